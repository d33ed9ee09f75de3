// Postgres token store access.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::PostgresConfig;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::types::{MappingMethod, Outlier};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &PostgresConfig) -> ConfluenceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await
            .map_err(|e| {
                ConfluenceError::database_connection(format!(
                    "postgres at {}:{}: {e}",
                    config.host, config.port
                ))
            })?;

        info!(
            host = %config.host,
            database = %config.database,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, shared-pool setups).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert flagged outliers in one transaction, `is_resolved = false`.
    pub async fn insert_outliers(&self, outliers: &[Outlier]) -> ConfluenceResult<()> {
        if outliers.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for outlier in outliers {
            sqlx::query(
                "INSERT INTO price_outliers \
                 (exchange_id, base_token_id, quote_token_id, exchange_price, \
                  average_price, deviation_percent, standard_deviations, \
                  mapping_method, is_resolved, detected_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9)",
            )
            .bind(&outlier.exchange_id)
            .bind(outlier.base_token_id)
            .bind(outlier.quote_token_id)
            .bind(outlier.exchange_price)
            .bind(outlier.average_price)
            .bind(outlier.deviation_percent)
            .bind(outlier.std_deviations)
            .bind(outlier.mapping_method.as_str())
            .bind(outlier.detected_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Unresolved outliers for operator review, worst deviation first.
    pub async fn unresolved_outliers(&self, limit: i64) -> ConfluenceResult<Vec<Outlier>> {
        type Row = (
            String,
            i32,
            i32,
            Decimal,
            Decimal,
            f64,
            f64,
            String,
            DateTime<Utc>,
        );
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT exchange_id, base_token_id, quote_token_id, exchange_price, \
                    average_price, deviation_percent, standard_deviations, \
                    mapping_method, detected_at \
             FROM price_outliers \
             WHERE is_resolved = FALSE \
             ORDER BY deviation_percent DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    exchange_id,
                    base_token_id,
                    quote_token_id,
                    exchange_price,
                    average_price,
                    deviation_percent,
                    std_deviations,
                    method,
                    detected_at,
                )| Outlier {
                    exchange_id,
                    base_token_id,
                    quote_token_id,
                    exchange_price,
                    average_price,
                    deviation_percent,
                    std_deviations,
                    mapping_method: MappingMethod::from_str_opt(&method)
                        .unwrap_or(MappingMethod::Symbol),
                    detected_at,
                    is_resolved: false,
                },
            )
            .collect())
    }
}
