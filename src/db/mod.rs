// Storage layer: Postgres holds the token store (tokens, mappings, outliers);
// InfluxDB holds the time-series families with retention-enforced TTLs.

pub mod datapoints;
pub mod influx;
pub mod postgres;

pub use influx::{InfluxSink, Series, SinkQueue};
pub use postgres::PostgresStore;
