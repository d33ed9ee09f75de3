// Adapter construction from the exchange descriptor document.

use std::sync::Arc;

use tracing::info;

use crate::config::ExchangeDescriptor;
use crate::error::ConfluenceResult;

use super::parsers::parser_for;
use super::{ExchangeClient, RestExchangeAdapter};

/// Build one REST adapter per enabled descriptor.
pub fn build_adapters(
    descriptors: Vec<ExchangeDescriptor>,
) -> ConfluenceResult<Vec<Arc<dyn ExchangeClient>>> {
    let mut adapters: Vec<Arc<dyn ExchangeClient>> = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let parser = parser_for(&descriptor);
        let adapter = RestExchangeAdapter::new(descriptor, parser)?;
        info!(
            exchange = adapter.id(),
            weight = %adapter.weight(),
            rate_interval_ms = adapter.min_call_interval().as_millis() as u64,
            "exchange adapter ready"
        );
        adapters.push(Arc::new(adapter));
    }

    Ok(adapters)
}
