use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::config::identifier_conf::IdentifierConfig;
use crate::model::counter::IdKind;
use crate::repository::counter_repo::CounterRepository;
use crate::util::error::{ServiceError, ServiceResult};

/// Issues year-scoped human readable identifiers such as `CL-2025-001`.
#[async_trait]
pub trait IdentifierAllocator: Send + Sync {
    /// Never returns the same identifier twice for a `(kind, year)` scope.
    async fn next_id(&self, kind: IdKind, year: i32) -> ServiceResult<String>;
}

pub fn format_identifier(prefix: &str, year: i32, sequence: i64, width: usize) -> String {
    format!("{}-{}-{:0width$}", prefix, year, sequence, width = width)
}

pub struct SequentialIdAllocator {
    counters: Arc<dyn CounterRepository>,
    config: IdentifierConfig,
}

impl SequentialIdAllocator {
    pub fn new(counters: Arc<dyn CounterRepository>, config: IdentifierConfig) -> Self {
        SequentialIdAllocator { counters, config }
    }

    fn prefix(&self, kind: IdKind) -> &str {
        match kind {
            IdKind::Client => &self.config.client_prefix,
            IdKind::Project => &self.config.project_prefix,
        }
    }
}

#[async_trait]
impl IdentifierAllocator for SequentialIdAllocator {
    #[instrument(skip(self))]
    async fn next_id(&self, kind: IdKind, year: i32) -> ServiceResult<String> {
        let sequence = self.counters.increment(kind, year).await.map_err(|e| {
            error!("Failed to allocate {} identifier: {}", kind, e);
            ServiceError::from(e)
        })?;
        if sequence < 1 {
            return Err(ServiceError::AllocationConflict(format!(
                "Counter {}-{} returned {}",
                kind, year, sequence
            )));
        }
        let id = format_identifier(self.prefix(kind), year, sequence, self.config.sequence_width);
        info!(id = %id, "Allocated identifier");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_identifier_pads_sequence() {
        assert_eq!(format_identifier("CL", 2025, 7, 3), "CL-2025-007");
        assert_eq!(format_identifier("P", 2024, 42, 4), "P-2024-0042");
    }

    #[test]
    fn test_format_identifier_grows_past_width() {
        assert_eq!(format_identifier("CL", 2025, 1234, 3), "CL-2025-1234");
    }
}
