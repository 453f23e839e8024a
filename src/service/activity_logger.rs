use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crate::model::activity_log::{ActivityLog, ActivityLogFilter};
use crate::repository::activity_log_repo::ActivityLogRepository;
use crate::util::error::{ServiceError, ServiceResult};

/// Upper bound on entries returned by one query
pub const MAX_QUERY_LIMIT: usize = 500;

#[async_trait]
pub trait ActivityLogService: Send + Sync {
    /// Append an entry. Failures are reported through tracing and never
    /// returned, so auditing cannot abort the operation being audited.
    async fn record(&self, log: ActivityLog);
    /// Matching entries, newest first
    async fn query(&self, filter: ActivityLogFilter) -> ServiceResult<Vec<ActivityLog>>;
}

pub struct ActivityLogServiceImpl {
    repo: Arc<dyn ActivityLogRepository>,
}

impl ActivityLogServiceImpl {
    pub fn new(repo: Arc<dyn ActivityLogRepository>) -> Self {
        ActivityLogServiceImpl { repo }
    }
}

#[async_trait]
impl ActivityLogService for ActivityLogServiceImpl {
    #[instrument(skip(self, log), fields(action = log.action.as_str(), entity = %log.entity_id))]
    async fn record(&self, log: ActivityLog) {
        match self.repo.append(log).await {
            Ok(()) => debug!("Activity recorded"),
            Err(e) => error!("Failed to record activity: {}", e),
        }
    }

    #[instrument(skip(self))]
    async fn query(&self, filter: ActivityLogFilter) -> ServiceResult<Vec<ActivityLog>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ServiceError::validation("'from' must not be after 'to'"));
            }
        }
        let mut logs = self.repo.find(&filter).await.map_err(|e| {
            error!("Failed to query activity logs: {}", e);
            ServiceError::from(e)
        })?;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(filter.limit.unwrap_or(MAX_QUERY_LIMIT).min(MAX_QUERY_LIMIT));
        Ok(logs)
    }
}
