use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use tokio::sync::RwLock;
use tracing::error;

use crate::model::activity_log::{ActivityLog, ActivityLogFilter};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::{collect_documents, to_store_document};

#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    async fn append(&self, log: ActivityLog) -> RepositoryResult<()>;
    /// Entries matching `filter`, in store order. Callers sort.
    async fn find(&self, filter: &ActivityLogFilter) -> RepositoryResult<Vec<ActivityLog>>;
}

pub struct MongoActivityLogRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoActivityLogRepository {
    pub fn new(db: &mongodb::Database, collection_name: &str) -> Self {
        MongoActivityLogRepository {
            collection: db.collection::<Document>(collection_name),
        }
    }
}

fn filter_document(filter: &ActivityLogFilter) -> Document {
    let mut query = Document::new();
    if let Some(actor) = &filter.actor {
        query.insert("actor", actor.as_str());
    }
    if let Some(entity_type) = filter.entity_type {
        query.insert("entityType", entity_type.as_str());
    }
    if let Some(entity_id) = &filter.entity_id {
        query.insert("entityId", entity_id.as_str());
    }
    if let Some(action) = filter.action {
        query.insert("action", action.as_str());
    }
    let mut range = Document::new();
    if let Some(from) = filter.from {
        range.insert("$gte", bson::DateTime::from_chrono(from));
    }
    if let Some(to) = filter.to {
        range.insert("$lte", bson::DateTime::from_chrono(to));
    }
    if !range.is_empty() {
        query.insert("timestamp", range);
    }
    query
}

#[async_trait]
impl ActivityLogRepository for MongoActivityLogRepository {
    #[tracing::instrument(skip(self, log), fields(action = log.action.as_str(), entity = %log.entity_id))]
    async fn append(&self, log: ActivityLog) -> RepositoryResult<()> {
        let document = to_store_document(&log)?;
        self.collection.insert_one(document, None).await.map_err(|e| {
            error!("Failed to append activity log: {}", e);
            RepositoryError::database(format!("Failed to append activity log: {}", e))
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find(&self, filter: &ActivityLogFilter) -> RepositoryResult<Vec<ActivityLog>> {
        let cursor = self
            .collection
            .find(filter_document(filter), None)
            .await
            .map_err(|e| {
                error!("Failed to query activity logs: {}", e);
                RepositoryError::database(format!("Failed to query activity logs: {}", e))
            })?;
        collect_documents(cursor).await
    }
}

#[derive(Default, Clone)]
pub struct InMemoryActivityLogRepository {
    logs: Arc<RwLock<Vec<ActivityLog>>>,
}

impl InMemoryActivityLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityLogRepository for InMemoryActivityLogRepository {
    async fn append(&self, log: ActivityLog) -> RepositoryResult<()> {
        self.logs.write().await.push(log);
        Ok(())
    }

    async fn find(&self, filter: &ActivityLogFilter) -> RepositoryResult<Vec<ActivityLog>> {
        Ok(self
            .logs
            .read()
            .await
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::activity_log::{ActivityAction, EntityType};

    #[test]
    fn test_filter_document_builds_time_range() {
        let filter = ActivityLogFilter {
            entity_type: Some(EntityType::ClientRequest),
            action: Some(ActivityAction::Approve),
            from: Some(chrono::Utc::now()),
            ..ActivityLogFilter::default()
        };
        let query = filter_document(&filter);
        assert_eq!(query.get_str("entityType").unwrap(), "client_request");
        assert_eq!(query.get_str("action").unwrap(), "APPROVE");
        assert!(query.get_document("timestamp").unwrap().contains_key("$gte"));
        assert!(!query.contains_key("actor"));
    }
}
