use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::model::quotation::{QuotationThread, ThreadStatus};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::{collect_documents, from_store_document, to_store_document};

#[async_trait]
pub trait QuotationThreadRepository: Send + Sync {
    /// `AlreadyExists` if the inquiry already has a thread
    async fn insert(&self, thread: QuotationThread) -> RepositoryResult<QuotationThread>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<QuotationThread>>;
    /// Replace the stored thread only if its revision is still `expected_revision`.
    /// The caller has already bumped `thread.revision`.
    async fn replace(
        &self,
        thread: &QuotationThread,
        expected_revision: i64,
    ) -> RepositoryResult<()>;
    async fn list(&self, status: Option<ThreadStatus>) -> RepositoryResult<Vec<QuotationThread>>;
}

pub struct MongoQuotationThreadRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoQuotationThreadRepository {
    pub fn new(db: &mongodb::Database, collection_name: &str) -> Self {
        MongoQuotationThreadRepository {
            collection: db.collection::<Document>(collection_name),
        }
    }
}

#[async_trait]
impl QuotationThreadRepository for MongoQuotationThreadRepository {
    #[tracing::instrument(skip(self, thread), fields(id = %thread.id))]
    async fn insert(&self, thread: QuotationThread) -> RepositoryResult<QuotationThread> {
        let document = to_store_document(&thread)?;
        match self.collection.insert_one(document, None).await {
            Ok(_) => {
                info!("Quotation thread created");
                Ok(thread)
            }
            Err(e) => {
                let err = RepositoryError::from(e);
                if !err.is_already_exists() {
                    error!("Failed to create quotation thread: {}", err);
                }
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<QuotationThread>> {
        match self.collection.find_one(doc! { "_id": id }, None).await {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch quotation thread {}: {}", id, e);
                Err(RepositoryError::database(format!("Failed to fetch quotation thread: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self, thread), fields(id = %thread.id, revision = thread.revision))]
    async fn replace(
        &self,
        thread: &QuotationThread,
        expected_revision: i64,
    ) -> RepositoryResult<()> {
        let document = to_store_document(thread)?;
        let result = self
            .collection
            .replace_one(
                doc! { "_id": thread.id.as_str(), "revision": expected_revision },
                document,
                None,
            )
            .await
            .map_err(|e| {
                error!("Failed to save quotation thread: {}", e);
                RepositoryError::database(format!("Failed to save quotation thread: {}", e))
            })?;
        if result.matched_count == 0 {
            warn!("Quotation thread {} changed concurrently", thread.id);
            return Err(RepositoryError::conflict(format!(
                "Quotation thread {} is no longer at revision {}",
                thread.id, expected_revision
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, status: Option<ThreadStatus>) -> RepositoryResult<Vec<QuotationThread>> {
        let filter = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => doc! {},
        };
        let cursor = self.collection.find(filter, None).await.map_err(|e| {
            error!("Failed to list quotation threads: {}", e);
            RepositoryError::database(format!("Failed to list quotation threads: {}", e))
        })?;
        let mut threads: Vec<QuotationThread> = collect_documents(cursor).await?;
        sort_by_activity(&mut threads);
        Ok(threads)
    }
}

/// Most recent activity first; threads without messages fall back to `updatedAt`
fn sort_by_activity(threads: &mut [QuotationThread]) {
    threads.sort_by(|a, b| {
        let a_at = a.last_message_at.unwrap_or(a.updated_at);
        let b_at = b.last_message_at.unwrap_or(b.updated_at);
        b_at.cmp(&a_at)
    });
}

#[derive(Default, Clone)]
pub struct InMemoryQuotationThreadRepository {
    threads: Arc<RwLock<HashMap<String, QuotationThread>>>,
}

impl InMemoryQuotationThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotationThreadRepository for InMemoryQuotationThreadRepository {
    async fn insert(&self, thread: QuotationThread) -> RepositoryResult<QuotationThread> {
        let mut threads = self.threads.write().await;
        if threads.contains_key(&thread.id) {
            return Err(RepositoryError::already_exists(format!("Duplicate key: thread {}", thread.id)));
        }
        threads.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<QuotationThread>> {
        Ok(self.threads.read().await.get(id).cloned())
    }

    async fn replace(
        &self,
        thread: &QuotationThread,
        expected_revision: i64,
    ) -> RepositoryResult<()> {
        let mut threads = self.threads.write().await;
        match threads.get(&thread.id) {
            Some(stored) if stored.revision == expected_revision => {
                threads.insert(thread.id.clone(), thread.clone());
                Ok(())
            }
            Some(_) => Err(RepositoryError::conflict(format!(
                "Quotation thread {} is no longer at revision {}",
                thread.id, expected_revision
            ))),
            None => Err(RepositoryError::not_found(format!("Quotation thread not found: {}", thread.id))),
        }
    }

    async fn list(&self, status: Option<ThreadStatus>) -> RepositoryResult<Vec<QuotationThread>> {
        let mut threads: Vec<QuotationThread> = self
            .threads
            .read()
            .await
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        sort_by_activity(&mut threads);
        Ok(threads)
    }
}
