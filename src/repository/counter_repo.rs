use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::model::counter::{counter_scope, IdKind, SequenceCounter};
use crate::repository::from_store_document;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Atomically increment the `(kind, year)` counter and return the new
    /// value. A scope that has never been used starts at 1.
    async fn increment(&self, kind: IdKind, year: i32) -> RepositoryResult<i64>;
    /// Last value handed out for the scope, 0 when unused. Read-only, for
    /// inspection; allocation always goes through `increment`.
    async fn current(&self, kind: IdKind, year: i32) -> RepositoryResult<i64>;
}

pub struct MongoCounterRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoCounterRepository {
    pub fn new(db: &mongodb::Database, collection_name: &str) -> Self {
        MongoCounterRepository {
            collection: db.collection::<Document>(collection_name),
        }
    }
}

#[async_trait]
impl CounterRepository for MongoCounterRepository {
    #[tracing::instrument(skip(self))]
    async fn increment(&self, kind: IdKind, year: i32) -> RepositoryResult<i64> {
        let scope = counter_scope(kind, year);
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let result = self
            .collection
            .find_one_and_update(
                doc! { "_id": scope.as_str() },
                doc! {
                    "$inc": { "value": 1_i64 },
                    "$setOnInsert": { "kind": kind.as_str(), "year": year },
                },
                options,
            )
            .await
            .map_err(|e| {
                error!("Failed to increment counter {}: {}", scope, e);
                RepositoryError::from(e)
            })?;

        let document = result
            .ok_or_else(|| RepositoryError::database(format!("Counter {} missing after upsert", scope)))?;
        let counter: SequenceCounter = from_store_document(document)?;
        debug!(scope = %scope, value = counter.value, "Counter incremented");
        Ok(counter.value)
    }

    #[tracing::instrument(skip(self))]
    async fn current(&self, kind: IdKind, year: i32) -> RepositoryResult<i64> {
        let scope = counter_scope(kind, year);
        match self.collection.find_one(doc! { "_id": scope.as_str() }, None).await {
            Ok(Some(document)) => Ok(from_store_document::<SequenceCounter>(document)?.value),
            Ok(None) => Ok(0),
            Err(e) => {
                error!("Failed to read counter {}: {}", scope, e);
                Err(RepositoryError::database(format!("Failed to read counter: {}", e)))
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCounterRepository {
    counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryCounterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterRepository for InMemoryCounterRepository {
    async fn increment(&self, kind: IdKind, year: i32) -> RepositoryResult<i64> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(counter_scope(kind, year)).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn current(&self, kind: IdKind, year: i32) -> RepositoryResult<i64> {
        Ok(self
            .counters
            .lock()
            .await
            .get(&counter_scope(kind, year))
            .copied()
            .unwrap_or(0))
    }
}
