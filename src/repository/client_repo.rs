use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::IndexModel;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::model::client::ClientRecord;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::{collect_documents, from_store_document, to_store_document};

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// `AlreadyExists` when the id or the idempotency key is taken
    async fn insert(&self, client: ClientRecord) -> RepositoryResult<ClientRecord>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ClientRecord>>;
    async fn find_by_idempotency_key(&self, key: &str) -> RepositoryResult<Option<ClientRecord>>;
    async fn list_by_inquiry(&self, inquiry_id: &str) -> RepositoryResult<Vec<ClientRecord>>;
}

pub struct MongoClientRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoClientRepository {
    pub fn new(db: &mongodb::Database, collection_name: &str) -> Self {
        MongoClientRepository {
            collection: db.collection::<Document>(collection_name),
        }
    }

    pub async fn ensure_indexes(&self) -> RepositoryResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "idempotencyKey": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        info!("Client indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for MongoClientRepository {
    #[tracing::instrument(skip(self, client), fields(id = %client.id, key = %client.idempotency_key))]
    async fn insert(&self, client: ClientRecord) -> RepositoryResult<ClientRecord> {
        let document = to_store_document(&client)?;
        match self.collection.insert_one(document, None).await {
            Ok(_) => {
                info!("Client record created");
                Ok(client)
            }
            Err(e) => {
                let err = RepositoryError::from(e);
                error!("Failed to create client record: {}", err);
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ClientRecord>> {
        match self.collection.find_one(doc! { "_id": id }, None).await {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch client {}: {}", id, e);
                Err(RepositoryError::database(format!("Failed to fetch client: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_idempotency_key(&self, key: &str) -> RepositoryResult<Option<ClientRecord>> {
        match self.collection.find_one(doc! { "idempotencyKey": key }, None).await {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch client by key {}: {}", key, e);
                Err(RepositoryError::database(format!("Failed to fetch client: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_inquiry(&self, inquiry_id: &str) -> RepositoryResult<Vec<ClientRecord>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self
            .collection
            .find(doc! { "inquiryId": inquiry_id }, options)
            .await
            .map_err(|e| {
                error!("Failed to list clients: {}", e);
                RepositoryError::database(format!("Failed to list clients: {}", e))
            })?;
        collect_documents(cursor).await
    }
}

#[derive(Default, Clone)]
pub struct InMemoryClientRepository {
    clients: Arc<RwLock<HashMap<String, ClientRecord>>>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn insert(&self, client: ClientRecord) -> RepositoryResult<ClientRecord> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.id) {
            return Err(RepositoryError::already_exists(format!("Duplicate key: client {}", client.id)));
        }
        if clients.values().any(|c| c.idempotency_key == client.idempotency_key) {
            return Err(RepositoryError::already_exists(format!(
                "Duplicate key: idempotencyKey {}",
                client.idempotency_key
            )));
        }
        clients.insert(client.id.clone(), client.clone());
        Ok(client)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ClientRecord>> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> RepositoryResult<Option<ClientRecord>> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .find(|c| c.idempotency_key == key)
            .cloned())
    }

    async fn list_by_inquiry(&self, inquiry_id: &str) -> RepositoryResult<Vec<ClientRecord>> {
        let mut found: Vec<ClientRecord> = self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.inquiry_id == inquiry_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}
