use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::model::project::{ProjectRecord, ProjectStatus};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::{from_store_document, to_store_document};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// `AlreadyExists` when the id or the idempotency key is taken
    async fn insert(&self, project: ProjectRecord) -> RepositoryResult<ProjectRecord>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ProjectRecord>>;
    async fn find_by_idempotency_key(&self, key: &str) -> RepositoryResult<Option<ProjectRecord>>;
    /// Set-union `names` into `clientNames`
    async fn add_client_names(
        &self,
        id: &str,
        names: &[String],
        now: DateTime<Utc>,
    ) -> RepositoryResult<()>;
    /// `Pending -> Ongoing`, stamping who and why. Returns false when the
    /// project was already past `Pending`.
    async fn activate_if_pending(
        &self,
        id: &str,
        changed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;
}

pub struct MongoProjectRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoProjectRepository {
    pub fn new(db: &mongodb::Database, collection_name: &str) -> Self {
        MongoProjectRepository {
            collection: db.collection::<Document>(collection_name),
        }
    }

    pub async fn ensure_indexes(&self) -> RepositoryResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "idempotencyKey": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        info!("Project indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for MongoProjectRepository {
    #[tracing::instrument(skip(self, project), fields(id = %project.id))]
    async fn insert(&self, project: ProjectRecord) -> RepositoryResult<ProjectRecord> {
        let document = to_store_document(&project)?;
        match self.collection.insert_one(document, None).await {
            Ok(_) => {
                info!("Project record created");
                Ok(project)
            }
            Err(e) => {
                let err = RepositoryError::from(e);
                error!("Failed to create project record: {}", err);
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ProjectRecord>> {
        match self.collection.find_one(doc! { "_id": id }, None).await {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch project {}: {}", id, e);
                Err(RepositoryError::database(format!("Failed to fetch project: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_idempotency_key(&self, key: &str) -> RepositoryResult<Option<ProjectRecord>> {
        match self.collection.find_one(doc! { "idempotencyKey": key }, None).await {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch project by key {}: {}", key, e);
                Err(RepositoryError::database(format!("Failed to fetch project: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self, names), fields(count = names.len()))]
    async fn add_client_names(
        &self,
        id: &str,
        names: &[String],
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$addToSet": { "clientNames": { "$each": names } },
                    "$set": { "updatedAt": bson::DateTime::from_chrono(now) },
                },
                None,
            )
            .await;
        match result {
            Ok(r) if r.matched_count > 0 => Ok(()),
            Ok(_) => Err(RepositoryError::not_found(format!("Project not found: {}", id))),
            Err(e) => {
                error!("Failed to merge client names into {}: {}", id, e);
                Err(RepositoryError::database(format!("Failed to update project: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn activate_if_pending(
        &self,
        id: &str,
        changed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let at = bson::DateTime::from_chrono(now);
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "status": ProjectStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": ProjectStatus::Ongoing.as_str(),
                    "statusChangedBy": changed_by,
                    "statusReason": reason,
                    "statusChangedAt": at,
                    "updatedAt": at,
                } },
                None,
            )
            .await
            .map_err(|e| {
                error!("Failed to activate project {}: {}", id, e);
                RepositoryError::database(format!("Failed to activate project: {}", e))
            })?;
        Ok(result.modified_count > 0)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryProjectRepository {
    projects: Arc<RwLock<HashMap<String, ProjectRecord>>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn insert(&self, project: ProjectRecord) -> RepositoryResult<ProjectRecord> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id)
            || projects.values().any(|p| p.idempotency_key == project.idempotency_key)
        {
            return Err(RepositoryError::already_exists(format!("Duplicate key: project {}", project.id)));
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ProjectRecord>> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> RepositoryResult<Option<ProjectRecord>> {
        Ok(self
            .projects
            .read()
            .await
            .values()
            .find(|p| p.idempotency_key == key)
            .cloned())
    }

    async fn add_client_names(
        &self,
        id: &str,
        names: &[String],
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found(format!("Project not found: {}", id)))?;
        if !project.merge_client_names(names).is_empty() {
            project.updated_at = now;
        }
        Ok(())
    }

    async fn activate_if_pending(
        &self,
        id: &str,
        changed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found(format!("Project not found: {}", id)))?;
        if project.status != ProjectStatus::Pending {
            return Ok(false);
        }
        project.status = ProjectStatus::Ongoing;
        project.status_changed_by = Some(changed_by.to_string());
        project.status_reason = Some(reason.to_string());
        project.status_changed_at = Some(now);
        project.updated_at = now;
        Ok(true)
    }
}
