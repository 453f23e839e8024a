use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::model::draft_request::{DraftRequest, RequestKind, RequestStatus};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::{collect_documents, from_store_document, to_store_document};

/// Review outcome written together with a status change
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub status: RequestStatus,
    pub reviewed_by: String,
    pub assigned_ids: Vec<String>,
    pub rejection_reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait DraftRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        kind: RequestKind,
        id: &str,
    ) -> RepositoryResult<Option<DraftRequest>>;
    /// `AlreadyExists` when a draft is already stored under `draft.id`
    async fn insert(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest>;
    /// Replace the stored document only while it is still in `draft`.
    /// `Conflict` when it has moved on or is gone.
    async fn replace_draft(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest>;
    /// Drafts of an inquiry, oldest first
    async fn list(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        status: Option<RequestStatus>,
    ) -> RepositoryResult<Vec<DraftRequest>>;
    /// Compare-and-set on status. `Conflict` when the stored status is not `expected`.
    async fn review(
        &self,
        kind: RequestKind,
        id: &str,
        expected: RequestStatus,
        update: ReviewUpdate,
    ) -> RepositoryResult<DraftRequest>;
    /// Move the given drafts from `draft` to `pending`. Returns how many moved.
    async fn submit_batch(
        &self,
        kind: RequestKind,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64>;
    /// Delete only while the stored status equals `status`. Returns whether a document went away.
    async fn delete_if_status(
        &self,
        kind: RequestKind,
        id: &str,
        status: RequestStatus,
    ) -> RepositoryResult<bool>;
    async fn delete_many(&self, kind: RequestKind, ids: &[String]) -> RepositoryResult<u64>;
}

pub struct MongoDraftRequestRepository {
    client_requests: mongodb::Collection<Document>,
    project_requests: mongodb::Collection<Document>,
}

impl MongoDraftRequestRepository {
    pub fn new(db: &mongodb::Database, client_collection: &str, project_collection: &str) -> Self {
        MongoDraftRequestRepository {
            client_requests: db.collection::<Document>(client_collection),
            project_requests: db.collection::<Document>(project_collection),
        }
    }

    fn collection(&self, kind: RequestKind) -> &mongodb::Collection<Document> {
        match kind {
            RequestKind::Client => &self.client_requests,
            RequestKind::Project => &self.project_requests,
        }
    }
}

#[async_trait]
impl DraftRequestRepository for MongoDraftRequestRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_id(
        &self,
        kind: RequestKind,
        id: &str,
    ) -> RepositoryResult<Option<DraftRequest>> {
        match self.collection(kind).find_one(doc! { "_id": id }, None).await {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch {} {}: {}", kind.label(), id, e);
                Err(RepositoryError::database(format!("Failed to fetch {}: {}", kind.label(), e)))
            }
        }
    }

    #[tracing::instrument(skip(self, draft), fields(id = %draft.id, kind = %draft.kind))]
    async fn insert(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest> {
        let document = to_store_document(&draft)?;
        match self.collection(draft.kind).insert_one(document, None).await {
            Ok(_) => {
                info!("Created {}", draft.kind.label());
                Ok(draft)
            }
            Err(e) => {
                let e = RepositoryError::from(e);
                if !e.is_already_exists() {
                    error!("Failed to create {}: {}", draft.kind.label(), e);
                }
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self, draft), fields(id = %draft.id, kind = %draft.kind))]
    async fn replace_draft(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest> {
        let document = to_store_document(&draft)?;
        let filter = doc! { "_id": draft.id.as_str(), "status": RequestStatus::Draft.as_str() };
        match self.collection(draft.kind).replace_one(filter, document, None).await {
            Ok(r) if r.matched_count > 0 => {
                info!("Updated {}", draft.kind.label());
                Ok(draft)
            }
            Ok(_) => {
                warn!("{} {} is no longer a draft", draft.kind.label(), draft.id);
                Err(RepositoryError::conflict(format!(
                    "{} {} is no longer a draft",
                    draft.kind.label(),
                    draft.id
                )))
            }
            Err(e) => {
                error!("Failed to update {}: {}", draft.kind.label(), e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        status: Option<RequestStatus>,
    ) -> RepositoryResult<Vec<DraftRequest>> {
        let mut filter = doc! { "inquiryId": inquiry_id };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }
        let options = FindOptions::builder().sort(doc! { "createdAt": 1 }).build();
        let cursor = self.collection(kind).find(filter, options).await.map_err(|e| {
            error!("Failed to list {}s: {}", kind.label(), e);
            RepositoryError::database(format!("Failed to list {}s: {}", kind.label(), e))
        })?;
        collect_documents(cursor).await
    }

    #[tracing::instrument(skip(self, update), fields(to = %update.status))]
    async fn review(
        &self,
        kind: RequestKind,
        id: &str,
        expected: RequestStatus,
        update: ReviewUpdate,
    ) -> RepositoryResult<DraftRequest> {
        let at = bson::DateTime::from_chrono(update.at);
        let mut set = doc! {
            "status": update.status.as_str(),
            "reviewedBy": update.reviewed_by.as_str(),
            "reviewedAt": at,
            "updatedAt": at,
            "assignedIds": update.assigned_ids.clone(),
        };
        if let Some(reason) = &update.rejection_reason {
            set.insert("rejectionReason", reason.as_str());
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = self
            .collection(kind)
            .find_one_and_update(
                doc! { "_id": id, "status": expected.as_str() },
                doc! { "$set": set },
                options,
            )
            .await
            .map_err(|e| {
                error!("Failed to review {} {}: {}", kind.label(), id, e);
                RepositoryError::database(format!("Failed to review {}: {}", kind.label(), e))
            })?;

        match result {
            Some(document) => {
                info!("{} {} is now {}", kind.label(), id, update.status);
                from_store_document(document)
            }
            None => match self.find_by_id(kind, id).await? {
                Some(current) => {
                    warn!("{} {} is {}, expected {}", kind.label(), id, current.status, expected);
                    Err(RepositoryError::conflict(format!(
                        "{} {} is {}",
                        kind.label(),
                        id,
                        current.status
                    )))
                }
                None => Err(RepositoryError::not_found(format!("{} not found: {}", kind.label(), id))),
            },
        }
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn submit_batch(
        &self,
        kind: RequestKind,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let at = bson::DateTime::from_chrono(at);
        let result = self
            .collection(kind)
            .update_many(
                doc! { "_id": { "$in": ids }, "status": RequestStatus::Draft.as_str() },
                doc! { "$set": {
                    "status": RequestStatus::Pending.as_str(),
                    "submittedAt": at,
                    "updatedAt": at,
                } },
                None,
            )
            .await;
        match result {
            Ok(r) => {
                info!("Submitted {} {}s", r.modified_count, kind.label());
                Ok(r.modified_count)
            }
            Err(e) => {
                error!("Failed to submit {}s: {}", kind.label(), e);
                Err(RepositoryError::database(format!("Failed to submit {}s: {}", kind.label(), e)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_if_status(
        &self,
        kind: RequestKind,
        id: &str,
        status: RequestStatus,
    ) -> RepositoryResult<bool> {
        match self
            .collection(kind)
            .delete_one(doc! { "_id": id, "status": status.as_str() }, None)
            .await
        {
            Ok(r) => Ok(r.deleted_count > 0),
            Err(e) => {
                error!("Failed to delete {} {}: {}", kind.label(), id, e);
                Err(RepositoryError::database(format!("Failed to delete {}: {}", kind.label(), e)))
            }
        }
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_many(&self, kind: RequestKind, ids: &[String]) -> RepositoryResult<u64> {
        match self
            .collection(kind)
            .delete_many(doc! { "_id": { "$in": ids } }, None)
            .await
        {
            Ok(r) => Ok(r.deleted_count),
            Err(e) => {
                error!("Failed to delete {}s: {}", kind.label(), e);
                Err(RepositoryError::database(format!("Failed to delete {}s: {}", kind.label(), e)))
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDraftRequestRepository {
    drafts: Arc<RwLock<HashMap<(RequestKind, String), DraftRequest>>>,
}

impl InMemoryDraftRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftRequestRepository for InMemoryDraftRequestRepository {
    async fn find_by_id(
        &self,
        kind: RequestKind,
        id: &str,
    ) -> RepositoryResult<Option<DraftRequest>> {
        Ok(self.drafts.read().await.get(&(kind, id.to_string())).cloned())
    }

    async fn insert(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest> {
        let mut drafts = self.drafts.write().await;
        let key = (draft.kind, draft.id.clone());
        if drafts.contains_key(&key) {
            return Err(RepositoryError::already_exists(format!(
                "{} already exists: {}",
                draft.kind.label(),
                draft.id
            )));
        }
        drafts.insert(key, draft.clone());
        Ok(draft)
    }

    async fn replace_draft(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest> {
        let mut drafts = self.drafts.write().await;
        match drafts.get_mut(&(draft.kind, draft.id.clone())) {
            Some(stored) if stored.status == RequestStatus::Draft => {
                *stored = draft.clone();
                Ok(draft)
            }
            _ => Err(RepositoryError::conflict(format!(
                "{} {} is no longer a draft",
                draft.kind.label(),
                draft.id
            ))),
        }
    }

    async fn list(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        status: Option<RequestStatus>,
    ) -> RepositoryResult<Vec<DraftRequest>> {
        let drafts = self.drafts.read().await;
        let mut found: Vec<DraftRequest> = drafts
            .values()
            .filter(|d| d.kind == kind && d.inquiry_id == inquiry_id)
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn review(
        &self,
        kind: RequestKind,
        id: &str,
        expected: RequestStatus,
        update: ReviewUpdate,
    ) -> RepositoryResult<DraftRequest> {
        let mut drafts = self.drafts.write().await;
        let draft = drafts
            .get_mut(&(kind, id.to_string()))
            .ok_or_else(|| RepositoryError::not_found(format!("{} not found: {}", kind.label(), id)))?;
        if draft.status != expected {
            return Err(RepositoryError::conflict(format!("{} {} is {}", kind.label(), id, draft.status)));
        }
        draft.status = update.status;
        draft.reviewed_by = Some(update.reviewed_by);
        draft.reviewed_at = Some(update.at);
        draft.updated_at = update.at;
        draft.assigned_ids = update.assigned_ids;
        if update.rejection_reason.is_some() {
            draft.rejection_reason = update.rejection_reason;
        }
        Ok(draft.clone())
    }

    async fn submit_batch(
        &self,
        kind: RequestKind,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        // one write lock for the whole batch
        let mut drafts = self.drafts.write().await;
        let mut moved = 0;
        for id in ids {
            if let Some(draft) = drafts.get_mut(&(kind, id.clone())) {
                if draft.status == RequestStatus::Draft {
                    draft.status = RequestStatus::Pending;
                    draft.submitted_at = Some(at);
                    draft.updated_at = at;
                    moved += 1;
                }
            }
        }
        Ok(moved)
    }

    async fn delete_if_status(
        &self,
        kind: RequestKind,
        id: &str,
        status: RequestStatus,
    ) -> RepositoryResult<bool> {
        let mut drafts = self.drafts.write().await;
        let key = (kind, id.to_string());
        match drafts.get(&key) {
            Some(draft) if draft.status == status => {
                drafts.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_many(&self, kind: RequestKind, ids: &[String]) -> RepositoryResult<u64> {
        let mut drafts = self.drafts.write().await;
        let mut deleted = 0;
        for id in ids {
            if drafts.remove(&(kind, id.clone())).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
