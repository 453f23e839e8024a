use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::dto::draft_dto::{PurgeOutcome, SubmitDraftsRequest, SubmitOutcome, UpsertDraftRequest};
use crate::model::activity_log::{ActivityAction, ActivityLog, EntityType};
use crate::model::draft_request::{DraftKey, DraftRequest, RequestKind, RequestStatus};
use crate::repository::draft_request_repo::DraftRequestRepository;
use crate::repository::inquiry_repo::InquiryRepository;
use crate::repository::repository_error::RepositoryError;
use crate::service::activity_logger::ActivityLogService;
use crate::util::error::{ServiceError, ServiceResult};

/// Bulk deletes are issued in chunks of this many documents
pub const PURGE_CHUNK_SIZE: usize = 500;

pub fn entity_type(kind: RequestKind) -> EntityType {
    match kind {
        RequestKind::Client => EntityType::ClientRequest,
        RequestKind::Project => EntityType::ProjectRequest,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftChange {
    pub kind: RequestKind,
    pub inquiry_id: String,
}

/// Fan-out of draft changes to live subscribers. Shared by every service
/// that writes drafts.
#[derive(Clone)]
pub struct DraftEvents {
    sender: broadcast::Sender<DraftChange>,
}

impl DraftEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        DraftEvents { sender }
    }

    pub fn publish(&self, kind: RequestKind, inquiry_id: &str) {
        // no receivers is fine
        let _ = self.sender.send(DraftChange {
            kind,
            inquiry_id: inquiry_id.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DraftChange> {
        self.sender.subscribe()
    }
}

impl Default for DraftEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
pub trait DraftService: Send + Sync {
    /// Create the draft at the request's composite key, or merge into it
    /// while it is still a draft.
    async fn upsert_draft(&self, request: UpsertDraftRequest) -> ServiceResult<DraftRequest>;
    async fn get_draft(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        submitter_email: &str,
        scope: Option<&str>,
    ) -> ServiceResult<Option<DraftRequest>>;
    async fn list_drafts(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        status: Option<RequestStatus>,
    ) -> ServiceResult<Vec<DraftRequest>>;
    /// Cancel a draft. Anything past `draft` is refused.
    async fn delete_draft(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        submitter_email: &str,
        scope: Option<&str>,
        actor: &str,
    ) -> ServiceResult<()>;
    /// Move every `draft` of the inquiry (optionally one project request) to
    /// `pending` in one batch.
    async fn submit_for_approval(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        request: SubmitDraftsRequest,
    ) -> ServiceResult<SubmitOutcome>;
    /// Delete the unreviewed drafts of an inquiry in chunks
    async fn purge_inquiry_drafts(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        actor: &str,
    ) -> ServiceResult<PurgeOutcome>;
    /// Current drafts, then a fresh snapshot after every change to the inquiry
    fn subscribe(
        &self,
        kind: RequestKind,
        inquiry_id: String,
        status: Option<RequestStatus>,
    ) -> BoxStream<'static, ServiceResult<Vec<DraftRequest>>>;
}

pub struct DraftServiceImpl {
    drafts: Arc<dyn DraftRequestRepository>,
    inquiries: Arc<dyn InquiryRepository>,
    activity: Arc<dyn ActivityLogService>,
    events: DraftEvents,
}

impl DraftServiceImpl {
    pub fn new(
        drafts: Arc<dyn DraftRequestRepository>,
        inquiries: Arc<dyn InquiryRepository>,
        activity: Arc<dyn ActivityLogService>,
        events: DraftEvents,
    ) -> Self {
        DraftServiceImpl {
            drafts,
            inquiries,
            activity,
            events,
        }
    }

    async fn find_by_key(
        &self,
        kind: RequestKind,
        key: &DraftKey,
    ) -> ServiceResult<Option<DraftRequest>> {
        Ok(self.drafts.find_by_id(kind, &key.as_id()).await?)
    }

    async fn current_status_error(
        &self,
        kind: RequestKind,
        id: &str,
        attempted: &str,
    ) -> ServiceError {
        match self.drafts.find_by_id(kind, id).await {
            Ok(Some(current)) => ServiceError::invalid_transition(kind.label(), id, current.status, attempted),
            Ok(None) => ServiceError::not_found(format!("{} not found: {}", kind.label(), id)),
            Err(e) => ServiceError::from(e),
        }
    }
}

#[async_trait]
impl DraftService for DraftServiceImpl {
    #[instrument(skip(self, request), fields(inquiry = %request.inquiry_id, submitter = %request.submitter_email))]
    async fn upsert_draft(&self, request: UpsertDraftRequest) -> ServiceResult<DraftRequest> {
        request.validate()?;
        request.payload.validate()?;
        let kind = request.payload.kind();

        if self.inquiries.find_by_id(&request.inquiry_id).await?.is_none() {
            return Err(ServiceError::not_found(format!("Inquiry not found: {}", request.inquiry_id)));
        }
        if kind == RequestKind::Project && request.project_request_id.is_some() {
            return Err(ServiceError::validation("A project request cannot belong to another project request"));
        }
        if let Some(parent) = &request.project_request_id {
            if self.drafts.find_by_id(RequestKind::Project, parent).await?.is_none() {
                return Err(ServiceError::not_found(format!("project request not found: {}", parent)));
            }
        }

        let key = request.key();
        let now = Utc::now();
        let mut saved = None;
        // a create that loses to a concurrent create falls back to an update
        for _ in 0..2 {
            if let Some(mut existing) = self.find_by_key(kind, &key).await? {
                if existing.status != RequestStatus::Draft {
                    return Err(ServiceError::invalid_transition(
                        kind.label(),
                        &existing.id,
                        existing.status,
                        "update",
                    ));
                }
                existing.payload = request.payload.clone();
                if request.project_id.is_some() {
                    existing.project_id = request.project_id.clone();
                }
                existing.updated_at = now;
                match self.drafts.replace_draft(existing).await {
                    Ok(draft) => saved = Some((draft, ActivityAction::Update)),
                    Err(RepositoryError::Conflict(_)) => {
                        return Err(self.current_status_error(kind, &key.as_id(), "update").await)
                    }
                    Err(e) => {
                        error!("Failed to save {}: {}", kind.label(), e);
                        return Err(ServiceError::from(e));
                    }
                }
                break;
            }

            let draft = DraftRequest {
                id: key.as_id(),
                kind,
                inquiry_id: key.inquiry_id.clone(),
                submitted_by: key.submitter_email.clone(),
                project_request_id: key.scope.clone(),
                project_id: request.project_id.clone(),
                payload: request.payload.clone(),
                status: RequestStatus::Draft,
                assigned_ids: Vec::new(),
                created_at: now,
                updated_at: now,
                submitted_at: None,
                reviewed_at: None,
                reviewed_by: None,
                rejection_reason: None,
            };
            match self.drafts.insert(draft).await {
                Ok(draft) => {
                    saved = Some((draft, ActivityAction::Create));
                    break;
                }
                Err(e) if e.is_already_exists() => continue,
                Err(e) => {
                    error!("Failed to save {}: {}", kind.label(), e);
                    return Err(ServiceError::from(e));
                }
            }
        }
        let (saved, action) = saved.ok_or_else(|| {
            ServiceError::Conflict(format!("{} {} kept changing, try again", kind.label(), key.as_id()))
        })?;
        info!(id = %saved.id, "Saved {}", kind.label());

        self.activity
            .record(ActivityLog::new(
                &saved.submitted_by,
                action,
                entity_type(kind),
                &saved.id,
                format!("{} {} saved as draft", kind.label(), saved.id),
            ))
            .await;
        self.events.publish(kind, &saved.inquiry_id);
        Ok(saved)
    }

    #[instrument(skip(self))]
    async fn get_draft(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        submitter_email: &str,
        scope: Option<&str>,
    ) -> ServiceResult<Option<DraftRequest>> {
        self.find_by_key(kind, &DraftKey::new(inquiry_id, submitter_email, scope)).await
    }

    #[instrument(skip(self))]
    async fn list_drafts(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        status: Option<RequestStatus>,
    ) -> ServiceResult<Vec<DraftRequest>> {
        Ok(self.drafts.list(kind, inquiry_id, status).await?)
    }

    #[instrument(skip(self))]
    async fn delete_draft(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        submitter_email: &str,
        scope: Option<&str>,
        actor: &str,
    ) -> ServiceResult<()> {
        let key = DraftKey::new(inquiry_id, submitter_email, scope);
        let id = key.as_id();
        let draft = self
            .find_by_key(kind, &key)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{} not found: {}", kind.label(), id)))?;
        if draft.status != RequestStatus::Draft {
            return Err(ServiceError::invalid_transition(kind.label(), &id, draft.status, "delete"));
        }
        if !self.drafts.delete_if_status(kind, &id, RequestStatus::Draft).await? {
            // submitted between the read and the delete
            return Err(self.current_status_error(kind, &id, "delete").await);
        }
        info!(id = %id, "Deleted {}", kind.label());

        self.activity
            .record(ActivityLog::new(
                actor,
                ActivityAction::Delete,
                entity_type(kind),
                &id,
                format!("{} {} cancelled", kind.label(), id),
            ))
            .await;
        self.events.publish(kind, &key.inquiry_id);
        Ok(())
    }

    #[instrument(skip(self, request))]
    async fn submit_for_approval(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        request: SubmitDraftsRequest,
    ) -> ServiceResult<SubmitOutcome> {
        request.validate()?;
        let scope = request.project_request_id.as_deref().map(str::trim);
        let in_scope: Vec<DraftRequest> = self
            .drafts
            .list(kind, inquiry_id, None)
            .await?
            .into_iter()
            .filter(|d| scope.map_or(true, |s| d.project_request_id.as_deref() == Some(s)))
            .collect();

        let ids: Vec<String> = in_scope
            .iter()
            .filter(|d| d.status == RequestStatus::Draft)
            .map(|d| d.id.clone())
            .collect();
        let already_submitted = in_scope.len() - ids.len();
        if ids.is_empty() {
            info!("Nothing to submit");
            return Ok(SubmitOutcome {
                submitted: ids,
                already_submitted,
            });
        }

        let now = Utc::now();
        if let Err(e) = self.drafts.submit_batch(kind, &ids, now).await {
            error!("Batch submission failed: {}", e);
            let completed = match self.drafts.list(kind, inquiry_id, Some(RequestStatus::Pending)).await {
                Ok(pending) => pending.iter().filter(|d| ids.contains(&d.id)).count(),
                Err(_) => 0,
            };
            return Err(ServiceError::PartialBatchFailure {
                completed,
                total: ids.len(),
                message: e.to_string(),
            });
        }
        info!(count = ids.len(), "Submitted {}s for approval", kind.label());

        for id in &ids {
            self.activity
                .record(ActivityLog::new(
                    &request.actor,
                    ActivityAction::Submit,
                    entity_type(kind),
                    id,
                    format!("{} {} submitted for approval", kind.label(), id),
                ))
                .await;
        }
        self.events.publish(kind, inquiry_id);
        Ok(SubmitOutcome {
            submitted: ids,
            already_submitted,
        })
    }

    #[instrument(skip(self))]
    async fn purge_inquiry_drafts(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        actor: &str,
    ) -> ServiceResult<PurgeOutcome> {
        let ids: Vec<String> = self
            .drafts
            .list(kind, inquiry_id, None)
            .await?
            .into_iter()
            .filter(|d| !d.status.is_terminal())
            .map(|d| d.id)
            .collect();
        let total = ids.len();

        let mut deleted = 0;
        for chunk in ids.chunks(PURGE_CHUNK_SIZE) {
            match self.drafts.delete_many(kind, chunk).await {
                Ok(n) => deleted += n as usize,
                Err(e) => {
                    error!(deleted, total, "Purge stopped: {}", e);
                    if deleted > 0 {
                        self.events.publish(kind, inquiry_id);
                    }
                    return Err(ServiceError::PartialBatchFailure {
                        completed: deleted,
                        total,
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(deleted, "Purged {}s", kind.label());

        if deleted > 0 {
            self.activity
                .record(ActivityLog::new(
                    actor,
                    ActivityAction::Delete,
                    EntityType::Inquiry,
                    inquiry_id,
                    format!("{} unreviewed {}s removed", deleted, kind.label()),
                ))
                .await;
            self.events.publish(kind, inquiry_id);
        }
        Ok(PurgeOutcome { deleted })
    }

    fn subscribe(
        &self,
        kind: RequestKind,
        inquiry_id: String,
        status: Option<RequestStatus>,
    ) -> BoxStream<'static, ServiceResult<Vec<DraftRequest>>> {
        // subscribe before the first read so no change slips between them
        let changes = BroadcastStream::new(self.events.subscribe());

        let repo = self.drafts.clone();
        let initial_id = inquiry_id.clone();
        let initial = stream::once(async move {
            repo.list(kind, &initial_id, status).await.map_err(ServiceError::from)
        });

        let repo = self.drafts.clone();
        let updates = changes.filter_map(move |change| {
            let repo = repo.clone();
            let inquiry_id = inquiry_id.clone();
            async move {
                match change {
                    Ok(change) if change.kind == kind && change.inquiry_id == inquiry_id => {}
                    Ok(_) => return None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Draft subscriber lagged, resending snapshot");
                    }
                }
                Some(repo.list(kind, &inquiry_id, status).await.map_err(ServiceError::from))
            }
        });

        initial.chain(updates).boxed()
    }
}
