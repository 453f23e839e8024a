//! Approval of pending draft requests.
//!
//! Promotion touches several collections without a multi-document
//! transaction. Every write is keyed so that running the whole approval again
//! after a partial failure converges on the same records:
//!
//! 1. durable records are looked up by idempotency key before an identifier
//!    is allocated, and a duplicate-key insert re-reads the winner;
//! 2. project name merge and activation are set-union and compare-and-set;
//! 3. the inquiry approval flag is idempotent;
//! 4. the draft's `pending -> approved` compare-and-set runs last and is the
//!    commit point. Until it succeeds the draft stays `pending` and can be
//!    approved again.
//!
//! Audit entries are written only by the run that commits, one per record it
//! promoted, whether that run or an earlier failed one inserted it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::dto::approval_dto::{ApprovalOutcome, ApproveRequest, RejectRequest};
use crate::model::activity_log::{ActivityAction, ActivityLog, EntityType};
use crate::model::client::{client_idempotency_key, ClientRecord};
use crate::model::counter::IdKind;
use crate::model::draft_request::{DraftPayload, DraftRequest, PersonPayload, RequestKind, RequestStatus};
use crate::model::project::{project_idempotency_key, ProjectRecord, ProjectStatus};
use crate::repository::client_repo::ClientRepository;
use crate::repository::draft_request_repo::{DraftRequestRepository, ReviewUpdate};
use crate::repository::inquiry_repo::InquiryRepository;
use crate::repository::project_repo::ProjectRepository;
use crate::repository::repository_error::RepositoryError;
use crate::service::activity_logger::ActivityLogService;
use crate::service::draft_service::{entity_type, DraftEvents};
use crate::service::id_allocator::IdentifierAllocator;
use crate::util::error::{ServiceError, ServiceResult};

pub const ACTIVATION_REASON: &str = "First member approved";

#[async_trait]
pub trait ApprovalService: Send + Sync {
    /// `pending -> approved`, promoting the payload into durable records
    async fn approve(
        &self,
        kind: RequestKind,
        id: &str,
        request: ApproveRequest,
    ) -> ServiceResult<ApprovalOutcome>;
    /// `pending -> rejected`; needs a non-empty reason
    async fn reject(
        &self,
        kind: RequestKind,
        id: &str,
        request: RejectRequest,
    ) -> ServiceResult<DraftRequest>;
}

pub struct ApprovalServiceImpl {
    drafts: Arc<dyn DraftRequestRepository>,
    inquiries: Arc<dyn InquiryRepository>,
    clients: Arc<dyn ClientRepository>,
    projects: Arc<dyn ProjectRepository>,
    allocator: Arc<dyn IdentifierAllocator>,
    activity: Arc<dyn ActivityLogService>,
    events: DraftEvents,
}

/// A client record produced or found by a member approval
struct PromotedClient {
    id: String,
    name: String,
}

impl ApprovalServiceImpl {
    pub fn new(
        drafts: Arc<dyn DraftRequestRepository>,
        inquiries: Arc<dyn InquiryRepository>,
        clients: Arc<dyn ClientRepository>,
        projects: Arc<dyn ProjectRepository>,
        allocator: Arc<dyn IdentifierAllocator>,
        activity: Arc<dyn ActivityLogService>,
        events: DraftEvents,
    ) -> Self {
        ApprovalServiceImpl {
            drafts,
            inquiries,
            clients,
            projects,
            allocator,
            activity,
            events,
        }
    }

    async fn load_pending(
        &self,
        kind: RequestKind,
        id: &str,
        attempted: &str,
    ) -> ServiceResult<DraftRequest> {
        let draft = self
            .drafts
            .find_by_id(kind, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{} not found: {}", kind.label(), id)))?;
        if draft.status != RequestStatus::Pending {
            warn!(status = %draft.status, "Refusing to {} {}", attempted, kind.label());
            return Err(ServiceError::invalid_transition(kind.label(), id, draft.status, attempted));
        }
        Ok(draft)
    }

    /// Translate a lost compare-and-set into the state that won
    async fn lost_race(
        &self,
        kind: RequestKind,
        id: &str,
        attempted: &str,
        err: RepositoryError,
    ) -> ServiceError {
        if !matches!(err, RepositoryError::Conflict(_)) {
            return ServiceError::from(err);
        }
        match self.drafts.find_by_id(kind, id).await {
            Ok(Some(current)) => ServiceError::invalid_transition(kind.label(), id, current.status, attempted),
            Ok(None) => ServiceError::not_found(format!("{} not found: {}", kind.label(), id)),
            Err(e) => ServiceError::from(e),
        }
    }

    /// Project the members join: the draft's own project, or the identifier
    /// assigned to its approved parent project request.
    async fn resolve_project(&self, draft: &DraftRequest) -> ServiceResult<Option<ProjectRecord>> {
        let project_id = match (&draft.project_id, &draft.project_request_id) {
            (Some(project_id), _) => project_id.clone(),
            (None, Some(parent_id)) => {
                let parent = self
                    .drafts
                    .find_by_id(RequestKind::Project, parent_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(format!("project request not found: {}", parent_id)))?;
                match (parent.status, parent.assigned_ids.first()) {
                    (RequestStatus::Approved, Some(project_id)) => project_id.clone(),
                    _ => {
                        return Err(ServiceError::validation(format!(
                            "project request {} must be approved before its members ({})",
                            parent_id, parent.status
                        )))
                    }
                }
            }
            (None, None) => return Ok(None),
        };
        let project = self
            .projects
            .find_by_id(&project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Project not found: {}", project_id)))?;
        Ok(Some(project))
    }

    async fn promote_member(
        &self,
        draft: &DraftRequest,
        index: usize,
        member: &PersonPayload,
        project_id: Option<&str>,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<PromotedClient> {
        let key = client_idempotency_key(&draft.id, index);
        if let Some(existing) = self.clients.find_by_idempotency_key(&key).await? {
            info!(client = %existing.id, "Reusing client record from an earlier attempt");
            return Ok(PromotedClient {
                id: existing.id,
                name: existing.name,
            });
        }

        let id = self.allocator.next_id(IdKind::Client, now.year()).await?;
        let record = ClientRecord {
            id: id.clone(),
            idempotency_key: key.clone(),
            inquiry_id: draft.inquiry_id.clone(),
            project_id: project_id.map(str::to_string),
            name: member.name.trim().to_string(),
            email: member.email.trim().to_lowercase(),
            affiliation: member.affiliation.clone(),
            designation: member.designation.clone(),
            phone: member.phone.clone(),
            is_contact_person: false,
            has_submitted: true,
            created_by: reviewer.to_string(),
            created_at: now,
        };
        match self.clients.insert(record).await {
            Ok(record) => Ok(PromotedClient {
                id: record.id,
                name: record.name,
            }),
            Err(e) if e.is_already_exists() => match self.clients.find_by_idempotency_key(&key).await? {
                // a concurrent approval wrote this member first
                Some(existing) => Ok(PromotedClient {
                    id: existing.id,
                    name: existing.name,
                }),
                None => {
                    error!(client = %id, "Allocated client identifier already in use");
                    Err(ServiceError::AllocationConflict(format!("Client identifier {} is already taken", id)))
                }
            },
            Err(e) => {
                error!("Failed to write client record: {}", e);
                Err(ServiceError::from(e))
            }
        }
    }

    async fn approve_members(
        &self,
        draft: &DraftRequest,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ApprovalOutcome> {
        let project = self.resolve_project(draft).await?;
        let project_id = project.as_ref().map(|p| p.id.clone());

        let mut promoted = Vec::new();
        for (index, member) in draft.members().iter().enumerate() {
            if member.is_contact_person {
                // provisioned with the inquiry
                continue;
            }
            promoted.push(
                self.promote_member(draft, index, member, project_id.as_deref(), reviewer, now)
                    .await?,
            );
        }

        let mut added_names = Vec::new();
        if let Some(mut project) = project {
            let names: Vec<String> = promoted.iter().map(|c| c.name.clone()).collect();
            if !names.is_empty() {
                added_names = project.merge_client_names(&names);
                self.projects.add_client_names(&project.id, &names, now).await?;
            }
            let activated = !promoted.is_empty()
                && project.status == ProjectStatus::Pending
                && self
                    .projects
                    .activate_if_pending(&project.id, reviewer, ACTIVATION_REASON, now)
                    .await?;
            if activated {
                self.activity
                    .record(
                        ActivityLog::new(
                            reviewer,
                            ActivityAction::StatusChange,
                            EntityType::Project,
                            &project.id,
                            format!("Project {} is now Ongoing", project.id),
                        )
                        .with_changes(serde_json::json!({
                            "status": { "from": ProjectStatus::Pending.as_str(), "to": ProjectStatus::Ongoing.as_str() },
                            "reason": ACTIVATION_REASON,
                        })),
                    )
                    .await;
            }
            if !added_names.is_empty() {
                self.activity
                    .record(
                        ActivityLog::new(
                            reviewer,
                            ActivityAction::Update,
                            EntityType::Project,
                            &project.id,
                            format!("Added {} member(s) to project {}", added_names.len(), project.id),
                        )
                        .with_changes(serde_json::json!({ "clientNames": { "added": &added_names } })),
                    )
                    .await;
            }
        }

        self.inquiries.mark_approved(&draft.inquiry_id, now).await?;

        let assigned_ids: Vec<String> = promoted.iter().map(|c| c.id.clone()).collect();
        let approved = self
            .drafts
            .review(
                RequestKind::Client,
                &draft.id,
                RequestStatus::Pending,
                ReviewUpdate {
                    status: RequestStatus::Approved,
                    reviewed_by: reviewer.to_string(),
                    assigned_ids: assigned_ids.clone(),
                    rejection_reason: None,
                    at: now,
                },
            )
            .await;
        let approved = match approved {
            Ok(approved) => approved,
            Err(e) => return Err(self.lost_race(RequestKind::Client, &draft.id, "approve", e).await),
        };

        for client in &promoted {
            self.activity
                .record(ActivityLog::new(
                    reviewer,
                    ActivityAction::Create,
                    EntityType::Client,
                    &client.id,
                    format!("Client {} ({}) created from {}", client.id, client.name, draft.id),
                ))
                .await;
        }

        Ok(ApprovalOutcome {
            request: approved,
            assigned_ids,
            project_id,
            added_names,
        })
    }

    async fn approve_project(
        &self,
        draft: &DraftRequest,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ApprovalOutcome> {
        let payload = match &draft.payload {
            DraftPayload::Project(payload) => payload,
            DraftPayload::Members(_) => {
                return Err(ServiceError::validation(format!(
                    "project request {} carries a member payload",
                    draft.id
                )))
            }
        };

        let key = project_idempotency_key(&draft.id);
        let project_id = match self.projects.find_by_idempotency_key(&key).await? {
            Some(existing) => existing.id,
            None => {
                let id = self.allocator.next_id(IdKind::Project, now.year()).await?;
                let record = ProjectRecord {
                    id: id.clone(),
                    idempotency_key: key.clone(),
                    inquiry_id: draft.inquiry_id.clone(),
                    title: payload.title.trim().to_string(),
                    project_lead: payload.project_lead.trim().to_string(),
                    lab_name: payload.lab_name.clone(),
                    services: payload.services.clone(),
                    sample_count: payload.sample_count,
                    funding_source: payload.funding_source.clone(),
                    notes: payload.notes.clone(),
                    client_names: Vec::new(),
                    status: ProjectStatus::Pending,
                    status_changed_by: None,
                    status_reason: None,
                    status_changed_at: None,
                    created_at: now,
                    updated_at: now,
                };
                match self.projects.insert(record).await {
                    Ok(record) => record.id,
                    Err(e) if e.is_already_exists() => match self.projects.find_by_idempotency_key(&key).await? {
                        Some(existing) => existing.id,
                        None => {
                            return Err(ServiceError::AllocationConflict(format!(
                                "Project identifier {} is already taken",
                                id
                            )))
                        }
                    },
                    Err(e) => return Err(ServiceError::from(e)),
                }
            }
        };

        self.inquiries.mark_approved(&draft.inquiry_id, now).await?;

        let approved = self
            .drafts
            .review(
                RequestKind::Project,
                &draft.id,
                RequestStatus::Pending,
                ReviewUpdate {
                    status: RequestStatus::Approved,
                    reviewed_by: reviewer.to_string(),
                    assigned_ids: vec![project_id.clone()],
                    rejection_reason: None,
                    at: now,
                },
            )
            .await;
        let approved = match approved {
            Ok(approved) => approved,
            Err(e) => return Err(self.lost_race(RequestKind::Project, &draft.id, "approve", e).await),
        };

        self.activity
            .record(ActivityLog::new(
                reviewer,
                ActivityAction::Create,
                EntityType::Project,
                &project_id,
                format!("Project {} created from {}", project_id, draft.id),
            ))
            .await;

        Ok(ApprovalOutcome {
            request: approved,
            assigned_ids: vec![project_id.clone()],
            project_id: Some(project_id),
            added_names: Vec::new(),
        })
    }
}

#[async_trait]
impl ApprovalService for ApprovalServiceImpl {
    #[instrument(skip(self, request), fields(reviewer = %request.reviewer))]
    async fn approve(
        &self,
        kind: RequestKind,
        id: &str,
        request: ApproveRequest,
    ) -> ServiceResult<ApprovalOutcome> {
        request.validate()?;
        let draft = self.load_pending(kind, id, "approve").await?;
        let now = Utc::now();

        let outcome = match kind {
            RequestKind::Client => self.approve_members(&draft, &request.reviewer, now).await,
            RequestKind::Project => self.approve_project(&draft, &request.reviewer, now).await,
        };
        let outcome = outcome.map_err(|e| {
            error!("Approval of {} failed: {}", id, e);
            e
        })?;
        info!(assigned = ?outcome.assigned_ids, "Approved {}", kind.label());

        self.activity
            .record(
                ActivityLog::new(
                    &request.reviewer,
                    ActivityAction::Approve,
                    entity_type(kind),
                    id,
                    format!("{} {} approved", kind.label(), id),
                )
                .with_changes(serde_json::json!({
                    "status": { "from": RequestStatus::Pending.as_str(), "to": RequestStatus::Approved.as_str() },
                    "assignedIds": &outcome.assigned_ids,
                })),
            )
            .await;
        self.activity
            .record(ActivityLog::new(
                &request.reviewer,
                ActivityAction::StatusChange,
                EntityType::Inquiry,
                &draft.inquiry_id,
                format!("Inquiry {} approved via {}", draft.inquiry_id, id),
            ))
            .await;
        self.events.publish(kind, &draft.inquiry_id);
        Ok(outcome)
    }

    #[instrument(skip(self, request), fields(reviewer = %request.reviewer))]
    async fn reject(
        &self,
        kind: RequestKind,
        id: &str,
        request: RejectRequest,
    ) -> ServiceResult<DraftRequest> {
        request.validate()?;
        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ServiceError::validation("A rejection reason is required"))?
            .to_string();
        let draft = self.load_pending(kind, id, "reject").await?;

        let rejected = self
            .drafts
            .review(
                kind,
                id,
                RequestStatus::Pending,
                ReviewUpdate {
                    status: RequestStatus::Rejected,
                    reviewed_by: request.reviewer.clone(),
                    assigned_ids: Vec::new(),
                    rejection_reason: Some(reason.clone()),
                    at: Utc::now(),
                },
            )
            .await;
        let rejected = match rejected {
            Ok(rejected) => rejected,
            Err(e) => return Err(self.lost_race(kind, id, "reject", e).await),
        };
        info!("Rejected {}", kind.label());

        self.activity
            .record(
                ActivityLog::new(
                    &request.reviewer,
                    ActivityAction::Reject,
                    entity_type(kind),
                    id,
                    format!("{} {} rejected: {}", kind.label(), id, reason),
                )
                .with_changes(serde_json::json!({ "reason": reason })),
            )
            .await;
        self.events.publish(kind, &draft.inquiry_id);
        Ok(rejected)
    }
}
