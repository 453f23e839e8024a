use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::dto::quotation_dto::{
    ActorRequest, ClientResponseRequest, CreateQuotationRequest, MarkReadResponse, PostMessageRequest,
};
use crate::model::activity_log::{ActivityAction, ActivityLog, EntityType};
use crate::model::quotation::{QuotationThread, QuotationVersion, SenderRole, ThreadStatus, VersionMeta};
use crate::repository::inquiry_repo::InquiryRepository;
use crate::repository::quotation_thread_repo::QuotationThreadRepository;
use crate::repository::repository_error::RepositoryError;
use crate::service::activity_logger::ActivityLogService;
use crate::util::error::{ServiceError, ServiceResult};

/// Attempts at a revision-checked thread write before giving up with `Conflict`
pub const MAX_WRITE_ATTEMPTS: usize = 3;

#[async_trait]
pub trait QuotationService: Send + Sync {
    async fn get_or_create_thread(&self, inquiry_id: &str) -> ServiceResult<QuotationThread>;
    async fn get_thread(&self, inquiry_id: &str) -> ServiceResult<QuotationThread>;
    /// Most recently active first
    async fn list_threads(
        &self,
        status: Option<ThreadStatus>,
    ) -> ServiceResult<Vec<QuotationThread>>;
    async fn start_review(
        &self,
        inquiry_id: &str,
        request: ActorRequest,
    ) -> ServiceResult<QuotationThread>;
    /// Append version `currentQuotationVersion + 1` as a draft
    async fn create_quotation_version(
        &self,
        inquiry_id: &str,
        request: CreateQuotationRequest,
    ) -> ServiceResult<QuotationVersion>;
    async fn send_quotation_to_client(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ActorRequest,
    ) -> ServiceResult<QuotationThread>;
    async fn approve_quotation(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ClientResponseRequest,
    ) -> ServiceResult<QuotationThread>;
    async fn request_quotation_revision(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ClientResponseRequest,
    ) -> ServiceResult<QuotationThread>;
    async fn reject_quotation(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ClientResponseRequest,
    ) -> ServiceResult<QuotationThread>;
    async fn convert_to_project(
        &self,
        inquiry_id: &str,
        request: ActorRequest,
    ) -> ServiceResult<QuotationThread>;
    async fn send_message(
        &self,
        inquiry_id: &str,
        request: PostMessageRequest,
    ) -> ServiceResult<QuotationThread>;
    /// Flag every message unread by `role` as read and zero its counter
    async fn mark_messages_read(
        &self,
        inquiry_id: &str,
        role: SenderRole,
    ) -> ServiceResult<MarkReadResponse>;
}

pub struct QuotationServiceImpl {
    threads: Arc<dyn QuotationThreadRepository>,
    inquiries: Arc<dyn InquiryRepository>,
    activity: Arc<dyn ActivityLogService>,
}

impl QuotationServiceImpl {
    pub fn new(
        threads: Arc<dyn QuotationThreadRepository>,
        inquiries: Arc<dyn InquiryRepository>,
        activity: Arc<dyn ActivityLogService>,
    ) -> Self {
        QuotationServiceImpl {
            threads,
            inquiries,
            activity,
        }
    }

    async fn load(&self, inquiry_id: &str) -> ServiceResult<QuotationThread> {
        self.threads
            .find_by_id(inquiry_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Quotation thread not found: {}", inquiry_id)))
    }

    /// Load, apply, and save with a revision check, retrying on a concurrent
    /// write. Status and the message narrating it land in the same write.
    /// Returns the saved thread and the status it had before.
    async fn update_thread<T, F>(
        &self,
        inquiry_id: &str,
        mut apply: F,
    ) -> ServiceResult<(QuotationThread, ThreadStatus, T)>
    where
        F: FnMut(&mut QuotationThread) -> ServiceResult<T> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut thread = self.load(inquiry_id).await?;
            let previous_status = thread.status;
            let expected_revision = thread.revision;
            let output = apply(&mut thread)?;
            thread.revision = expected_revision + 1;

            match self.threads.replace(&thread, expected_revision).await {
                Ok(()) => {
                    if thread.status != previous_status {
                        self.mirror_status(&thread, thread.updated_at).await;
                    }
                    return Ok((thread, previous_status, output));
                }
                Err(RepositoryError::Conflict(msg)) => {
                    warn!(attempt, "Thread write lost a race, retrying: {}", msg);
                }
                Err(e) => {
                    error!("Failed to save quotation thread {}: {}", inquiry_id, e);
                    return Err(ServiceError::from(e));
                }
            }
        }
        Err(ServiceError::Conflict(format!(
            "Quotation thread {} kept changing, gave up after {} attempts",
            inquiry_id, MAX_WRITE_ATTEMPTS
        )))
    }

    /// Best effort: the thread is the source of truth for quotation status
    async fn mirror_status(&self, thread: &QuotationThread, now: DateTime<Utc>) {
        let status = thread.status.as_inquiry_status();
        match self.inquiries.set_status(&thread.inquiry_id, status, now).await {
            Ok(true) => {}
            Ok(false) => {
                info!(inquiry = %thread.inquiry_id, status = %status, "Inquiry is past approval, status not mirrored");
            }
            Err(e) => {
                warn!(inquiry = %thread.inquiry_id, status = %status, "Failed to mirror thread status: {}", e);
            }
        }
    }

    async fn audit(
        &self,
        actor: &str,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: &str,
        description: String,
    ) {
        self.activity
            .record(ActivityLog::new(actor, action, entity_type, entity_id, description))
            .await;
    }

    async fn audit_transition(&self, actor: &str, thread: &QuotationThread, from: ThreadStatus) {
        if thread.status == from {
            return;
        }
        self.activity
            .record(
                ActivityLog::new(
                    actor,
                    ActivityAction::StatusChange,
                    EntityType::QuotationThread,
                    &thread.id,
                    format!("Quotation thread {} moved from {} to {}", thread.id, from, thread.status),
                )
                .with_changes(serde_json::json!({
                    "status": { "from": from.as_str(), "to": thread.status.as_str() },
                })),
            )
            .await;
    }
}

fn required_message(request: &ClientResponseRequest, what: &str) -> ServiceResult<String> {
    request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::validation(format!("A reason is required to {}", what)))
}

#[async_trait]
impl QuotationService for QuotationServiceImpl {
    #[instrument(skip(self))]
    async fn get_or_create_thread(&self, inquiry_id: &str) -> ServiceResult<QuotationThread> {
        if let Some(thread) = self.threads.find_by_id(inquiry_id).await? {
            return Ok(thread);
        }
        let inquiry = self
            .inquiries
            .find_by_id(inquiry_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Inquiry not found: {}", inquiry_id)))?;

        let thread = QuotationThread::new(&inquiry, Utc::now());
        match self.threads.insert(thread).await {
            Ok(thread) => {
                info!("Quotation thread opened");
                self.audit(
                    &inquiry.email,
                    ActivityAction::Create,
                    EntityType::QuotationThread,
                    &thread.id,
                    format!("Quotation thread opened for inquiry {}", inquiry_id),
                )
                .await;
                Ok(thread)
            }
            // opened concurrently
            Err(e) if e.is_already_exists() => self.load(inquiry_id).await,
            Err(e) => Err(ServiceError::from(e)),
        }
    }

    #[instrument(skip(self))]
    async fn get_thread(&self, inquiry_id: &str) -> ServiceResult<QuotationThread> {
        self.load(inquiry_id).await
    }

    #[instrument(skip(self))]
    async fn list_threads(
        &self,
        status: Option<ThreadStatus>,
    ) -> ServiceResult<Vec<QuotationThread>> {
        Ok(self.threads.list(status).await?)
    }

    #[instrument(skip(self, request), fields(actor = %request.actor))]
    async fn start_review(
        &self,
        inquiry_id: &str,
        request: ActorRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| t.start_review(&request.actor, now))
            .await?;
        info!("Review started");
        self.audit_transition(&request.actor, &thread, from).await;
        Ok(thread)
    }

    #[instrument(skip(self, request), fields(created_by = %request.created_by))]
    async fn create_quotation_version(
        &self,
        inquiry_id: &str,
        request: CreateQuotationRequest,
    ) -> ServiceResult<QuotationVersion> {
        request.validate()?;
        let adjustments = request.adjustments();
        let meta = VersionMeta {
            currency: request.currency(),
            notes: request.notes.clone(),
            terms: request.terms.clone(),
            valid_until: request.valid_until,
            created_by: request.created_by.clone(),
        };
        let now = Utc::now();
        let (thread, _, version) = self
            .update_thread(inquiry_id, |t| {
                t.add_version(&request.items, &adjustments, meta.clone(), now)
            })
            .await?;
        let quotation = thread
            .version(version)
            .cloned()
            .ok_or_else(|| ServiceError::InternalError(format!("Version {} missing after save", version)))?;
        info!(number = %quotation.quotation_number, total = %quotation.total_amount, "Quotation version created");

        self.audit(
            &request.created_by,
            ActivityAction::Create,
            EntityType::Quotation,
            &quotation.quotation_number,
            format!(
                "Quotation {} drafted: total {} {}",
                quotation.quotation_number, quotation.currency, quotation.total_amount
            ),
        )
        .await;
        Ok(quotation)
    }

    #[instrument(skip(self, request), fields(actor = %request.actor))]
    async fn send_quotation_to_client(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ActorRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| t.send_version(version, &request.actor, now))
            .await?;
        info!(status = %thread.status, "Quotation sent");

        if let Some(q) = thread.version(version) {
            self.audit(
                &request.actor,
                ActivityAction::Send,
                EntityType::Quotation,
                &q.quotation_number,
                format!("Quotation {} sent to {}", q.quotation_number, thread.client_email),
            )
            .await;
        }
        self.audit_transition(&request.actor, &thread, from).await;
        Ok(thread)
    }

    #[instrument(skip(self, request), fields(client = %request.client))]
    async fn approve_quotation(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ClientResponseRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| {
                t.approve_version(version, &request.client, request.message.clone(), now)
            })
            .await?;
        info!("Quotation approved");

        if let Some(q) = thread.version(version) {
            self.audit(
                &request.client,
                ActivityAction::Approve,
                EntityType::Quotation,
                &q.quotation_number,
                format!("Quotation {} approved by client", q.quotation_number),
            )
            .await;
        }
        self.audit_transition(&request.client, &thread, from).await;
        Ok(thread)
    }

    #[instrument(skip(self, request), fields(client = %request.client))]
    async fn request_quotation_revision(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ClientResponseRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let reason = required_message(&request, "request a revision")?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| t.request_revision(version, &request.client, &reason, now))
            .await?;
        info!("Quotation revision requested");

        if let Some(q) = thread.version(version) {
            self.audit(
                &request.client,
                ActivityAction::Update,
                EntityType::Quotation,
                &q.quotation_number,
                format!("Revision requested for {}: {}", q.quotation_number, reason),
            )
            .await;
        }
        self.audit_transition(&request.client, &thread, from).await;
        Ok(thread)
    }

    #[instrument(skip(self, request), fields(client = %request.client))]
    async fn reject_quotation(
        &self,
        inquiry_id: &str,
        version: u32,
        request: ClientResponseRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let reason = required_message(&request, "reject a quotation")?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| t.reject_version(version, &request.client, &reason, now))
            .await?;
        info!("Quotation rejected");

        if let Some(q) = thread.version(version) {
            self.audit(
                &request.client,
                ActivityAction::Reject,
                EntityType::Quotation,
                &q.quotation_number,
                format!("Quotation {} rejected: {}", q.quotation_number, reason),
            )
            .await;
        }
        self.audit_transition(&request.client, &thread, from).await;
        Ok(thread)
    }

    #[instrument(skip(self, request), fields(actor = %request.actor))]
    async fn convert_to_project(
        &self,
        inquiry_id: &str,
        request: ActorRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| t.convert(&request.actor, now))
            .await?;
        info!("Quotation thread converted");
        self.audit_transition(&request.actor, &thread, from).await;
        Ok(thread)
    }

    #[instrument(skip(self, request), fields(sender = %request.sender))]
    async fn send_message(
        &self,
        inquiry_id: &str,
        request: PostMessageRequest,
    ) -> ServiceResult<QuotationThread> {
        request.validate()?;
        let now = Utc::now();
        let (thread, from, ()) = self
            .update_thread(inquiry_id, |t| t.post_message(request.role, &request.sender, &request.content, now))
            .await?;
        self.audit(
            &request.sender,
            ActivityAction::Message,
            EntityType::QuotationThread,
            &thread.id,
            format!("{} posted a message", request.role.as_str()),
        )
        .await;
        Ok(thread)
    }

    #[instrument(skip(self))]
    async fn mark_messages_read(
        &self,
        inquiry_id: &str,
        role: SenderRole,
    ) -> ServiceResult<MarkReadResponse> {
        let now = Utc::now();
        let (thread, _, marked) = self.update_thread(inquiry_id, |t| t.mark_read(role, now)).await?;
        info!(marked, "Messages marked read");
        Ok(MarkReadResponse {
            marked,
            unread_count: thread.unread_count,
        })
    }
}
