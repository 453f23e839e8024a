mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::*;
use futures::StreamExt;
use labportal_backend::app::app::{Repositories, Services};
use labportal_backend::config::identifier_conf::IdentifierConfig;
use labportal_backend::model::draft_request::{DraftPayload, DraftRequest, RequestKind, RequestStatus};
use labportal_backend::repository::draft_request_repo::{
    DraftRequestRepository, InMemoryDraftRequestRepository, ReviewUpdate,
};
use labportal_backend::repository::repository_error::RepositoryResult;
use labportal_backend::util::error::ServiceError;

#[tokio::test]
async fn test_upsert_twice_keeps_one_draft_with_latest_payload() {
    let (_repos, services) = setup().await;

    let first = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .expect("first upsert");
    let second = services
        .drafts
        .upsert_draft(member_draft(
            "Ana.Reyes@Example.edu",
            vec![person("Ben Cruz", "ben@example.edu"), person("Carla Lim", "carla@example.edu")],
        ))
        .await
        .expect("second upsert");

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, RequestStatus::Draft);
    assert_eq!(second.members().len(), 2);
    assert_eq!(second.created_at, first.created_at);

    let all = services.drafts.list_drafts(RequestKind::Client, INQUIRY_ID, None).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_upsert_unknown_inquiry_is_not_found() {
    let (_repos, services) = setup().await;
    let mut request = member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]);
    request.inquiry_id = "INQ-missing".to_string();

    let err = services.drafts.upsert_draft(request).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_upsert_invalid_member_email_is_rejected() {
    let (_repos, services) = setup().await;
    let err = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "not-an-email")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailure(_)));
}

#[tokio::test]
async fn test_member_drafts_scoped_to_project_request_coexist() {
    let (_repos, services) = setup().await;
    let parent = services
        .drafts
        .upsert_draft(project_draft(CONTACT_EMAIL, "Rice drought tolerance"))
        .await
        .unwrap();

    let unscoped = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();
    let mut scoped_request = member_draft(CONTACT_EMAIL, vec![person("Carla Lim", "carla@example.edu")]);
    scoped_request.project_request_id = Some(parent.id.clone());
    let scoped = services.drafts.upsert_draft(scoped_request).await.unwrap();

    assert_ne!(unscoped.id, scoped.id);
    let found = services
        .drafts
        .get_draft(RequestKind::Client, INQUIRY_ID, CONTACT_EMAIL, Some(&parent.id))
        .await
        .unwrap()
        .expect("scoped draft");
    assert_eq!(found.id, scoped.id);
}

#[tokio::test]
async fn test_submit_is_idempotent() {
    let (_repos, services) = setup().await;
    services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();
    services
        .drafts
        .upsert_draft(member_draft("dan@example.edu", vec![person("Dan Uy", "dan@example.edu")]))
        .await
        .unwrap();

    let first = services
        .drafts
        .submit_for_approval(RequestKind::Client, INQUIRY_ID, submit_all(CONTACT_EMAIL))
        .await
        .unwrap();
    assert_eq!(first.submitted.len(), 2);
    assert_eq!(first.already_submitted, 0);

    let second = services
        .drafts
        .submit_for_approval(RequestKind::Client, INQUIRY_ID, submit_all(CONTACT_EMAIL))
        .await
        .unwrap();
    assert!(second.submitted.is_empty());
    assert_eq!(second.already_submitted, 2);

    let pending = services
        .drafts
        .list_drafts(RequestKind::Client, INQUIRY_ID, Some(RequestStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|d| d.submitted_at.is_some()));
}

#[tokio::test]
async fn test_upsert_after_submit_is_invalid_transition() {
    let (_repos, services) = setup().await;
    services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();
    services
        .drafts
        .submit_for_approval(RequestKind::Client, INQUIRY_ID, submit_all(CONTACT_EMAIL))
        .await
        .unwrap();

    let err = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Eve Tan", "eve@example.edu")]))
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidStateTransition { current, attempted, .. } => {
            assert_eq!(current, "pending");
            assert_eq!(attempted, "update");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Submits the draft right after the next read hands it out, so the caller
/// acts on a stale copy
struct SubmitAfterRead {
    inner: InMemoryDraftRequestRepository,
    armed: AtomicBool,
}

#[async_trait]
impl DraftRequestRepository for SubmitAfterRead {
    async fn find_by_id(&self, kind: RequestKind, id: &str) -> RepositoryResult<Option<DraftRequest>> {
        let found = self.inner.find_by_id(kind, id).await?;
        if found.is_some() && self.armed.swap(false, Ordering::SeqCst) {
            self.inner.submit_batch(kind, &[id.to_string()], Utc::now()).await?;
        }
        Ok(found)
    }

    async fn insert(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest> {
        self.inner.insert(draft).await
    }

    async fn replace_draft(&self, draft: DraftRequest) -> RepositoryResult<DraftRequest> {
        self.inner.replace_draft(draft).await
    }

    async fn list(
        &self,
        kind: RequestKind,
        inquiry_id: &str,
        status: Option<RequestStatus>,
    ) -> RepositoryResult<Vec<DraftRequest>> {
        self.inner.list(kind, inquiry_id, status).await
    }

    async fn review(
        &self,
        kind: RequestKind,
        id: &str,
        expected: RequestStatus,
        update: ReviewUpdate,
    ) -> RepositoryResult<DraftRequest> {
        self.inner.review(kind, id, expected, update).await
    }

    async fn submit_batch(
        &self,
        kind: RequestKind,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        self.inner.submit_batch(kind, ids, at).await
    }

    async fn delete_if_status(
        &self,
        kind: RequestKind,
        id: &str,
        status: RequestStatus,
    ) -> RepositoryResult<bool> {
        self.inner.delete_if_status(kind, id, status).await
    }

    async fn delete_many(&self, kind: RequestKind, ids: &[String]) -> RepositoryResult<u64> {
        self.inner.delete_many(kind, ids).await
    }
}

#[tokio::test]
async fn test_upsert_racing_a_submit_does_not_reopen_the_draft() {
    let inner = InMemoryDraftRequestRepository::new();
    let racing = Arc::new(SubmitAfterRead {
        inner: inner.clone(),
        armed: AtomicBool::new(false),
    });
    let mut repos = Repositories::in_memory();
    repos.drafts = racing.clone();
    let services = Services::new(&repos, IdentifierConfig::default());
    seed_inquiry(&repos, INQUIRY_ID).await;

    let draft = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();

    racing.armed.store(true, Ordering::SeqCst);
    let err = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Eve Tan", "eve@example.edu")]))
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidStateTransition { current, attempted, .. } => {
            assert_eq!(current, "pending");
            assert_eq!(attempted, "update");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let stored = inner.find_by_id(RequestKind::Client, &draft.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(stored.submitted_at.is_some());
    assert_eq!(stored.members()[0].email, "ben@example.edu");
}

#[tokio::test]
async fn test_insert_of_existing_draft_id_is_refused() {
    let repo = InMemoryDraftRequestRepository::new();
    let (_repos, services) = setup().await;
    let draft = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();

    repo.insert(draft.clone()).await.unwrap();
    let err = repo.insert(draft).await.unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_delete_only_allowed_in_draft() {
    let (_repos, services) = setup().await;
    services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();
    services
        .drafts
        .submit_for_approval(RequestKind::Client, INQUIRY_ID, submit_all(CONTACT_EMAIL))
        .await
        .unwrap();

    let err = services
        .drafts
        .delete_draft(RequestKind::Client, INQUIRY_ID, CONTACT_EMAIL, None, CONTACT_EMAIL)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));

    services
        .drafts
        .upsert_draft(member_draft("dan@example.edu", vec![person("Dan Uy", "dan@example.edu")]))
        .await
        .unwrap();
    services
        .drafts
        .delete_draft(RequestKind::Client, INQUIRY_ID, "dan@example.edu", None, "dan@example.edu")
        .await
        .expect("draft deletes");
    let gone = services
        .drafts
        .get_draft(RequestKind::Client, INQUIRY_ID, "dan@example.edu", None)
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn test_purge_removes_only_unreviewed_drafts() {
    let (_repos, services) = setup().await;
    services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();
    services
        .drafts
        .submit_for_approval(RequestKind::Client, INQUIRY_ID, submit_all(CONTACT_EMAIL))
        .await
        .unwrap();
    let pending_id = services
        .drafts
        .get_draft(RequestKind::Client, INQUIRY_ID, CONTACT_EMAIL, None)
        .await
        .unwrap()
        .unwrap()
        .id;
    services
        .approvals
        .reject(
            RequestKind::Client,
            &pending_id,
            labportal_backend::dto::approval_dto::RejectRequest {
                reviewer: ADMIN.to_string(),
                reason: Some("Duplicate submission".to_string()),
            },
        )
        .await
        .unwrap();
    services
        .drafts
        .upsert_draft(member_draft("dan@example.edu", vec![person("Dan Uy", "dan@example.edu")]))
        .await
        .unwrap();

    let outcome = services
        .drafts
        .purge_inquiry_drafts(RequestKind::Client, INQUIRY_ID, ADMIN)
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 1);

    let left = services.drafts.list_drafts(RequestKind::Client, INQUIRY_ID, None).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].status, RequestStatus::Rejected);
}

#[tokio::test]
async fn test_subscribe_emits_snapshot_then_changes() {
    let (_repos, services) = setup().await;
    let mut stream = services
        .drafts
        .subscribe(RequestKind::Client, INQUIRY_ID.to_string(), None);

    let initial = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("initial snapshot")
        .expect("stream open")
        .expect("snapshot ok");
    assert!(initial.is_empty());

    services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();

    let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("change snapshot")
        .expect("stream open")
        .expect("snapshot ok");
    assert_eq!(next.len(), 1);
    assert!(matches!(next[0].payload, DraftPayload::Members(_)));
}
