mod common;

use chrono::{Duration, Utc};
use common::*;
use labportal_backend::dto::approval_dto::ApproveRequest;
use labportal_backend::model::activity_log::{ActivityAction, ActivityLog, ActivityLogFilter, EntityType};
use labportal_backend::model::draft_request::RequestKind;
use labportal_backend::util::error::ServiceError;

#[tokio::test]
async fn test_query_returns_newest_first_and_respects_limit() {
    let (_repos, services) = setup().await;
    let base = Utc::now() - Duration::minutes(10);
    for i in 0..5 {
        let mut log = ActivityLog::new(
            ADMIN,
            ActivityAction::Update,
            EntityType::Project,
            "P-2025-001",
            format!("change {}", i),
        );
        log.timestamp = base + Duration::minutes(i);
        services.activity.record(log).await;
    }

    let logs = services
        .activity
        .query(ActivityLogFilter {
            entity_id: Some("P-2025-001".to_string()),
            limit: Some(3),
            ..ActivityLogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].description, "change 4");
    assert!(logs.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn test_query_rejects_inverted_range() {
    let (_repos, services) = setup().await;
    let now = Utc::now();
    let err = services
        .activity
        .query(ActivityLogFilter {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
            ..ActivityLogFilter::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailure(_)));
}

#[tokio::test]
async fn test_approval_leaves_an_audit_trail() {
    let (_repos, services) = setup().await;
    let draft = services
        .drafts
        .upsert_draft(member_draft(CONTACT_EMAIL, vec![person("Ben Cruz", "ben@example.edu")]))
        .await
        .unwrap();
    services
        .drafts
        .submit_for_approval(RequestKind::Client, INQUIRY_ID, submit_all(CONTACT_EMAIL))
        .await
        .unwrap();
    services
        .approvals
        .approve(
            RequestKind::Client,
            &draft.id,
            ApproveRequest {
                reviewer: ADMIN.to_string(),
            },
        )
        .await
        .unwrap();

    let trail = services
        .activity
        .query(ActivityLogFilter {
            entity_id: Some(draft.id.clone()),
            ..ActivityLogFilter::default()
        })
        .await
        .unwrap();
    let actions: Vec<ActivityAction> = trail.iter().map(|l| l.action).collect();
    assert!(actions.contains(&ActivityAction::Create));
    assert!(actions.contains(&ActivityAction::Submit));
    assert!(actions.contains(&ActivityAction::Approve));

    let created_clients = services
        .activity
        .query(ActivityLogFilter {
            actor: Some(ADMIN.to_string()),
            entity_type: Some(EntityType::Client),
            action: Some(ActivityAction::Create),
            ..ActivityLogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(created_clients.len(), 1);
}
