mod common;

use std::str::FromStr;

use common::*;
use labportal_backend::dto::quotation_dto::{
    ActorRequest, ClientResponseRequest, CreateQuotationRequest, PostMessageRequest,
};
use labportal_backend::model::inquiry::InquiryStatus;
use labportal_backend::model::quotation::{QuotationLine, SenderRole, ThreadStatus, VersionStatus};
use labportal_backend::util::error::ServiceError;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn quotation(lines: &[(&str, &str, &str)]) -> CreateQuotationRequest {
    CreateQuotationRequest {
        items: lines
            .iter()
            .map(|(description, quantity, price)| QuotationLine {
                description: description.to_string(),
                quantity: dec(quantity),
                unit_price: dec(price),
                unit: Some("sample".to_string()),
            })
            .collect(),
        discount_amount: None,
        discount_percentage: None,
        tax_amount: None,
        tax_percentage: None,
        currency: None,
        notes: None,
        terms: None,
        valid_until: None,
        created_by: ADMIN.to_string(),
    }
}

fn admin() -> ActorRequest {
    ActorRequest {
        actor: ADMIN.to_string(),
    }
}

fn client_says(message: Option<&str>) -> ClientResponseRequest {
    ClientResponseRequest {
        client: CONTACT_EMAIL.to_string(),
        message: message.map(str::to_string),
    }
}

#[tokio::test]
async fn test_thread_is_created_once_per_inquiry() {
    let (_repos, services) = setup().await;
    let first = services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();
    let second = services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();

    assert_eq!(first.id, INQUIRY_ID);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(first.status, ThreadStatus::Pending);
    assert_eq!(services.quotations.list_threads(None).await.unwrap().len(), 1);

    let err = services.quotations.get_or_create_thread("INQ-missing").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_versions_increment_and_totals_are_computed() {
    let (_repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();

    let v1 = services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("DNA extraction", "2", "100"), ("QC", "1", "50")]))
        .await
        .unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v1.subtotal, dec("250.00"));
    assert_eq!(v1.total_amount, dec("250.00"));
    assert_eq!(v1.currency, "PHP");
    assert_eq!(v1.status, VersionStatus::Draft);

    let mut request = quotation(&[("DNA extraction", "2", "100"), ("QC", "1", "50")]);
    request.discount_amount = Some(dec("50"));
    request.tax_percentage = Some(dec("12"));
    let v2 = services
        .quotations
        .create_quotation_version(INQUIRY_ID, request)
        .await
        .unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.taxable_amount, dec("200.00"));
    assert_eq!(v2.tax_amount, dec("24.00"));
    assert_eq!(v2.total_amount, dec("224.00"));
    assert!(v2.quotation_number.ends_with("-V2"));

    let thread = services.quotations.get_thread(INQUIRY_ID).await.unwrap();
    assert_eq!(thread.current_quotation_version, 2);
    assert_eq!(thread.quotations.len(), 2);
}

#[tokio::test]
async fn test_empty_quotation_is_rejected() {
    let (_repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();

    let err = services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailure(_)));
    let thread = services.quotations.get_thread(INQUIRY_ID).await.unwrap();
    assert_eq!(thread.current_quotation_version, 0);
}

#[tokio::test]
async fn test_oversized_line_is_a_validation_failure() {
    let (_repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();

    let err = services
        .quotations
        .create_quotation_version(
            INQUIRY_ID,
            quotation(&[("Whole genome sequencing", "1000000000000000", "1000000000000000")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailure(_)));
    let thread = services.quotations.get_thread(INQUIRY_ID).await.unwrap();
    assert!(thread.quotations.is_empty());
}

#[tokio::test]
async fn test_send_moves_thread_and_counts_unread_for_client() {
    let (repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();
    services.quotations.start_review(INQUIRY_ID, admin()).await.unwrap();
    let unread_after_review = services.quotations.get_thread(INQUIRY_ID).await.unwrap().unread_count.client;

    services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("Library prep", "4", "75")]))
        .await
        .unwrap();
    let thread = services
        .quotations
        .send_quotation_to_client(INQUIRY_ID, 1, admin())
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Quoted);
    assert_eq!(thread.unread_count.client, unread_after_review + 1);
    assert_eq!(thread.unread_count.admin, 0);
    assert_eq!(thread.active_quotation_version, Some(1));

    let inquiry = repos.inquiries.find_by_id(INQUIRY_ID).await.unwrap().unwrap();
    assert_eq!(inquiry.status, InquiryStatus::Quoted);

    let resent = services
        .quotations
        .send_quotation_to_client(INQUIRY_ID, 1, admin())
        .await
        .unwrap();
    assert_eq!(resent.status, ThreadStatus::Quoted);
    assert_eq!(resent.unread_count.client, thread.unread_count.client + 1);

    services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("Library prep", "4", "70")]))
        .await
        .unwrap();
    let newer = services
        .quotations
        .send_quotation_to_client(INQUIRY_ID, 2, admin())
        .await
        .unwrap();
    assert_eq!(newer.unread_count.client, resent.unread_count.client + 1);

    let err = services
        .quotations
        .send_quotation_to_client(INQUIRY_ID, 1, admin())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_revision_cycle_then_approval() {
    let (_repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();
    services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("Library prep", "4", "75")]))
        .await
        .unwrap();
    services.quotations.send_quotation_to_client(INQUIRY_ID, 1, admin()).await.unwrap();

    let err = services
        .quotations
        .request_quotation_revision(INQUIRY_ID, 1, client_says(None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailure(_)));

    let thread = services
        .quotations
        .request_quotation_revision(INQUIRY_ID, 1, client_says(Some("Please split the invoice")))
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Negotiating);
    assert_eq!(thread.version(1).unwrap().status, VersionStatus::Revised);

    services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("Library prep", "4", "70")]))
        .await
        .unwrap();
    let thread = services.quotations.send_quotation_to_client(INQUIRY_ID, 2, admin()).await.unwrap();
    assert_eq!(thread.status, ThreadStatus::Negotiating);
    assert_eq!(thread.effective_status(1), Some(VersionStatus::Superseded));

    let err = services
        .quotations
        .approve_quotation(INQUIRY_ID, 1, client_says(None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));

    let thread = services
        .quotations
        .approve_quotation(INQUIRY_ID, 2, client_says(Some("Looks good")))
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Approved);
    assert_eq!(thread.version(2).unwrap().status, VersionStatus::Approved);

    let thread = services.quotations.convert_to_project(INQUIRY_ID, admin()).await.unwrap();
    assert_eq!(thread.status, ThreadStatus::Converted);
}

#[tokio::test]
async fn test_reject_closes_thread() {
    let (_repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();
    services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("Library prep", "4", "75")]))
        .await
        .unwrap();
    services.quotations.send_quotation_to_client(INQUIRY_ID, 1, admin()).await.unwrap();

    let thread = services
        .quotations
        .reject_quotation(INQUIRY_ID, 1, client_says(Some("Budget was cut")))
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Rejected);

    let err = services
        .quotations
        .create_quotation_version(INQUIRY_ID, quotation(&[("Library prep", "4", "60")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_messages_and_mark_read() {
    let (_repos, services) = setup().await;
    services.quotations.get_or_create_thread(INQUIRY_ID).await.unwrap();

    for content in ["Is the turnaround two weeks?", "Also, can we add 4 samples?"] {
        services
            .quotations
            .send_message(
                INQUIRY_ID,
                PostMessageRequest {
                    role: SenderRole::Client,
                    sender: CONTACT_EMAIL.to_string(),
                    content: content.to_string(),
                },
            )
            .await
            .unwrap();
    }
    let thread = services.quotations.get_thread(INQUIRY_ID).await.unwrap();
    assert_eq!(thread.unread_count.admin, 2);
    assert_eq!(thread.unread_count.client, 0);
    assert!(thread.last_message_at.is_some());

    let read = services
        .quotations
        .mark_messages_read(INQUIRY_ID, SenderRole::Admin)
        .await
        .unwrap();
    assert_eq!(read.marked, 2);
    assert_eq!(read.unread_count.admin, 0);

    let again = services
        .quotations
        .mark_messages_read(INQUIRY_ID, SenderRole::Admin)
        .await
        .unwrap();
    assert_eq!(again.marked, 0);

    let err = services
        .quotations
        .mark_messages_read(INQUIRY_ID, SenderRole::System)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailure(_)));
}
