#![allow(dead_code)]

use chrono::Utc;
use labportal_backend::app::app::{Repositories, Services};
use labportal_backend::config::identifier_conf::IdentifierConfig;
use labportal_backend::dto::draft_dto::{SubmitDraftsRequest, UpsertDraftRequest};
use labportal_backend::model::draft_request::{DraftPayload, MemberPayload, PersonPayload, ProjectPayload};
use labportal_backend::model::inquiry::Inquiry;

pub const INQUIRY_ID: &str = "INQ-0001";
pub const CONTACT_EMAIL: &str = "ana.reyes@example.edu";
pub const ADMIN: &str = "admin@lab.example";

pub async fn setup() -> (Repositories, Services) {
    let repos = Repositories::in_memory();
    let services = Services::new(&repos, IdentifierConfig::default());
    seed_inquiry(&repos, INQUIRY_ID).await;
    (repos, services)
}

pub async fn seed_inquiry(repos: &Repositories, id: &str) -> Inquiry {
    repos
        .inquiries
        .insert(Inquiry::new(id, "Ana Reyes", CONTACT_EMAIL, Utc::now()))
        .await
        .expect("seed inquiry")
}

pub fn person(name: &str, email: &str) -> PersonPayload {
    PersonPayload {
        name: name.to_string(),
        email: email.to_string(),
        affiliation: Some("Institute of Biology".to_string()),
        designation: None,
        phone: None,
        is_contact_person: false,
    }
}

pub fn member_draft(submitter: &str, members: Vec<PersonPayload>) -> UpsertDraftRequest {
    UpsertDraftRequest {
        inquiry_id: INQUIRY_ID.to_string(),
        submitter_email: submitter.to_string(),
        project_request_id: None,
        project_id: None,
        payload: DraftPayload::Members(MemberPayload { members }),
    }
}

pub fn project_draft(submitter: &str, title: &str) -> UpsertDraftRequest {
    UpsertDraftRequest {
        inquiry_id: INQUIRY_ID.to_string(),
        submitter_email: submitter.to_string(),
        project_request_id: None,
        project_id: None,
        payload: DraftPayload::Project(ProjectPayload {
            title: title.to_string(),
            project_lead: "Dr. Ana Reyes".to_string(),
            lab_name: Some("Plant Genomics Lab".to_string()),
            services: vec!["sequencing".to_string()],
            sample_count: Some(24),
            funding_source: None,
            notes: None,
        }),
    }
}

pub fn submit_all(actor: &str) -> SubmitDraftsRequest {
    SubmitDraftsRequest {
        project_request_id: None,
        actor: actor.to_string(),
    }
}
