use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::{Event, KeepAlive, Sse}, IntoResponse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::dto::approval_dto::{ApproveRequest, RejectRequest};
use crate::dto::draft_dto::{DeleteDraftQuery, DraftListQuery, PurgeDraftsRequest, SubmitDraftsRequest, UpsertDraftRequest};
use crate::model::draft_request::RequestKind;
use crate::service::approval_service::ApprovalService;
use crate::service::draft_service::DraftService;
use crate::util::error::{HandlerError, HandlerErrorKind};

#[derive(Clone)]
pub struct DraftHandlerState {
    pub drafts: Arc<dyn DraftService>,
    pub approvals: Arc<dyn ApprovalService>,
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub scope: Option<String>,
}

// Handler: Create or update a draft
pub async fn upsert_draft_handler(
    State(state): State<DraftHandlerState>,
    Path(kind): Path<RequestKind>,
    Json(payload): Json<UpsertDraftRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    if payload.payload.kind() != kind {
        return Err(HandlerError::bad_request(format!(
            "Payload does not describe a {}",
            kind.label()
        )));
    }
    let draft = state.drafts.upsert_draft(payload).await?;
    Ok(Json(draft))
}

// Handler: List drafts of an inquiry
pub async fn list_drafts_handler(
    State(state): State<DraftHandlerState>,
    Path((inquiry_id, kind)): Path<(String, RequestKind)>,
    Query(query): Query<DraftListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let drafts = state.drafts.list_drafts(kind, &inquiry_id, query.status).await?;
    Ok(Json(drafts))
}

// Handler: Get one submitter's draft
pub async fn get_draft_handler(
    State(state): State<DraftHandlerState>,
    Path((inquiry_id, kind, email)): Path<(String, RequestKind, String)>,
    Query(query): Query<ScopeQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let draft = state
        .drafts
        .get_draft(kind, &inquiry_id, &email, query.scope.as_deref())
        .await?
        .ok_or_else(|| HandlerError {
            error: HandlerErrorKind::NotFound,
            message: format!("No {} from {} for inquiry {}", kind.label(), email, inquiry_id),
            details: None,
        })?;
    Ok(Json(draft))
}

// Handler: Submit every draft of an inquiry for approval
pub async fn submit_drafts_handler(
    State(state): State<DraftHandlerState>,
    Path((inquiry_id, kind)): Path<(String, RequestKind)>,
    Json(payload): Json<SubmitDraftsRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = state.drafts.submit_for_approval(kind, &inquiry_id, payload).await?;
    Ok(Json(outcome))
}

// Handler: Cancel a draft
pub async fn delete_draft_handler(
    State(state): State<DraftHandlerState>,
    Path((inquiry_id, kind)): Path<(String, RequestKind)>,
    Query(query): Query<DeleteDraftQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let actor = query.actor.clone().unwrap_or_else(|| query.email.clone());
    state
        .drafts
        .delete_draft(kind, &inquiry_id, &query.email, query.scope.as_deref(), &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Handler: Remove all unreviewed drafts of an inquiry (admin only)
pub async fn purge_drafts_handler(
    State(state): State<DraftHandlerState>,
    Path((inquiry_id, kind)): Path<(String, RequestKind)>,
    Json(payload): Json<PurgeDraftsRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    if let Err(e) = payload.validate() {
        return Err(HandlerError::bad_request(format!("Validation error: {}", e)));
    }
    let outcome = state.drafts.purge_inquiry_drafts(kind, &inquiry_id, &payload.actor).await?;
    Ok(Json(outcome))
}

// Handler: Live draft snapshots as server-sent events
pub async fn stream_drafts_handler(
    State(state): State<DraftHandlerState>,
    Path((inquiry_id, kind)): Path<(String, RequestKind)>,
    Query(query): Query<DraftListQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(inquiry = %inquiry_id, kind = %kind, "Draft stream opened");
    let events = state
        .drafts
        .subscribe(kind, inquiry_id, query.status)
        .map(|snapshot| {
            let event = match snapshot {
                Ok(drafts) => Event::default().event("snapshot").json_data(&drafts),
                Err(e) => Ok(Event::default().event("error").data(e.to_string())),
            };
            Ok(event.unwrap_or_else(|e| {
                warn!("Failed to encode draft snapshot: {}", e);
                Event::default().event("error").data("encoding failed")
            }))
        });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// Handler: Approve a pending request (admin only)
pub async fn approve_request_handler(
    State(state): State<DraftHandlerState>,
    Path((kind, id)): Path<(RequestKind, String)>,
    Json(payload): Json<ApproveRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = state.approvals.approve(kind, &id, payload).await?;
    Ok(Json(outcome))
}

// Handler: Reject a pending request (admin only)
pub async fn reject_request_handler(
    State(state): State<DraftHandlerState>,
    Path((kind, id)): Path<(RequestKind, String)>,
    Json(payload): Json<RejectRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let rejected = state.approvals.reject(kind, &id, payload).await?;
    Ok(Json(rejected))
}
