use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::dto::quotation_dto::{
    ActorRequest, ClientResponseRequest, CreateQuotationRequest, MarkReadRequest, PostMessageRequest,
    ThreadListQuery, ThreadResponse,
};
use crate::service::quotation_service::QuotationService;
use crate::util::error::HandlerError;

// Handler: Open (or fetch) the thread of an inquiry
pub async fn open_thread_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.get_or_create_thread(&inquiry_id).await?;
    Ok((StatusCode::OK, Json(ThreadResponse::from(thread))))
}

// Handler: List threads (admin only)
pub async fn list_threads_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Query(query): Query<ThreadListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let threads: Vec<ThreadResponse> = service
        .list_threads(query.status)
        .await?
        .into_iter()
        .map(ThreadResponse::from)
        .collect();
    Ok(Json(threads))
}

pub async fn get_thread_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.get_thread(&inquiry_id).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

pub async fn start_review_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.start_review(&inquiry_id, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

// Handler: Draft a new quotation version (admin only)
pub async fn create_quotation_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
    Json(payload): Json<CreateQuotationRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let quotation = service.create_quotation_version(&inquiry_id, payload).await?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn send_quotation_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path((inquiry_id, version)): Path<(String, u32)>,
    Json(payload): Json<ActorRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.send_quotation_to_client(&inquiry_id, version, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

// Handler: Client approves a quotation
pub async fn approve_quotation_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path((inquiry_id, version)): Path<(String, u32)>,
    Json(payload): Json<ClientResponseRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.approve_quotation(&inquiry_id, version, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

// Handler: Client asks for a revision
pub async fn request_revision_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path((inquiry_id, version)): Path<(String, u32)>,
    Json(payload): Json<ClientResponseRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.request_quotation_revision(&inquiry_id, version, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

// Handler: Client declines a quotation
pub async fn reject_quotation_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path((inquiry_id, version)): Path<(String, u32)>,
    Json(payload): Json<ClientResponseRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.reject_quotation(&inquiry_id, version, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

pub async fn convert_thread_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.convert_to_project(&inquiry_id, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

pub async fn post_message_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let thread = service.send_message(&inquiry_id, payload).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

pub async fn mark_read_handler(
    State(service): State<Arc<dyn QuotationService>>,
    Path(inquiry_id): Path<String>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = service.mark_messages_read(&inquiry_id, payload.role).await?;
    Ok(Json(response))
}
