use axum::{Router, routing::{get, post}};
use crate::handler::quotation_handler::{
    open_thread_handler,
    list_threads_handler,
    get_thread_handler,
    start_review_handler,
    create_quotation_handler,
    send_quotation_handler,
    approve_quotation_handler,
    request_revision_handler,
    reject_quotation_handler,
    convert_thread_handler,
    post_message_handler,
    mark_read_handler,
};
use std::sync::Arc;
use crate::service::quotation_service::QuotationService;


pub fn quotation_router(service: Arc<dyn QuotationService>) -> Router {
    // Admin routes
    let admin = Router::new()
        .route("/threads", get(list_threads_handler))
        .route("/threads/{inquiry_id}/review", post(start_review_handler))
        .route("/threads/{inquiry_id}/quotations", post(create_quotation_handler))
        .route("/threads/{inquiry_id}/quotations/{version}/send", post(send_quotation_handler))
        .route("/threads/{inquiry_id}/convert", post(convert_thread_handler));

    // Client routes
    let client = Router::new()
        .route("/threads/{inquiry_id}/quotations/{version}/approve", post(approve_quotation_handler))
        .route("/threads/{inquiry_id}/quotations/{version}/revision", post(request_revision_handler))
        .route("/threads/{inquiry_id}/quotations/{version}/reject", post(reject_quotation_handler));

    // Shared routes
    let shared = Router::new()
        .route("/threads/{inquiry_id}", get(get_thread_handler).post(open_thread_handler))
        .route("/threads/{inquiry_id}/messages", post(post_message_handler))
        .route("/threads/{inquiry_id}/read", post(mark_read_handler));

    admin
        .merge(client)
        .merge(shared)
        .with_state(service)
}
