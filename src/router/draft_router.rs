use axum::{Router, routing::{delete, get, post, put}};
use crate::handler::draft_handler::{
    DraftHandlerState,
    upsert_draft_handler,
    list_drafts_handler,
    get_draft_handler,
    submit_drafts_handler,
    delete_draft_handler,
    purge_drafts_handler,
    stream_drafts_handler,
    approve_request_handler,
    reject_request_handler,
};


pub fn draft_router(state: DraftHandlerState) -> Router {
    // Submitter routes
    let submitter = Router::new()
        .route("/drafts/{kind}", put(upsert_draft_handler))
        .route(
            "/inquiries/{inquiry_id}/drafts/{kind}",
            get(list_drafts_handler).delete(delete_draft_handler),
        )
        .route("/inquiries/{inquiry_id}/drafts/{kind}/submit", post(submit_drafts_handler))
        .route("/inquiries/{inquiry_id}/drafts/{kind}/by/{email}", get(get_draft_handler));

    // Review routes
    let review = Router::new()
        .route("/inquiries/{inquiry_id}/drafts/{kind}/stream", get(stream_drafts_handler))
        .route("/inquiries/{inquiry_id}/drafts/{kind}/purge", post(purge_drafts_handler))
        .route("/drafts/{kind}/{id}/approve", post(approve_request_handler))
        .route("/drafts/{kind}/{id}/reject", post(reject_request_handler));

    submitter
        .merge(review)
        .with_state(state)
}
