use axum::{Router, routing::get};
use crate::handler::activity_handler::list_activity_handler;
use std::sync::Arc;
use crate::service::activity_logger::ActivityLogService;


pub fn activity_router(service: Arc<dyn ActivityLogService>) -> Router {
    Router::new()
        .route("/activity-logs", get(list_activity_handler))
        .with_state(service)
}
