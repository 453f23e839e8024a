use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::dto::activity_dto::ActivityLogQuery;
use crate::model::activity_log::ActivityLogFilter;
use crate::service::activity_logger::ActivityLogService;
use crate::util::error::HandlerError;

// Handler: Query the audit trail (admin only)
pub async fn list_activity_handler(
    State(service): State<Arc<dyn ActivityLogService>>,
    Query(query): Query<ActivityLogQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let filter = ActivityLogFilter::try_from(query)?;
    let logs = service.query(filter).await?;
    Ok(Json(logs))
}
