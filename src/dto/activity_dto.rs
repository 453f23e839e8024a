use serde::Deserialize;

use crate::model::activity_log::{ActivityAction, ActivityLogFilter, EntityType};
use crate::util::error::ServiceError;
use crate::util::timestamp::parse_iso8601;

/// Query string of `GET /activity-logs`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogQuery {
    pub actor: Option<String>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

impl TryFrom<ActivityLogQuery> for ActivityLogFilter {
    type Error = ServiceError;

    fn try_from(query: ActivityLogQuery) -> Result<Self, Self::Error> {
        let parse = |value: Option<String>| -> Result<_, ServiceError> {
            value
                .map(|v| parse_iso8601(&v).map_err(ServiceError::validation))
                .transpose()
        };
        Ok(ActivityLogFilter {
            actor: query.actor,
            entity_type: query.entity_type,
            entity_id: query.entity_id,
            action: query.action,
            from: parse(query.from)?,
            to: parse(query.to)?,
            limit: query.limit,
        })
    }
}
