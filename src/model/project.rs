use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Not yet active: no member has been approved
    Pending,
    Ongoing,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "Pending",
            ProjectStatus::Ongoing => "Ongoing",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub idempotency_key: String,
    pub inquiry_id: String,
    pub title: String,
    pub project_lead: String,
    pub lab_name: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub sample_count: Option<u32>,
    pub funding_source: Option<String>,
    pub notes: Option<String>,
    /// Display names of approved members. Derived from the client records.
    #[serde(default)]
    pub client_names: Vec<String>,
    pub status: ProjectStatus,
    pub status_changed_by: Option<String>,
    pub status_reason: Option<String>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub status_changed_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::util::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Set-merge names into `client_names`, keeping first-seen order.
    /// Returns the names that were actually added.
    pub fn merge_client_names(&mut self, names: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() || self.client_names.iter().any(|n| n == name) {
                continue;
            }
            self.client_names.push(name.to_string());
            added.push(name.to_string());
        }
        added
    }
}

pub fn project_idempotency_key(draft_id: &str) -> String {
    format!("{}:projects:0", draft_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectRecord {
        let now = Utc::now();
        ProjectRecord {
            id: "P-2025-001".to_string(),
            idempotency_key: project_idempotency_key("INQ-1_lead@lab.org"),
            inquiry_id: "INQ-1".to_string(),
            title: "Rice pathogen panel".to_string(),
            project_lead: "Dr. Reyes".to_string(),
            lab_name: None,
            services: vec![],
            sample_count: None,
            funding_source: None,
            notes: None,
            client_names: vec!["Ana Cruz".to_string()],
            status: ProjectStatus::Pending,
            status_changed_by: None,
            status_reason: None,
            status_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_client_names_deduplicates() {
        let mut p = project();
        let added = p.merge_client_names(&[
            "Ben Santos".to_string(),
            "Ana Cruz".to_string(),
            "Ben Santos".to_string(),
            "  ".to_string(),
        ]);
        assert_eq!(added, vec!["Ben Santos".to_string()]);
        assert_eq!(p.client_names, vec!["Ana Cruz".to_string(), "Ben Santos".to_string()]);
    }
}
