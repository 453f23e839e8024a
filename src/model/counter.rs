use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Client,
    Project,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Client => "client",
            IdKind::Project => "project",
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last issued sequence for one `(kind, year)` scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceCounter {
    #[serde(rename = "_id")]
    pub id: String,
    pub kind: IdKind,
    pub year: i32,
    pub value: i64,
}

pub fn counter_scope(kind: IdKind, year: i32) -> String {
    format!("{}-{}", kind.as_str(), year)
}
