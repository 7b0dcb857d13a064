use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scored,
    /// Terminal. Never transitions back to `Scored`.
    Excluded,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scored => "scored",
            MatchStatus::Excluded => "excluded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scored" => Some(MatchStatus::Scored),
            "excluded" => Some(MatchStatus::Excluded),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached outcome of scoring one job for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub tenant_id: Uuid,
    pub job_id: String,
    /// Final bounded score, 0–100.
    pub score: u8,
    /// Semantic score × 100 before penalties. `None` when the job was rejected
    /// before the external scorer ran.
    pub base_score: Option<u8>,
    pub missing_skills: BTreeSet<String>,
    pub bonus_skills: BTreeSet<String>,
    pub seniority_penalty: i32,
    pub seniority_explanation: String,
    pub rationale: String,
    pub persona_signature: String,
    pub computed_at: DateTime<Utc>,
    pub status: MatchStatus,
}

impl MatchRecord {
    pub fn is_excluded(&self) -> bool {
        self.status == MatchStatus::Excluded
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchRow {
    pub tenant_id: Uuid,
    pub job_id: String,
    pub score: i16,
    pub base_score: Option<i16>,
    pub missing_skills: Vec<String>,
    pub bonus_skills: Vec<String>,
    pub seniority_penalty: i32,
    pub seniority_explanation: String,
    pub rationale: String,
    pub persona_signature: String,
    pub computed_at: DateTime<Utc>,
    pub status: String,
}
