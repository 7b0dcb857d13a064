//! Score Aggregator — folds filter outcomes, the semantic estimate and the gap
//! analysis into one bounded, explainable `MatchRecord`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::matching::gap::GapAnalysis;
use crate::models::match_record::{MatchRecord, MatchStatus};
use crate::scorer::SemanticScore;

/// Scores strictly below this are permanently excluded.
pub const HARD_EXCLUSION_THRESHOLD: u8 = 40;

pub const NO_KEYWORD_MATCH_RATIONALE: &str = "no mandatory keyword match";

/// How far a job got through the filters.
#[derive(Debug, Clone, PartialEq)]
pub enum Screening {
    ConstraintFailed(String),
    NoKeywordMatch,
    Assessed(SemanticScore),
}

/// Identity and provenance stamped on every record.
#[derive(Debug, Clone)]
pub struct RecordStamp {
    pub tenant_id: Uuid,
    pub job_id: String,
    pub persona_signature: String,
    pub computed_at: DateTime<Utc>,
}

pub fn aggregate(stamp: RecordStamp, screening: Screening, gap: GapAnalysis) -> MatchRecord {
    let (score, base_score, rationale, status) = match screening {
        Screening::ConstraintFailed(reason) => (0, None, reason, MatchStatus::Excluded),
        Screening::NoKeywordMatch => (
            0,
            None,
            NO_KEYWORD_MATCH_RATIONALE.to_string(),
            MatchStatus::Excluded,
        ),
        Screening::Assessed(semantic) => {
            let base = base_score(semantic.score);
            let score = final_score(base, gap.seniority_penalty);
            let status = if score < HARD_EXCLUSION_THRESHOLD {
                MatchStatus::Excluded
            } else {
                MatchStatus::Scored
            };
            (score, Some(base), semantic.rationale, status)
        }
    };

    MatchRecord {
        tenant_id: stamp.tenant_id,
        job_id: stamp.job_id,
        score,
        base_score,
        missing_skills: gap.missing_skills,
        bonus_skills: gap.bonus_skills,
        seniority_penalty: gap.seniority_penalty,
        seniority_explanation: gap.seniority_explanation,
        rationale,
        persona_signature: stamp.persona_signature,
        computed_at: stamp.computed_at,
        status,
    }
}

/// `round(semantic × 100)`, with the estimate clamped into [0, 1] first.
pub fn base_score(semantic: f64) -> u8 {
    (semantic.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// `clamp(base + penalty, 0, 100)`.
pub fn final_score(base: u8, penalty: i32) -> u8 {
    (i32::from(base) + penalty).clamp(0, 100) as u8
}
