//! External semantic scorer: untrusted, paid, possibly slow.
//!
//! `ExternalScorer` is the seam; the pipeline holds an `Arc<dyn ExternalScorer>`.
//! Production uses `LlmScorer`; tests script a fake.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::{LlmClient, LlmError};

pub mod prompts;

use prompts::{FIT_SCORE_PROMPT_TEMPLATE, FIT_SCORE_SYSTEM};

/// Character budgets applied before the model call.
const PERSONA_CHAR_BUDGET: usize = 2000;
const JOB_CHAR_BUDGET: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticScore {
    /// Compatibility estimate in [0, 1].
    pub score: f64,
    pub rationale: String,
}

/// Transient scorer failures. Neither aborts a batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScorerError {
    #[error("scorer timed out after {0:?}")]
    Timeout(Duration),

    #[error("scorer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ExternalScorer: Send + Sync {
    async fn score(
        &self,
        persona_summary: &str,
        job_summary: &str,
        timeout: Duration,
    ) -> Result<SemanticScore, ScorerError>;
}

/// Semantic scorer backed by the LLM client.
pub struct LlmScorer(pub LlmClient);

#[async_trait]
impl ExternalScorer for LlmScorer {
    async fn score(
        &self,
        persona_summary: &str,
        job_summary: &str,
        timeout: Duration,
    ) -> Result<SemanticScore, ScorerError> {
        let prompt = FIT_SCORE_PROMPT_TEMPLATE
            .replace("{persona}", truncate_chars(persona_summary, PERSONA_CHAR_BUDGET))
            .replace("{job}", truncate_chars(job_summary, JOB_CHAR_BUDGET));

        self.0
            .call_json::<SemanticScore>(&prompt, FIT_SCORE_SYSTEM, timeout)
            .await
            .map_err(|e| match e {
                LlmError::Timeout(d) => ScorerError::Timeout(d),
                other => ScorerError::Unavailable(other.to_string()),
            })
    }
}

/// Cuts `text` to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
