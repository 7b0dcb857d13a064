//! The one path every scoring attempt takes.
//!
//! Flow per (tenant, job), under the pair lock:
//! exclusion gate → constraint filter → keyword pre-filter →
//! external scorer + gap analysis → aggregation → persist (+ exclusion entry).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::matching::aggregate::{aggregate, RecordStamp, Screening};
use crate::matching::constraints::{self, ConstraintResult};
use crate::matching::gap;
use crate::matching::keywords::{self, KeywordResult};
use crate::matching::locks::PairLocks;
use crate::models::job::Job;
use crate::models::match_record::MatchRecord;
use crate::models::persona::Persona;
use crate::persona::signature::fingerprint;
use crate::scorer::{ExternalScorer, ScorerError, SemanticScore};
use crate::store::{ExclusionStore, JobStore, MatchStore, StoreError};

pub const DEFAULT_SCORER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SYNC_BATCH_CAP: usize = 1000;
pub const DEFAULT_SYNC_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scorer_timeout: Duration,
    /// Upper bound on records recomputed by one sync trigger.
    pub sync_batch_cap: usize,
    /// Concurrent scorer calls within one tenant's sync batch.
    pub sync_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scorer_timeout: DEFAULT_SCORER_TIMEOUT,
            sync_batch_cap: DEFAULT_SYNC_BATCH_CAP,
            sync_concurrency: DEFAULT_SYNC_CONCURRENCY,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("job {0} is not in the job store")]
    MissingJob(String),

    #[error("superseded by a newer sync cycle")]
    Superseded,

    #[error("job {0} is excluded but has no match record")]
    ExcludedWithoutRecord(String),
}

/// Result of a sync-driven recompute for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescoreOutcome {
    Updated,
    /// Recomputed and fell below the exclusion threshold.
    NewlyExcluded,
    /// Already tagged with the cycle's signature.
    AlreadyCurrent,
    /// Excluded before the cycle reached it.
    AlreadyExcluded,
}

/// Lets a sync cycle notice that a newer persona change superseded it.
#[derive(Debug, Clone)]
pub struct CycleToken {
    generation: Arc<AtomicU64>,
    expected: u64,
}

impl CycleToken {
    pub fn new(generation: Arc<AtomicU64>, expected: u64) -> Self {
        Self {
            generation,
            expected,
        }
    }

    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.expected
    }
}

enum Gate {
    Excluded(MatchRecord),
    Open(Option<MatchRecord>),
}

pub struct MatchPipeline {
    matches: Arc<dyn MatchStore>,
    exclusions: Arc<dyn ExclusionStore>,
    jobs: Arc<dyn JobStore>,
    scorer: Arc<dyn ExternalScorer>,
    locks: PairLocks,
    settings: EngineSettings,
}

impl MatchPipeline {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        exclusions: Arc<dyn ExclusionStore>,
        jobs: Arc<dyn JobStore>,
        scorer: Arc<dyn ExternalScorer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            matches,
            exclusions,
            jobs,
            scorer,
            locks: PairLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// First-time scoring entry point used by ingestion.
    ///
    /// Excluded jobs are returned as stored. A record already computed against
    /// this persona's signature is returned without calling the scorer.
    #[instrument(skip(self, persona, job), fields(tenant = %tenant, job_id = %job.id))]
    pub async fn score_job(
        &self,
        tenant: Uuid,
        persona: &Persona,
        job: &Job,
    ) -> Result<MatchRecord, PipelineError> {
        let signature = fingerprint(persona);
        let _guard = self.locks.lock_pair(tenant, &job.id).await;

        match self.gate(tenant, &job.id).await? {
            Gate::Excluded(record) => {
                debug!("job already excluded");
                return Ok(record);
            }
            Gate::Open(Some(existing)) if existing.persona_signature == signature => {
                debug!("job already scored against this persona");
                return Ok(existing);
            }
            Gate::Open(_) => {}
        }

        let record = self.compute(tenant, persona, &signature, job).await?;
        self.persist(&record).await?;
        info!(score = record.score, status = %record.status, "job scored");
        Ok(record)
    }

    /// Recomputes one previously scored job for a sync cycle. Writes nothing
    /// when the cycle has been superseded by the time the result is ready.
    #[instrument(skip(self, persona, signature, token), fields(tenant = %tenant))]
    pub async fn rescore_for_sync(
        &self,
        tenant: Uuid,
        persona: &Persona,
        signature: &str,
        job_id: &str,
        token: &CycleToken,
    ) -> Result<RescoreOutcome, PipelineError> {
        if !token.is_current() {
            return Err(PipelineError::Superseded);
        }
        let _guard = self.locks.lock_pair(tenant, job_id).await;

        match self.gate(tenant, job_id).await? {
            Gate::Excluded(_) => return Ok(RescoreOutcome::AlreadyExcluded),
            Gate::Open(Some(existing)) if existing.persona_signature == signature => {
                return Ok(RescoreOutcome::AlreadyCurrent)
            }
            Gate::Open(_) => {}
        }

        let job = self
            .jobs
            .get_job(tenant, job_id)
            .await?
            .ok_or_else(|| PipelineError::MissingJob(job_id.to_string()))?;

        let record = self.compute(tenant, persona, signature, &job).await?;

        if !token.is_current() {
            return Err(PipelineError::Superseded);
        }
        self.persist(&record).await?;

        Ok(if record.is_excluded() {
            RescoreOutcome::NewlyExcluded
        } else {
            RescoreOutcome::Updated
        })
    }

    /// The exclusion store is consulted before anything else. A record marked
    /// excluded without its entry (interrupted write) is treated as excluded
    /// and the entry is repaired.
    async fn gate(&self, tenant: Uuid, job_id: &str) -> Result<Gate, PipelineError> {
        let excluded = self.exclusions.is_excluded(tenant, job_id).await?;
        let existing = self.matches.get_match(tenant, job_id).await?;

        match existing {
            Some(record) if excluded => Ok(Gate::Excluded(record)),
            Some(record) if record.is_excluded() => {
                warn!(job_id, "excluded record without exclusion entry; repairing");
                self.exclusions.record_exclusion(tenant, job_id).await?;
                Ok(Gate::Excluded(record))
            }
            None if excluded => Err(PipelineError::ExcludedWithoutRecord(job_id.to_string())),
            other => Ok(Gate::Open(other)),
        }
    }

    async fn compute(
        &self,
        tenant: Uuid,
        persona: &Persona,
        signature: &str,
        job: &Job,
    ) -> Result<MatchRecord, PipelineError> {
        let gap = gap::analyze(persona, job);

        let screening = match constraints::evaluate(persona, job) {
            ConstraintResult::Fail(reason) => Screening::ConstraintFailed(reason),
            ConstraintResult::Pass => {
                match keywords::evaluate(&persona.mandatory_keywords, &job.text()) {
                    KeywordResult::Fail => Screening::NoKeywordMatch,
                    KeywordResult::Pass { .. } => {
                        Screening::Assessed(self.semantic(persona, job).await?)
                    }
                }
            }
        };

        let stamp = RecordStamp {
            tenant_id: tenant,
            job_id: job.id.clone(),
            persona_signature: signature.to_string(),
            computed_at: Utc::now(),
        };
        Ok(aggregate(stamp, screening, gap))
    }

    /// Calls the external scorer under the pipeline's own deadline, whatever
    /// the implementation does with the timeout it is handed.
    async fn semantic(&self, persona: &Persona, job: &Job) -> Result<SemanticScore, ScorerError> {
        let timeout = self.settings.scorer_timeout;
        let result = tokio::time::timeout(
            timeout,
            self.scorer.score(&persona.summary(), &job.summary(), timeout),
        )
        .await
        .map_err(|_| ScorerError::Timeout(timeout))??;

        if !result.score.is_finite() {
            return Err(ScorerError::Unavailable(format!(
                "scorer returned non-finite score {}",
                result.score
            )));
        }
        Ok(result)
    }

    /// Writes the record and, on exclusion, its exclusion entry.
    async fn persist(&self, record: &MatchRecord) -> Result<(), StoreError> {
        let applied = self.matches.save_match(record).await?;
        if !applied {
            warn!(job_id = %record.job_id, "stored record is excluded; write skipped");
        }
        if record.is_excluded() {
            self.exclusions
                .record_exclusion(record.tenant_id, &record.job_id)
                .await?;
        }
        Ok(())
    }
}
