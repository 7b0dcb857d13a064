//! Bounded bulk recomputation after a persona change.
//!
//! One worker task per tenant drains an mpsc queue of triggers, so a tenant
//! never has two sync batches running at once. Each trigger bumps the tenant's
//! generation counter; a cycle whose generation is no longer current stops
//! scheduling work and its pending writes are discarded by the pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::matching::locks::TenantLocks;
use crate::matching::pipeline::{CycleToken, MatchPipeline, PipelineError, RescoreOutcome};
use crate::models::persona::Persona;
use crate::persona::signature::{fingerprint, SignatureTracker};
use crate::store::{MatchStore, PersonaStore, StoreError};

/// A tenant worker with nothing queued for this long exits; the next trigger
/// starts a fresh one.
pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Scanning,
    Recomputing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    pub job_id: String,
    pub error: String,
}

/// Progress of the latest sync trigger for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub tenant_id: Uuid,
    pub generation: u64,
    pub signature: String,
    pub state: SyncState,
    pub scanned: usize,
    pub updated: usize,
    pub excluded: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    fn queued(tenant_id: Uuid, generation: u64, signature: &str) -> Self {
        Self {
            tenant_id,
            generation,
            signature: signature.to_string(),
            state: SyncState::Idle,
            scanned: 0,
            updated: 0,
            excluded: 0,
            unchanged: 0,
            failed: 0,
            failures: Vec::new(),
            cancelled: false,
            started_at: None,
            finished_at: None,
        }
    }

    fn record_failure(&mut self, job_id: &str, error: String) {
        self.failed += 1;
        self.failures.push(SyncFailure {
            job_id: job_id.to_string(),
            error,
        });
    }
}

/// What `on_persona_saved` tells its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaSaved {
    pub signature: String,
    pub changed: bool,
    /// Generation of the scheduled sync cycle, if one was scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

struct SyncTrigger {
    persona: Persona,
    signature: String,
    generation: u64,
}

struct TenantWorker {
    tx: mpsc::UnboundedSender<SyncTrigger>,
    generation: Arc<AtomicU64>,
}

struct Shared {
    pipeline: Arc<MatchPipeline>,
    matches: Arc<dyn MatchStore>,
    reports: RwLock<HashMap<Uuid, SyncReport>>,
}

pub struct SyncCoordinator {
    shared: Arc<Shared>,
    personas: Arc<dyn PersonaStore>,
    tracker: SignatureTracker,
    /// Held across persist-and-sign so the stored signature always belongs
    /// to the live persona.
    tenant_locks: TenantLocks,
    workers: Mutex<HashMap<Uuid, TenantWorker>>,
}

impl SyncCoordinator {
    pub fn new(
        pipeline: Arc<MatchPipeline>,
        matches: Arc<dyn MatchStore>,
        personas: Arc<dyn PersonaStore>,
        tracker: SignatureTracker,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline,
                matches,
                reports: RwLock::new(HashMap::new()),
            }),
            personas,
            tracker,
            tenant_locks: TenantLocks::new(),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Persists `persona` and signs it as one step per tenant.
    #[instrument(skip(self, persona), fields(tenant = %tenant))]
    pub async fn save_persona(
        &self,
        tenant: Uuid,
        persona: Persona,
    ) -> Result<PersonaSaved, StoreError> {
        let _guard = self.tenant_locks.lock(tenant).await;
        self.personas.put_persona(tenant, &persona).await?;
        self.sign(tenant, persona).await
    }

    /// Called after the persona has been persisted. Schedules a sync cycle
    /// when the signature changed and returns without waiting for it.
    ///
    /// The stored persona is re-read under the tenant lock, so a caller
    /// holding an older copy cannot sign over a newer save. `persona` is only
    /// used when nothing is stored.
    #[instrument(skip(self, persona), fields(tenant = %tenant))]
    pub async fn on_persona_saved(
        &self,
        tenant: Uuid,
        persona: Persona,
    ) -> Result<PersonaSaved, StoreError> {
        let _guard = self.tenant_locks.lock(tenant).await;
        let live = self.personas.get_persona(tenant).await?.unwrap_or(persona);
        self.sign(tenant, live).await
    }

    async fn sign(&self, tenant: Uuid, persona: Persona) -> Result<PersonaSaved, StoreError> {
        let signature = fingerprint(&persona);
        let changed = self.tracker.has_changed(tenant, &signature).await?;
        if !changed {
            info!("persona signature unchanged; no sync");
            return Ok(PersonaSaved {
                signature,
                changed,
                generation: None,
            });
        }

        let generation = self.schedule(tenant, persona, signature.clone());
        info!(generation, "persona changed; sync scheduled");
        Ok(PersonaSaved {
            signature,
            changed,
            generation: Some(generation),
        })
    }

    /// Schedules a cycle for the stored persona even when its signature is
    /// already current, picking up records a previous cycle failed to
    /// refresh. `None` when the tenant has no persona.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn force_sync(&self, tenant: Uuid) -> Result<Option<PersonaSaved>, StoreError> {
        let _guard = self.tenant_locks.lock(tenant).await;
        let Some(persona) = self.personas.get_persona(tenant).await? else {
            return Ok(None);
        };
        let signature = fingerprint(&persona);
        let changed = self.tracker.has_changed(tenant, &signature).await?;
        let generation = self.schedule(tenant, persona, signature.clone());
        info!(generation, changed, "forced sync scheduled");
        Ok(Some(PersonaSaved {
            signature,
            changed,
            generation: Some(generation),
        }))
    }

    pub fn report(&self, tenant: Uuid) -> Option<SyncReport> {
        self.shared.report(tenant)
    }

    #[cfg(test)]
    fn worker_running(&self, tenant: Uuid) -> bool {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tenant)
            .is_some_and(|w| !w.tx.is_closed())
    }

    fn schedule(&self, tenant: Uuid, persona: Persona, signature: String) -> u64 {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = workers
            .entry(tenant)
            .or_insert_with(|| self.spawn_worker(tenant, Arc::new(AtomicU64::new(0))));

        let generation = worker.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared
            .publish(SyncReport::queued(tenant, generation, &signature));

        let trigger = SyncTrigger {
            persona,
            signature,
            generation,
        };
        if let Err(mpsc::error::SendError(trigger)) = worker.tx.send(trigger) {
            warn!(%tenant, "sync worker stopped; restarting");
            let restarted = self.spawn_worker(tenant, worker.generation.clone());
            // A freshly created receiver is alive, so this send cannot fail.
            let _ = restarted.tx.send(trigger);
            *worker = restarted;
        }
        generation
    }

    fn spawn_worker(&self, tenant: Uuid, generation: Arc<AtomicU64>) -> TenantWorker {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = self.shared.clone();
        tokio::spawn(shared.run_worker(tenant, generation.clone(), rx));
        TenantWorker { tx, generation }
    }
}

impl Shared {
    fn report(&self, tenant: Uuid) -> Option<SyncReport> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tenant)
            .cloned()
    }

    /// Keeps the newest generation's report; a superseded cycle finishing
    /// late does not hide the queued one.
    fn publish(&self, report: SyncReport) {
        let mut reports = self.reports.write().unwrap_or_else(PoisonError::into_inner);
        match reports.get(&report.tenant_id) {
            Some(current) if current.generation > report.generation => {}
            _ => {
                reports.insert(report.tenant_id, report);
            }
        }
    }

    async fn run_worker(
        self: Arc<Self>,
        tenant: Uuid,
        generation: Arc<AtomicU64>,
        mut rx: mpsc::UnboundedReceiver<SyncTrigger>,
    ) {
        loop {
            let next = match tokio::time::timeout(WORKER_IDLE_TIMEOUT, rx.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    // Refuse new sends, then drain whatever slipped in first.
                    rx.close();
                    rx.recv().await
                }
            };
            let Some(mut trigger) = next else {
                info!(%tenant, "sync worker idle; exiting");
                break;
            };
            // Only the newest queued trigger matters.
            while let Ok(newer) = rx.try_recv() {
                trigger = newer;
            }
            let token = CycleToken::new(generation.clone(), trigger.generation);
            if !token.is_current() {
                continue;
            }
            self.run_cycle(tenant, trigger, token).await;
        }
    }

    #[instrument(skip_all, fields(tenant = %tenant, generation = trigger.generation))]
    async fn run_cycle(&self, tenant: Uuid, trigger: SyncTrigger, token: CycleToken) {
        let SyncTrigger {
            persona,
            signature,
            generation,
        } = trigger;
        let settings = self.pipeline.settings().clone();

        let mut report = SyncReport::queued(tenant, generation, &signature);
        report.started_at = Some(Utc::now());
        report.state = SyncState::Scanning;
        self.publish(report.clone());

        let candidates = match self
            .matches
            .list_stale_scored(tenant, &signature, settings.sync_batch_cap)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "sync scan failed");
                report.record_failure("*", e.to_string());
                self.finish(report);
                return;
            }
        };
        report.scanned = candidates.len();
        report.state = SyncState::Recomputing;
        self.publish(report.clone());
        info!(scanned = report.scanned, "recomputing stale matches");

        let persona = Arc::new(persona);
        let signature = Arc::new(signature);
        let permits = Arc::new(Semaphore::new(settings.sync_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for record in candidates {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            if !token.is_current() {
                report.cancelled = true;
                break;
            }

            let pipeline = self.pipeline.clone();
            let persona = persona.clone();
            let signature = signature.clone();
            let token = token.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = pipeline
                    .rescore_for_sync(tenant, &persona, &signature, &record.job_id, &token)
                    .await;
                (record.job_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(RescoreOutcome::Updated))) => report.updated += 1,
                Ok((_, Ok(RescoreOutcome::NewlyExcluded))) => report.excluded += 1,
                Ok((_, Ok(RescoreOutcome::AlreadyCurrent | RescoreOutcome::AlreadyExcluded))) => {
                    report.unchanged += 1
                }
                Ok((_, Err(PipelineError::Superseded))) => report.cancelled = true,
                Ok((job_id, Err(e))) => {
                    warn!(job_id, error = %e, "sync recompute failed; record left stale");
                    report.record_failure(&job_id, e.to_string());
                }
                Err(e) => {
                    error!(error = %e, "sync task aborted");
                    report.record_failure("*", e.to_string());
                }
            }
        }

        self.finish(report);
    }

    fn finish(&self, mut report: SyncReport) {
        report.state = SyncState::Done;
        report.finished_at = Some(Utc::now());
        info!(
            updated = report.updated,
            excluded = report.excluded,
            unchanged = report.unchanged,
            failed = report.failed,
            cancelled = report.cancelled,
            "sync cycle done"
        );
        self.publish(report);
    }
}
