//! Shared fixtures for unit tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::matching::pipeline::{EngineSettings, MatchPipeline};
use crate::models::job::Job;
use crate::models::persona::{HardConstraints, Persona, SeniorityLevel};
use crate::persona::archive::{snapshot_key, ArchiveError, PersonaArchive};
use crate::persona::signature::SignatureTracker;
use crate::persona::sync::SyncCoordinator;
use crate::scorer::{ExternalScorer, ScorerError, SemanticScore};
use crate::state::AppState;
use crate::store::memory::MemoryStore;

fn set_of(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Five years of experience, no keywords, no hard constraints.
pub fn persona(stack: &[&str], seniority: SeniorityLevel) -> Persona {
    Persona {
        tech_stack: set_of(stack),
        valuable_skills: BTreeSet::new(),
        mandatory_keywords: BTreeSet::new(),
        years_of_experience: 5,
        seniority,
        hard_constraints: HardConstraints::default(),
        soft_traits: "Calm under pressure".to_string(),
        ambitions: "Grow into a staff role".to_string(),
    }
}

/// The id and skills are written into the description so keyword filters and
/// scripted scorers can see them.
pub fn job(id: &str, skills: &[&str], seniority: Option<SeniorityLevel>) -> Job {
    Job {
        id: id.to_string(),
        title: "Backend Engineer".to_string(),
        company: "Example Co".to_string(),
        description: format!("Listing {id}. Stack: {}.", skills.join(", ")),
        location: None,
        required_seniority: seniority,
        required_skills: set_of(skills),
        required_certifications: BTreeSet::new(),
        min_years_experience: None,
        ingested_at: Utc::now(),
    }
}

/// Deterministic stand-in for the LLM scorer.
///
/// Returns `default` unless a scripted marker appears in the job summary.
/// Every call is counted, including failing ones.
pub struct FakeScorer {
    default: Mutex<f64>,
    scripted: Mutex<Vec<(String, f64)>>,
    failure: Mutex<Option<ScorerError>>,
    failing_markers: Mutex<Vec<(String, ScorerError)>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeScorer {
    pub fn new(default: f64) -> Self {
        Self {
            default: Mutex::new(default),
            scripted: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            failing_markers: Mutex::new(Vec::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_default(&self, score: f64) {
        *self.default.lock().unwrap() = score;
    }

    /// Scores jobs whose summary contains `marker` with `score`.
    pub fn script(&self, marker: &str, score: f64) {
        self.scripted
            .lock()
            .unwrap()
            .push((marker.to_string(), score));
    }

    pub fn fail_with(&self, error: ScorerError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Fails only jobs whose summary contains `marker`.
    pub fn fail_for(&self, marker: &str, error: ScorerError) {
        self.failing_markers
            .lock()
            .unwrap()
            .push((marker.to_string(), error));
    }

    /// Drops every injected failure.
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
        self.failing_markers.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalScorer for FakeScorer {
    async fn score(
        &self,
        _persona_summary: &str,
        job_summary: &str,
        _timeout: Duration,
    ) -> Result<SemanticScore, ScorerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some((_, err)) = self
            .failing_markers
            .lock()
            .unwrap()
            .iter()
            .find(|(marker, _)| job_summary.contains(marker.as_str()))
        {
            return Err(err.clone());
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(marker, _)| job_summary.contains(marker.as_str()))
            .map(|(_, score)| *score);
        let score = scripted.unwrap_or(*self.default.lock().unwrap());

        Ok(SemanticScore {
            score,
            rationale: format!("fake assessment {score}"),
        })
    }
}

/// Archive that remembers the keys it was asked to write.
#[derive(Default)]
pub struct RecordingArchive {
    keys: Mutex<Vec<String>>,
}

impl RecordingArchive {
    pub fn count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[async_trait]
impl PersonaArchive for RecordingArchive {
    async fn archive(
        &self,
        tenant: Uuid,
        signature: &str,
        _persona: &Persona,
    ) -> Result<String, ArchiveError> {
        let key = snapshot_key(tenant, signature);
        self.keys.lock().unwrap().push(key.clone());
        Ok(key)
    }
}

/// Full application state over one in-memory store.
pub fn app_state(
    store: &Arc<MemoryStore>,
    scorer: Arc<FakeScorer>,
) -> (AppState, Arc<RecordingArchive>) {
    let pipeline = Arc::new(MatchPipeline::new(
        store.clone(),
        store.clone(),
        store.clone(),
        scorer,
        EngineSettings::default(),
    ));
    let sync = Arc::new(SyncCoordinator::new(
        pipeline.clone(),
        store.clone(),
        store.clone(),
        SignatureTracker::new(store.clone()),
    ));
    let archive = Arc::new(RecordingArchive::default());
    let state = AppState {
        personas: store.clone(),
        jobs: store.clone(),
        matches: store.clone(),
        exclusions: store.clone(),
        pipeline,
        sync,
        archive: archive.clone(),
    };
    (state, archive)
}
