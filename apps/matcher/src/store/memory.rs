use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::job::Job;
use crate::models::match_record::MatchRecord;
use crate::models::persona::Persona;
use crate::store::{
    ExclusionStore, JobStore, MatchStore, PersonaStore, SignatureStore, StoreError,
};

#[derive(Default)]
struct Inner {
    matches: HashMap<(Uuid, String), MatchRecord>,
    exclusions: HashMap<Uuid, BTreeSet<String>>,
    signatures: HashMap<Uuid, String>,
    jobs: HashMap<(Uuid, String), Job>,
    personas: HashMap<Uuid, Persona>,
}

/// In-process store used by tests. `fail_match_writes` simulates a storage
/// outage on the match table.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    pub fail_match_writes: AtomicBool,
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard)
    }

    /// Test helper: places a record without any terminality check.
    pub fn insert_match(&self, record: MatchRecord) {
        self.with(|i| {
            i.matches
                .insert((record.tenant_id, record.job_id.clone()), record)
        });
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get_match(
        &self,
        tenant: Uuid,
        job_id: &str,
    ) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.with(|i| i.matches.get(&(tenant, job_id.to_string())).cloned()))
    }

    async fn save_match(&self, record: &MatchRecord) -> Result<bool, StoreError> {
        if self.fail_match_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("match table offline".to_string()));
        }
        Ok(self.with(|i| {
            let key = (record.tenant_id, record.job_id.clone());
            if i.matches.get(&key).is_some_and(MatchRecord::is_excluded) {
                return false;
            }
            i.matches.insert(key, record.clone());
            true
        }))
    }

    async fn list_matches(&self, tenant: Uuid) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self.with(|i| {
            let mut out: Vec<MatchRecord> = i
                .matches
                .values()
                .filter(|r| r.tenant_id == tenant)
                .cloned()
                .collect();
            out.sort_by(|a, b| b.score.cmp(&a.score).then(b.computed_at.cmp(&a.computed_at)));
            out
        }))
    }

    async fn list_stale_scored(
        &self,
        tenant: Uuid,
        signature: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self.with(|i| {
            let mut out: Vec<MatchRecord> = i
                .matches
                .values()
                .filter(|r| {
                    r.tenant_id == tenant && !r.is_excluded() && r.persona_signature != signature
                })
                .cloned()
                .collect();
            out.sort_by(|a, b| b.computed_at.cmp(&a.computed_at));
            out.truncate(limit);
            out
        }))
    }
}

#[async_trait]
impl ExclusionStore for MemoryStore {
    async fn is_excluded(&self, tenant: Uuid, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.with(|i| {
            i.exclusions
                .get(&tenant)
                .is_some_and(|set| set.contains(job_id))
        }))
    }

    async fn record_exclusion(&self, tenant: Uuid, job_id: &str) -> Result<(), StoreError> {
        self.with(|i| {
            i.exclusions
                .entry(tenant)
                .or_default()
                .insert(job_id.to_string())
        });
        Ok(())
    }

    async fn list_excluded(&self, tenant: Uuid) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.with(|i| i.exclusions.get(&tenant).cloned().unwrap_or_default()))
    }
}

#[async_trait]
impl SignatureStore for MemoryStore {
    async fn current_signature(&self, tenant: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.with(|i| i.signatures.get(&tenant).cloned()))
    }

    async fn swap_signature(&self, tenant: Uuid, signature: &str) -> Result<bool, StoreError> {
        Ok(self.with(|i| {
            if i.signatures.get(&tenant).map(String::as_str) == Some(signature) {
                return false;
            }
            i.signatures.insert(tenant, signature.to_string());
            true
        }))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_job(&self, tenant: Uuid, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.with(|i| i.jobs.get(&(tenant, job_id.to_string())).cloned()))
    }

    async fn put_job(&self, tenant: Uuid, job: &Job) -> Result<(), StoreError> {
        self.with(|i| {
            i.jobs
                .entry((tenant, job.id.clone()))
                .or_insert_with(|| job.clone());
        });
        Ok(())
    }
}

#[async_trait]
impl PersonaStore for MemoryStore {
    async fn get_persona(&self, tenant: Uuid) -> Result<Option<Persona>, StoreError> {
        Ok(self.with(|i| i.personas.get(&tenant).cloned()))
    }

    async fn put_persona(&self, tenant: Uuid, persona: &Persona) -> Result<(), StoreError> {
        self.with(|i| i.personas.insert(tenant, persona.clone()));
        Ok(())
    }
}
