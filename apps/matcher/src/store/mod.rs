//! Tenant-scoped persistence seams.
//!
//! Every method takes the tenant id as its first argument and implementations
//! must never read or write across tenants. Postgres is the single source of
//! truth; the Redis layer in `cache` only ever shadows `MatchStore` reads.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::job::Job;
use crate::models::match_record::MatchRecord;
use crate::models::persona::Persona;

pub mod cache;
#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_match(&self, tenant: Uuid, job_id: &str)
        -> Result<Option<MatchRecord>, StoreError>;

    /// Upserts the record. Returns `false` without writing when the stored
    /// record is already excluded.
    async fn save_match(&self, record: &MatchRecord) -> Result<bool, StoreError>;

    async fn list_matches(&self, tenant: Uuid) -> Result<Vec<MatchRecord>, StoreError>;

    /// Scored records whose signature tag differs from `signature`, most
    /// recently computed first, at most `limit` of them.
    async fn list_stale_scored(
        &self,
        tenant: Uuid,
        signature: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError>;
}

#[async_trait]
pub trait ExclusionStore: Send + Sync {
    async fn is_excluded(&self, tenant: Uuid, job_id: &str) -> Result<bool, StoreError>;

    /// Idempotent: recording an existing entry is a no-op.
    async fn record_exclusion(&self, tenant: Uuid, job_id: &str) -> Result<(), StoreError>;

    async fn list_excluded(&self, tenant: Uuid) -> Result<BTreeSet<String>, StoreError>;
}

#[async_trait]
pub trait SignatureStore: Send + Sync {
    async fn current_signature(&self, tenant: Uuid) -> Result<Option<String>, StoreError>;

    /// Atomically stores `signature` if it differs from the current one.
    /// Returns `true` when it was stored, including the first signature ever
    /// seen for the tenant.
    async fn swap_signature(&self, tenant: Uuid, signature: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_job(&self, tenant: Uuid, job_id: &str) -> Result<Option<Job>, StoreError>;
    async fn put_job(&self, tenant: Uuid, job: &Job) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn get_persona(&self, tenant: Uuid) -> Result<Option<Persona>, StoreError>;
    async fn put_persona(&self, tenant: Uuid, persona: &Persona) -> Result<(), StoreError>;
}
