//! Redis read-through/write-through shadow of a `MatchStore`.
//!
//! Non-authoritative: any Redis failure degrades to the inner store and is
//! only logged. Exclusion and signature lookups never pass through here.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::warn;
use uuid::Uuid;

use crate::models::match_record::MatchRecord;
use crate::store::{MatchStore, StoreError};

pub struct CachedMatchStore {
    inner: Arc<dyn MatchStore>,
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    ttl_secs: u64,
}

impl CachedMatchStore {
    pub fn new(inner: Arc<dyn MatchStore>, client: redis::Client, ttl_secs: u64) -> Self {
        Self {
            inner,
            client,
            conn: OnceCell::new(),
            ttl_secs,
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.conn
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await
            .cloned()
    }

    async fn read(&self, key: &str) -> Result<Option<MatchRecord>, String> {
        let mut conn = self.connection().await.map_err(|e| e.to_string())?;
        let raw: Option<String> = conn.get(key).await.map_err(|e| e.to_string())?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| e.to_string())
    }

    async fn write(&self, key: &str, record: &MatchRecord) -> Result<(), String> {
        let body = serde_json::to_string(record).map_err(|e| e.to_string())?;
        let mut conn = self.connection().await.map_err(|e| e.to_string())?;
        conn.set_ex::<_, _, ()>(key, body, self.ttl_secs)
            .await
            .map_err(|e| e.to_string())
    }

    async fn evict(&self, key: &str) -> Result<(), String> {
        let mut conn = self.connection().await.map_err(|e| e.to_string())?;
        conn.del::<_, ()>(key).await.map_err(|e| e.to_string())
    }
}

fn cache_key(tenant: Uuid, job_id: &str) -> String {
    format!("match:{tenant}:{job_id}")
}

#[async_trait]
impl MatchStore for CachedMatchStore {
    async fn get_match(
        &self,
        tenant: Uuid,
        job_id: &str,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let key = cache_key(tenant, job_id);
        match self.read(&key).await {
            Ok(Some(record)) if record.tenant_id == tenant => return Ok(Some(record)),
            Ok(_) => {}
            Err(e) => warn!("match cache read failed for {key}: {e}"),
        }

        let record = self.inner.get_match(tenant, job_id).await?;
        if let Some(record) = &record {
            if let Err(e) = self.write(&key, record).await {
                warn!("match cache fill failed for {key}: {e}");
            }
        }
        Ok(record)
    }

    async fn save_match(&self, record: &MatchRecord) -> Result<bool, StoreError> {
        let applied = self.inner.save_match(record).await?;
        let key = cache_key(record.tenant_id, &record.job_id);
        let outcome = if applied {
            self.write(&key, record).await
        } else {
            self.evict(&key).await
        };
        if let Err(e) = outcome {
            warn!("match cache update failed for {key}: {e}");
        }
        Ok(applied)
    }

    async fn list_matches(&self, tenant: Uuid) -> Result<Vec<MatchRecord>, StoreError> {
        self.inner.list_matches(tenant).await
    }

    async fn list_stale_scored(
        &self,
        tenant: Uuid,
        signature: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        self.inner.list_stale_scored(tenant, signature, limit).await
    }
}
