//! Persona snapshots in S3, one object per distinct signature.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::persona::Persona;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to serialize persona: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("S3 upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait PersonaArchive: Send + Sync {
    /// Stores the persona under its signature and returns the object key.
    async fn archive(
        &self,
        tenant: Uuid,
        signature: &str,
        persona: &Persona,
    ) -> Result<String, ArchiveError>;
}

pub fn snapshot_key(tenant: Uuid, signature: &str) -> String {
    format!("personas/{tenant}/{signature}.json")
}

#[derive(Clone)]
pub struct S3PersonaArchive {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl S3PersonaArchive {
    pub fn new(s3: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            s3,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl PersonaArchive for S3PersonaArchive {
    async fn archive(
        &self,
        tenant: Uuid,
        signature: &str,
        persona: &Persona,
    ) -> Result<String, ArchiveError> {
        let body = serde_json::to_vec_pretty(persona)?;
        let key = snapshot_key(tenant, signature);

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| ArchiveError::Upload(e.to_string()))?;

        info!("Uploaded persona snapshot to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_layout() {
        let tenant = Uuid::nil();
        assert_eq!(
            snapshot_key(tenant, "abc123"),
            "personas/00000000-0000-0000-0000-000000000000/abc123.json"
        );
    }
}
