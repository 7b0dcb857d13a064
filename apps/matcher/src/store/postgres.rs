use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::job::Job;
use crate::models::match_record::{MatchRecord, MatchRow, MatchStatus};
use crate::models::persona::Persona;
use crate::store::{
    ExclusionStore, JobStore, MatchStore, PersonaStore, SignatureStore, StoreError,
};

const MATCH_COLUMNS: &str = "tenant_id, job_id, score, base_score, missing_skills, bonus_skills, \
     seniority_penalty, seniority_explanation, rationale, persona_signature, computed_at, status";

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: MatchRow) -> Result<MatchRecord, StoreError> {
    let status = MatchStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown match status '{}'", row.status)))?;
    let score = u8::try_from(row.score)
        .map_err(|_| StoreError::Corrupt(format!("score {} out of range", row.score)))?;
    let base_score = row
        .base_score
        .map(|b| {
            u8::try_from(b).map_err(|_| StoreError::Corrupt(format!("base score {b} out of range")))
        })
        .transpose()?;

    Ok(MatchRecord {
        tenant_id: row.tenant_id,
        job_id: row.job_id,
        score,
        base_score,
        missing_skills: row.missing_skills.into_iter().collect(),
        bonus_skills: row.bonus_skills.into_iter().collect(),
        seniority_penalty: row.seniority_penalty,
        seniority_explanation: row.seniority_explanation,
        rationale: row.rationale,
        persona_signature: row.persona_signature,
        computed_at: row.computed_at,
        status,
    })
}

fn to_vec(set: &BTreeSet<String>) -> Vec<String> {
    set.iter().cloned().collect()
}

#[async_trait]
impl MatchStore for PgStore {
    async fn get_match(
        &self,
        tenant: Uuid,
        job_id: &str,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_records WHERE tenant_id = $1 AND job_id = $2"
        );
        sqlx::query_as::<_, MatchRow>(&sql)
            .bind(tenant)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .map(record_from_row)
            .transpose()
    }

    async fn save_match(&self, record: &MatchRecord) -> Result<bool, StoreError> {
        // The WHERE clause on the conflict arm keeps excluded rows terminal.
        let result = sqlx::query(
            r#"
            INSERT INTO match_records
                (tenant_id, job_id, score, base_score, missing_skills, bonus_skills,
                 seniority_penalty, seniority_explanation, rationale, persona_signature,
                 computed_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id, job_id) DO UPDATE SET
                score = EXCLUDED.score,
                base_score = EXCLUDED.base_score,
                missing_skills = EXCLUDED.missing_skills,
                bonus_skills = EXCLUDED.bonus_skills,
                seniority_penalty = EXCLUDED.seniority_penalty,
                seniority_explanation = EXCLUDED.seniority_explanation,
                rationale = EXCLUDED.rationale,
                persona_signature = EXCLUDED.persona_signature,
                computed_at = EXCLUDED.computed_at,
                status = EXCLUDED.status
            WHERE match_records.status <> 'excluded'
            "#,
        )
        .bind(record.tenant_id)
        .bind(&record.job_id)
        .bind(i16::from(record.score))
        .bind(record.base_score.map(i16::from))
        .bind(to_vec(&record.missing_skills))
        .bind(to_vec(&record.bonus_skills))
        .bind(record.seniority_penalty)
        .bind(&record.seniority_explanation)
        .bind(&record.rationale)
        .bind(&record.persona_signature)
        .bind(record.computed_at)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() == 1;
        debug!(
            tenant = %record.tenant_id,
            job_id = %record.job_id,
            applied,
            "saved match record"
        );
        Ok(applied)
    }

    async fn list_matches(&self, tenant: Uuid) -> Result<Vec<MatchRecord>, StoreError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_records WHERE tenant_id = $1 \
             ORDER BY score DESC, computed_at DESC"
        );
        sqlx::query_as::<_, MatchRow>(&sql)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(record_from_row)
            .collect()
    }

    async fn list_stale_scored(
        &self,
        tenant: Uuid,
        signature: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_records \
             WHERE tenant_id = $1 AND status = 'scored' AND persona_signature <> $2 \
             ORDER BY computed_at DESC LIMIT $3"
        );
        sqlx::query_as::<_, MatchRow>(&sql)
            .bind(tenant)
            .bind(signature)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(record_from_row)
            .collect()
    }
}

#[async_trait]
impl ExclusionStore for PgStore {
    async fn is_excluded(&self, tenant: Uuid, job_id: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM match_exclusions WHERE tenant_id = $1 AND job_id = $2)",
        )
        .bind(tenant)
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn record_exclusion(&self, tenant: Uuid, job_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO match_exclusions (tenant_id, job_id) VALUES ($1, $2) \
             ON CONFLICT (tenant_id, job_id) DO NOTHING",
        )
        .bind(tenant)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_excluded(&self, tenant: Uuid) -> Result<BTreeSet<String>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT job_id FROM match_exclusions WHERE tenant_id = $1")
                .bind(tenant)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl SignatureStore for PgStore {
    async fn current_signature(&self, tenant: Uuid) -> Result<Option<String>, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT signature FROM persona_signatures WHERE tenant_id = $1")
                .bind(tenant)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn swap_signature(&self, tenant: Uuid, signature: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO persona_signatures (tenant_id, signature, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (tenant_id) DO UPDATE SET
                signature = EXCLUDED.signature,
                updated_at = EXCLUDED.updated_at
            WHERE persona_signatures.signature <> EXCLUDED.signature
            "#,
        )
        .bind(tenant)
        .bind(signature)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn get_job(&self, tenant: Uuid, job_id: &str) -> Result<Option<Job>, StoreError> {
        let row: Option<Json<Job>> =
            sqlx::query_scalar("SELECT data FROM jobs WHERE tenant_id = $1 AND job_id = $2")
                .bind(tenant)
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(job)| job))
    }

    async fn put_job(&self, tenant: Uuid, job: &Job) -> Result<(), StoreError> {
        // Jobs are immutable once ingested; a repeat ingest keeps the first copy.
        sqlx::query(
            "INSERT INTO jobs (tenant_id, job_id, data, ingested_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id, job_id) DO NOTHING",
        )
        .bind(tenant)
        .bind(&job.id)
        .bind(Json(job))
        .bind(job.ingested_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PersonaStore for PgStore {
    async fn get_persona(&self, tenant: Uuid) -> Result<Option<Persona>, StoreError> {
        let row: Option<Json<Persona>> =
            sqlx::query_scalar("SELECT data FROM personas WHERE tenant_id = $1")
                .bind(tenant)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(p)| p))
    }

    async fn put_persona(&self, tenant: Uuid, persona: &Persona) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO personas (tenant_id, data, updated_at) VALUES ($1, $2, now())
            ON CONFLICT (tenant_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(tenant)
        .bind(Json(persona))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
