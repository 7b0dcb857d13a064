use std::collections::BTreeSet;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::Job;
use crate::models::match_record::{MatchRecord, MatchStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MatchFilter {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ExclusionList {
    pub tenant_id: Uuid,
    pub job_ids: BTreeSet<String>,
}

/// POST /api/v1/tenants/:tenant_id/jobs
///
/// Stores the listing, then scores the stored copy against the tenant's saved
/// persona. A job id seen before keeps its first content.
pub async fn handle_ingest_job(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    payload: Result<Json<Job>, JsonRejection>,
) -> Result<Json<MatchRecord>, AppError> {
    let Json(job) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    if job.id.trim().is_empty() {
        return Err(AppError::Validation("job id must not be empty".to_string()));
    }

    let persona = state
        .personas
        .get_persona(tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No persona for tenant {tenant_id}")))?;

    state.jobs.put_job(tenant_id, &job).await?;
    let stored = state
        .jobs
        .get_job(tenant_id, &job.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} vanished after ingest", job.id)))?;
    let record = state.pipeline.score_job(tenant_id, &persona, &stored).await?;
    Ok(Json(record))
}

/// GET /api/v1/tenants/:tenant_id/matches?status=scored|excluded
pub async fn handle_list_matches(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(filter): Query<MatchFilter>,
) -> Result<Json<Vec<MatchRecord>>, AppError> {
    let wanted = match filter.status.as_deref() {
        None => None,
        Some(raw) => Some(
            MatchStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown status '{raw}'")))?,
        ),
    };

    let mut records = state.matches.list_matches(tenant_id).await?;
    if let Some(status) = wanted {
        records.retain(|r| r.status == status);
    }
    Ok(Json(records))
}

/// GET /api/v1/tenants/:tenant_id/exclusions
pub async fn handle_list_exclusions(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ExclusionList>, AppError> {
    let job_ids = state.exclusions.list_excluded(tenant_id).await?;
    Ok(Json(ExclusionList { tenant_id, job_ids }))
}
