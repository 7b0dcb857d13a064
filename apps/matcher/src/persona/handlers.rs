use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::persona::Persona;
use crate::persona::sync::{PersonaSaved, SyncReport};
use crate::state::AppState;

/// PUT /api/v1/tenants/:tenant_id/persona
pub async fn handle_put_persona(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    payload: Result<Json<Persona>, JsonRejection>,
) -> Result<Json<PersonaSaved>, AppError> {
    let Json(persona) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    persona.validate().map_err(AppError::Validation)?;

    let saved = state.sync.save_persona(tenant_id, persona.clone()).await?;

    if saved.changed {
        let archive = state.archive.clone();
        let signature = saved.signature.clone();
        tokio::spawn(async move {
            if let Err(e) = archive.archive(tenant_id, &signature, &persona).await {
                warn!(%tenant_id, "persona snapshot not archived: {e}");
            }
        });
    }

    Ok(Json(saved))
}

/// GET /api/v1/tenants/:tenant_id/persona
pub async fn handle_get_persona(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Persona>, AppError> {
    state
        .personas
        .get_persona(tenant_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No persona for tenant {tenant_id}")))
}

/// POST /api/v1/tenants/:tenant_id/sync
pub async fn handle_force_sync(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PersonaSaved>), AppError> {
    let scheduled = state
        .sync
        .force_sync(tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No persona for tenant {tenant_id}")))?;
    Ok((StatusCode::ACCEPTED, Json(scheduled)))
}

/// GET /api/v1/tenants/:tenant_id/sync
pub async fn handle_sync_status(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<SyncReport>, AppError> {
    state
        .sync
        .report(tenant_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No sync has run for tenant {tenant_id}")))
}
