pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::matching::handlers as matching;
use crate::persona::handlers as persona;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Persona + sync
        .route(
            "/api/v1/tenants/:tenant_id/persona",
            get(persona::handle_get_persona).put(persona::handle_put_persona),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sync",
            get(persona::handle_sync_status).post(persona::handle_force_sync),
        )
        // Jobs + matches
        .route(
            "/api/v1/tenants/:tenant_id/jobs",
            post(matching::handle_ingest_job),
        )
        .route(
            "/api/v1/tenants/:tenant_id/matches",
            get(matching::handle_list_matches),
        )
        .route(
            "/api/v1/tenants/:tenant_id/exclusions",
            get(matching::handle_list_exclusions),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::persona::signature::fingerprint;
    use crate::store::memory::MemoryStore;
    use crate::store::{JobStore, PersonaStore, SignatureStore};
    use crate::testing::{app_state, FakeScorer};

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn persona_body(stack: &[&str]) -> Value {
        json!({
            "tech_stack": stack,
            "mandatory_keywords": ["Python"],
            "years_of_experience": 4,
            "seniority": "mid"
        })
    }

    fn job_body(id: &str, seniority: &str) -> Value {
        json!({
            "id": id,
            "title": "Backend Engineer",
            "company": "Example Co",
            "description": "Python services on AWS.",
            "required_skills": ["Python", "AWS"],
            "required_seniority": seniority
        })
    }

    #[tokio::test]
    async fn test_health() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.5)));
        let (status, body) = send(&build_router(state), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_persona_save_reports_change_and_archives() {
        let store = Arc::new(MemoryStore::default());
        let (state, archive) = app_state(&store, Arc::new(FakeScorer::new(0.5)));
        let app = build_router(state);
        let uri = format!("/api/v1/tenants/{}/persona", Uuid::new_v4());

        let (status, first) = send(&app, "PUT", &uri, Some(persona_body(&["Python"]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["changed"], true);

        let (_, again) = send(&app, "PUT", &uri, Some(persona_body(&["python"]))).await;
        assert_eq!(again["changed"], false);
        assert_eq!(again["signature"], first["signature"]);

        let (status, stored) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["seniority"], "mid");

        for _ in 0..100 {
            if archive.count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(archive.count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_persona_is_bad_request() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.5)));
        let app = build_router(state);
        let uri = format!("/api/v1/tenants/{}/persona", Uuid::new_v4());

        let mut wizard = persona_body(&["Python"]);
        wizard["seniority"] = json!("wizard");
        let (status, body) = send(&app, "PUT", &uri, Some(wizard)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(&app, "PUT", &uri, Some(persona_body(&["Python", " "]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_scores_and_lists() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.9)));
        let app = build_router(state);
        let tenant = Uuid::new_v4();
        let base = format!("/api/v1/tenants/{tenant}");

        send(&app, "PUT", &format!("{base}/persona"), Some(persona_body(&["Python"]))).await;

        let (status, record) =
            send(&app, "POST", &format!("{base}/jobs"), Some(job_body("j-senior", "senior"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["score"], 85);
        assert_eq!(record["status"], "scored");
        assert_eq!(record["missing_skills"], json!(["AWS"]));

        let (_, all) = send(&app, "GET", &format!("{base}/matches"), None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
        let (_, excluded) =
            send(&app, "GET", &format!("{base}/matches?status=excluded"), None).await;
        assert!(excluded.as_array().unwrap().is_empty());
        let (status, _) = send(&app, "GET", &format!("{base}/matches?status=maybe"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_excluded_job_shows_in_exclusions() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.3)));
        let app = build_router(state);
        let base = format!("/api/v1/tenants/{}", Uuid::new_v4());

        send(&app, "PUT", &format!("{base}/persona"), Some(persona_body(&["Python"]))).await;
        let (_, record) = send(
            &app,
            "POST",
            &format!("{base}/jobs"),
            Some(job_body("j-principal", "principal")),
        )
        .await;
        assert_eq!(record["status"], "excluded");

        let (status, body) = send(&app, "GET", &format!("{base}/exclusions"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job_ids"], json!(["j-principal"]));
    }

    #[tokio::test]
    async fn test_ingest_without_persona_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.9)));
        let uri = format!("/api/v1/tenants/{}/jobs", Uuid::new_v4());
        let app = build_router(state);
        let (status, _) = send(&app, "POST", &uri, Some(job_body("j1", "mid"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scorer_timeout_maps_to_gateway_timeout() {
        let store = Arc::new(MemoryStore::default());
        let scorer = Arc::new(FakeScorer::new(0.9));
        scorer.fail_with(crate::scorer::ScorerError::Timeout(std::time::Duration::from_secs(30)));
        let (state, _) = app_state(&store, scorer);
        let app = build_router(state);
        let base = format!("/api/v1/tenants/{}", Uuid::new_v4());

        send(&app, "PUT", &format!("{base}/persona"), Some(persona_body(&["Python"]))).await;
        let (status, body) =
            send(&app, "POST", &format!("{base}/jobs"), Some(job_body("j1", "mid"))).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["code"], "SCORER_TIMEOUT");

        let (_, all) = send(&app, "GET", &format!("{base}/matches"), None).await;
        assert!(all.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reingest_scores_the_stored_job() {
        let store = Arc::new(MemoryStore::default());
        let scorer = Arc::new(FakeScorer::new(0.9));
        let (state, _) = app_state(&store, scorer.clone());
        let app = build_router(state);
        let tenant = Uuid::new_v4();
        let base = format!("/api/v1/tenants/{tenant}");
        send(&app, "PUT", &format!("{base}/persona"), Some(persona_body(&["Python"]))).await;

        scorer.fail_with(crate::scorer::ScorerError::Unavailable("down".to_string()));
        let (status, _) =
            send(&app, "POST", &format!("{base}/jobs"), Some(job_body("j1", "mid"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        scorer.recover();

        // Same id, different content without the mandatory keyword.
        let mut rewritten = job_body("j1", "mid");
        rewritten["description"] = json!("Go only.");
        rewritten["required_skills"] = json!(["Go"]);
        let (status, record) = send(&app, "POST", &format!("{base}/jobs"), Some(rewritten)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["status"], "scored");
        assert_eq!(record["missing_skills"], json!(["AWS"]));

        let stored = store.get_job(tenant, "j1").await.unwrap().unwrap();
        assert_eq!(stored.description, "Python services on AWS.");
        let (_, body) = send(&app, "GET", &format!("{base}/exclusions"), None).await;
        assert_eq!(body["job_ids"], json!([]));
    }

    #[tokio::test]
    async fn test_concurrent_persona_puts_sign_the_live_persona() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.5)));
        let app = build_router(state);
        let tenant = Uuid::new_v4();
        let uri = format!("/api/v1/tenants/{tenant}/persona");

        let mut handles = Vec::new();
        for extra in ["Go", "Rust", "Kotlin", "Scala"] {
            let app = app.clone();
            let uri = uri.clone();
            handles.push(tokio::spawn(async move {
                send(&app, "PUT", &uri, Some(persona_body(&["Python", extra]))).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().0, StatusCode::OK);
        }

        let live = store.get_persona(tenant).await.unwrap().unwrap();
        let current = store.current_signature(tenant).await.unwrap();
        assert_eq!(current, Some(fingerprint(&live)));
    }

    #[tokio::test]
    async fn test_force_sync_and_status() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = app_state(&store, Arc::new(FakeScorer::new(0.9)));
        let app = build_router(state);
        let base = format!("/api/v1/tenants/{}", Uuid::new_v4());

        let (status, _) = send(&app, "POST", &format!("{base}/sync"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app, "PUT", &format!("{base}/persona"), Some(persona_body(&["Python"]))).await;
        let (status, scheduled) = send(&app, "POST", &format!("{base}/sync"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(scheduled["changed"], false);

        let (status, report) = send(&app, "GET", &format!("{base}/sync"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["signature"], scheduled["signature"]);
    }
}
