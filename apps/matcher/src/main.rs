mod config;
mod db;
mod errors;
mod llm_client;
mod matching;
mod models;
mod persona;
mod routes;
mod scorer;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::matching::pipeline::MatchPipeline;
use crate::persona::archive::S3PersonaArchive;
use crate::persona::signature::SignatureTracker;
use crate::persona::sync::SyncCoordinator;
use crate::routes::build_router;
use crate::scorer::LlmScorer;
use crate::state::AppState;
use crate::store::cache::CachedMatchStore;
use crate::store::postgres::PgStore;
use crate::store::MatchStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matcher v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL is the source of truth for every store
    let db = create_pool(&config.database_url).await?;
    let pg = Arc::new(PgStore::new(db));

    // Redis shadows match reads only
    let redis = redis::Client::open(config.redis_url.clone())?;
    let matches: Arc<dyn MatchStore> = Arc::new(CachedMatchStore::new(
        pg.clone(),
        redis,
        config.match_cache_ttl_secs,
    ));
    info!("Redis match cache initialized (ttl {}s)", config.match_cache_ttl_secs);

    // S3 / MinIO for persona snapshots
    let s3 = build_s3_client(&config).await;
    let archive = Arc::new(S3PersonaArchive::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    // LLM-backed semantic scorer
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    let scorer = Arc::new(LlmScorer(llm));
    info!("LLM scorer initialized (model: {})", llm_client::MODEL);

    let settings = config.engine_settings();
    info!(
        "Engine settings: scorer timeout {:?}, sync cap {}, sync concurrency {}",
        settings.scorer_timeout, settings.sync_batch_cap, settings.sync_concurrency
    );

    let pipeline = Arc::new(MatchPipeline::new(
        matches.clone(),
        pg.clone(),
        pg.clone(),
        scorer,
        settings,
    ));
    let sync = Arc::new(SyncCoordinator::new(
        pipeline.clone(),
        matches.clone(),
        pg.clone(),
        SignatureTracker::new(pg.clone()),
    ));

    // Build app state
    let state = AppState {
        personas: pg.clone(),
        jobs: pg.clone(),
        matches,
        exclusions: pg,
        pipeline,
        sync,
        archive,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the dashboard host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "matcher-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
