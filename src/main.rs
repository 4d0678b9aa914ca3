use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod db;
mod dto;
mod error;
mod handlers;
mod models;
mod services;

use config::Config;
use db::{EntryStore, MemoryEntryStore, PgEntryStore};
use services::llm::OpenAiGuidanceModel;
use services::notifier::UpdateNotifier;
use services::refinement::{RefinementHandle, RefinementPool};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntryStore>,
    pub config: Arc<Config>,
    pub notifier: UpdateNotifier,
    /// `None` when no AI credential is configured.
    pub refinement: Option<RefinementHandle>,
    /// Cancelled when the server begins shutting down; ends open streams.
    pub shutdown: CancellationToken,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calmnest_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    let store: Arc<dyn EntryStore> = match &config.database_url {
        Some(url) => {
            let db = db::pool::create_pool(url)
                .await
                .context("Failed to create database pool")?;
            db::pool::run_migrations(&db)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
            Arc::new(PgEntryStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, entries are kept in memory only");
            Arc::new(MemoryEntryStore::new())
        }
    };

    let notifier = UpdateNotifier::new();

    let refinement_pool = if config.ai_enabled() {
        let model = OpenAiGuidanceModel::from_config(&config)
            .context("Failed to build language model client")?;
        Some(RefinementPool::start(
            store.clone(),
            Arc::new(model),
            notifier.clone(),
            config.refinement_workers,
            config.refinement_queue,
        ))
    } else {
        tracing::warn!("OPENAI_API_KEY not set, AI refinement disabled");
        None
    };

    let shutdown = CancellationToken::new();
    let state = AppState {
        store,
        config: config.clone(),
        notifier,
        refinement: refinement_pool.as_ref().map(RefinementPool::handle),
        shutdown: shutdown.clone(),
    };

    let addr = config.listen_addr();
    tracing::info!(backend = state.store.backend(), "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some(pool) = refinement_pool {
        pool.shutdown().await;
    }
    Ok(())
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route(
            "/daily-guidance",
            post(handlers::guidance::submit_daily_guidance),
        )
        .route("/history", get(handlers::history::list_history))
        .route("/history/stream", get(handlers::history::stream_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(origins).allow_credentials(true)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
