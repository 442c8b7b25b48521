//! # Speech Coach Backend - Main Application Entry Point
//!
//! HTTP API for a public-speaking practice app: users upload a recording,
//! optionally read from a generated script, and get back a scored report with
//! coaching advice.
//!
//! ## Application Architecture:
//! - **config**: configuration (TOML file + environment variables)
//! - **state**: shared application state and request metrics
//! - **auth**: bearer-token extractor
//! - **analysis**: the recording analysis pipeline
//! - **services**: blob storage and the OpenAI-compatible model gateway
//! - **store**: report and prompt persistence
//! - **health**: health and metrics endpoints
//! - **middleware**: request logging and metrics collection
//! - **handlers**: HTTP request handlers for the `/api/v1` routes
//! - **error**: error types and HTTP error responses

mod analysis;
mod auth;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod services;
mod state;
mod store;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use analysis::{AnalysisSettings, Analyzer, Collaborators};
use anyhow::Result;
use config::AppConfig;
use error::AppError;
use services::blob::LocalBlobStore;
use services::openai::OpenAiClient;
use state::{AppState, StateServices};
use std::sync::Arc;
use store::{InMemoryStore, PromptStore, ReportStore, SqliteStore};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ## Startup:
/// 1. Load `.env`, set up tracing, load and validate configuration
/// 2. Build the model gateway, blob store and stores, and wire the analyzer
/// 3. Serve until the process receives SIGINT or SIGTERM, then stop gracefully
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting speech-coach-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    if config.openai.api_key.trim().is_empty() {
        warn!("No OpenAI API key configured; transcription and advice requests will fail");
    }
    if config.auth.users.is_empty() {
        warn!("No auth tokens configured; every authenticated route will answer 401");
    }

    let app_state = build_state(config.clone())?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let max_upload_bytes = config.storage.max_upload_bytes;

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::ValidationError(err.to_string()).into()
            }))
            // Middleware runs in reverse registration order on the way in
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::RequestMetrics)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .configure(handlers::configure_api_routes),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Wire the concrete services into the analyzer and the shared state.
fn build_state(config: AppConfig) -> Result<AppState> {
    let model = Arc::new(OpenAiClient::new(config.openai.clone())?);
    let blobs = Arc::new(LocalBlobStore::new(&config.storage));
    let (reports, prompts) = open_stores(&config)?;

    let temp_dir = config.temp_dir();
    std::fs::create_dir_all(&temp_dir)?;

    let analyzer = Analyzer::new(
        Collaborators {
            blobs: blobs.clone(),
            transcriber: model.clone(),
            sentiment: model.clone(),
            advisor: model.clone(),
            improvisation: model.clone(),
            reports: reports.clone(),
            prompts: prompts.clone(),
        },
        AnalysisSettings {
            history_limit: config.analysis.history_limit,
            min_gap_seconds: config.analysis.min_gap_seconds,
            temp_dir,
        },
    );

    Ok(AppState::new(
        config,
        StateServices {
            analyzer: Arc::new(analyzer),
            reports,
            prompts,
            blobs,
            prompt_generator: model,
        },
    ))
}

/// SQLite at `storage.database_path`, or memory when the path is empty.
fn open_stores(config: &AppConfig) -> Result<(Arc<dyn ReportStore>, Arc<dyn PromptStore>)> {
    let path = config.storage.database_path.trim();
    if path.is_empty() {
        warn!("No database path configured; reports are kept in memory and lost on restart");
        let store = Arc::new(InMemoryStore::new());
        let reports: Arc<dyn ReportStore> = store.clone();
        let prompts: Arc<dyn PromptStore> = store;
        return Ok((reports, prompts));
    }

    let store = Arc::new(SqliteStore::open(path)?);
    let reports: Arc<dyn ReportStore> = store.clone();
    let prompts: Arc<dyn PromptStore> = store;
    Ok((reports, prompts))
}

/// Console logging controlled by `RUST_LOG`, defaulting to
/// `speech_coach_backend=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speech_coach_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Resolve on Ctrl+C, or on SIGTERM where the platform has it.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
