//! Teller application binary - composition root.
//!
//! Ties together all Teller crates into a single executable:
//! 1. Parse CLI arguments and initialize tracing
//! 2. Load configuration from TOML
//! 3. Open SQLite storage and build the repositories
//! 4. Build the model router from configured backends
//! 5. Assemble the session guard and conversation pipeline
//! 6. Start the background session sweep
//! 7. Start the axum REST API server with ctrl-c graceful shutdown

mod cli;

use std::sync::Arc;

use clap::Parser;

use teller_api::{start_server, AppState};
use teller_backend::ModelRouter;
use teller_chat::{ConversationPipeline, FeedbackSink, UnavailableSpeechToText};
use teller_core::config::TellerConfig;
use teller_core::store::KeyValueStore;
use teller_session::{CredentialStore, SessionGuard};
use teller_storage::{
    Database, SqliteCredentialStore, SqliteFeedbackSink, SqliteKvStore, TurnRepository,
};

use cli::CliArgs;

/// Seconds between expired-session sweeps.
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Periodically drop sessions whose idle timeout has elapsed.
async fn session_sweep_loop(pipeline: Arc<ConversationPipeline>) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        let removed = pipeline.purge_expired();
        if removed > 0 {
            tracing::info!(removed, "Expired sessions purged");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing.
    let filter = match args.resolve_log_level() {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Teller v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = TellerConfig::load_or_default(&config_file);
    config.api.host = args.resolve_host(&config.api.host);
    config.api.port = args.resolve_port(config.api.port);

    // Storage.
    let db_path = args.resolve_database(&config.storage.database_path);
    let db = Arc::new(Database::new(&db_path)?);

    let credentials = Arc::new(SqliteCredentialStore::new(Arc::clone(&db)));
    if args.seed_demo_user {
        credentials.store_credential("demo", "demo-secret")?;
        tracing::info!("Demo credential seeded (user \"demo\")");
    }
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKvStore::new(Arc::clone(&db)));
    let turns = TurnRepository::new(Arc::clone(&db));
    let feedback: Arc<dyn FeedbackSink> = Arc::new(SqliteFeedbackSink::new(Arc::clone(&db)));

    // Backends.
    let router = ModelRouter::from_config(&config)?;
    tracing::info!(backends = ?router.backend_names(), "Model router ready");

    // Session guard + conversation pipeline.
    let guard = Arc::new(SessionGuard::new(credentials, config.session.clone()));
    let pipeline = ConversationPipeline::new(
        &config,
        guard,
        Arc::new(router),
        store,
        Arc::new(UnavailableSpeechToText),
    );

    let state = AppState::new(config.clone(), pipeline, turns, feedback);

    // === Background tasks ===

    let sweep_pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        session_sweep_loop(sweep_pipeline).await;
    });

    // === API server ===

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
    };

    if let Err(e) = start_server(&config, state, shutdown).await {
        tracing::error!(error = %e, "API server failed. Is another instance running?");
        tracing::error!("Try: teller --port {}", config.api.port + 1);
        return Err(e.into());
    }

    tracing::info!("Teller stopped");
    Ok(())
}
