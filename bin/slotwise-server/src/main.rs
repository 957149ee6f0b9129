//! slotwise-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables and the command line.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the store and run pending migrations.
//! 4. Construct the LLM provider and the shared application state.
//! 5. Start the background pruning task.
//! 6. Build the Axum router and start the HTTP server with graceful shutdown.

mod auth;
mod cli;
mod config;
mod entities;
mod error;
mod middleware;
mod routes;
mod schemas;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use slotwise_agent::build_provider;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::entities::PgStore;
use crate::state::AppState;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    cli.apply(&mut cfg);

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Held until exit so buffered file output is flushed.
    let _log_guard = init_tracing(&cfg);

    info!(version = env!("CARGO_PKG_VERSION"), "slotwise-server starting");
    if cfg.uses_dev_jwt_secret() {
        warn!("SLOTWISE_JWT_SECRET is not set; using the development secret. Never run like this in production");
    }

    if cli.command() == Command::Migrate {
        if cfg.database_url.starts_with(entities::MEMORY_URL_SCHEME) {
            info!("in-memory store has no migrations");
            return Ok(());
        }
        let store = PgStore::connect(&cfg.database_url, cfg.db_max_connections).await?;
        store.migrate().await?;
        info!("migrations applied");
        return Ok(());
    }

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = entities::connect(&cfg.database_url, cfg.db_max_connections).await?;
    info!(backend = store.backend(), "database ready");

    // ── 4. LLM provider + shared application state ────────────────────────────
    let llm = build_provider(&cfg.llm_settings()?)?;
    let bind_address = cfg.bind_address.clone();
    let state = Arc::new(AppState::new(cfg, store, llm)?);

    // ── 5. Background pruning of revoked tokens and rate-limit windows ─────────
    let prune_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let tokens = prune_state.revoked.purge_expired(Utc::now().timestamp());
            let windows = prune_state.api_limiter.prune() + prune_state.auth_limiter.prune();
            debug!(tokens, windows, "pruned expired entries");
        }
    });

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("slotwise-server stopped");
    Ok(())
}

/// Install the global subscriber. With `SLOTWISE_LOG_DIR` set, output also
/// goes to a daily-rotated file; the returned guard must outlive logging.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: SLOTWISE_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "slotwise-server.log");
            let (file, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(std::io::stdout.and(file)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    guard
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
