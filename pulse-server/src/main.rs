//! Pulse LMS server - main entry point
//!
//! Resolves configuration (CLI/env, then TOML file, then compiled
//! defaults), opens the database, starts the recurring reassignment job
//! and serves the HTTP API until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::api::load_session_secret;
use pulse_common::config::{load_optional_toml_config, ConfigOverrides, ServerConfig};
use pulse_common::db::init::init_database;
use pulse_server::{build_router, db, scheduler, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pulse-server
#[derive(Parser, Debug)]
#[command(name = "pulse-server")]
#[command(about = "Multi-tenant learning management server")]
#[command(version)]
struct Args {
    /// SQLite database file
    #[arg(long, env = "PULSE_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "PULSE_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PULSE_PORT")]
    port: Option<u16>,

    /// Secret used to sign session tokens (generated and stored when unset)
    #[arg(long, env = "PULSE_SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// Session lifetime in hours
    #[arg(long, env = "PULSE_SESSION_TTL_HOURS")]
    session_ttl_hours: Option<i64>,

    /// Where demo-request notices are sent
    #[arg(long, env = "PULSE_ADMIN_EMAIL")]
    admin_notification_email: Option<String>,

    /// Base URL used in emailed links
    #[arg(long, env = "PULSE_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Seconds between recurring reassignment passes
    #[arg(long, env = "PULSE_REASSIGN_INTERVAL_SECS")]
    reassignment_interval_secs: Option<u64>,

    /// Admin account created on first start
    #[arg(long, env = "PULSE_BOOTSTRAP_ADMIN_EMAIL")]
    bootstrap_admin_email: Option<String>,

    #[arg(long, env = "PULSE_BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    bootstrap_admin_password: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "PULSE_LOG_LEVEL")]
    log_level: Option<String>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        ConfigOverrides {
            database_path: args.database,
            bind_address: args.bind_address,
            port: args.port,
            session_secret: args.session_secret,
            session_ttl_hours: args.session_ttl_hours,
            admin_notification_email: args.admin_notification_email,
            public_base_url: args.public_base_url,
            reassignment_interval_secs: args.reassignment_interval_secs,
            bootstrap_admin_email: args.bootstrap_admin_email,
            bootstrap_admin_password: args.bootstrap_admin_password,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides = ConfigOverrides::from(Args::parse());
    let file_config = load_optional_toml_config();
    let config = ServerConfig::resolve(&overrides, file_config.as_ref())
        .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pulse_server={0},pulse_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Pulse server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let session_secret = match config.session_secret.clone() {
        Some(secret) => secret,
        None => load_session_secret(&pool)
            .await
            .context("Failed to load session secret")?,
    };

    match config.bootstrap_admin.as_ref() {
        Some(admin) => {
            if db::users::ensure_bootstrap_admin(&pool, admin, pulse_common::time::now())
                .await
                .context("Failed to create bootstrap admin")?
            {
                info!("Created bootstrap admin {}", admin.email);
            }
        }
        None => {
            if db::users::count_by_role(&pool, pulse_common::db::models::Role::Admin).await? == 0 {
                warn!("No admin account exists; set PULSE_BOOTSTRAP_ADMIN_EMAIL and PULSE_BOOTSTRAP_ADMIN_PASSWORD");
            }
        }
    }

    let cancel = CancellationToken::new();
    let job = scheduler::spawn_reassignment_job(
        pool.clone(),
        config.reassignment_interval,
        cancel.clone(),
    );

    let addr = config.listen_address();
    let state = AppState::new(pool, config, session_secret);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Pulse listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Err(e) = job.await {
        warn!("Reassignment job ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
