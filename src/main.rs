use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use reqwest::Client;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

mod auth;
mod config;
mod observability;
mod readiness;
mod routes;

use auth::{
    AuthOrchestrator, IdentityVerifier, MemorySessionStore, SessionInvalidator,
    SiteMetadataResolver,
};
use readiness::{HttpReadinessProbe, ReadinessGate};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::PortcullisConfig>,
    /// The auth-key-to-identity pipeline.
    pub orchestrator: Arc<AuthOrchestrator>,
    /// Readiness gate for the dependent feature service.
    pub gate: Arc<ReadinessGate>,
    /// Session storage cleared on an admin-impersonation handoff.
    pub session_store: Arc<MemorySessionStore>,
}

impl AppState {
    pub fn new(config: config::PortcullisConfig) -> Result<Self, Box<dyn std::error::Error>> {
        // One shared HTTP client for all outbound calls; reqwest keeps
        // per-host connection pools internally.
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        let session_store = Arc::new(MemorySessionStore::new());

        let orchestrator = Arc::new(AuthOrchestrator::new(
            SiteMetadataResolver::with_client(config.upstream.clone(), http_client.clone()),
            SessionInvalidator::new(session_store.clone(), config.session.keys.clone()),
            IdentityVerifier::with_client(config.upstream.clone(), http_client.clone()),
        ));

        let probe = Arc::new(HttpReadinessProbe::with_client(
            &config.readiness,
            http_client.clone(),
        ));
        let gate = Arc::new(ReadinessGate::new(&config.readiness, probe));

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            gate,
            session_store,
        })
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let request_timeout = Duration::from_secs(state.config.server.timeout_secs);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/auth/login", post(routes::auth::login))
        .route("/readiness", get(routes::readiness::get_state))
        .route("/readiness/retry", post(routes::readiness::retry))
        .route("/readiness/bypass", post(routes::readiness::bypass))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// CLI arguments for the portcullis authentication front door.
#[derive(Parser, Debug)]
#[command(version, about = "Portcullis authentication front door", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./portcullis.toml if it exists,
    /// otherwise built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the server (default)
    Serve,
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to ./portcullis.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Starter configuration for local development against stub upstreams.
fn default_config_toml() -> &'static str {
    r#"# Portcullis configuration
# Generated automatically for local development

[server]
host = "127.0.0.1"
port = 8088

[upstream]
base_url = "http://127.0.0.1:9100"
metadata_path = "/api/site/metadata"
verify_path = "/api/identity/verify"

[readiness]
probe_url = "http://127.0.0.1:9200/health"
max_attempts = 5
retry_delay_ms = 2000

[session]
keys = ["sessionId", "authToken", "userContext"]

[observability.logging]
level = "info"
format = "compact"

# Example with a secret from the environment:
# [upstream]
# base_url = "${IDENTITY_PROVIDER_URL}"
"#
}

/// Resolve the config to run with.
///
/// An explicit path must exist; otherwise ./portcullis.toml is used when
/// present, and built-in defaults when not.
fn resolve_config(explicit_path: Option<&str>) -> Result<config::PortcullisConfig, String> {
    if let Some(path) = explicit_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        return config::PortcullisConfig::from_file(&path)
            .map_err(|e| format!("Failed to load config from {}: {}", path.display(), e));
    }

    let cwd_config = PathBuf::from("portcullis.toml");
    if cwd_config.exists() {
        return config::PortcullisConfig::from_file(&cwd_config)
            .map_err(|e| format!("Failed to load config from {}: {}", cwd_config.display(), e));
    }

    Ok(config::PortcullisConfig::default())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => {
            run_init(output, force);
        }
        Some(Command::Serve) | None => {
            run_server(args.config.as_deref()).await;
        }
    }
}

/// Initialize a new configuration file.
fn run_init(output: Option<String>, force: bool) {
    let output_path = output.map_or_else(|| PathBuf::from("portcullis.toml"), PathBuf::from);

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("To start the server, run:");
    println!("  portcullis serve --config {}", output_path.display());
}

/// Run the server.
async fn run_server(explicit_config_path: Option<&str>) {
    let config = match resolve_config(explicit_config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    observability::init_tracing(&config.observability);

    tracing::info!(
        upstream = %config.upstream.base_url,
        probe_url = %config.readiness.probe_url,
        "Starting portcullis"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config).expect("Failed to initialize application state");
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
