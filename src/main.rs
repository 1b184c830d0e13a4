//! obstore -- object storage gateway.
//!
//! Serves `GET`/`PUT /object/{id}` and routes each request to one of
//! several object-storage backend nodes discovered through the container
//! runtime at startup. SIGTERM/SIGINT handlers stop accepting connections
//! and wait for in-flight requests within a bounded grace period; exceeding
//! it forces process termination.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

/// Command-line arguments for the gateway.
#[derive(Parser, Debug)]
#[command(
    name = "obstore",
    version,
    about = "Object storage gateway with container-based backend discovery"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "obstore.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = obstore::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("loaded configuration from {}", cli.config);

    // Initialize Prometheus metrics recorder and register metric descriptions.
    obstore::metrics::init_metrics();
    obstore::metrics::describe_metrics();

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);

    let state = Arc::new(obstore::AppState::new(config));

    // Trigger backend discovery in the background; the first HTTP request
    // joins the same once-only initialization if it arrives earlier. A
    // failed pipeline (runtime unreachable, zero validated backends) means
    // the gateway has nothing to serve with and must not keep running.
    let init_state = Arc::clone(&state);
    tokio::spawn(async move {
        match init_state.get_or_init_router().await {
            Ok(router) => {
                info!(backends = router.backend_count(), "storage backends ready");
            }
            Err(err) => {
                error!(error = %err, "backend initialization failed, exiting");
                std::process::exit(1);
            }
        }
    });

    let app = obstore::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("gateway listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests. A watchdog forces exit when the
    // grace period elapses first.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tokio::spawn(async move {
                tokio::time::sleep(shutdown_timeout).await;
                error!("graceful shutdown timed out, forcing exit");
                std::process::exit(1);
            });
        })
        .await?;

    info!("gateway shut down");

    Ok(())
}

/// Initialize the tracing subscriber from config; `RUST_LOG` overrides the
/// configured level.
fn init_tracing(logging: &obstore::config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        },
    }
}
