//! HTTP dispatcher demo service.
//!
//! ```text
//! Client ──▶ net::Listener ──▶ http::HttpServer ──▶ Dispatcher ──▶ DemoResponder
//!                                   │                    │
//!                             request id, trace,    hooks, 404/500
//!                                 timeout             fallbacks
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use http_dispatcher::config::{self, ConfigError, DispatcherConfig};
use http_dispatcher::demo::DemoResponder;
use http_dispatcher::lifecycle::{wait_for_signal, Shutdown};
use http_dispatcher::net::Listener;
use http_dispatcher::observability::{logging, metrics};
use http_dispatcher::{Dispatcher, HttpContext, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "http-dispatcher", version, about = "Serve registered responders over HTTP")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address (e.g. 0.0.0.0:8080).
    #[arg(short, long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<DispatcherConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => DispatcherConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
        config::validate_config(&config).map_err(ConfigError::Validation)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.limits.request_timeout_secs,
        "http-dispatcher starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let dispatcher: Arc<Dispatcher<HttpContext>> = Arc::new(Dispatcher::new());
    dispatcher.add_responder(Arc::new(DemoResponder))?;
    for route in dispatcher.routes() {
        tracing::info!(
            pattern = %route.pattern,
            method = route.method.as_ref().map_or("*", |m| m.as_str()),
            responder = %route.responder,
            endpoint = %route.endpoint,
            "Route registered"
        );
    }

    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, dispatcher);
    let mut serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = wait_for_signal() => {
            shutdown.trigger();
            serving.await??;
        }
        result = &mut serving => result??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
