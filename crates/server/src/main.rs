mod bootstrap;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use voxact_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use voxact_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let state = routes::ApiState {
        runtime: app.runtime.clone(),
        http: reqwest::Client::new(),
        callback_timeout: Duration::from_secs(app.config.routing.callback_timeout_secs),
    };
    let router = routes::router(state).merge(health::router(app.config.llm.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "voxact-server started"
    );

    let grace_secs = app.config.server.graceful_shutdown_secs;
    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server => result?,
        _ = forced_shutdown(grace_secs) => {
            tracing::warn!(
                event_name = "system.server.forced_stop",
                correlation_id = "shutdown",
                grace_secs,
                "graceful shutdown window elapsed; exiting"
            );
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "voxact-server stopping"
    );

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(
        event_name = "system.server.shutdown_signal",
        correlation_id = "shutdown",
        "shutdown signal received; draining in-flight requests"
    );
}

// Bounds the drain: the serve future normally finishes first once in-flight
// requests complete.
async fn forced_shutdown(grace_secs: u64) {
    let _ = tokio::signal::ctrl_c().await;
    tokio::time::sleep(Duration::from_secs(grace_secs)).await;
}
