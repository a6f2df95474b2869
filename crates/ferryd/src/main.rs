//! ferryd — the ferry dataset router daemon.
//!
//! Exit codes: 0 normal shutdown, 1 startup failure, 2 fatal runtime
//! error.

use std::process::ExitCode;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ferry_api::ApiState;
use ferry_core::config::FerryConfig;
use ferry_services::{BrokerSettings, Metrics, RequestBroker, SessionRegistry};

enum RunError {
    Startup(anyhow::Error),
    Fatal(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match FerryConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ferryd: configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    init_tracing(&config);
    tracing::info!(
        listen_addr = %config.network.listen_addr,
        request_timeout_s = config.transfer.request_timeout_s,
        keepalive_interval_s = config.channel.keepalive_interval_s,
        "ferryd starting"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!("ferryd stopped");
            ExitCode::SUCCESS
        }
        Err(RunError::Startup(e)) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::from(1)
        }
        Err(RunError::Fatal(e)) => {
            tracing::error!(error = %e, "fatal runtime error");
            ExitCode::from(2)
        }
    }
}

async fn run(config: FerryConfig) -> Result<(), RunError> {
    let metrics = Metrics::new();
    let registry = SessionRegistry::new(config.channel.outbound_queue_depth, metrics.clone());
    let broker = RequestBroker::new(
        registry.clone(),
        metrics.clone(),
        BrokerSettings::from_config(&config),
    );
    let janitor = broker.spawn_janitor();

    let listener = TcpListener::bind(&config.network.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.network.listen_addr))
        .map_err(RunError::Startup)?;

    let state = ApiState::new(&config, registry.clone(), broker.clone(), metrics);

    ferry_api::serve(state, listener, shutdown_signal())
        .await
        .map_err(RunError::Fatal)?;

    // drain: new requests were already refused once the listener went
    // away; settle what is left and drop the channels
    tracing::info!("draining pending requests and connector sessions");
    broker.begin_drain();
    registry.close_all();
    janitor.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

fn init_tracing(config: &FerryConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
