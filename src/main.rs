// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use alby::aws::{Cloud, CloudApi};
use alby::config::ControllerConfig;
use alby::constants::{
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT, TOKIO_WORKER_THREADS,
};
use alby::events::KubeEventPublisher;
use alby::{controller, metrics};
use anyhow::Result;
use axum::{routing::get, Router};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("alby-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Alby Load Balancer Ingress Controller");
    debug!("Logging initialized with file and line number tracking");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Select the cloud transport.
///
/// The provider SDK transport is an external collaborator: deployment
/// builds link a crate implementing [`CloudApi`] and register it here.
/// `ALBY_CLOUD=memory` runs against the in-process cloud, which is useful
/// for hermetic end-to-end exercising of the reconciliation core.
fn initialize_cloud() -> Result<Cloud> {
    let mode = std::env::var("ALBY_CLOUD").unwrap_or_else(|_| "memory".to_string());
    match mode.as_str() {
        "memory" => {
            warn!("ALBY_CLOUD=memory: using the in-process cloud, no real resources will be created");
            let api: Arc<dyn CloudApi> = Arc::new(alby::aws::fake::InMemoryCloud::new());
            Ok(Cloud::new(api))
        }
        other => {
            anyhow::bail!(
                "unknown cloud transport `{other}`; this build only carries the `memory` transport, \
                 production builds must link a CloudApi implementation"
            )
        }
    }
}

async fn async_main() -> Result<()> {
    initialize_logging();

    let config = Arc::new(ControllerConfig::from_env());
    info!(
        controller_id = %config.controller_id,
        ingress_class = %config.ingress_class,
        vpc_id = %config.vpc_id,
        workers = config.workers,
        "configuration loaded"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let cloud = initialize_cloud()?;
    let events = Arc::new(KubeEventPublisher::new(
        client.clone(),
        &config.controller_id,
    ));

    let _metrics_handle = start_metrics_server();

    // Run the controller with signal handling; it should never exit on
    // its own
    let shutdown_result: Result<()> = tokio::select! {
        // Monitor for SIGINT (Ctrl+C)
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        // Monitor for SIGTERM (Kubernetes sends this when deleting pods)
        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                // On non-Unix platforms, just wait forever
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = controller::run(client, cloud, config, events) => {
            error!("CRITICAL: controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("controller exited unexpectedly without error")
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}
