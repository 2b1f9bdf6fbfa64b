//! # Application Federation Controller
//!
//! A Kubernetes controller that renders Helm-based `Application` resources
//! into federated resources and applies them to the host cluster.
//!
//! ## Overview
//!
//! 1. **Watching Applications** - Monitors `Application` resources across all
//!    namespaces
//! 2. **Chart rendering** - Expands the referenced Helm chart locally via
//!    `helm template` (no cluster side effects)
//! 3. **Federation** - Wraps each rendered object into its `Federated<Kind>`
//!    template form
//! 4. **Server-side apply** - Applies each federated resource with
//!    field-owned, conflict-safe patch semantics
//! 5. **Status tracking** - Persists the `Deploying`/`Deployed`/`Errored`
//!    lifecycle and the set of applied resources
//!
//! ## Features
//!
//! - **Admission webhooks**: `/mutate` defaults the spec, `/validate` rejects
//!   malformed resources before persistence
//! - **Cleanup on deletion**: a finalizer blocks deletion until previously
//!   applied resources are removed
//! - **Prometheus metrics**: exposed for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

use anyhow::{Context, Result};
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{error, info};

use application_controller::constants::DEFAULT_SERVER_PORT;
use application_controller::controller::reconciler::{self, Reconciler};
use application_controller::crd::Application;
use application_controller::observability::metrics;
use application_controller::server::{start_server, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    // Install the ring crypto provider before any TLS connection is made
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "application_controller=info".into()),
        )
        .init();

    info!(
        "Starting Application Federation Controller (build {})",
        env!("BUILD_GIT_HASH")
    );

    // Initialize metrics
    metrics::register_metrics().context("Failed to register metrics")?;

    // Start HTTP server for metrics, probes, and admission webhooks
    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
    });
    let server_port = std::env::var("SERVER_PORT")
        .unwrap_or_default()
        .parse::<u16>()
        .unwrap_or(DEFAULT_SERVER_PORT);

    let server_state_clone = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Create Kubernetes client
    let client = Client::try_default().await?;

    // Watch Application resources in all namespaces
    let applications: Api<Application> = Api::all(client.clone());

    // Create reconciler context
    let ctx = Arc::new(Reconciler::new(client));

    // Mark as ready
    server_state
        .is_ready
        .store(true, std::sync::atomic::Ordering::Relaxed);

    Controller::new(applications, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconciler::reconcile, reconciler::error_policy, ctx)
        .for_each(|_| std::future::ready(()))
        .await;

    info!("Controller stopped");

    Ok(())
}
