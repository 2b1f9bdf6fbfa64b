//! # Reconciliation Logic
//!
//! Main reconciliation loop for Application resources.
//!
//! Every pass recomputes the deployment state from `Deploying` toward a
//! terminal value and persists the outcome at exit via a deferred,
//! best-effort status write. A business failure always takes priority over a
//! status-write failure in what is reported to the scheduler.

use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument};

use crate::admission::validate_spec;
use crate::constants::{APPLICATION_FINALIZER, DEFAULT_ERROR_REQUEUE_SECS, DEFAULT_RESYNC_SECS};
use crate::controller::apply::{apply_all, ResourceApplier};
use crate::controller::federate::ManifestTransformer;
use crate::controller::helm::ChartRenderer;
use crate::controller::reconciler::status::persist_status;
use crate::controller::reconciler::types::Reconciler;
use crate::crd::{Application, ApplicationState, ApplicationStatus, AppliedResourceRef};
use crate::error::Error;
use crate::observability;

/// Main reconciliation function
pub async fn reconcile(app: Arc<Application>, ctx: Arc<Reconciler>) -> Result<Action, Error> {
    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = %app.name_any(),
        resource.namespace = %app.namespace().unwrap_or_else(|| "default".to_string()),
        resource.kind = "Application"
    );
    reconcile_inner(app, ctx).instrument(span).await
}

async fn reconcile_inner(app: Arc<Application>, ctx: Arc<Reconciler>) -> Result<Action, Error> {
    let name = app.name_any();
    let namespace = app.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<Application> = Api::namespaced(ctx.client.clone(), &namespace);

    if app.metadata.deletion_timestamp.is_some() {
        return finalize_deletion(&app, &ctx, &api).await;
    }

    // Deletion must not complete before cleanup runs on a future pass
    ensure_finalizer(&app, &api).await?;

    info!("Reconciling Application");
    observability::metrics::increment_reconciliations();
    let start = Instant::now();

    // Pass start: Deploying, unconditionally overwriting any prior terminal
    // state so repeated edits re-enter the lifecycle
    let mut status = app.status.clone().unwrap_or_default();
    status.state = Some(ApplicationState::Deploying);
    if let Err(e) = persist_status(&api, &name, &status).await {
        warn!("Failed to persist Deploying state: {e}");
    }

    let outcome = run_pass(
        &app,
        ctx.renderer.as_ref(),
        ctx.transformer.as_ref(),
        ctx.applier.as_ref(),
        &mut status,
    )
    .await;

    // Deferred, best-effort outcome write
    let persisted = persist_status(&api, &name, &status).await;

    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    match outcome {
        Ok(()) => match persisted {
            Ok(()) => {
                info!(
                    duration_s = start.elapsed().as_secs_f64(),
                    "Application deployed"
                );
                Ok(Action::requeue(Duration::from_secs(DEFAULT_RESYNC_SECS)))
            }
            Err(e) => {
                error!("Failed to persist deployment outcome: {e}");
                Err(e)
            }
        },
        Err(business) => {
            // The business error takes priority over a persist failure
            if let Err(e) = persisted {
                error!("Failed to persist error outcome: {e}");
            }
            Err(business)
        }
    }
}

/// Validate and deploy, recording the resulting state on `status`
pub async fn run_pass(
    app: &Application,
    renderer: &dyn ChartRenderer,
    transformer: &dyn ManifestTransformer,
    applier: &dyn ResourceApplier,
    status: &mut ApplicationStatus,
) -> Result<(), Error> {
    // Defensive re-validation: objects may have been inserted without passing
    // through the admission gate
    if let Err(e) = validate_spec(&app.spec) {
        error!("Validation failed: {e}");
        status.state = Some(ApplicationState::Errored);
        return Err(e);
    }

    let mut applied = Vec::new();
    let result = deploy_application(app, renderer, transformer, applier, &mut applied).await;

    // Record every apply that landed, even on failure, so deletion cleanup
    // and operators see the truthful partial set
    observability::metrics::add_resources_applied(applied.len() as u64);
    merge_applied(&mut status.applied_resources, applied);

    match result {
        Ok(()) => {
            status.state = Some(ApplicationState::Deployed);
            status.deployed_at = Some(chrono::Utc::now().to_rfc3339());
            Ok(())
        }
        Err(e) => {
            error!("Deployment failed: {e}");
            status.state = Some(ApplicationState::Errored);
            Err(e)
        }
    }
}

/// Render, federate, and apply the Application's chart
///
/// On the first apply failure iteration stops; `applied` holds exactly the
/// resources that reached the cluster.
pub async fn deploy_application(
    app: &Application,
    renderer: &dyn ChartRenderer,
    transformer: &dyn ManifestTransformer,
    applier: &dyn ResourceApplier,
    applied: &mut Vec<AppliedResourceRef>,
) -> Result<(), Error> {
    let chart = &app.spec.template.chart;
    let release = app.name_any();
    // Empty chart namespace means "same namespace as the Application"
    let target_namespace = if chart.namespace.is_empty() {
        app.namespace().unwrap_or_else(|| "default".to_string())
    } else {
        chart.namespace.clone()
    };

    let manifest = renderer
        .render(
            &release,
            &chart.name,
            &chart.repo,
            &target_namespace,
            chart.version.as_deref(),
        )
        .await?;
    let objects = transformer.parse(&manifest)?;
    let federated = transformer.federate(objects)?;
    apply_all(applier, &federated, &target_namespace, applied).await
}

/// Add the cleanup finalizer if it is missing
async fn ensure_finalizer(app: &Application, api: &Api<Application>) -> Result<(), Error> {
    let mut finalizers = app.metadata.finalizers.clone().unwrap_or_default();
    if finalizers.iter().any(|f| f == APPLICATION_FINALIZER) {
        return Ok(());
    }
    finalizers.push(APPLICATION_FINALIZER.to_string());

    debug!("Adding cleanup finalizer");
    api.patch(
        &app.name_any(),
        &PatchParams::default(),
        &Patch::Merge(serde_json::json!({
            "metadata": { "finalizers": finalizers }
        })),
    )
    .await?;
    Ok(())
}

/// Delete previously applied resources, then release the finalizer
///
/// Any cleanup failure leaves the finalizer in place, so deletion stays
/// pending and the pass is retried.
async fn finalize_deletion(
    app: &Application,
    ctx: &Reconciler,
    api: &Api<Application>,
) -> Result<Action, Error> {
    let finalizers = app.metadata.finalizers.clone().unwrap_or_default();
    if !finalizers.iter().any(|f| f == APPLICATION_FINALIZER) {
        return Ok(Action::await_change());
    }

    let applied = app
        .status
        .as_ref()
        .map(|s| s.applied_resources.clone())
        .unwrap_or_default();
    info!(
        count = applied.len(),
        "Cleaning up applied resources before deletion"
    );
    cleanup_applied(ctx.applier.as_ref(), &applied).await?;

    let remaining: Vec<String> = finalizers
        .into_iter()
        .filter(|f| f != APPLICATION_FINALIZER)
        .collect();
    api.patch(
        &app.name_any(),
        &PatchParams::default(),
        &Patch::Merge(serde_json::json!({
            "metadata": { "finalizers": remaining }
        })),
    )
    .await?;

    info!("Cleanup complete, finalizer released");
    Ok(Action::await_change())
}

/// Delete every previously applied resource, stopping at the first failure
///
/// Absent objects are tolerated by the applier; any other failure propagates
/// so the caller keeps the finalizer in place.
pub async fn cleanup_applied(
    applier: &dyn ResourceApplier,
    applied: &[AppliedResourceRef],
) -> Result<(), Error> {
    for resource in applied {
        applier.delete(resource).await?;
    }
    Ok(())
}

/// Handle reconciliation errors
///
/// Validation errors are not retried: the resource stays `Errored` until the
/// user edits it and a new update event fires. Everything else gets the
/// standard requeue-on-error behavior, no custom backoff.
pub fn error_policy(app: Arc<Application>, error: &Error, _ctx: Arc<Reconciler>) -> Action {
    error!(
        "Reconciliation error for {}: {error}",
        app.name_any()
    );
    observability::metrics::increment_reconciliation_errors();
    match error {
        Error::Validation(_) => Action::await_change(),
        _ => Action::requeue(Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS)),
    }
}

/// Merge newly applied resource identities into the tracked set
///
/// The tracked set is a union across passes: a resource applied by an earlier
/// pass but dropped from the chart stays tracked until deletion cleanup
/// removes it from the cluster.
pub(crate) fn merge_applied(
    existing: &mut Vec<AppliedResourceRef>,
    new: Vec<AppliedResourceRef>,
) {
    for resource in new {
        if !existing.contains(&resource) {
            existing.push(resource);
        }
    }
}
