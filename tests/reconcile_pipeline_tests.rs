//! # Reconciliation Pipeline Tests
//!
//! Scenario tests for the validate -> render -> federate -> apply pipeline
//! and its state transitions, using fakes for the external collaborators
//! (chart renderer and cluster apply target).

use async_trait::async_trait;
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use application_controller::controller::apply::ResourceApplier;
use application_controller::controller::federate::KubeFed;
use application_controller::controller::helm::ChartRenderer;
use application_controller::controller::reconciler::{cleanup_applied, run_pass};
use application_controller::crd::{
    Application, ApplicationSpec, ApplicationState, ApplicationStatus, ApplicationTemplate,
    ApplicationType, AppliedResourceRef, HelmChartSpec,
};
use application_controller::error::Error;

const THREE_DOC_MANIFEST: &str = r#"---
# Source: nginx/templates/configmap.yaml
apiVersion: v1
kind: ConfigMap
metadata:
  name: nginx-config
data:
  nginx.conf: "worker_processes 1;"
---
# Source: nginx/templates/service.yaml
apiVersion: v1
kind: Service
metadata:
  name: nginx
spec:
  ports:
    - port: 80
---
# Source: nginx/templates/deployment.yaml
apiVersion: apps/v1
kind: Deployment
metadata:
  name: nginx
spec:
  replicas: 1
"#;

/// Renderer returning a canned manifest, counting invocations
struct FakeRenderer {
    manifest: &'static str,
    calls: AtomicUsize,
}

impl FakeRenderer {
    fn returning(manifest: &'static str) -> Self {
        Self {
            manifest,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChartRenderer for FakeRenderer {
    async fn render(
        &self,
        _release: &str,
        _chart: &str,
        _repo: &str,
        _namespace: &str,
        _version: Option<&str>,
    ) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.manifest.to_string())
    }
}

/// Renderer simulating an unresolvable chart
struct FailingRenderer;

#[async_trait]
impl ChartRenderer for FailingRenderer {
    async fn render(
        &self,
        _release: &str,
        chart: &str,
        repo: &str,
        _namespace: &str,
        _version: Option<&str>,
    ) -> Result<String, Error> {
        Err(Error::render(format!("chart {chart} not found in {repo}")))
    }
}

/// In-memory apply target with optional per-object failure injection
#[derive(Default)]
struct FakeCluster {
    state: Mutex<BTreeMap<String, DynamicObject>>,
    fail_on: Option<String>,
    fail_deletes: bool,
}

impl FakeCluster {
    fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn names(&self) -> Vec<String> {
        self.state.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ResourceApplier for FakeCluster {
    async fn apply(
        &self,
        object: &DynamicObject,
        fallback_namespace: &str,
    ) -> Result<AppliedResourceRef, Error> {
        let types = object.types.as_ref().expect("federated object has types");
        let name = object.metadata.name.clone().expect("federated object has a name");
        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(Error::OwnershipConflict(format!("{name}: contested fields")));
        }
        let namespace = object
            .metadata
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| fallback_namespace.to_string());
        self.state
            .lock()
            .unwrap()
            .insert(format!("{}/{name}", types.kind), object.clone());
        Ok(AppliedResourceRef {
            api_version: types.api_version.clone(),
            kind: types.kind.clone(),
            name,
            namespace,
        })
    }

    async fn delete(&self, resource: &AppliedResourceRef) -> Result<(), Error> {
        if self.fail_deletes {
            return Err(Error::mapping(format!(
                "no server resource for {}",
                resource.kind
            )));
        }
        // Absent entries are tolerated, matching the production applier
        self.state
            .lock()
            .unwrap()
            .remove(&format!("{}/{}", resource.kind, resource.name));
        Ok(())
    }
}

fn application(chart_name: &str, repo: &str) -> Application {
    let mut app = Application::new(
        "nginx",
        ApplicationSpec {
            application_type: ApplicationType::Helm,
            template: ApplicationTemplate {
                chart: HelmChartSpec {
                    name: chart_name.to_string(),
                    namespace: String::new(),
                    repo: repo.to_string(),
                    version: None,
                },
            },
        },
    );
    app.metadata.namespace = Some("default".to_string());
    app
}

/// Well-formed spec, render and apply succeed: Deployed with deployedAt set
#[tokio::test]
async fn test_full_pipeline_success() {
    let app = application("nginx", "https://charts.bitnami.com/bitnami");
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::default();
    let mut status = ApplicationStatus::default();

    run_pass(&app, &renderer, &KubeFed, &cluster, &mut status)
        .await
        .expect("pass should succeed");

    assert_eq!(status.state, Some(ApplicationState::Deployed));
    assert!(status.deployed_at.is_some());
    assert_eq!(status.applied_resources.len(), 3);

    let kinds: Vec<&str> = status
        .applied_resources
        .iter()
        .map(|r| r.kind.as_str())
        .collect();
    assert_eq!(
        kinds,
        ["FederatedConfigMap", "FederatedService", "FederatedDeployment"]
    );
    // Empty chart namespace falls back to the Application's namespace
    assert!(status.applied_resources.iter().all(|r| r.namespace == "default"));
    assert_eq!(cluster.names().len(), 3);
}

/// Empty chart name: validation fails before any render or apply
#[tokio::test]
async fn test_validation_failure_stops_pipeline() {
    let app = application("", "https://x");
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::default();
    let mut status = ApplicationStatus::default();

    let err = run_pass(&app, &renderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(status.state, Some(ApplicationState::Errored));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert!(status.applied_resources.is_empty());
    assert!(status.deployed_at.is_none());
    assert!(cluster.names().is_empty());
}

/// Apply fails on the second of three objects: the first stays applied and
/// is visible in status, state becomes Errored
#[tokio::test]
async fn test_partial_apply_failure_is_visible() {
    let app = application("nginx", "https://charts.bitnami.com/bitnami");
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::failing_on("nginx");
    let mut status = ApplicationStatus::default();

    let err = run_pass(&app, &renderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OwnershipConflict(_)));
    assert_eq!(status.state, Some(ApplicationState::Errored));
    // Only the config map made it before the failure; it remains applied
    assert_eq!(cluster.names(), ["FederatedConfigMap/nginx-config"]);
    assert_eq!(status.applied_resources.len(), 1);
    assert_eq!(status.applied_resources[0].kind, "FederatedConfigMap");
    assert!(status.deployed_at.is_none());
}

/// Render failure surfaces as Errored without touching the cluster
#[tokio::test]
async fn test_render_failure_is_errored() {
    let app = application("nginx", "https://charts.bitnami.com/bitnami");
    let cluster = FakeCluster::default();
    let mut status = ApplicationStatus::default();

    let err = run_pass(&app, &FailingRenderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Render(_)));
    assert_eq!(status.state, Some(ApplicationState::Errored));
    assert!(cluster.names().is_empty());
}

/// Running the same pass twice converges: same applied set, no errors
#[tokio::test]
async fn test_repeated_pass_is_idempotent() {
    let app = application("nginx", "https://charts.bitnami.com/bitnami");
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::default();

    let mut first = ApplicationStatus::default();
    run_pass(&app, &renderer, &KubeFed, &cluster, &mut first)
        .await
        .unwrap();
    let after_first = cluster.names();

    let mut second = first.clone();
    run_pass(&app, &renderer, &KubeFed, &cluster, &mut second)
        .await
        .unwrap();

    assert_eq!(cluster.names(), after_first);
    assert_eq!(second.state, Some(ApplicationState::Deployed));
    assert_eq!(second.applied_resources, first.applied_resources);
}

/// A failed pass after a successful one re-enters the lifecycle and ends
/// Errored, but the earlier deployedAt timestamp is not cleared
#[tokio::test]
async fn test_failure_after_success_keeps_stale_deployed_at() {
    let app = application("nginx", "https://charts.bitnami.com/bitnami");
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::default();

    let mut status = ApplicationStatus::default();
    run_pass(&app, &renderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap();
    let deployed_at = status.deployed_at.clone();
    assert!(deployed_at.is_some());

    run_pass(&app, &FailingRenderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap_err();

    assert_eq!(status.state, Some(ApplicationState::Errored));
    assert_eq!(status.deployed_at, deployed_at);
    // Previously applied resources stay tracked for cleanup
    assert_eq!(status.applied_resources.len(), 3);
}

/// Deletion cleanup removes everything a successful pass applied
#[tokio::test]
async fn test_cleanup_removes_applied_resources() {
    let app = application("nginx", "https://charts.bitnami.com/bitnami");
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::default();
    let mut status = ApplicationStatus::default();

    run_pass(&app, &renderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap();
    assert_eq!(cluster.names().len(), 3);

    cleanup_applied(&cluster, &status.applied_resources)
        .await
        .unwrap();
    assert!(cluster.names().is_empty());
}

/// Cleanup failure propagates so the finalizer stays and deletion remains
/// pending
#[tokio::test]
async fn test_cleanup_failure_keeps_deletion_pending() {
    let cluster = FakeCluster {
        fail_deletes: true,
        ..Default::default()
    };
    let applied = vec![AppliedResourceRef {
        api_version: "types.kubefed.io/v1beta1".to_string(),
        kind: "FederatedService".to_string(),
        name: "web".to_string(),
        namespace: "default".to_string(),
    }];

    let err = cleanup_applied(&cluster, &applied).await.unwrap_err();
    assert!(matches!(err, Error::Mapping(_)));
}

/// An explicit chart namespace overrides the Application's namespace
#[tokio::test]
async fn test_chart_namespace_overrides_fallback() {
    let mut app = application("nginx", "https://charts.bitnami.com/bitnami");
    app.spec.template.chart.namespace = "web".to_string();
    let renderer = FakeRenderer::returning(THREE_DOC_MANIFEST);
    let cluster = FakeCluster::default();
    let mut status = ApplicationStatus::default();

    run_pass(&app, &renderer, &KubeFed, &cluster, &mut status)
        .await
        .unwrap();

    assert!(status.applied_resources.iter().all(|r| r.namespace == "web"));
}
