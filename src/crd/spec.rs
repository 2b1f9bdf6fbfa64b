//! # Application CRD Specification
//!
//! The `Application` custom resource describes a chart-based workload that the
//! controller renders and applies to the host cluster as federated resources.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::ApplicationStatus;

/// Application Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: federation.octopilot.io/v1
/// kind: Application
/// metadata:
///   name: nginx
///   namespace: default
/// spec:
///   type: Helm
///   template:
///     chart:
///       name: nginx
///       repoUrl: https://charts.bitnami.com/bitnami
///       namespace: web
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "federation.octopilot.io",
    version = "v1",
    kind = "Application",
    namespaced,
    status = "ApplicationStatus",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"DeployedAt", "type":"string", "jsonPath":".status.deployedAt"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Deployment type - `Helm` is the only supported value
    /// Defaults to `Helm` when unset so objects created without the admission
    /// gate still deserialize
    #[serde(default = "default_application_type", rename = "type")]
    pub application_type: ApplicationType,
    /// Chart template describing what to render and where to apply it
    pub template: ApplicationTemplate,
}

/// Supported deployment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ApplicationType {
    Helm,
}

pub fn default_application_type() -> ApplicationType {
    ApplicationType::Helm
}

/// Template holding the chart reference
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTemplate {
    pub chart: HelmChartSpec,
}

/// Helm chart reference
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartSpec {
    /// Chart name within the repository
    pub name: String,
    /// Target namespace for rendered objects
    /// Empty means "same namespace as the Application resource" at apply time
    #[serde(default)]
    pub namespace: String,
    /// Chart repository URL
    #[serde(default, rename = "repoUrl")]
    pub repo: String,
    /// Pinned chart version; latest when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ApplicationSpec {
    /// Structural well-formedness predicate: supported type, non-empty chart
    /// name, non-empty repository locator. No side effects.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.application_type == ApplicationType::Helm
            && !self.template.chart.name.is_empty()
            && !self.template.chart.repo.is_empty()
    }
}
