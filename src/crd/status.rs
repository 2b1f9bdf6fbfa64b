//! # Application Status
//!
//! Status types for tracking deployment state across reconciliation passes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Deployment state of an Application
///
/// Each reconciliation pass recomputes the state from `Deploying` toward a
/// terminal value, so the state is not monotonic: a spec edit after a
/// successful deployment re-enters `Deploying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ApplicationState {
    /// A reconciliation pass is in flight
    Deploying,
    /// The most recent pass applied every derived resource
    Deployed,
    /// The most recent pass failed; see controller logs
    Errored,
    /// Reserved for admission-time rejection. The reconciliation loop never
    /// writes this value: rejection prevents persistence, so no live object
    /// carries it. Kept so stored objects that have it still deserialize.
    Rejected,
}

/// Identity of one federated resource applied to the cluster
///
/// Recorded after each successful apply so deletion cleanup knows what to
/// remove. A failed pass leaves a truthful partial list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedResourceRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Observed state of an Application
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Deployment state, recomputed every pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ApplicationState>,
    /// Time of the last successful full deployment (RFC 3339)
    /// Not cleared by later failed passes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<String>,
    /// Resources applied by the most recent pass, in apply order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_resources: Vec<AppliedResourceRef>,
}
