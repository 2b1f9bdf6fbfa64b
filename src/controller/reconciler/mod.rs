//! # Reconciler
//!
//! Core reconciliation logic for `Application` resources.
//!
//! ## Reconciliation Flow
//!
//! 1. Ensure the cleanup finalizer is present on live resources
//! 2. On deletion: remove previously applied resources, then the finalizer
//! 3. Enter `Deploying`, re-validate the spec defensively
//! 4. Render the chart, parse and federate the manifests
//! 5. Server-side apply each federated resource in order
//! 6. Persist the outcome (`Deployed` or `Errored`) as status

pub mod reconcile;
pub mod status;
pub mod types;

// Re-export public API
pub use reconcile::{cleanup_applied, deploy_application, error_policy, reconcile, run_pass};
pub use status::persist_status;
pub use types::Reconciler;
