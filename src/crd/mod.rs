//! # Custom Resource Definitions
//!
//! CRD types for the Application Federation Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Application CRD specification and default values
//! - `status.rs` - Status types for tracking deployment state

mod spec;
mod status;

// Re-export all public types
pub use spec::{
    default_application_type, Application, ApplicationSpec, ApplicationTemplate, ApplicationType,
    HelmChartSpec,
};
pub use status::{ApplicationState, ApplicationStatus, AppliedResourceRef};
