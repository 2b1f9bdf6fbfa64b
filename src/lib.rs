//! Application Federation Controller Library
//!
//! Reconciles `Application` resources describing Helm-chart workloads into
//! federated resources applied to the host cluster. The core pipeline:
//! validate the spec, render the chart, wrap the manifests into federated
//! templates, server-side apply each one, and persist the outcome as status.

pub mod admission;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod server;

pub use error::Error;
