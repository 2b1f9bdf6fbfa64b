//! # Controller
//!
//! Core controller modules for the Application Federation Controller.
//!
//! - `helm`: chart rendering via the `helm` binary
//! - `federate`: manifest parsing and federated-template wrapping
//! - `apply`: discovery-backed mapping and server-side apply
//! - `reconciler`: core reconciliation logic

pub mod apply;
pub mod federate;
pub mod helm;
pub mod reconciler;
