//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Finalizer added to every live Application so deletion waits for cleanup
pub const APPLICATION_FINALIZER: &str = "applications.federation.octopilot.io/finalizer";

/// Field manager recorded on server-side applies
/// Must stay stable across restarts so repeated applies are recognized as the
/// same owner
pub const FIELD_MANAGER: &str = "application-controller";

/// Default HTTP server port for metrics, probes, and admission webhooks
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default requeue interval after a successful reconciliation (seconds)
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// Default requeue interval after a reconciliation error (seconds)
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 60;

/// Attempts for optimistic-concurrency status writes before giving up
pub const STATUS_UPDATE_ATTEMPTS: u32 = 3;

/// API group of the federated resource templates produced by the transformer
pub const FEDERATED_GROUP: &str = "types.kubefed.io";

/// API version of the federated resource templates
pub const FEDERATED_VERSION: &str = "v1beta1";
