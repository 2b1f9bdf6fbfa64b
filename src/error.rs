//! Error types for the Application Federation Controller
//!
//! Each pipeline step returns a typed failure; the reconciler is the sole
//! place that turns failures into status transitions.

use thiserror::Error;

/// Main error type for controller operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed Application spec; not retried until the user edits it
    #[error("validation error: {0}")]
    Validation(String),

    /// Chart could not be resolved, parsed, or expanded
    #[error("chart render error: {0}")]
    Render(String),

    /// Malformed document in the rendered manifest stream
    #[error("manifest parse error: {0}")]
    Parse(String),

    /// An object could not be wrapped into its federated form
    #[error("federation transform error: {0}")]
    Transform(String),

    /// Kind/version could not be resolved to a resource mapping, even after
    /// a discovery refresh
    #[error("resource mapping error: {0}")]
    Mapping(String),

    /// Another field manager owns contested fields; requires operator
    /// intervention
    #[error("field ownership conflict: {0}")]
    OwnershipConflict(String),

    /// Apply failed for a reason other than ownership
    #[error("apply error: {0}")]
    Apply(#[source] kube::Error),

    /// Outcome could not be written back; never overrides the business error
    #[error("status persist error: {0}")]
    StatusPersist(#[source] kube::Error),

    /// Kubernetes API error outside the apply path
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a render error with the given message
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a parse error with the given message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a transform error with the given message
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a mapping error with the given message
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
