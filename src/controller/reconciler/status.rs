//! # Status Persistence
//!
//! Writes Application status through the status subresource with
//! optimistic-concurrency retry.

use kube::api::{Patch, PatchParams};
use kube::Api;
use tracing::debug;

use crate::constants::{FIELD_MANAGER, STATUS_UPDATE_ATTEMPTS};
use crate::crd::{Application, ApplicationStatus};
use crate::error::Error;

/// Persist the given status for the named Application
///
/// Retries on write conflicts (an admission path may be mutating the object
/// concurrently) rather than blindly overwriting. A final failure is reported
/// as [`Error::StatusPersist`] so the caller can keep any earlier business
/// error as the pass outcome.
pub async fn persist_status(
    api: &Api<Application>,
    name: &str,
    status: &ApplicationStatus,
) -> Result<(), Error> {
    let patch = serde_json::json!({ "status": status });

    let mut attempt = 0;
    loop {
        attempt += 1;
        match api
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(_) => return Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 && attempt < STATUS_UPDATE_ATTEMPTS => {
                debug!(name, attempt, "Status write conflict, retrying");
            }
            Err(e) => return Err(Error::StatusPersist(e)),
        }
    }
}
