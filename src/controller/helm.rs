//! # Helm Integration
//!
//! Renders a chart reference into raw manifest text by executing
//! `helm template`.
//!
//! Rendering is local-only (`helm template` never contacts the target
//! cluster), so this step creates no objects; any resolution, parse, or
//! expansion failure is surfaced as a render error and fails the whole pass.

use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::Error;

/// Chart rendering capability
///
/// Implemented by the production `helm` backend and by test fakes.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render `chart` from `repo` for the given release into a raw
    /// multi-document manifest stream
    async fn render(
        &self,
        release: &str,
        chart: &str,
        repo: &str,
        namespace: &str,
        version: Option<&str>,
    ) -> Result<String, Error>;
}

/// Renders charts by shelling out to the `helm` binary
#[derive(Debug, Clone, Copy, Default)]
pub struct HelmCli;

#[async_trait]
impl ChartRenderer for HelmCli {
    async fn render(
        &self,
        release: &str,
        chart: &str,
        repo: &str,
        namespace: &str,
        version: Option<&str>,
    ) -> Result<String, Error> {
        let start = Instant::now();

        let mut command = Command::new("helm");
        command.arg("template").arg(release).arg(chart);
        command.arg("--repo").arg(repo);
        if !namespace.is_empty() {
            command.arg("--namespace").arg(namespace);
        }
        if let Some(version) = version {
            command.arg("--version").arg(version);
        }

        info!(release, chart, repo, "Rendering chart with helm template");

        let output = command
            .output()
            .await
            .map_err(|e| Error::render(format!("failed to execute helm: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(release, chart, "helm template failed: {}", stderr.trim());
            return Err(Error::render(format!(
                "helm template failed for chart {chart}: {}",
                stderr.trim()
            )));
        }

        let manifest = String::from_utf8(output.stdout)
            .map_err(|e| Error::render(format!("helm output is not valid UTF-8: {e}")))?;

        debug!(
            release,
            chart,
            duration_ms = start.elapsed().as_millis() as u64,
            "helm template succeeded"
        );
        Ok(manifest)
    }
}
