//! # Types
//!
//! Core types for the reconciler.

use kube::Client;
use std::sync::Arc;

use crate::controller::apply::{MappingCache, ResourceApplier, ServerSideApply};
use crate::controller::federate::{KubeFed, ManifestTransformer};
use crate::controller::helm::{ChartRenderer, HelmCli};

/// Shared reconciliation context
///
/// The renderer, transformer, and applier are capability objects so tests can
/// substitute fakes for the external collaborators.
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub renderer: Arc<dyn ChartRenderer>,
    pub transformer: Arc<dyn ManifestTransformer>,
    pub applier: Arc<dyn ResourceApplier>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Production wiring: `helm` renderer, KubeFed transformer, server-side
    /// apply backed by a shared discovery cache
    #[must_use]
    pub fn new(client: Client) -> Self {
        let mappings = Arc::new(MappingCache::new(client.clone()));
        Self {
            client: client.clone(),
            renderer: Arc::new(HelmCli),
            transformer: Arc::new(KubeFed),
            applier: Arc::new(ServerSideApply::new(client, mappings)),
        }
    }

    /// Construction with explicit collaborators, used by tests
    #[must_use]
    pub fn with_pipeline(
        client: Client,
        renderer: Arc<dyn ChartRenderer>,
        transformer: Arc<dyn ManifestTransformer>,
        applier: Arc<dyn ResourceApplier>,
    ) -> Self {
        Self {
            client,
            renderer,
            transformer,
            applier,
        }
    }
}
