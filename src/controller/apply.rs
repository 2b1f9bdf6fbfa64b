//! # Apply Engine
//!
//! Applies federated objects to the host cluster with conflict-safe,
//! field-owned server-side apply, resolving each object's resource mapping
//! through a discovery cache.
//!
//! Objects are applied strictly in the order the transformer produced them;
//! the engine never reorders for dependency resolution. On the first failure
//! iteration stops and already-applied objects stay applied.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::core::{GroupVersionKind, TypeMeta};
use kube::discovery::{ApiCapabilities, ApiResource, Scope};
use kube::{Client, Discovery};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::constants::FIELD_MANAGER;
use crate::crd::AppliedResourceRef;
use crate::error::Error;

/// Resource application capability
///
/// Seam between the reconciler and the cluster; substituted by fakes in
/// tests.
#[async_trait]
pub trait ResourceApplier: Send + Sync {
    /// Apply one object with field-owned semantics, returning its identity
    ///
    /// The object's own namespace wins over `fallback_namespace`.
    async fn apply(
        &self,
        object: &DynamicObject,
        fallback_namespace: &str,
    ) -> Result<AppliedResourceRef, Error>;

    /// Delete a previously applied object; absent objects are not an error
    async fn delete(&self, resource: &AppliedResourceRef) -> Result<(), Error>;
}

/// Lazily refreshed cache over the cluster discovery document
///
/// Shared read-mostly across reconciliation passes; refreshed on a miss under
/// a single-writer lock, never on a schedule, so kinds introduced after
/// process start become resolvable without a restart.
pub struct MappingCache {
    client: Client,
    discovery: RwLock<Option<Discovery>>,
}

impl std::fmt::Debug for MappingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingCache").finish_non_exhaustive()
    }
}

impl MappingCache {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            discovery: RwLock::new(None),
        }
    }

    /// Resolve a kind/version to its resource mapping, refreshing the cache
    /// on a miss
    pub async fn resolve(
        &self,
        gvk: &GroupVersionKind,
    ) -> Result<(ApiResource, ApiCapabilities), Error> {
        if let Some(discovery) = self.discovery.read().await.as_ref() {
            if let Some(found) = discovery.resolve_gvk(gvk) {
                return Ok(found);
            }
        }

        // Miss: refresh under the write lock. Re-check first since another
        // pass may have refreshed while we waited.
        let mut guard = self.discovery.write().await;
        if let Some(found) = guard.as_ref().and_then(|d| d.resolve_gvk(gvk)) {
            return Ok(found);
        }

        debug!(kind = %gvk.kind, "Discovery cache miss, refreshing");
        let refreshed = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| Error::mapping(format!("discovery refresh failed: {e}")))?;
        let found = refreshed.resolve_gvk(gvk);
        *guard = Some(refreshed);

        found.ok_or_else(|| {
            Error::mapping(format!(
                "no server resource for {}/{} {}",
                gvk.group, gvk.version, gvk.kind
            ))
        })
    }
}

/// Applies objects via field-owned server-side apply
pub struct ServerSideApply {
    client: Client,
    mappings: Arc<MappingCache>,
}

impl std::fmt::Debug for ServerSideApply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSideApply").finish_non_exhaustive()
    }
}

impl ServerSideApply {
    #[must_use]
    pub fn new(client: Client, mappings: Arc<MappingCache>) -> Self {
        Self { client, mappings }
    }

    fn dynamic_api(&self, ar: &ApiResource, caps: &ApiCapabilities, namespace: &str) -> Api<DynamicObject> {
        match caps.scope {
            Scope::Cluster => Api::all_with(self.client.clone(), ar),
            Scope::Namespaced => Api::namespaced_with(self.client.clone(), namespace, ar),
        }
    }
}

#[async_trait]
impl ResourceApplier for ServerSideApply {
    async fn apply(
        &self,
        object: &DynamicObject,
        fallback_namespace: &str,
    ) -> Result<AppliedResourceRef, Error> {
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| Error::transform("object has no apiVersion/kind"))?;
        let name = object
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::transform(format!("{} object has no name", types.kind)))?;

        let gvk = gvk_of(types);
        let (ar, caps) = self.mappings.resolve(&gvk).await?;
        let namespace = object
            .metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(fallback_namespace);
        let api = self.dynamic_api(&ar, &caps, namespace);

        let params = PatchParams::apply(FIELD_MANAGER);
        match api.patch(name, &params, &Patch::Apply(object)).await {
            Ok(_) => {
                debug!(kind = %types.kind, name, namespace, "Applied resource");
                Ok(AppliedResourceRef {
                    api_version: types.api_version.clone(),
                    kind: types.kind.clone(),
                    name: name.to_string(),
                    namespace: match caps.scope {
                        Scope::Cluster => String::new(),
                        Scope::Namespaced => namespace.to_string(),
                    },
                })
            }
            // Server-side apply reports contested field ownership as 409
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::OwnershipConflict(format!(
                "{} {name}: {}",
                types.kind, ae.message
            ))),
            Err(e) => Err(Error::Apply(e)),
        }
    }

    async fn delete(&self, resource: &AppliedResourceRef) -> Result<(), Error> {
        let types = TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        };
        let (ar, caps) = self.mappings.resolve(&gvk_of(&types)).await?;
        let api = self.dynamic_api(&ar, &caps, &resource.namespace);

        match api.delete(&resource.name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(kind = %resource.kind, name = %resource.name, "Deleted resource");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                warn!(kind = %resource.kind, name = %resource.name, "Resource already gone");
                Ok(())
            }
            Err(e) => Err(Error::Kube(e)),
        }
    }
}

/// Apply objects in transformer order, recording each success in `applied`
///
/// Stops at the first failure; `applied` then holds exactly the objects that
/// made it to the cluster before the failure.
pub async fn apply_all(
    applier: &dyn ResourceApplier,
    objects: &[DynamicObject],
    fallback_namespace: &str,
    applied: &mut Vec<AppliedResourceRef>,
) -> Result<(), Error> {
    for object in objects {
        let resource = applier.apply(object, fallback_namespace).await?;
        applied.push(resource);
    }
    Ok(())
}

fn gvk_of(types: &TypeMeta) -> GroupVersionKind {
    let (group, version) = types
        .api_version
        .split_once('/')
        .map_or(("", types.api_version.as_str()), |(g, v)| (g, v));
    GroupVersionKind::gvk(group, version, &types.kind)
}
