//! # Manifest Transformation
//!
//! Splits a rendered multi-document manifest stream into discrete objects and
//! wraps each one into its federated, applyable form.
//!
//! Both stages are all-or-nothing: a single malformed document rejects the
//! whole batch, and a single unwrappable object rejects the whole federation
//! result. No partial output ever reaches the apply engine.

use kube::api::{DynamicObject, ObjectMeta};
use kube::core::TypeMeta;
use serde::Deserialize;
use tracing::debug;

use crate::constants::{FEDERATED_GROUP, FEDERATED_VERSION};
use crate::error::Error;

/// Manifest transformation capability
///
/// Implemented by the production KubeFed backend and by test fakes.
pub trait ManifestTransformer: Send + Sync {
    /// Split a multi-document manifest stream into individual objects
    ///
    /// Empty and comment-only documents are skipped; a malformed document
    /// fails the whole batch.
    fn parse(&self, manifest: &str) -> Result<Vec<DynamicObject>, Error>;

    /// Wrap each object into its federated template form
    fn federate(&self, objects: Vec<DynamicObject>) -> Result<Vec<DynamicObject>, Error>;
}

/// Wraps objects into `Federated<Kind>` templates with empty-selector
/// placement, targeting every member cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeFed;

impl ManifestTransformer for KubeFed {
    fn parse(&self, manifest: &str) -> Result<Vec<DynamicObject>, Error> {
        let mut objects = Vec::new();
        for document in serde_yaml::Deserializer::from_str(manifest) {
            let value = serde_json::Value::deserialize(document)
                .map_err(|e| Error::parse(format!("malformed manifest document: {e}")))?;
            // helm emits comment-only and empty trailing documents
            if value.is_null() {
                continue;
            }
            let object: DynamicObject = serde_json::from_value(value)
                .map_err(|e| Error::parse(format!("manifest document is not an object: {e}")))?;
            objects.push(object);
        }
        debug!(count = objects.len(), "Parsed manifest stream");
        Ok(objects)
    }

    fn federate(&self, objects: Vec<DynamicObject>) -> Result<Vec<DynamicObject>, Error> {
        objects.iter().map(federate_one).collect()
    }
}

/// Wrap one object into its `Federated<Kind>` form: the portable original
/// under `spec.template`, plus empty-selector placement scaffolding
fn federate_one(object: &DynamicObject) -> Result<DynamicObject, Error> {
    let types = object
        .types
        .as_ref()
        .ok_or_else(|| Error::transform("object has no apiVersion/kind"))?;
    let name = object
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::transform(format!("{} object has no name", types.kind)))?;

    let mut template = serde_json::Map::new();
    template.insert(
        "apiVersion".to_string(),
        serde_json::Value::String(types.api_version.clone()),
    );
    template.insert(
        "kind".to_string(),
        serde_json::Value::String(types.kind.clone()),
    );
    template.insert("metadata".to_string(), portable_metadata(&object.metadata));
    if let serde_json::Value::Object(data) = &object.data {
        for (key, value) in data {
            template.insert(key.clone(), value.clone());
        }
    }

    Ok(DynamicObject {
        types: Some(TypeMeta {
            api_version: format!("{FEDERATED_GROUP}/{FEDERATED_VERSION}"),
            kind: format!("Federated{}", types.kind),
        }),
        metadata: ObjectMeta {
            name: Some(name),
            namespace: object.metadata.namespace.clone(),
            ..Default::default()
        },
        data: serde_json::json!({
            "spec": {
                "template": template,
                "placement": { "clusterSelector": {} },
            }
        }),
    })
}

/// Template metadata keeps only what travels to member clusters; identity and
/// cluster-managed fields live on the federated wrapper
fn portable_metadata(meta: &ObjectMeta) -> serde_json::Value {
    let mut portable = serde_json::Map::new();
    if let Some(labels) = &meta.labels {
        portable.insert(
            "labels".to_string(),
            serde_json::to_value(labels).unwrap_or_default(),
        );
    }
    if let Some(annotations) = &meta.annotations {
        portable.insert(
            "annotations".to_string(),
            serde_json::to_value(annotations).unwrap_or_default(),
        );
    }
    serde_json::Value::Object(portable)
}
