//! # Admission
//!
//! Defaulting and validation for Application resources at write time.
//!
//! The resource store invokes these hooks synchronously before persistence:
//! `/mutate` fills in defaults, `/validate` rejects malformed specs. Delete
//! requests are always allowed. The reconciler re-validates defensively with
//! [`validate_spec`] since a controller may also run against objects inserted
//! without passing through this gate.

use axum::Json;
use json_patch::{AddOperation, PatchOperation};
use jsonptr::PointerBuf;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use tracing::{debug, error, info};

use crate::crd::ApplicationSpec;
use crate::error::Error;

/// Validate an Application spec
///
/// Fails when the chart name or repository locator is empty. The unsupported
/// type case is caught at the JSON boundary: `ApplicationType` has a single
/// variant, so any other value fails deserialization before this runs.
pub fn validate_spec(spec: &ApplicationSpec) -> Result<(), Error> {
    if spec.template.chart.name.is_empty() {
        return Err(Error::validation("chart name must not be empty"));
    }
    if spec.template.chart.repo.is_empty() {
        return Err(Error::validation("chart repoUrl must not be empty"));
    }
    Ok(())
}

/// Patch operations that fill in spec defaults
///
/// Currently a single default: an unset or empty `spec.type` becomes `Helm`.
pub fn defaulting_patch(obj: &DynamicObject) -> Vec<PatchOperation> {
    let mut ops = Vec::new();

    let current = obj
        .data
        .get("spec")
        .and_then(|spec| spec.get("type"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("");
    if current.is_empty() {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "type"]),
            value: serde_json::Value::String("Helm".to_string()),
        }));
    }

    ops
}

/// Handle mutating admission review for Applications
pub async fn mutate_handler(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = AdmissionResponse::from(&req);
    let Some(obj) = &req.object else {
        return Json(response.into_review());
    };

    let ops = defaulting_patch(obj);
    if ops.is_empty() {
        return Json(response.into_review());
    }

    debug!(
        name = ?obj.metadata.name,
        patch_ops = ops.len(),
        "Defaulting Application"
    );
    match response.with_patch(json_patch::Patch(ops)) {
        Ok(response) => Json(response.into_review()),
        Err(e) => {
            error!(error = %e, "Failed to serialize defaulting patch");
            Json(AdmissionResponse::invalid(e.to_string()).into_review())
        }
    }
}

/// Handle validating admission review for Applications
///
/// Runs identically on create and update; delete is always allowed.
pub async fn validate_handler(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = AdmissionResponse::from(&req);
    if matches!(req.operation, Operation::Delete) {
        return Json(response.into_review());
    }
    let Some(obj) = &req.object else {
        return Json(response.into_review());
    };

    let reason = match obj.data.get("spec") {
        None => Some("spec is required".to_string()),
        Some(spec) => match serde_json::from_value::<ApplicationSpec>(spec.clone()) {
            // Unknown `type` values surface here as an unknown-variant error
            Err(e) => Some(format!("invalid Application spec: {e}")),
            Ok(spec) => validate_spec(&spec).err().map(|e| e.to_string()),
        },
    };

    match reason {
        Some(reason) => {
            info!(name = ?obj.metadata.name, %reason, "Rejecting Application");
            Json(response.deny(reason).into_review())
        }
        None => Json(response.into_review()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn dynamic_app(spec: serde_json::Value) -> DynamicObject {
        DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("test-app".to_string()),
                ..Default::default()
            },
            data: serde_json::json!({ "spec": spec }),
        }
    }

    #[test]
    fn test_defaulting_fills_unset_type() {
        let obj = dynamic_app(serde_json::json!({
            "template": { "chart": { "name": "nginx", "repoUrl": "https://x" } }
        }));
        let ops = defaulting_patch(&obj);
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            PatchOperation::Add(add) => {
                assert_eq!(add.path, PointerBuf::from_tokens(["spec", "type"]));
                assert_eq!(add.value, serde_json::json!("Helm"));
            }
            other => panic!("expected add operation, got {other:?}"),
        }
    }

    #[test]
    fn test_defaulting_fills_empty_type() {
        let obj = dynamic_app(serde_json::json!({
            "type": "",
            "template": { "chart": { "name": "nginx", "repoUrl": "https://x" } }
        }));
        assert_eq!(defaulting_patch(&obj).len(), 1);
    }

    #[test]
    fn test_defaulting_leaves_set_type_alone() {
        let obj = dynamic_app(serde_json::json!({
            "type": "Helm",
            "template": { "chart": { "name": "nginx", "repoUrl": "https://x" } }
        }));
        assert!(defaulting_patch(&obj).is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_chart_name() {
        let spec: ApplicationSpec = serde_json::from_value(serde_json::json!({
            "type": "Helm",
            "template": { "chart": { "name": "", "repoUrl": "https://x" } }
        }))
        .unwrap();
        let err = validate_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("chart name"));
    }

    #[test]
    fn test_validate_rejects_empty_repo() {
        let spec: ApplicationSpec = serde_json::from_value(serde_json::json!({
            "type": "Helm",
            "template": { "chart": { "name": "nginx", "repoUrl": "" } }
        }))
        .unwrap();
        let err = validate_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("repoUrl"));
    }

    #[test]
    fn test_validate_accepts_well_formed_spec() {
        let spec: ApplicationSpec = serde_json::from_value(serde_json::json!({
            "type": "Helm",
            "template": { "chart": { "name": "nginx", "repoUrl": "https://x" } }
        }))
        .unwrap();
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn test_unsupported_type_fails_at_json_boundary() {
        let result = serde_json::from_value::<ApplicationSpec>(serde_json::json!({
            "type": "Kustomize",
            "template": { "chart": { "name": "nginx", "repoUrl": "https://x" } }
        }));
        assert!(result.is_err());
    }
}
