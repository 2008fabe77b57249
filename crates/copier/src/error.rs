//! Per-resource error taxonomy. Every fault that hits a single resource
//! becomes a `CopyError` on its result; the batch keeps going.

use thiserror::Error;

use kopy_core::ResourceRef;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("{0}")]
    Connectivity(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    UnknownResourceType(String),
    #[error("{0}")]
    Other(String),
}

impl CopyError {
    /// Stable programmatic tag for scripts and tests.
    pub fn tag(&self) -> &'static str {
        match self {
            CopyError::Connectivity(_) => "connectivity",
            CopyError::Authorization(_) => "authorization",
            CopyError::NotFound(_) => "not-found",
            CopyError::AlreadyExists(_) => "already-exists",
            CopyError::UnknownResourceType(_) => "resource-type-unknown",
            CopyError::Other(_) => "other",
        }
    }
}

const UNKNOWN_TYPE_MARKER: &str = "the server could not find the requested resource";

/// Classify a failure while fetching from the source cluster.
pub(crate) fn classify_fetch(err: kube::Error, reference: &ResourceRef) -> CopyError {
    let display = reference.display_name();
    match err {
        kube::Error::Api(api) => match api.code {
            401 | 403 => CopyError::Authorization(format!(
                "{display}: permission denied in namespace {:?}.\n    Check your RBAC roles and kubeconfig context.",
                reference.namespace
            )),
            404 if api.message.contains(UNKNOWN_TYPE_MARKER) => {
                CopyError::UnknownResourceType(format!(
                    "{display}: resource type not recognized by the cluster API server.\n    Verify the resource exists: kubectl api-resources | grep {}",
                    reference.gvr.resource
                ))
            }
            404 => CopyError::NotFound(format!(
                "{display} not found in namespace {:?}.\n    Run: kubectl get {} -n {}",
                reference.namespace, reference.gvr.resource, reference.namespace
            )),
            _ => CopyError::Other(format!(
                "fetch {display} in {}: {}",
                reference.namespace, api.message
            )),
        },
        other => classify_transport(other, &format!("fetch {display} in {}", reference.namespace)),
    }
}

/// Classify a failure while creating in the target cluster.
pub(crate) fn classify_create(
    err: kube::Error,
    reference: &ResourceRef,
    target_ns: &str,
) -> CopyError {
    let display = reference.display_name();
    match err {
        kube::Error::Api(api) => match api.code {
            409 => CopyError::AlreadyExists(format!(
                "{display} already exists in namespace {target_ns:?}.\n    Use --on-conflict=overwrite to replace it."
            )),
            401 | 403 => CopyError::Authorization(format!(
                "{display}: permission denied creating in namespace {target_ns:?}.\n    Check your RBAC roles for the target cluster/namespace."
            )),
            _ => CopyError::Other(format!(
                "create {display} in {target_ns}: {}",
                api.message
            )),
        },
        other => classify_transport(other, &format!("create {display} in {target_ns}")),
    }
}

fn classify_transport(err: kube::Error, action: &str) -> CopyError {
    let message = err.to_string();
    if is_connectivity(&message) {
        CopyError::Connectivity(format!(
            "cannot reach cluster: {message}\n    Check your kubeconfig context and network connectivity."
        ))
    } else {
        CopyError::Other(format!("{action}: {message}"))
    }
}

fn is_connectivity(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["error trying to connect", "connection refused", "dns error", "no such host", "timed out"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopy_core::Gvr;
    use kube::core::ErrorResponse;

    fn api_err(code: u16, message: &str, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: message.into(),
            reason: reason.into(),
            code,
        })
    }

    fn dep_ref() -> ResourceRef {
        ResourceRef {
            gvr: Gvr::new("apps", "v1", "deployments"),
            kind: "Deployment".into(),
            name: "web".into(),
            namespace: "ns-a".into(),
            namespaced: true,
        }
    }

    #[test]
    fn fetch_404_is_not_found_with_hint() {
        let err = classify_fetch(api_err(404, "deployments \"web\" not found", "NotFound"), &dep_ref());
        assert_eq!(err.tag(), "not-found");
        assert!(err.to_string().contains("kubectl get deployments -n ns-a"));
    }

    #[test]
    fn fetch_unknown_type_is_distinguished_from_missing_object() {
        let err = classify_fetch(
            api_err(404, "the server could not find the requested resource", "NotFound"),
            &dep_ref(),
        );
        assert_eq!(err.tag(), "resource-type-unknown");
    }

    #[test]
    fn forbidden_maps_to_authorization() {
        let err = classify_fetch(api_err(403, "forbidden", "Forbidden"), &dep_ref());
        assert_eq!(err.tag(), "authorization");
    }

    #[test]
    fn create_conflict_suggests_overwrite_flag() {
        let err = classify_create(
            api_err(409, "deployments \"web\" already exists", "AlreadyExists"),
            &dep_ref(),
            "ns-b",
        );
        assert_eq!(err.tag(), "already-exists");
        assert!(err.to_string().contains("--on-conflict=overwrite"));
    }

    #[test]
    fn connectivity_markers_are_recognized() {
        assert!(is_connectivity("error trying to connect: tcp connect error"));
        assert!(is_connectivity("Connection refused (os error 111)"));
        assert!(!is_connectivity("invalid object"));
    }
}
