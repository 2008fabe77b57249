//! Kopy core types: resource identifiers and opaque object-tree helpers.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod object;
pub mod refs;

/// Opaque JSON-shaped Kubernetes object. All field access is by path so that
/// CRDs and unknown kinds flow through unchanged.
pub type Object = serde_json::Value;

/// Group/version/resource triple identifying a resource type on the wire
/// (resource is the lowercase plural, e.g. "deployments").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Core-group ("", v1) resource, e.g. configmaps, secrets.
    pub fn core_v1(resource: &str) -> Self {
        Self::new("", "v1", resource)
    }

    /// "group/version" or bare "version" for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl std::fmt::Display for Gvr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}

/// Uniquely identifies one object to be copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub gvr: Gvr,
    /// Human-friendly kind, e.g. "Deployment". May be empty when unknown.
    pub kind: String,
    pub name: String,
    /// Source namespace; ignored on fetch/create for cluster-scoped kinds.
    pub namespace: String,
    /// False for cluster-scoped kinds (Node, ClusterRole, StorageClass, ...).
    pub namespaced: bool,
}

impl ResourceRef {
    /// "Kind/name" for display, falling back to the plural resource.
    pub fn display_name(&self) -> String {
        if self.kind.is_empty() {
            format!("{}/{}", self.gvr.resource, self.name)
        } else {
            format!("{}/{}", self.kind, self.name)
        }
    }

    /// Dedup key for the dependency walk.
    pub fn key(&self) -> (String, String, String) {
        (
            self.gvr.resource.clone(),
            self.namespace.clone(),
            self.name.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gvr_api_version_formats() {
        assert_eq!(Gvr::core_v1("configmaps").api_version(), "v1");
        assert_eq!(
            Gvr::new("apps", "v1", "deployments").api_version(),
            "apps/v1"
        );
    }

    #[test]
    fn display_name_prefers_kind() {
        let r = ResourceRef {
            gvr: Gvr::new("apps", "v1", "deployments"),
            kind: "Deployment".into(),
            name: "web".into(),
            namespace: "ns".into(),
            namespaced: true,
        };
        assert_eq!(r.display_name(), "Deployment/web");
        let anon = ResourceRef { kind: String::new(), ..r };
        assert_eq!(anon.display_name(), "deployments/web");
    }
}
