//! Resource sanitization: strip source-cluster identity so an object can be
//! recreated elsewhere.
//!
//! The universal pass runs on every object; kind-specific rules live in a
//! process-wide registry keyed by kind string. Sanitizers mutate in place and
//! only ever produce advisory warnings.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kopy_core::{object, Object};

mod ingress;
mod job;
mod pod;
mod pvc;
mod service;
mod service_account;

/// Advisory message produced during sanitization. Never fails the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// e.g. "Service/my-svc"
    pub resource: String,
    pub message: String,
}

impl Warning {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// A kind-specific sanitizer: mutates the object, returns warnings.
pub type KindSanitizer = fn(&mut Object) -> Vec<Warning>;

static REGISTRY: Lazy<RwLock<HashMap<String, KindSanitizer>>> = Lazy::new(|| {
    let mut m: HashMap<String, KindSanitizer> = HashMap::new();
    m.insert("Service".into(), service::sanitize);
    m.insert("Pod".into(), pod::sanitize);
    m.insert("PersistentVolumeClaim".into(), pvc::sanitize);
    m.insert("Ingress".into(), ingress::sanitize);
    m.insert("ServiceAccount".into(), service_account::sanitize);
    m.insert("Job".into(), job::sanitize);
    RwLock::new(m)
});

/// Register a sanitizer for a kind (exact case, e.g. "Service"). Registration
/// is append-only; later registrations for the same kind win.
pub fn register(kind: &str, sanitizer: KindSanitizer) {
    REGISTRY
        .write()
        .unwrap()
        .insert(kind.to_string(), sanitizer);
}

/// Apply the universal sanitizer, then the kind-specific one when registered.
/// Returns the collected warnings.
pub fn run(obj: &mut Object, target_namespace: &str, target_name: &str) -> Vec<Warning> {
    let mut warnings = Vec::new();

    sanitize_common(obj, target_namespace, target_name);

    let kind = object::kind(obj).to_string();
    let sanitizer = REGISTRY
        .read()
        .unwrap()
        .get(&kind)
        .copied();
    if let Some(sanitizer) = sanitizer {
        let kind_warnings = sanitizer(obj);
        debug!(kind = %kind, warnings = kind_warnings.len(), "kind sanitizer applied");
        warnings.extend(kind_warnings);
    }

    warnings
}

const STRIP_METADATA_FIELDS: [&str; 7] = [
    "uid",
    "resourceVersion",
    "creationTimestamp",
    "generation",
    "selfLink",
    "managedFields",
    "ownerReferences",
];

const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Strip server-set metadata and status, rewrite namespace and name. Applied
/// to every object before any kind-specific rule. Idempotent; a missing
/// `metadata` mapping leaves the object untouched.
pub fn sanitize_common(obj: &mut Object, target_namespace: &str, target_name: &str) {
    let Some(metadata) = object::map_at_mut(obj, "/metadata") else {
        return;
    };

    for field in STRIP_METADATA_FIELDS {
        metadata.remove(field);
    }

    if let Some(annotations) = metadata
        .get_mut("annotations")
        .and_then(serde_json::Value::as_object_mut)
    {
        annotations.remove(LAST_APPLIED_ANNOTATION);
        if annotations.is_empty() {
            metadata.remove("annotations");
        }
    }

    if target_namespace.is_empty() {
        metadata.remove("namespace");
    } else {
        metadata.insert("namespace".into(), target_namespace.into());
    }

    if !target_name.is_empty() {
        metadata.insert("name".into(), target_name.into());
    }

    if let Some(root) = obj.as_object_mut() {
        root.remove("status");
    }
}
