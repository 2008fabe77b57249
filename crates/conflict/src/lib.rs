//! Pre-flight conflict detection. Runs after sanitization and before any
//! write; detection itself is read-only.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::debug;

use kopy_client::DynamicOps;
use kopy_core::{object, refs, Gvr, Object};

/// Classifies a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    /// The object already exists in the target.
    Existence,
    /// A hardcoded network address may collide in the target.
    Address,
    /// A referenced resource is missing from the target.
    Reference,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Existence => f.write_str("existence"),
            ConflictKind::Address => f.write_str("address"),
            ConflictKind::Reference => f.write_str("reference"),
        }
    }
}

/// A single detected conflict. Only existence conflicts influence the planned
/// action; address and reference conflicts are reported but never block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// e.g. "Service/my-svc"
    pub resource: String,
    pub message: String,
}

impl Conflict {
    fn new(kind: ConflictKind, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Run all pre-flight checks for an object about to be created in
/// `target_ns` (empty for cluster scope).
pub async fn detect(
    target: &dyn DynamicOps,
    gvr: &Gvr,
    obj: &Object,
    target_ns: &str,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    let name = object::name(obj);
    let identifier = object::identifier(obj);

    if target.get(gvr, target_ns, name).await.is_ok() {
        conflicts.push(Conflict::new(
            ConflictKind::Existence,
            &identifier,
            format!("{identifier} already exists in namespace {target_ns:?}"),
        ));
    }

    conflicts.extend(detect_address_conflicts(obj));
    conflicts.extend(detect_reference_conflicts(target, obj, target_ns).await);

    debug!(resource = %identifier, count = conflicts.len(), "conflict detection done");
    conflicts
}

/// Residual hardcoded addresses. The sanitizer should have cleared these for
/// a Service; re-verify before the write.
fn detect_address_conflicts(obj: &Object) -> Vec<Conflict> {
    if object::kind(obj) != "Service" {
        return Vec::new();
    }

    let mut conflicts = Vec::new();
    let identifier = object::identifier(obj);

    if let Some(cluster_ip) = object::str_at(obj, "/spec/clusterIP") {
        if !cluster_ip.is_empty() && cluster_ip != "None" {
            conflicts.push(Conflict::new(
                ConflictKind::Address,
                &identifier,
                format!("Service has hardcoded clusterIP {cluster_ip} that may conflict"),
            ));
        }
    }

    if let Some(ports) = object::seq_at(obj, "/spec/ports") {
        for port in ports {
            let node_port = port
                .get("nodePort")
                .and_then(object::as_i64_lenient)
                .unwrap_or(0);
            if node_port > 0 {
                conflicts.push(Conflict::new(
                    ConflictKind::Address,
                    &identifier,
                    format!("Service has hardcoded nodePort {node_port} that may conflict"),
                ));
            }
        }
    }

    if let Some(lb_ip) = object::str_at(obj, "/spec/loadBalancerIP") {
        if !lb_ip.is_empty() {
            conflicts.push(Conflict::new(
                ConflictKind::Address,
                &identifier,
                format!("Service has hardcoded loadBalancerIP {lb_ip} that may conflict"),
            ));
        }
    }

    conflicts
}

/// Check that everything the pod spec refers to exists in the target. A GET
/// failure counts as "does not exist".
async fn detect_reference_conflicts(
    target: &dyn DynamicOps,
    obj: &Object,
    target_ns: &str,
) -> Vec<Conflict> {
    let Some(pod_spec) = refs::pod_spec(obj) else {
        return Vec::new();
    };

    let mut conflicts = Vec::new();
    let identifier = object::identifier(obj);

    let checks: [(&str, Gvr, Vec<String>); 4] = [
        ("ConfigMap", Gvr::core_v1("configmaps"), refs::config_map_names(pod_spec)),
        ("Secret", Gvr::core_v1("secrets"), refs::secret_names(pod_spec)),
        ("PVC", Gvr::core_v1("persistentvolumeclaims"), refs::pvc_names(pod_spec)),
        (
            "ServiceAccount",
            Gvr::core_v1("serviceaccounts"),
            refs::service_account_name(pod_spec).into_iter().collect(),
        ),
    ];

    for (label, gvr, names) in checks {
        for name in names {
            if target.get(&gvr, target_ns, &name).await.is_err() {
                conflicts.push(Conflict::new(
                    ConflictKind::Reference,
                    &identifier,
                    format!(
                        "references {label} {name:?} which does not exist in target namespace {target_ns:?} (consider --recursive)"
                    ),
                ));
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn service(spec: Value) -> Value {
        json!({"kind": "Service", "metadata": {"name": "web"}, "spec": spec})
    }

    #[test]
    fn address_checks_accept_both_number_shapes() {
        let int_port = service(json!({"ports": [{"port": 80, "nodePort": 31000}]}));
        let float_port = service(json!({"ports": [{"port": 80, "nodePort": 31000.0}]}));
        assert_eq!(detect_address_conflicts(&int_port).len(), 1);
        assert_eq!(detect_address_conflicts(&float_port).len(), 1);
    }

    #[test]
    fn sanitized_service_has_no_address_conflicts() {
        let svc = service(json!({"clusterIP": "", "ports": [{"port": 80}]}));
        assert!(detect_address_conflicts(&svc).is_empty());
        let headless = service(json!({"clusterIP": "None"}));
        assert!(detect_address_conflicts(&headless).is_empty());
    }

    #[test]
    fn residual_addresses_each_report_once() {
        let svc = service(json!({
            "clusterIP": "10.0.0.1",
            "loadBalancerIP": "1.2.3.4",
            "ports": [{"port": 80, "nodePort": 31000}, {"port": 443}]
        }));
        let conflicts = detect_address_conflicts(&svc);
        assert_eq!(conflicts.len(), 3);
        assert!(conflicts.iter().all(|c| c.kind == ConflictKind::Address));
    }

    #[test]
    fn address_checks_only_apply_to_services() {
        let dep = json!({
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"ports": [{"nodePort": 31000}]}
        });
        assert!(detect_address_conflicts(&dep).is_empty());
    }
}
