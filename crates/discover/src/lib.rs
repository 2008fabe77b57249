//! Dependency discovery: BFS over the reference graph rooted at a primary
//! resource.
//!
//! Forward edges are the ConfigMap/Secret/PVC/ServiceAccount references in
//! the pod spec; reverse edges are Services selecting the workload, Ingresses
//! backed by a Service, and HPAs targeting a scalable workload. The graph has
//! cycles in practice (Service ↔ Ingress), so a visited set keyed by
//! `(resource, namespace, name)` breaks them.

#![forbid(unsafe_code)]

use std::collections::{HashSet, VecDeque};

use anyhow::{Context, Result};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use kopy_client::DynamicOps;
use kopy_core::{object, refs, Gvr, Object, ResourceRef};

/// Walk the reference graph from `primary` and return the additional
/// resources to copy, in BFS order (the primary itself is excluded). A fetch
/// failure on the primary is fatal; any other failed edge expansion is
/// skipped.
pub async fn discover(client: &dyn DynamicOps, primary: &ResourceRef) -> Result<Vec<ResourceRef>> {
    let mut visited: HashSet<(String, String, String)> = HashSet::new();
    let mut result: Vec<ResourceRef> = Vec::new();

    visited.insert(primary.key());

    let src_ns = if primary.namespaced {
        primary.namespace.as_str()
    } else {
        ""
    };
    let primary_obj = client
        .get(&primary.gvr, src_ns, &primary.name)
        .await
        .with_context(|| {
            format!(
                "fetching primary resource {}/{}",
                primary.gvr.resource, primary.name
            )
        })?;

    let mut queue: VecDeque<(Object, ResourceRef)> = VecDeque::new();
    queue.push_back((primary_obj, primary.clone()));

    while let Some((obj, current)) = queue.pop_front() {
        for reference in forward_refs(&obj, &current.namespace) {
            if !visited.insert(reference.key()) {
                continue;
            }
            // Confirm the reference exists in the source before adding it;
            // dangling references are dropped silently.
            match client
                .get(&reference.gvr, &reference.namespace, &reference.name)
                .await
            {
                Ok(ref_obj) => {
                    result.push(reference.clone());
                    queue.push_back((ref_obj, reference));
                }
                Err(err) => {
                    debug!(reference = %reference.display_name(), error = %err, "dropping missing forward reference");
                }
            }
        }

        for (reference, ref_obj) in reverse_refs(client, &obj, &current.namespace).await {
            if !visited.insert(reference.key()) {
                continue;
            }
            result.push(reference.clone());
            queue.push_back((ref_obj, reference));
        }
    }

    counter!("discover_refs_total", result.len() as u64);
    debug!(count = result.len(), primary = %primary.display_name(), "discovery complete");
    Ok(result)
}

/// Out-edges: what the object depends on, mapped to the canonical core-group
/// resource types in the same namespace.
fn forward_refs(obj: &Object, namespace: &str) -> Vec<ResourceRef> {
    let Some(pod_spec) = refs::pod_spec(obj) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut push = |kind: &str, resource: &str, names: Vec<String>| {
        for name in names {
            out.push(ResourceRef {
                gvr: Gvr::core_v1(resource),
                kind: kind.to_string(),
                name,
                namespace: namespace.to_string(),
                namespaced: true,
            });
        }
    };

    push("ConfigMap", "configmaps", refs::config_map_names(pod_spec));
    push("Secret", "secrets", refs::secret_names(pod_spec));
    push(
        "PersistentVolumeClaim",
        "persistentvolumeclaims",
        refs::pvc_names(pod_spec),
    );
    push(
        "ServiceAccount",
        "serviceaccounts",
        refs::service_account_name(pod_spec).into_iter().collect(),
    );

    out
}

/// In-edges: what depends on the object.
async fn reverse_refs(
    client: &dyn DynamicOps,
    obj: &Object,
    namespace: &str,
) -> Vec<(ResourceRef, Object)> {
    let mut out = Vec::new();
    let kind = object::kind(obj);

    if matches!(
        kind,
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Pod"
    ) {
        let pod_labels = refs::pod_template_labels(obj);
        if !pod_labels.is_empty() {
            out.extend(matching_services(client, namespace, &pod_labels).await);
        }
    }

    if kind == "Service" {
        out.extend(ingresses_for_service(client, namespace, object::name(obj)).await);
    }

    if matches!(kind, "Deployment" | "StatefulSet" | "ReplicaSet") {
        out.extend(hpas_for_target(client, namespace, kind, object::name(obj)).await);
    }

    out
}

/// Services whose selector is a subset of the pod template labels. An empty
/// selector never matches.
async fn matching_services(
    client: &dyn DynamicOps,
    namespace: &str,
    pod_labels: &std::collections::HashMap<String, String>,
) -> Vec<(ResourceRef, Object)> {
    let gvr = Gvr::core_v1("services");
    let services = match client.list(&gvr, namespace).await {
        Ok(list) => list,
        Err(err) => {
            warn!(error = %err, "listing services for reverse discovery failed");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for svc in services {
        let Some(selector) = svc.pointer("/spec/selector").and_then(Value::as_object) else {
            continue;
        };
        if selector.is_empty() {
            continue;
        }
        let matched = selector.iter().all(|(k, v)| {
            v.as_str()
                .is_some_and(|s| pod_labels.get(k).map(String::as_str) == Some(s))
        });
        if matched {
            let reference = ResourceRef {
                gvr: gvr.clone(),
                kind: "Service".into(),
                name: object::name(&svc).to_string(),
                namespace: namespace.to_string(),
                namespaced: true,
            };
            out.push((reference, svc));
        }
    }
    out
}

/// Ingresses with any backend pointing at the named Service.
async fn ingresses_for_service(
    client: &dyn DynamicOps,
    namespace: &str,
    service_name: &str,
) -> Vec<(ResourceRef, Object)> {
    let gvr = Gvr::new("networking.k8s.io", "v1", "ingresses");
    let ingresses = match client.list(&gvr, namespace).await {
        Ok(list) => list,
        Err(err) => {
            warn!(error = %err, "listing ingresses for reverse discovery failed");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for ing in ingresses {
        if ingress_references_service(&ing, service_name) {
            let reference = ResourceRef {
                gvr: gvr.clone(),
                kind: "Ingress".into(),
                name: object::name(&ing).to_string(),
                namespace: namespace.to_string(),
                namespaced: true,
            };
            out.push((reference, ing));
        }
    }
    out
}

fn ingress_references_service(ing: &Object, service_name: &str) -> bool {
    if object::str_at(ing, "/spec/defaultBackend/service/name") == Some(service_name) {
        return true;
    }
    let Some(rules) = object::seq_at(ing, "/spec/rules") else {
        return false;
    };
    rules.iter().any(|rule| {
        rule.pointer("/http/paths")
            .and_then(Value::as_array)
            .is_some_and(|paths| {
                paths.iter().any(|path| {
                    object::str_at(path, "/backend/service/name") == Some(service_name)
                })
            })
    })
}

/// HPAs targeting the given workload; prefers autoscaling/v2 and falls back
/// to v1 when the v2 list fails.
async fn hpas_for_target(
    client: &dyn DynamicOps,
    namespace: &str,
    kind: &str,
    name: &str,
) -> Vec<(ResourceRef, Object)> {
    let mut gvr = Gvr::new("autoscaling", "v2", "horizontalpodautoscalers");
    let hpas = match client.list(&gvr, namespace).await {
        Ok(list) => list,
        Err(_) => {
            gvr = Gvr::new("autoscaling", "v1", "horizontalpodautoscalers");
            match client.list(&gvr, namespace).await {
                Ok(list) => list,
                Err(err) => {
                    warn!(error = %err, "listing horizontalpodautoscalers failed");
                    return Vec::new();
                }
            }
        }
    };

    let mut out = Vec::new();
    for hpa in hpas {
        let target_kind = object::str_at(&hpa, "/spec/scaleTargetRef/kind").unwrap_or("");
        let target_name = object::str_at(&hpa, "/spec/scaleTargetRef/name").unwrap_or("");
        if target_kind == kind && target_name == name {
            let reference = ResourceRef {
                gvr: gvr.clone(),
                kind: "HorizontalPodAutoscaler".into(),
                name: object::name(&hpa).to_string(),
                namespace: namespace.to_string(),
                namespaced: true,
            };
            out.push((reference, hpa));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ingress_backend_matching() {
        let ing = json!({
            "kind": "Ingress",
            "spec": {
                "defaultBackend": {"service": {"name": "fallback"}},
                "rules": [
                    {"host": "a", "http": {"paths": [
                        {"path": "/", "backend": {"service": {"name": "web"}}}
                    ]}}
                ]
            }
        });
        assert!(ingress_references_service(&ing, "web"));
        assert!(ingress_references_service(&ing, "fallback"));
        assert!(!ingress_references_service(&ing, "other"));
    }

    #[test]
    fn forward_refs_use_core_group_types() {
        let dep = json!({
            "kind": "Deployment",
            "spec": {"template": {"spec": {
                "serviceAccountName": "runner",
                "volumes": [{"name": "v", "configMap": {"name": "cfg"}}],
                "containers": []
            }}}
        });
        let refs = forward_refs(&dep, "ns-a");
        let keys: Vec<_> = refs
            .iter()
            .map(|r| (r.gvr.resource.as_str(), r.name.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("configmaps", "cfg"), ("serviceaccounts", "runner")]
        );
        assert!(refs.iter().all(|r| r.namespaced && r.namespace == "ns-a"));
    }
}
