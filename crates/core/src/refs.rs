//! Pod-spec reference extraction.
//!
//! Workload-shaped objects embed a pod spec directly or via a template; the
//! functions here pull out the ConfigMap/Secret/PVC/ServiceAccount names that
//! spec refers to. Lists are deduplicated in insertion order.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{object, Object};

/// Locate the pod-spec sub-tree for the object's kind, if it has one.
pub fn pod_spec(obj: &Object) -> Option<&Object> {
    match object::kind(obj) {
        "Pod" => obj.pointer("/spec"),
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" => {
            obj.pointer("/spec/template/spec")
        }
        "CronJob" => obj.pointer("/spec/jobTemplate/spec/template/spec"),
        _ => None,
    }
}

/// ConfigMap names referenced by volumes, projected volumes, envFrom and env.
pub fn config_map_names(pod_spec: &Object) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    if let Some(volumes) = object::seq_at(pod_spec, "/volumes") {
        for vol in volumes {
            push_name(vol.pointer("/configMap/name"), &mut seen, &mut names);
            from_projected(vol, "configMap", &mut seen, &mut names);
        }
    }
    from_container_env(pod_spec, "configMapRef", "configMapKeyRef", &mut seen, &mut names);

    names
}

/// Secret names referenced by volumes, projected volumes, envFrom and env.
pub fn secret_names(pod_spec: &Object) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    if let Some(volumes) = object::seq_at(pod_spec, "/volumes") {
        for vol in volumes {
            push_name(vol.pointer("/secret/secretName"), &mut seen, &mut names);
            from_projected(vol, "secret", &mut seen, &mut names);
        }
    }
    from_container_env(pod_spec, "secretRef", "secretKeyRef", &mut seen, &mut names);

    names
}

/// PVC names referenced by volumes.
pub fn pvc_names(pod_spec: &Object) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    if let Some(volumes) = object::seq_at(pod_spec, "/volumes") {
        for vol in volumes {
            push_name(
                vol.pointer("/persistentVolumeClaim/claimName"),
                &mut seen,
                &mut names,
            );
        }
    }

    names
}

/// ServiceAccount name from `serviceAccountName` or the legacy
/// `serviceAccount` field. `"default"` is treated as absent.
pub fn service_account_name(pod_spec: &Object) -> Option<String> {
    let name = object::str_at(pod_spec, "/serviceAccountName")
        .or_else(|| object::str_at(pod_spec, "/serviceAccount"))?;
    if name.is_empty() || name == "default" {
        return None;
    }
    Some(name.to_string())
}

/// Pod template labels (the object's own labels for a bare Pod). Only
/// string-valued entries are returned.
pub fn pod_template_labels(obj: &Object) -> HashMap<String, String> {
    let labels = match object::kind(obj) {
        "Pod" => obj.pointer("/metadata/labels"),
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" => {
            obj.pointer("/spec/template/metadata/labels")
        }
        "CronJob" => obj.pointer("/spec/jobTemplate/spec/template/metadata/labels"),
        _ => None,
    };

    let mut out = HashMap::new();
    if let Some(map) = labels.and_then(Value::as_object) {
        for (k, v) in map {
            if let Some(s) = v.as_str() {
                out.insert(k.clone(), s.to_string());
            }
        }
    }
    out
}

fn push_name(value: Option<&Value>, seen: &mut HashSet<String>, names: &mut Vec<String>) {
    if let Some(name) = value.and_then(Value::as_str) {
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
}

fn from_projected(
    vol: &Value,
    source_key: &str,
    seen: &mut HashSet<String>,
    names: &mut Vec<String>,
) {
    let Some(sources) = object::seq_at(vol, "/projected/sources") else {
        return;
    };
    for src in sources {
        push_name(
            src.get(source_key).and_then(|s| s.get("name")),
            seen,
            names,
        );
    }
}

fn from_container_env(
    pod_spec: &Object,
    env_from_key: &str,
    env_var_key: &str,
    seen: &mut HashSet<String>,
    names: &mut Vec<String>,
) {
    for container_field in ["/containers", "/initContainers"] {
        let Some(containers) = object::seq_at(pod_spec, container_field) else {
            continue;
        };
        for container in containers {
            if let Some(env_from) = object::seq_at(container, "/envFrom") {
                for entry in env_from {
                    push_name(
                        entry.get(env_from_key).and_then(|r| r.get("name")),
                        seen,
                        names,
                    );
                }
            }
            if let Some(env) = object::seq_at(container, "/env") {
                for var in env {
                    push_name(
                        var.pointer("/valueFrom")
                            .and_then(|vf| vf.get(env_var_key))
                            .and_then(|r| r.get("name")),
                        seen,
                        names,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment_with_pod_spec(pod_spec: Value) -> Value {
        json!({
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"template": {"spec": pod_spec}}
        })
    }

    #[test]
    fn pod_spec_location_by_kind() {
        let pod = json!({"kind": "Pod", "spec": {"nodeName": "n1"}});
        assert!(pod_spec(&pod).is_some());

        let cj = json!({
            "kind": "CronJob",
            "spec": {"jobTemplate": {"spec": {"template": {"spec": {"containers": []}}}}}
        });
        assert!(pod_spec(&cj).is_some());

        let cm = json!({"kind": "ConfigMap", "data": {}});
        assert!(pod_spec(&cm).is_none());
    }

    #[test]
    fn config_map_names_deduped_in_order() {
        let obj = deployment_with_pod_spec(json!({
            "volumes": [
                {"name": "a", "configMap": {"name": "cfg-vol"}},
                {"name": "b", "projected": {"sources": [{"configMap": {"name": "cfg-proj"}}]}}
            ],
            "containers": [{
                "name": "app",
                "envFrom": [{"configMapRef": {"name": "cfg-env"}}],
                "env": [{"name": "X", "valueFrom": {"configMapKeyRef": {"name": "cfg-vol", "key": "k"}}}]
            }]
        }));
        let spec = pod_spec(&obj).unwrap();
        assert_eq!(config_map_names(spec), vec!["cfg-vol", "cfg-proj", "cfg-env"]);
    }

    #[test]
    fn secret_names_cover_all_paths() {
        let obj = deployment_with_pod_spec(json!({
            "volumes": [
                {"name": "a", "secret": {"secretName": "tls"}},
                {"name": "b", "projected": {"sources": [{"secret": {"name": "proj-sec"}}]}}
            ],
            "initContainers": [{
                "name": "init",
                "envFrom": [{"secretRef": {"name": "env-sec"}}],
                "env": [{"name": "T", "valueFrom": {"secretKeyRef": {"name": "tls", "key": "crt"}}}]
            }]
        }));
        let spec = pod_spec(&obj).unwrap();
        assert_eq!(secret_names(spec), vec!["tls", "proj-sec", "env-sec"]);
    }

    #[test]
    fn pvc_names_from_volumes_only() {
        let obj = deployment_with_pod_spec(json!({
            "volumes": [
                {"name": "data", "persistentVolumeClaim": {"claimName": "data-pvc"}},
                {"name": "dup", "persistentVolumeClaim": {"claimName": "data-pvc"}}
            ]
        }));
        let spec = pod_spec(&obj).unwrap();
        assert_eq!(pvc_names(spec), vec!["data-pvc"]);
    }

    #[test]
    fn default_service_account_is_absent() {
        assert_eq!(service_account_name(&json!({"serviceAccountName": "default"})), None);
        assert_eq!(
            service_account_name(&json!({"serviceAccountName": "runner"})),
            Some("runner".to_string())
        );
        assert_eq!(
            service_account_name(&json!({"serviceAccount": "legacy"})),
            Some("legacy".to_string())
        );
        assert_eq!(service_account_name(&json!({})), None);
    }

    #[test]
    fn template_labels_only_string_values() {
        let obj = json!({
            "kind": "Deployment",
            "spec": {"template": {"metadata": {"labels": {"app": "web", "weird": 7}}}}
        });
        let labels = pod_template_labels(&obj);
        assert_eq!(labels.get("app").map(String::as_str), Some("web"));
        assert!(!labels.contains_key("weird"));
    }
}
