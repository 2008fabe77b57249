use std::collections::HashSet;

use serde_json::Value;

use kopy_core::{object, Object};

use crate::Warning;

/// Strip scheduling assignment and auto-injected service account token
/// volumes from a Pod.
pub(crate) fn sanitize(obj: &mut Object) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let identifier = object::identifier(obj);

    let Some(spec) = object::map_at_mut(obj, "/spec") else {
        return warnings;
    };

    if let Some(node_name) = spec.get("nodeName").and_then(Value::as_str) {
        if !node_name.is_empty() {
            warnings.push(Warning::new(
                &identifier,
                format!("removed nodeName {node_name:?} to allow scheduler to place the pod"),
            ));
            spec.remove("nodeName");
        }
    }

    remove_sa_token_volumes(spec, &identifier, &mut warnings);

    warnings
}

/// Auto-injected token volumes have names like "kube-api-access-xxxxx"; drop
/// them together with the matching volumeMounts in all containers.
fn remove_sa_token_volumes(
    spec: &mut serde_json::Map<String, Value>,
    identifier: &str,
    warnings: &mut Vec<Warning>,
) {
    let Some(volumes) = spec.get_mut("volumes").and_then(Value::as_array_mut) else {
        return;
    };

    let mut removed: HashSet<String> = HashSet::new();
    volumes.retain(|vol| {
        let name = vol.get("name").and_then(Value::as_str).unwrap_or("");
        if name.starts_with("kube-api-access-") {
            removed.insert(name.to_string());
            false
        } else {
            true
        }
    });

    if removed.is_empty() {
        return;
    }
    for name in &removed {
        warnings.push(Warning::new(
            identifier,
            format!("removed auto-injected volume {name:?}"),
        ));
    }

    for container_field in ["containers", "initContainers"] {
        let Some(containers) = spec.get_mut(container_field).and_then(Value::as_array_mut) else {
            continue;
        };
        for container in containers.iter_mut() {
            let Some(mounts) = container
                .get_mut("volumeMounts")
                .and_then(Value::as_array_mut)
            else {
                continue;
            };
            mounts.retain(|m| {
                let name = m.get("name").and_then(Value::as_str).unwrap_or("");
                !removed.contains(name)
            });
        }
    }
}
