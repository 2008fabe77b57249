use serde_json::Value;

use kopy_core::{object, Object};

use crate::Warning;

/// Clear cluster-assigned addressing from a Service so the target API server
/// can allocate fresh values.
pub(crate) fn sanitize(obj: &mut Object) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let identifier = object::identifier(obj);

    let Some(spec) = object::map_at_mut(obj, "/spec") else {
        return warnings;
    };

    if let Some(cluster_ip) = spec.get("clusterIP").and_then(Value::as_str) {
        if !cluster_ip.is_empty() && cluster_ip != "None" {
            warnings.push(Warning::new(
                &identifier,
                format!(
                    "reset clusterIP (was {cluster_ip}) to let the cluster assign a new one"
                ),
            ));
            spec.insert("clusterIP".into(), "".into());
        }
    }

    if let Some(cluster_ips) = spec.get_mut("clusterIPs").and_then(Value::as_array_mut) {
        // A single "None" entry marks a headless service; keep it.
        let headless = cluster_ips.len() == 1
            && cluster_ips[0].as_str() == Some("None");
        if !cluster_ips.is_empty() && !headless {
            cluster_ips.clear();
        }
    }

    if let Some(ports) = spec.get_mut("ports").and_then(Value::as_array_mut) {
        for port in ports.iter_mut() {
            let Some(port) = port.as_object_mut() else {
                continue;
            };
            if let Some(node_port) = port.remove("nodePort") {
                warnings.push(Warning::new(
                    &identifier,
                    format!("removed nodePort {node_port} to let the cluster assign a new one"),
                ));
            }
        }
    }

    if let Some(lb_ip) = spec.get("loadBalancerIP").and_then(Value::as_str) {
        if !lb_ip.is_empty() {
            warnings.push(Warning::new(
                &identifier,
                format!("loadBalancerIP is set to {lb_ip} -- this may conflict in the target cluster"),
            ));
        }
    }

    if spec.get("type").and_then(Value::as_str) == Some("ExternalName") {
        warnings.push(Warning::new(
            &identifier,
            "ExternalName service -- verify the external name is valid in the target",
        ));
    }

    // Auto-assigned for LoadBalancer + externalTrafficPolicy: Local.
    spec.remove("healthCheckNodePort");

    warnings
}
