use serde_json::Value;

use kopy_core::{object, Object};

use crate::Warning;

/// Warn about hardcoded hostnames; an Ingress is never mutated.
pub(crate) fn sanitize(obj: &mut Object) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let identifier = object::identifier(obj);

    if let Some(rules) = object::seq_at(obj, "/spec/rules") {
        for rule in rules {
            if let Some(host) = rule.get("host").and_then(Value::as_str) {
                if !host.is_empty() {
                    warnings.push(Warning::new(
                        &identifier,
                        format!(
                            "ingress rule has hardcoded host {host:?} -- this may conflict if the same hostname is already used in the target"
                        ),
                    ));
                }
            }
        }
    }

    if let Some(tls) = object::seq_at(obj, "/spec/tls") {
        for entry in tls {
            let Some(hosts) = entry.get("hosts").and_then(Value::as_array) else {
                continue;
            };
            for host in hosts.iter().filter_map(Value::as_str) {
                warnings.push(Warning::new(
                    &identifier,
                    format!(
                        "TLS entry references host {host:?} -- verify the TLS secret and DNS are valid in the target"
                    ),
                ));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_warning_per_host() {
        let mut ing = json!({
            "kind": "Ingress",
            "metadata": {"name": "edge"},
            "spec": {
                "rules": [
                    {"host": "a.example.com", "http": {"paths": []}},
                    {"http": {"paths": []}}
                ],
                "tls": [{"hosts": ["a.example.com", "b.example.com"], "secretName": "tls"}]
            }
        });
        let before = ing.clone();
        let warnings = sanitize(&mut ing);
        assert_eq!(warnings.len(), 3);
        // Advisory only: the object is not mutated.
        assert_eq!(ing, before);
    }
}
