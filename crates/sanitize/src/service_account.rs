use serde_json::Value;

use kopy_core::{object, Object};

use crate::Warning;

/// Drop references to controller-generated secrets from a ServiceAccount.
pub(crate) fn sanitize(obj: &mut Object) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let identifier = object::identifier(obj);

    remove_generated(
        obj,
        "secrets",
        "-token-",
        "removed auto-generated token secret reference",
        &identifier,
        &mut warnings,
    );
    remove_generated(
        obj,
        "imagePullSecrets",
        "-dockercfg-",
        "removed auto-generated imagePullSecret reference",
        &identifier,
        &mut warnings,
    );

    warnings
}

fn remove_generated(
    obj: &mut Object,
    field: &str,
    marker: &str,
    note: &str,
    identifier: &str,
    warnings: &mut Vec<Warning>,
) {
    let Some(list) = obj.get_mut(field).and_then(Value::as_array_mut) else {
        return;
    };

    list.retain(|entry| {
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("");
        if name.contains(marker) {
            warnings.push(Warning::new(identifier, format!("{note} {name:?}")));
            false
        } else {
            true
        }
    });

    if list.is_empty() {
        if let Some(root) = obj.as_object_mut() {
            root.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_token_and_dockercfg_references() {
        let mut sa = json!({
            "kind": "ServiceAccount",
            "metadata": {"name": "runner"},
            "secrets": [
                {"name": "runner-token-x7k2p"},
                {"name": "runner-extra"}
            ],
            "imagePullSecrets": [{"name": "runner-dockercfg-9fh3s"}]
        });
        let warnings = sanitize(&mut sa);
        assert_eq!(warnings.len(), 2);
        assert_eq!(sa.get("secrets"), Some(&json!([{"name": "runner-extra"}])));
        // Emptied list is removed entirely.
        assert!(sa.get("imagePullSecrets").is_none());
    }

    #[test]
    fn plain_service_account_is_untouched() {
        let mut sa = json!({
            "kind": "ServiceAccount",
            "metadata": {"name": "runner"}
        });
        assert!(sanitize(&mut sa).is_empty());
    }
}
