use serde_json::Value;

use kopy_core::{object, Object};

use crate::Warning;

const CONTROLLER_UID_LABELS: [&str; 2] = ["controller-uid", "batch.kubernetes.io/controller-uid"];

/// Strip controller-generated identity from a Job so the target's job
/// controller can adopt the recreated pods.
pub(crate) fn sanitize(obj: &mut Object) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let identifier = object::identifier(obj);

    let mut changed = false;
    if object::remove_at(obj, "/spec", "selector").is_some() {
        changed = true;
    }
    for labels_path in ["/metadata/labels", "/spec/template/metadata/labels"] {
        let Some(labels) = obj
            .pointer_mut(labels_path)
            .and_then(Value::as_object_mut)
        else {
            continue;
        };
        for label in CONTROLLER_UID_LABELS {
            if labels.remove(label).is_some() {
                changed = true;
            }
        }
    }

    if changed {
        warnings.push(Warning::new(
            &identifier,
            "removed controller-generated selector and labels",
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_selector_and_controller_uid_labels() {
        let mut job = json!({
            "kind": "Job",
            "metadata": {
                "name": "migrate",
                "labels": {"controller-uid": "aaa", "app": "migrate"}
            },
            "spec": {
                "selector": {"matchLabels": {"controller-uid": "aaa"}},
                "template": {
                    "metadata": {"labels": {
                        "batch.kubernetes.io/controller-uid": "aaa",
                        "app": "migrate"
                    }},
                    "spec": {"containers": []}
                }
            }
        });
        let warnings = sanitize(&mut job);
        assert_eq!(warnings.len(), 1);
        assert!(job.pointer("/spec/selector").is_none());
        assert_eq!(
            job.pointer("/metadata/labels"),
            Some(&json!({"app": "migrate"}))
        );
        assert_eq!(
            job.pointer("/spec/template/metadata/labels"),
            Some(&json!({"app": "migrate"}))
        );
    }

    #[test]
    fn job_without_controller_identity_is_untouched() {
        let mut job = json!({
            "kind": "Job",
            "metadata": {"name": "migrate"},
            "spec": {"template": {"spec": {"containers": []}}}
        });
        assert!(sanitize(&mut job).is_empty());
    }
}
