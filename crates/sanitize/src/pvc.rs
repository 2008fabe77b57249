use serde_json::Value;

use kopy_core::{object, Object};

use crate::Warning;

const PV_BINDING_ANNOTATIONS: [&str; 5] = [
    "pv.kubernetes.io/bind-completed",
    "pv.kubernetes.io/bound-by-controller",
    "volume.beta.kubernetes.io/storage-provisioner",
    "volume.kubernetes.io/storage-provisioner",
    "volume.kubernetes.io/selected-node",
];

/// Unbind a PersistentVolumeClaim from its PV so the target can provision a
/// fresh volume.
pub(crate) fn sanitize(obj: &mut Object) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let identifier = object::identifier(obj);

    if let Some(spec) = object::map_at_mut(obj, "/spec") {
        if let Some(volume_name) = spec.get("volumeName").and_then(Value::as_str) {
            if !volume_name.is_empty() {
                warnings.push(Warning::new(
                    &identifier,
                    format!(
                        "removed volumeName {volume_name:?} (PV binding) to allow dynamic provisioning"
                    ),
                ));
                spec.remove("volumeName");
            }
        }
    }

    if let Some(metadata) = object::map_at_mut(obj, "/metadata") {
        let mut changed = false;
        if let Some(annotations) = metadata
            .get_mut("annotations")
            .and_then(Value::as_object_mut)
        {
            for ann in PV_BINDING_ANNOTATIONS {
                if annotations.remove(ann).is_some() {
                    changed = true;
                }
            }
            if annotations.is_empty() {
                metadata.remove("annotations");
            }
        }
        if changed {
            warnings.push(Warning::new(&identifier, "removed PV binding annotations"));
        }
    }

    warnings
}
