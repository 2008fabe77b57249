//! In-memory `DynamicOps` implementation for tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::core::ErrorResponse;

use kopy_core::{object, Gvr, Object};

use crate::DynamicOps;

type Key = (String, String, String); // (resource, namespace, name)

/// HashMap-backed cluster double. Seed it with [`MockClient::insert`], then
/// assert on the stored state and the recorded operation log.
#[derive(Default)]
pub struct MockClient {
    state: Mutex<BTreeMap<Key, Object>>,
    log: Mutex<Vec<String>>,
    failing_lists: Mutex<HashSet<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object under `(gvr.resource, namespace, metadata.name)`.
    pub fn insert(&self, gvr: &Gvr, namespace: &str, obj: Object) {
        let name = object::name(&obj).to_string();
        self.state
            .lock()
            .unwrap()
            .insert(key(gvr, namespace, &name), obj);
    }

    pub fn contains(&self, gvr: &Gvr, namespace: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .contains_key(&key(gvr, namespace, name))
    }

    pub fn stored(&self, gvr: &Gvr, namespace: &str, name: &str) -> Option<Object> {
        self.state
            .lock()
            .unwrap()
            .get(&key(gvr, namespace, name))
            .cloned()
    }

    /// Every call issued so far, e.g. `"create services/ns-b/web"`.
    pub fn operations(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Make every `list` for the given resource type fail.
    pub fn fail_lists_for(&self, gvr: &Gvr) {
        self.failing_lists.lock().unwrap().insert(gvr.to_string());
    }

    fn record(&self, op: &str, gvr: &Gvr, namespace: &str, name: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{op} {}/{namespace}/{name}", gvr.resource));
    }
}

fn key(gvr: &Gvr, namespace: &str, name: &str) -> Key {
    (
        gvr.resource.clone(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn not_found(gvr: &Gvr, name: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: format!("{}.{} {:?} not found", gvr.resource, gvr.group, name),
        reason: "NotFound".into(),
        code: 404,
    })
}

fn already_exists(gvr: &Gvr, name: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: format!("{}.{} {:?} already exists", gvr.resource, gvr.group, name),
        reason: "AlreadyExists".into(),
        code: 409,
    })
}

#[async_trait]
impl DynamicOps for MockClient {
    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Object, kube::Error> {
        self.record("get", gvr, namespace, name);
        self.stored(gvr, namespace, name)
            .ok_or_else(|| not_found(gvr, name))
    }

    async fn list(&self, gvr: &Gvr, namespace: &str) -> Result<Vec<Object>, kube::Error> {
        self.record("list", gvr, namespace, "*");
        if self.failing_lists.lock().unwrap().contains(&gvr.to_string()) {
            return Err(kube::Error::Api(ErrorResponse {
                status: "Failure".into(),
                message: format!("the server could not list {}", gvr.resource),
                reason: "InternalError".into(),
                code: 500,
            }));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .iter()
            .filter(|((r, ns, _), _)| r == &gvr.resource && ns == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, gvr: &Gvr, namespace: &str, obj: &Object) -> Result<Object, kube::Error> {
        let name = object::name(obj).to_string();
        self.record("create", gvr, namespace, &name);
        let mut state = self.state.lock().unwrap();
        let k = key(gvr, namespace, &name);
        if state.contains_key(&k) {
            return Err(already_exists(gvr, &name));
        }
        state.insert(k, obj.clone());
        Ok(obj.clone())
    }

    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), kube::Error> {
        self.record("delete", gvr, namespace, name);
        match self.state.lock().unwrap().remove(&key(gvr, namespace, name)) {
            Some(_) => Ok(()),
            None => Err(not_found(gvr, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn crud_round_trip() {
        let mock = MockClient::new();
        let gvr = Gvr::core_v1("configmaps");
        let obj = json!({"kind": "ConfigMap", "metadata": {"name": "cfg"}});

        assert!(mock.get(&gvr, "ns", "cfg").await.is_err());
        mock.create(&gvr, "ns", &obj).await.unwrap();
        assert!(mock.create(&gvr, "ns", &obj).await.is_err());
        assert_eq!(mock.get(&gvr, "ns", "cfg").await.unwrap(), obj);
        assert_eq!(mock.list(&gvr, "ns").await.unwrap().len(), 1);
        assert!(mock.list(&gvr, "other").await.unwrap().is_empty());
        mock.delete(&gvr, "ns", "cfg").await.unwrap();
        assert!(mock.delete(&gvr, "ns", "cfg").await.is_err());
    }
}
