#![forbid(unsafe_code)]

use serde_json::json;

use kopy_client::mock::MockClient;
use kopy_core::{Gvr, ResourceRef};
use kopy_discover::discover;

fn deployment_ref(name: &str, namespace: &str) -> ResourceRef {
    ResourceRef {
        gvr: Gvr::new("apps", "v1", "deployments"),
        kind: "Deployment".into(),
        name: name.into(),
        namespace: namespace.into(),
        namespaced: true,
    }
}

fn seed_deployment(mock: &MockClient, name: &str, namespace: &str, pod_spec: serde_json::Value) {
    mock.insert(
        &Gvr::new("apps", "v1", "deployments"),
        namespace,
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": name, "namespace": namespace},
            "spec": {"template": {
                "metadata": {"labels": {"app": name}},
                "spec": pod_spec
            }}
        }),
    );
}

#[tokio::test]
async fn missing_forward_refs_are_dropped_silently() {
    let mock = MockClient::new();
    // Deployment references a ConfigMap that exists and a Secret that does not.
    seed_deployment(
        &mock,
        "web",
        "ns-a",
        json!({
            "volumes": [
                {"name": "cfg", "configMap": {"name": "cfg"}},
                {"name": "tls", "secret": {"secretName": "tls"}}
            ],
            "containers": []
        }),
    );
    mock.insert(
        &Gvr::core_v1("configmaps"),
        "ns-a",
        json!({"kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "ns-a"}}),
    );

    let found = discover(&mock, &deployment_ref("web", "ns-a")).await.unwrap();
    let names: Vec<_> = found
        .iter()
        .map(|r| (r.gvr.resource.as_str(), r.name.as_str()))
        .collect();
    assert_eq!(names, vec![("configmaps", "cfg")]);
}

#[tokio::test]
async fn primary_fetch_failure_is_fatal() {
    let mock = MockClient::new();
    let err = discover(&mock, &deployment_ref("ghost", "ns-a"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("fetching primary resource"));
}

#[tokio::test]
async fn service_selector_must_be_label_subset() {
    let mock = MockClient::new();
    seed_deployment(&mock, "web", "ns-a", json!({"containers": []}));
    // s1's selector is a subset of the pod labels, s2's is not.
    mock.insert(
        &Gvr::core_v1("services"),
        "ns-a",
        json!({
            "kind": "Service",
            "metadata": {"name": "s1", "namespace": "ns-a"},
            "spec": {"selector": {"app": "web"}}
        }),
    );
    mock.insert(
        &Gvr::core_v1("services"),
        "ns-a",
        json!({
            "kind": "Service",
            "metadata": {"name": "s2", "namespace": "ns-a"},
            "spec": {"selector": {"app": "web", "tier": "db"}}
        }),
    );
    // Empty selector never matches.
    mock.insert(
        &Gvr::core_v1("services"),
        "ns-a",
        json!({
            "kind": "Service",
            "metadata": {"name": "s3", "namespace": "ns-a"},
            "spec": {"selector": {}}
        }),
    );

    let found = discover(&mock, &deployment_ref("web", "ns-a")).await.unwrap();
    let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["s1"]);
}

#[tokio::test]
async fn service_ingress_cycle_terminates_with_no_duplicates() {
    let mock = MockClient::new();
    seed_deployment(&mock, "web", "ns-a", json!({"containers": []}));
    mock.insert(
        &Gvr::core_v1("services"),
        "ns-a",
        json!({
            "kind": "Service",
            "metadata": {"name": "web-svc", "namespace": "ns-a"},
            "spec": {"selector": {"app": "web"}}
        }),
    );
    // The ingress points back at the service that led to it.
    mock.insert(
        &Gvr::new("networking.k8s.io", "v1", "ingresses"),
        "ns-a",
        json!({
            "kind": "Ingress",
            "metadata": {"name": "edge", "namespace": "ns-a"},
            "spec": {"rules": [{"http": {"paths": [
                {"path": "/", "backend": {"service": {"name": "web-svc"}}}
            ]}}]}
        }),
    );

    let found = discover(&mock, &deployment_ref("web", "ns-a")).await.unwrap();
    let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["web-svc", "edge"]);
}

#[tokio::test]
async fn hpa_v2_list_failure_falls_back_to_v1() {
    let mock = MockClient::new();
    seed_deployment(&mock, "web", "ns-a", json!({"containers": []}));
    mock.fail_lists_for(&Gvr::new("autoscaling", "v2", "horizontalpodautoscalers"));
    mock.insert(
        &Gvr::new("autoscaling", "v1", "horizontalpodautoscalers"),
        "ns-a",
        json!({
            "kind": "HorizontalPodAutoscaler",
            "metadata": {"name": "web-hpa", "namespace": "ns-a"},
            "spec": {"scaleTargetRef": {"kind": "Deployment", "name": "web"}}
        }),
    );

    let found = discover(&mock, &deployment_ref("web", "ns-a")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "web-hpa");
    assert_eq!(found[0].gvr.version, "v1");
}

#[tokio::test]
async fn hpa_must_match_kind_and_name() {
    let mock = MockClient::new();
    seed_deployment(&mock, "web", "ns-a", json!({"containers": []}));
    mock.insert(
        &Gvr::new("autoscaling", "v2", "horizontalpodautoscalers"),
        "ns-a",
        json!({
            "kind": "HorizontalPodAutoscaler",
            "metadata": {"name": "other-hpa", "namespace": "ns-a"},
            "spec": {"scaleTargetRef": {"kind": "StatefulSet", "name": "web"}}
        }),
    );

    let found = discover(&mock, &deployment_ref("web", "ns-a")).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn list_failure_aborts_only_that_edge() {
    let mock = MockClient::new();
    seed_deployment(
        &mock,
        "web",
        "ns-a",
        json!({
            "volumes": [{"name": "cfg", "configMap": {"name": "cfg"}}],
            "containers": []
        }),
    );
    mock.insert(
        &Gvr::core_v1("configmaps"),
        "ns-a",
        json!({"kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "ns-a"}}),
    );
    mock.fail_lists_for(&Gvr::core_v1("services"));

    let found = discover(&mock, &deployment_ref("web", "ns-a")).await.unwrap();
    let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["cfg"]);
}
