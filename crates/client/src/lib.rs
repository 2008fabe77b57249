//! Cluster plumbing: kubeconfig loading, resource-string resolution against
//! API discovery, and a dynamic CRUD surface over opaque objects.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, DynamicObject, ListParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::ApiResource,
    discovery::{Discovery, Scope},
    Client, Config,
};
use tracing::{debug, info};

use kopy_core::{Gvr, Object};

pub mod mock;

/// Dynamic CRUD over `(gvr, namespace, name)`. An empty namespace addresses
/// cluster scope.
#[async_trait]
pub trait DynamicOps: Send + Sync {
    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Object, kube::Error>;
    async fn list(&self, gvr: &Gvr, namespace: &str) -> Result<Vec<Object>, kube::Error>;
    async fn create(&self, gvr: &Gvr, namespace: &str, obj: &Object) -> Result<Object, kube::Error>;
    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), kube::Error>;
}

/// `DynamicOps` backed by a kube client.
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, gvr: &Gvr, namespace: &str) -> Api<DynamicObject> {
        // Request routing only needs group/version/plural.
        let ar = ApiResource {
            group: gvr.group.clone(),
            version: gvr.version.clone(),
            api_version: gvr.api_version(),
            kind: String::new(),
            plural: gvr.resource.clone(),
        };
        if namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        }
    }
}

#[async_trait]
impl DynamicOps for KubeClient {
    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Object, kube::Error> {
        let obj = self.api(gvr, namespace).get(name).await?;
        serde_json::to_value(obj).map_err(kube::Error::SerdeError)
    }

    async fn list(&self, gvr: &Gvr, namespace: &str) -> Result<Vec<Object>, kube::Error> {
        let list = self
            .api(gvr, namespace)
            .list(&ListParams::default())
            .await?;
        list.items
            .into_iter()
            .map(|o| serde_json::to_value(o).map_err(kube::Error::SerdeError))
            .collect()
    }

    async fn create(&self, gvr: &Gvr, namespace: &str, obj: &Object) -> Result<Object, kube::Error> {
        let dynamic: DynamicObject =
            serde_json::from_value(obj.clone()).map_err(kube::Error::SerdeError)?;
        let created = self
            .api(gvr, namespace)
            .create(&PostParams::default(), &dynamic)
            .await?;
        serde_json::to_value(created).map_err(kube::Error::SerdeError)
    }

    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), kube::Error> {
        self.api(gvr, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
    }
}

/// Where to read cluster credentials for the source and (optionally
/// different) target cluster.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    pub to_kubeconfig: Option<String>,
    pub to_context: Option<String>,
}

impl ConnectOptions {
    fn has_target_override(&self) -> bool {
        self.to_kubeconfig.is_some() || self.to_context.is_some()
    }
}

/// A resource string resolved against the source cluster's API discovery.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    pub gvr: Gvr,
    pub kind: String,
    pub namespaced: bool,
}

/// Source and target cluster handles. When no target override is given both
/// handles share one connection.
pub struct Clients {
    pub source: Arc<KubeClient>,
    pub target: Arc<KubeClient>,
    source_client: Client,
    default_namespace: String,
}

impl Clients {
    pub async fn connect(opts: &ConnectOptions) -> Result<Self> {
        let source_config = build_config(opts.kubeconfig.as_deref(), opts.context.as_deref())
            .await
            .context("source cluster config")?;
        let default_namespace = source_config.default_namespace.clone();
        let source_client = Client::try_from(source_config).context("source cluster client")?;
        let source = Arc::new(KubeClient::new(source_client.clone()));

        let target = if opts.has_target_override() {
            let kubeconfig = opts.to_kubeconfig.as_deref().or(opts.kubeconfig.as_deref());
            let context = opts.to_context.as_deref().or(opts.context.as_deref());
            let target_config = build_config(kubeconfig, context)
                .await
                .context("target cluster config")?;
            let target_client = Client::try_from(target_config).context("target cluster client")?;
            Arc::new(KubeClient::new(target_client))
        } else {
            Arc::clone(&source)
        };

        info!(
            cross_cluster = opts.has_target_override(),
            "connected to cluster(s)"
        );
        Ok(Self {
            source,
            target,
            source_client,
            default_namespace,
        })
    }

    /// Namespace of the source kubeconfig context, "default" when unset.
    pub fn default_namespace(&self) -> &str {
        if self.default_namespace.is_empty() {
            "default"
        } else {
            &self.default_namespace
        }
    }

    /// Map a user-typed resource string ("deployment", "deploy",
    /// "deployments.apps", ...) to a served resource type, like kubectl does.
    pub async fn resolve(&self, resource: &str) -> Result<ResolvedResource> {
        let want = resource.to_ascii_lowercase();
        let (name_part, group_filter) = match want.split_once('.') {
            Some((n, g)) => (n.to_string(), Some(g.to_string())),
            None => (want.clone(), None),
        };

        let discovery = Discovery::new(self.source_client.clone())
            .run()
            .await
            .context("running API discovery")?;
        for group in discovery.groups() {
            if let Some(filter) = &group_filter {
                if group.name() != filter.as_str() {
                    continue;
                }
            }
            for (ar, caps) in group.recommended_resources() {
                if resource_matches(&ar, &name_part) {
                    let gvr = Gvr::new(&ar.group, &ar.version, &ar.plural);
                    let namespaced = matches!(caps.scope, Scope::Namespaced);
                    debug!(resource = %resource, gvr = %gvr, kind = %ar.kind, namespaced, "resolved resource");
                    return Ok(ResolvedResource {
                        gvr,
                        kind: ar.kind.clone(),
                        namespaced,
                    });
                }
            }
        }

        Err(anyhow!(
            "cannot resolve resource type {:?}: run 'kubectl api-resources' to see available types",
            resource
        ))
    }
}

// Common kubectl aliases; discovery does not expose server-side short names.
const SHORT_NAMES: &[(&str, &str)] = &[
    ("po", "pods"),
    ("deploy", "deployments"),
    ("svc", "services"),
    ("cm", "configmaps"),
    ("sec", "secrets"),
    ("sa", "serviceaccounts"),
    ("pvc", "persistentvolumeclaims"),
    ("pv", "persistentvolumes"),
    ("ing", "ingresses"),
    ("sts", "statefulsets"),
    ("ds", "daemonsets"),
    ("rs", "replicasets"),
    ("hpa", "horizontalpodautoscalers"),
    ("cj", "cronjobs"),
    ("no", "nodes"),
    ("ns", "namespaces"),
];

fn resource_matches(ar: &ApiResource, want: &str) -> bool {
    if ar.plural == want || ar.kind.to_ascii_lowercase() == want {
        return true;
    }
    SHORT_NAMES
        .iter()
        .any(|(alias, plural)| *alias == want && *plural == ar.plural)
}

async fn build_config(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Config> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        cluster: None,
        user: None,
    };
    let config = match kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path)
                .with_context(|| format!("reading kubeconfig {path:?}"))?;
            Config::from_custom_kubeconfig(kc, &options).await?
        }
        None => Config::from_kubeconfig(&options).await?,
    };
    Ok(config)
}
