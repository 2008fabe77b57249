//! The copy pipeline: fetch → sanitize → detect → create, split into a
//! read-only Plan phase and a writing Apply phase so the caller can render
//! the plan (and ask for confirmation) in between.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{info, warn};

use kopy_client::DynamicOps;
use kopy_core::{Object, ResourceRef};

mod error;

pub use error::CopyError;
// Re-export the result vocabulary so frontends depend on one crate.
pub use kopy_conflict::{Conflict, ConflictKind};
pub use kopy_sanitize::Warning;

/// How Plan reacts to an existence conflict in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Leave the existing object alone.
    #[default]
    Skip,
    /// Overwrite, but call it out loudly in the plan.
    Warn,
    /// Delete and recreate.
    Overwrite,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Skip => f.write_str("skip"),
            ConflictPolicy::Warn => f.write_str("warn"),
            ConflictPolicy::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// Action Plan decided on for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Skip,
    Overwrite,
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannedAction::Create => f.write_str("create"),
            PlannedAction::Skip => f.write_str("skip"),
            PlannedAction::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// What Apply actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutedAction {
    Created,
    Skipped,
    Overwritten,
}

impl std::fmt::Display for ExecutedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutedAction::Created => f.write_str("created"),
            ExecutedAction::Skipped => f.write_str("skipped"),
            ExecutedAction::Overwritten => f.write_str("overwritten"),
        }
    }
}

/// Per-resource record of the copy. Created by Plan, finalized by Apply.
#[derive(Debug)]
pub struct CopyResult {
    pub source: ResourceRef,
    pub target_name: String,
    pub target_namespace: String,
    pub sanitized: Option<Object>,
    pub warnings: Vec<Warning>,
    pub conflicts: Vec<Conflict>,
    pub planned: PlannedAction,
    pub executed: Option<ExecutedAction>,
    pub error: Option<CopyError>,
}

impl CopyResult {
    /// The action string to show: executed when Apply ran, planned otherwise.
    pub fn action_label(&self) -> String {
        match self.executed {
            Some(action) => action.to_string(),
            None => self.planned.to_string(),
        }
    }
}

/// Lifecycle callbacks for real-time status. All methods default to no-ops.
pub trait Progress: Send + Sync {
    fn connecting(&self) {}
    fn discovering(&self) {}
    fn discovered(&self, _count: usize) {}
    fn fetching(&self, _display_name: &str, _namespace: &str) {}
    fn sanitizing(&self, _display_name: &str) {}
    fn checking(&self, _display_name: &str) {}
    fn creating(&self, _display_name: &str, _namespace: &str) {}
}

/// Silent sink used when the caller does not care about progress.
pub struct NoProgress;

impl Progress for NoProgress {}

/// Stateless fetch-sanitize-detect-create orchestrator. All calls are
/// sequential; ordering across resources follows the input list.
pub struct Copier {
    pub source: Arc<dyn DynamicOps>,
    pub target: Arc<dyn DynamicOps>,
    pub on_conflict: ConflictPolicy,
    pub progress: Arc<dyn Progress>,
}

impl Copier {
    pub fn new(
        source: Arc<dyn DynamicOps>,
        target: Arc<dyn DynamicOps>,
        on_conflict: ConflictPolicy,
    ) -> Self {
        Self {
            source,
            target,
            on_conflict,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch one resource, sanitize it and check for conflicts, without
    /// touching the target. `target_name` falls back to the source name.
    pub async fn plan(
        &self,
        reference: &ResourceRef,
        target_namespace: &str,
        target_name: &str,
    ) -> CopyResult {
        let t0 = Instant::now();
        counter!("copy_plan_total", 1u64);

        let target_name = if target_name.is_empty() {
            reference.name.clone()
        } else {
            target_name.to_string()
        };
        // Cluster-scoped kinds carry no namespace on either side.
        let effective_ns = if reference.namespaced {
            target_namespace
        } else {
            ""
        };
        let mut result = CopyResult {
            source: reference.clone(),
            target_name: target_name.clone(),
            target_namespace: effective_ns.to_string(),
            sanitized: None,
            warnings: Vec::new(),
            conflicts: Vec::new(),
            planned: PlannedAction::Create,
            executed: None,
            error: None,
        };

        let src_ns = if reference.namespaced {
            reference.namespace.as_str()
        } else {
            ""
        };
        self.progress
            .fetching(&reference.display_name(), &reference.namespace);
        let fetched = match self.source.get(&reference.gvr, src_ns, &reference.name).await {
            Ok(obj) => obj,
            Err(err) => {
                counter!("copy_errors_total", 1u64);
                warn!(resource = %reference.display_name(), error = %err, "fetch failed");
                result.error = Some(error::classify_fetch(err, reference));
                return result;
            }
        };

        self.progress.sanitizing(&reference.display_name());
        let mut sanitized = fetched;
        result.warnings = kopy_sanitize::run(&mut sanitized, effective_ns, &target_name);

        self.progress.checking(&reference.display_name());
        result.conflicts =
            kopy_conflict::detect(self.target.as_ref(), &reference.gvr, &sanitized, effective_ns)
                .await;
        result.sanitized = Some(sanitized);

        let exists = result
            .conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Existence);
        result.planned = if exists {
            match self.on_conflict {
                ConflictPolicy::Skip => PlannedAction::Skip,
                ConflictPolicy::Warn | ConflictPolicy::Overwrite => PlannedAction::Overwrite,
            }
        } else {
            PlannedAction::Create
        };
        if exists && self.on_conflict == ConflictPolicy::Warn {
            result.warnings.push(Warning::new(
                reference.display_name(),
                format!(
                    "existing object in namespace {:?} will be overwritten (--on-conflict=warn)",
                    effective_ns
                ),
            ));
        }

        histogram!("plan_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(
            resource = %reference.display_name(),
            planned = %result.planned,
            warnings = result.warnings.len(),
            conflicts = result.conflicts.len(),
            "planned"
        );
        result
    }

    /// Execute one planned result against the target. Results that already
    /// carry an error, and planned skips, are finalized without any write.
    pub async fn apply(&self, planned: &mut CopyResult) {
        if planned.error.is_some() || planned.planned == PlannedAction::Skip {
            if planned.planned == PlannedAction::Skip {
                planned.executed = Some(ExecutedAction::Skipped);
            }
            return;
        }

        let t0 = Instant::now();
        counter!("copy_apply_total", 1u64);

        let reference = &planned.source;
        let target_ns = if reference.namespaced {
            planned.target_namespace.as_str()
        } else {
            ""
        };
        let Some(sanitized) = planned.sanitized.as_ref() else {
            planned.error = Some(CopyError::Other(format!(
                "{}: nothing to apply (planning produced no object)",
                reference.display_name()
            )));
            return;
        };

        self.progress
            .creating(&reference.display_name(), target_ns);

        let outcome = if planned.planned == PlannedAction::Overwrite {
            // Delete-then-create; the delete error is ignored because the
            // object may have vanished since planning.
            let _ = self
                .target
                .delete(&reference.gvr, target_ns, &planned.target_name)
                .await;
            let created = self.target.create(&reference.gvr, target_ns, sanitized).await;
            created.map(|_| ExecutedAction::Overwritten)
        } else {
            self.target
                .create(&reference.gvr, target_ns, sanitized)
                .await
                .map(|_| ExecutedAction::Created)
        };

        match outcome {
            Ok(action) => {
                planned.executed = Some(action);
                info!(resource = %reference.display_name(), action = %action, "applied");
            }
            Err(err) => {
                counter!("copy_errors_total", 1u64);
                warn!(resource = %reference.display_name(), error = %err, "apply failed");
                planned.error = Some(error::classify_create(err, reference, target_ns));
            }
        }
        histogram!("apply_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
    }

    /// Plan every resource in order. The first ref is the primary; only it
    /// receives the caller-supplied name override.
    pub async fn plan_all(
        &self,
        refs: &[ResourceRef],
        target_namespace: &str,
        primary_target_name: &str,
    ) -> Vec<CopyResult> {
        let mut results = Vec::with_capacity(refs.len());
        for (i, reference) in refs.iter().enumerate() {
            let name = if i == 0 { primary_target_name } else { "" };
            results.push(self.plan(reference, target_namespace, name).await);
        }
        results
    }

    /// Apply every planned result in order.
    pub async fn apply_all(&self, planned: &mut [CopyResult]) {
        for result in planned.iter_mut() {
            self.apply(result).await;
        }
    }
}
