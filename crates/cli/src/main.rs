use std::io::BufRead;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use tracing::info;

use kopy_client::{Clients, ConnectOptions};
use kopy_copier::{ConflictPolicy, Copier, CopyResult, PlannedAction, Progress};
use kopy_core::ResourceRef;

mod output;
mod progress;

use output::OutputFormat;
use progress::ProgressReporter;

/// Copy Kubernetes resources across namespaces or clusters, sanitizing
/// metadata and detecting conflicts along the way.
#[derive(Parser, Debug)]
#[command(
    name = "kubectl-copy",
    version,
    about = "Copy Kubernetes resources across namespaces or clusters",
    after_help = "Examples:
  # Copy a deployment to another namespace
  kubectl copy deployment/myapp --to-namespace staging

  # Copy with a new name in the same namespace
  kubectl copy deployment/myapp --to-name myapp-v2

  # Copy to another cluster
  kubectl copy deployment/myapp --to-context prod --to-namespace default

  # Recursive copy (includes related ConfigMaps, Secrets, Services, ...)
  kubectl copy deployment/myapp --to-namespace staging -r

  # Preview without writing anything
  kubectl copy deployment/myapp --to-namespace staging -r --dry-run"
)]
struct Cli {
    /// Resource to copy: "deployment/myapp", "deploy/myapp" or "deployment myapp"
    resource: String,
    /// Resource name when given as a separate argument
    name: Option<String>,

    /// Path to the kubeconfig file
    #[arg(long = "kubeconfig", global = true)]
    kubeconfig: Option<String>,
    /// Kubeconfig context to use for the source
    #[arg(long = "context", global = true)]
    context: Option<String>,
    /// Source namespace (defaults to the current context namespace)
    #[arg(short = 'n', long = "namespace", global = true)]
    namespace: Option<String>,

    /// Target namespace (defaults to the source namespace)
    #[arg(long = "to-namespace", visible_alias = "to-ns")]
    to_namespace: Option<String>,
    /// New resource name (required for a same-namespace copy)
    #[arg(long = "to-name")]
    to_name: Option<String>,
    /// Target kubeconfig context (for cross-cluster copy)
    #[arg(long = "to-context")]
    to_context: Option<String>,
    /// Target kubeconfig file (for cross-cluster copy)
    #[arg(long = "to-kubeconfig")]
    to_kubeconfig: Option<String>,

    /// Copy the full dependency graph
    #[arg(short = 'r', long = "recursive", action = ArgAction::SetTrue)]
    recursive: bool,
    /// Preview what would be copied without making changes
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes", action = ArgAction::SetTrue)]
    yes: bool,
    /// Suppress progress output
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
    /// Conflict strategy when the target already has the object
    #[arg(long = "on-conflict", value_enum, default_value_t = OnConflict::Skip)]
    on_conflict: OnConflict,
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OnConflict {
    Skip,
    Warn,
    Overwrite,
}

impl From<OnConflict> for ConflictPolicy {
    fn from(v: OnConflict) -> Self {
        match v {
            OnConflict::Skip => ConflictPolicy::Skip,
            OnConflict::Warn => ConflictPolicy::Warn,
            OnConflict::Overwrite => ConflictPolicy::Overwrite,
        }
    }
}

fn init_tracing() {
    let env = std::env::var("KOPY_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KOPY_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KOPY_METRICS_ADDR; expected host:port");
        }
    }
}

/// Accepts "resource/name" or the two-argument form.
fn parse_selector(resource: &str, name: Option<&str>) -> Result<(String, String)> {
    if let Some(name) = name {
        return Ok((resource.to_ascii_lowercase(), name.to_string()));
    }
    match resource.split_once('/') {
        Some((kind, name)) if !kind.is_empty() && !name.is_empty() => {
            Ok((kind.to_ascii_lowercase(), name.to_string()))
        }
        _ => bail!(
            "invalid resource argument {:?}: expected <resource>/<name> or <resource> <name>",
            resource
        ),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (resource_kind, resource_name) = parse_selector(&cli.resource, cli.name.as_deref())?;

    let progress = Arc::new(ProgressReporter::new(cli.quiet));

    progress.connecting();
    let clients = Clients::connect(&ConnectOptions {
        kubeconfig: cli.kubeconfig.clone(),
        context: cli.context.clone(),
        to_kubeconfig: cli.to_kubeconfig.clone(),
        to_context: cli.to_context.clone(),
    })
    .await
    .map_err(|e| {
        progress.clear();
        e.context("cannot connect to cluster (check your kubeconfig and network connectivity)")
    })?;

    let source_namespace = cli
        .namespace
        .clone()
        .unwrap_or_else(|| clients.default_namespace().to_string());
    let target_namespace = cli
        .to_namespace
        .clone()
        .unwrap_or_else(|| source_namespace.clone());

    let cross_cluster = cli.to_context.is_some() || cli.to_kubeconfig.is_some();
    if target_namespace == source_namespace && cli.to_name.is_none() && !cross_cluster {
        progress.clear();
        bail!("copying within the same namespace requires --to-name to avoid name collision");
    }

    let resolved = match clients.resolve(&resource_kind).await {
        Ok(r) => r,
        Err(e) => {
            progress.clear();
            return Err(e);
        }
    };
    let primary = ResourceRef {
        gvr: resolved.gvr,
        kind: resolved.kind,
        name: resource_name,
        namespace: source_namespace.clone(),
        namespaced: resolved.namespaced,
    };
    info!(primary = %primary.display_name(), ns = %source_namespace, target_ns = %target_namespace, "copy invoked");

    let mut refs = vec![primary.clone()];
    if cli.recursive {
        progress.discovering();
        let discovered = kopy_discover::discover(clients.source.as_ref(), &primary)
            .await
            .map_err(|e| {
                progress.clear();
                e.context("discovering dependencies")
            })?;
        progress.discovered(discovered.len());
        refs.extend(discovered);
    }

    let copier = Copier::new(
        clients.source.clone() as Arc<dyn kopy_client::DynamicOps>,
        clients.target.clone() as Arc<dyn kopy_client::DynamicOps>,
        cli.on_conflict.into(),
    )
    .with_progress(progress.clone());

    // Phase 1: plan (fetch, sanitize, detect). No writes.
    let mut planned = copier
        .plan_all(&refs, &target_namespace, cli.to_name.as_deref().unwrap_or(""))
        .await;
    progress.clear();

    if cli.dry_run {
        output::print(&planned, cli.output, true)?;
        return Ok(exit_code(&planned));
    }

    output::print(&planned, OutputFormat::Table, false)?;

    if !cli.yes {
        let has_work = planned
            .iter()
            .any(|r| r.error.is_none() && r.planned != PlannedAction::Skip);
        if !has_work {
            eprintln!("\n  Nothing to do.\n");
            return Ok(exit_code(&planned));
        }
        if !ask_confirmation()? {
            eprintln!("  Aborted.\n");
            return Ok(ExitCode::SUCCESS);
        }
    }

    // Phase 2: apply.
    eprintln!();
    copier.apply_all(&mut planned).await;
    progress.clear();

    output::print(&planned, cli.output, false)?;
    Ok(exit_code(&planned))
}

fn exit_code(results: &[CopyResult]) -> ExitCode {
    if results.iter().any(|r| r.error.is_some()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// y/N prompt on stderr; anything but an explicit yes declines.
fn ask_confirmation() -> Result<bool> {
    eprint!("  Proceed? [y/N]: ");
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("reading confirmation")?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
