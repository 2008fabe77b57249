//! Rendering of plan/apply results: a colorized table for humans, yaml/json
//! dumps of the sanitized objects for machines.

use anyhow::Result;
use clap::ValueEnum;
use console::style;
use serde_json::json;

use kopy_copier::CopyResult;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Yaml,
    Json,
}

pub fn print(results: &[CopyResult], format: OutputFormat, dry_run: bool) -> Result<()> {
    match format {
        OutputFormat::Table => print_table(results, dry_run),
        OutputFormat::Yaml => print_yaml(results),
        OutputFormat::Json => print_json(results),
    }
}

struct Row {
    status: String,
    styled_status: String,
    resource: String,
    source: String,
    target: String,
    error: Option<String>,
}

fn print_table(results: &[CopyResult], dry_run: bool) -> Result<()> {
    if dry_run {
        println!("\n{}\n", style("--- DRY RUN (no changes made) ---").cyan());
    }

    let mut rows = Vec::with_capacity(results.len());
    for r in results {
        let resource = format!("{}/{}", r.source.gvr.resource, r.source.name);
        let source = format!("{}/{}", r.source.namespace, r.source.name);
        let target = format!("{}/{}", r.target_namespace, r.target_name);
        let row = if let Some(err) = &r.error {
            Row {
                status: "ERROR".into(),
                styled_status: style("ERROR").red().to_string(),
                resource,
                source,
                target,
                error: Some(err.to_string()),
            }
        } else {
            let label = r.action_label();
            let (symbol, styled) = match label.as_str() {
                "skip" | "skipped" => ("-", style(format!("- {label}")).yellow()),
                "overwrite" | "overwritten" => ("~", style(format!("~ {label}")).yellow()),
                _ => ("+", style(format!("+ {label}")).green()),
            };
            Row {
                status: format!("{symbol} {label}"),
                styled_status: styled.to_string(),
                resource,
                source,
                target,
                error: None,
            }
        };
        rows.push(row);
    }

    let status_w = column_width("STATUS", rows.iter().map(|r| r.status.len()));
    let resource_w = column_width("RESOURCE", rows.iter().map(|r| r.resource.len()));
    let source_w = column_width("SOURCE", rows.iter().map(|r| r.source.len()));

    println!(
        "  {}",
        style(format!(
            "{:<status_w$}  {:<resource_w$}  {:<source_w$}  TARGET",
            "STATUS", "RESOURCE", "SOURCE"
        ))
        .dim()
    );
    for row in &rows {
        // Pad by the plain width, then swap in the styled text.
        let padding = " ".repeat(status_w - row.status.len());
        println!(
            "  {}{padding}  {:<resource_w$}  {:<source_w$}  {}",
            row.styled_status, row.resource, row.source, row.target
        );
        if let Some(err) = &row.error {
            for line in err.lines() {
                println!("  {}", style(format!("  -> {line}")).red());
            }
        }
    }

    for r in results {
        for warning in &r.warnings {
            println!(
                "  {} {}: {}",
                style("WARNING").yellow(),
                warning.resource,
                warning.message
            );
        }
        for conflict in &r.conflicts {
            println!(
                "  {} {}",
                style(format!("CONFLICT [{}]", conflict.kind)).red(),
                conflict.message
            );
        }
    }

    println!("\n  {}\n", style(summary(results)).dim());
    Ok(())
}

fn column_width(header: &str, cells: impl Iterator<Item = usize>) -> usize {
    cells.chain(std::iter::once(header.len())).max().unwrap_or(0)
}

fn summary(results: &[CopyResult]) -> String {
    let count = |label: &str| {
        results
            .iter()
            .filter(|r| r.error.is_none() && r.action_label() == label)
            .count()
    };
    let errors = results.iter().filter(|r| r.error.is_some()).count();

    let mut parts = vec![format!("Summary: {} resource(s) processed", results.len())];
    for (label, text) in [
        ("create", "to create"),
        ("skip", "to skip"),
        ("overwrite", "to overwrite"),
        ("created", "created"),
        ("skipped", "skipped"),
        ("overwritten", "overwritten"),
    ] {
        let n = count(label);
        if n > 0 {
            parts.push(format!("{n} {text}"));
        }
    }
    if errors > 0 {
        parts.push(format!("{errors} error(s)"));
    }
    parts.join(", ")
}

fn sanitized_objects(results: &[CopyResult]) -> Vec<&serde_json::Value> {
    results.iter().filter_map(|r| r.sanitized.as_ref()).collect()
}

/// One document when there is a single object, otherwise a v1 List envelope.
fn render_value(results: &[CopyResult]) -> serde_json::Value {
    let objects = sanitized_objects(results);
    if objects.len() == 1 {
        objects[0].clone()
    } else {
        json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": objects,
        })
    }
}

fn print_yaml(results: &[CopyResult]) -> Result<()> {
    print!("{}", serde_yaml::to_string(&render_value(results))?);
    Ok(())
}

fn print_json(results: &[CopyResult]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&render_value(results))?);
    Ok(())
}
