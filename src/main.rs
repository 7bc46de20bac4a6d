use anyhow::{Context, Result};
use clap::Parser;
use jpf_autodoc::aggregate::ResultAggregate;
use jpf_autodoc::cli::{Cli, Commands, OutputFormat};
use jpf_autodoc::config::{resolve_analysis_config, resolve_site, resolve_targets};
use jpf_autodoc::coordinator::Coordinator;
use jpf_autodoc::reader::{SkippedSource, read_paths};
use jpf_autodoc::unit::{Provenance, UnitSet};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let site = resolve_site(&cli);
    let targets = resolve_targets(&cli, &site);

    match &cli.command {
        Commands::Analyze { format, output, .. } => {
            let config = resolve_analysis_config(&cli)?;
            let coordinator = Coordinator::new();
            let results = coordinator.analyze_sources(&targets, &config);
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            let reports: Vec<SourceReport> = results
                .into_iter()
                .map(|(source, result)| match result {
                    Ok(aggregate) => SourceReport {
                        source,
                        result: Some(aggregate),
                        error: None,
                    },
                    Err(err) => SourceReport {
                        source,
                        result: None,
                        error: Some(err.to_string()),
                    },
                })
                .collect();
            write_analysis_output(&reports, *format, output.as_deref())?;
            if failed == reports.len() {
                anyhow::bail!("All {failed} source(s) failed to analyze");
            }
        }
        Commands::Units { .. } => {
            let report = read_paths(&targets);
            let skipped = report.skipped;
            let units: UnitSet = report.units.into_iter().collect();
            let listing = UnitListing {
                count: units.len(),
                units: units
                    .iter()
                    .map(|u| UnitEntry {
                        name: u.logical_name().to_string(),
                        provenance: u.provenance(),
                        path: u.provenance_path().to_string(),
                        size: u.content().len(),
                    })
                    .collect(),
                skipped,
            };
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let verbose = matches!(cli.command, Commands::Analyze { verbose: true, .. });
    let fallback = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

#[derive(Debug, Serialize)]
struct SourceReport {
    source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResultAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct UnitListing {
    count: usize,
    units: Vec<UnitEntry>,
    skipped: Vec<SkippedSource>,
}

#[derive(Debug, Serialize)]
struct UnitEntry {
    name: String,
    provenance: Provenance,
    path: String,
    size: usize,
}

fn render_text(reports: &[SourceReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "source: {}", report.source.display());
        let Some(aggregate) = report.result.as_ref() else {
            let _ = writeln!(out, "  error: {}", report.error.as_deref().unwrap_or("unknown"));
            continue;
        };
        let meta = aggregate.metadata();
        let _ = writeln!(out, "  units_analyzed: {}", meta.units_analyzed);
        let _ = writeln!(out, "  config_options: {}", aggregate.config_options().len());
        let _ = writeln!(out, "  config_annotations: {}", aggregate.config_annotations().len());
        let _ = writeln!(out, "  choice_generators: {}", aggregate.choice_generators().len());
        let _ = writeln!(out, "  loggers: {}", aggregate.loggers().len());
        let _ = writeln!(out, "  types: {}", aggregate.types().len());
        let _ = writeln!(out, "  model_classes: {}", aggregate.model_classes().len());
        let _ = writeln!(out, "  native_peers: {}", aggregate.native_peers().len());
        let _ = writeln!(out, "  listeners: {}", aggregate.listeners().len());
        let _ = writeln!(out, "  cross_references: {}", aggregate.cross_references().len());
        for failure in &meta.unit_failures {
            let _ = writeln!(
                out,
                "  - failed: {} ({}): {}",
                failure.unit, failure.family, failure.message
            );
        }
        if let Some(validation) = aggregate.validation() {
            let _ = writeln!(
                out,
                "  validation: {} ({})",
                if validation.is_valid() { "valid" } else { "invalid" },
                validation.summary()
            );
            for issue in validation.issues() {
                let _ = writeln!(
                    out,
                    "  - [{}] {}: {}",
                    issue.severity, issue.source, issue.message
                );
            }
        }
    }
    out
}

fn write_analysis_output(
    reports: &[SourceReport],
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(reports)?,
        OutputFormat::Text => render_text(reports),
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
