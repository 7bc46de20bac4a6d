use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cli::{Cli, Commands};
use crate::properties::{Properties, load_properties, parse_bool, split_list};
use crate::settings::{AnalysisConfig, AnalysisConfigBuilder, MAX_THREADS};
use crate::site::SiteProperties;

pub const CONFIG_ENV: &str = "JPF_AUTODOC_CONFIG";

pub fn resolve_config_file(cli: &Cli) -> Option<PathBuf> {
    if let Some(p) = cli.config_file.clone() {
        return Some(p);
    }
    env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn resolve_site(cli: &Cli) -> SiteProperties {
    if cli.no_site {
        SiteProperties::disabled()
    } else {
        SiteProperties::standard()
    }
}

/// File values first, then explicit flags on top.
pub fn resolve_analysis_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder();

    if let Some(path) = resolve_config_file(cli) {
        let props = load_properties(&path)?;
        debug!(file = %path.display(), keys = props.len(), "loaded config file");
        builder = apply_properties(builder, &props);
    }

    if let Commands::Analyze {
        config_only,
        types_only,
        validate,
        threads,
        sequential,
        include,
        exclude,
        timeout,
        verbose,
        ..
    } = &cli.command
    {
        if *config_only {
            builder = builder.analyze_configurations(true).analyze_types(false);
        }
        if *types_only {
            builder = builder.analyze_configurations(false).analyze_types(true);
        }
        if *validate {
            builder = builder.validate(true);
        }
        if let Some(n) = threads {
            builder = builder.parallel(true).thread_count(*n);
        }
        if *sequential {
            builder = builder.parallel(false);
        }
        for pattern in include {
            builder = builder.include_pattern(pattern.as_str());
        }
        for pattern in exclude {
            builder = builder.exclude_pattern(pattern.as_str());
        }
        if let Some(secs) = timeout {
            builder = builder.timeout(Some(Duration::from_secs(*secs)));
        }
        if *verbose {
            builder = builder.verbose(true);
        }
    }

    builder.build().context("Invalid analysis configuration")
}

/// Unknown keys and unparsable values are logged and ignored.
pub fn apply_properties(
    mut builder: AnalysisConfigBuilder,
    props: &Properties,
) -> AnalysisConfigBuilder {
    if let Some(on) = bool_property(props, "config-only") {
        builder = builder.analyze_configurations(on).analyze_types(!on);
    }
    if let Some(on) = bool_property(props, "types-only") {
        builder = builder.analyze_configurations(!on).analyze_types(on);
    }
    if let Some(on) = bool_property(props, "validate") {
        builder = builder.validate(on);
    }
    if let Some(raw) = props.get("parallel") {
        match raw.trim().parse::<usize>() {
            Ok(n) if (1..=MAX_THREADS).contains(&n) => {
                builder = builder.parallel(true).thread_count(n);
            }
            _ => warn!(value = %raw, "ignoring invalid parallel setting in config file"),
        }
    }
    if let Some(raw) = props.get("include-patterns") {
        for pattern in split_list(raw) {
            builder = builder.include_pattern(pattern);
        }
    }
    if let Some(raw) = props.get("exclude-patterns") {
        for pattern in split_list(raw) {
            builder = builder.exclude_pattern(pattern);
        }
    }
    if let Some(on) = bool_property(props, "verbose") {
        builder = builder.verbose(on);
    }
    if let Some(raw) = props.get("timeout") {
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => builder = builder.timeout(Some(Duration::from_secs(secs))),
            _ => warn!(value = %raw, "ignoring invalid timeout in config file"),
        }
    }
    builder
}

fn bool_property(props: &Properties, key: &str) -> Option<bool> {
    let raw = props.get(key)?;
    let parsed = parse_bool(raw);
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring non-boolean value in config file");
    }
    parsed
}

/// Command targets, plus the jpf-core jar when `--with-jpf-core` is given and
/// one can be found.
pub fn resolve_targets(cli: &Cli, site: &SiteProperties) -> Vec<PathBuf> {
    match &cli.command {
        Commands::Analyze {
            targets,
            with_jpf_core,
            ..
        } => {
            let mut all = targets.clone();
            if *with_jpf_core {
                match site.jpf_core_jar() {
                    Some(jar) => all.push(jar),
                    None => warn!("--with-jpf-core given but no jpf-core jar was found"),
                }
            }
            all
        }
        Commands::Units { targets } => targets.clone(),
    }
}
