//! Immutable per-run analysis settings.
//!
//! An `AnalysisConfig` is only obtainable from `AnalysisConfigBuilder::build`,
//! which validates the thread count and compiles the name patterns once. The
//! finished value has no mutators and is shared read-only with worker threads.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::analyzer::AnalyzerFamily;
use crate::error::ConfigError;

pub const MAX_THREADS: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    analyze_configurations: bool,
    analyze_types: bool,
    validate: bool,
    parallel: bool,
    thread_count: usize,
    include_patterns: BTreeSet<String>,
    exclude_patterns: BTreeSet<String>,
    verbose: bool,
    timeout: Option<Duration>,
    #[serde(skip)]
    filter: NameFilter,
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    pub fn default_config() -> Self {
        Self::builder().build_unchecked()
    }

    pub fn config_only() -> Self {
        Self::builder()
            .analyze_configurations(true)
            .analyze_types(false)
            .build_unchecked()
    }

    pub fn types_only() -> Self {
        Self::builder()
            .analyze_configurations(false)
            .analyze_types(true)
            .build_unchecked()
    }

    pub fn analyze_configurations(&self) -> bool {
        self.analyze_configurations
    }

    pub fn analyze_types(&self) -> bool {
        self.analyze_types
    }

    pub fn analyzes(&self, family: AnalyzerFamily) -> bool {
        match family {
            AnalyzerFamily::Configuration => self.analyze_configurations,
            AnalyzerFamily::Types => self.analyze_types,
        }
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn include_patterns(&self) -> &BTreeSet<String> {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &BTreeSet<String> {
        &self.exclude_patterns
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn name_filter(&self) -> &NameFilter {
        &self.filter
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfigBuilder {
    analyze_configurations: bool,
    analyze_types: bool,
    validate: bool,
    parallel: bool,
    thread_count: usize,
    include_patterns: BTreeSet<String>,
    exclude_patterns: BTreeSet<String>,
    verbose: bool,
    timeout: Option<Duration>,
}

impl Default for AnalysisConfigBuilder {
    fn default() -> Self {
        Self {
            analyze_configurations: true,
            analyze_types: true,
            validate: false,
            parallel: true,
            thread_count: default_thread_count(),
            include_patterns: BTreeSet::new(),
            exclude_patterns: BTreeSet::new(),
            verbose: false,
            timeout: None,
        }
    }
}

impl AnalysisConfigBuilder {
    pub fn analyze_configurations(mut self, on: bool) -> Self {
        self.analyze_configurations = on;
        self
    }

    pub fn analyze_types(mut self, on: bool) -> Self {
        self.analyze_types = on;
        self
    }

    pub fn validate(mut self, on: bool) -> Self {
        self.validate = on;
        self
    }

    pub fn parallel(mut self, on: bool) -> Self {
        self.parallel = on;
        self
    }

    pub fn thread_count(mut self, threads: usize) -> Self {
        self.thread_count = threads;
        self
    }

    pub fn include_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.include_patterns.insert(pattern.into());
        self
    }

    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.insert(pattern.into());
        self
    }

    pub fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        if !(1..=MAX_THREADS).contains(&self.thread_count) {
            return Err(ConfigError::ThreadCount(self.thread_count));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        let filter = NameFilter::new(&self.include_patterns, &self.exclude_patterns)?;

        Ok(AnalysisConfig {
            analyze_configurations: self.analyze_configurations,
            analyze_types: self.analyze_types,
            validate: self.validate,
            parallel: self.parallel,
            thread_count: self.thread_count,
            include_patterns: self.include_patterns,
            exclude_patterns: self.exclude_patterns,
            verbose: self.verbose,
            timeout: self.timeout,
            filter,
        })
    }

    // Only for presets: no patterns and a clamped thread count cannot fail.
    fn build_unchecked(self) -> AnalysisConfig {
        AnalysisConfig {
            analyze_configurations: self.analyze_configurations,
            analyze_types: self.analyze_types,
            validate: self.validate,
            parallel: self.parallel,
            thread_count: self.thread_count.clamp(1, MAX_THREADS),
            include_patterns: BTreeSet::new(),
            exclude_patterns: BTreeSet::new(),
            verbose: self.verbose,
            timeout: self.timeout.filter(|t| !t.is_zero()),
            filter: NameFilter::default(),
        }
    }
}

pub fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_THREADS)
}

/// Compiled include/exclude patterns, each anchored to the full name.
/// Exclusion wins; a non-empty include list must match.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl NameFilter {
    pub fn new<'a>(
        include: impl IntoIterator<Item = &'a String>,
        exclude: impl IntoIterator<Item = &'a String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn accepts(&self, logical_name: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(logical_name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(logical_name))
    }
}

fn compile_all<'a>(
    patterns: impl IntoIterator<Item = &'a String>,
) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .into_iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
