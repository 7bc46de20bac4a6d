use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::aggregate::ResultAggregate;
use crate::analyzer::types::OBJECT_TYPE;
use crate::facts::FactKind;
use crate::unit::simple_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    pub severity: Severity,
    pub source: String,
    pub details: String,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        source: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            source: source.into(),
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
    valid: bool,
    summary: String,
}

impl ValidationReport {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        let valid = !issues.iter().any(|i| i.severity >= Severity::Error);
        let summary = if issues.is_empty() {
            "no issues found".to_string()
        } else {
            let counts = [Severity::Critical, Severity::Error, Severity::Warning, Severity::Info]
                .into_iter()
                .filter_map(|s| {
                    let n = issues.iter().filter(|i| i.severity == s).count();
                    (n > 0).then(|| format!("{n} {s}"))
                })
                .collect::<Vec<_>>();
            format!("{} issue(s): {}", issues.len(), counts.join(", "))
        };
        Self {
            issues,
            valid,
            summary,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn issues_by_severity(&self, severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect()
    }
}

/// Runs every consistency check over a closed aggregate.
pub fn validate(aggregate: &ResultAggregate) -> ValidationReport {
    let mut issues = Vec::new();
    check_cross_references(aggregate, &mut issues);
    check_analyzer_failures(aggregate, &mut issues);
    check_option_names(aggregate, &mut issues);
    check_native_peers(aggregate, &mut issues);
    check_supertypes(aggregate, &mut issues);
    if aggregate.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Info,
            "aggregate",
            "no facts were extracted",
            format!("{} unit(s) analyzed", aggregate.metadata().units_analyzed),
        ));
    }
    ValidationReport::new(issues)
}

fn check_cross_references(aggregate: &ResultAggregate, issues: &mut Vec<ValidationIssue>) {
    for xref in aggregate.cross_references().values() {
        for (kind, key) in [
            (xref.source_kind, &xref.source_key),
            (xref.target_kind, &xref.target_key),
        ] {
            if !aggregate.contains(kind, key) {
                issues.push(ValidationIssue::new(
                    Severity::Error,
                    xref.id.as_str(),
                    "cross-reference points at a missing fact",
                    format!("{kind} `{key}` not in aggregate"),
                ));
            }
        }
    }
}

fn check_analyzer_failures(aggregate: &ResultAggregate, issues: &mut Vec<ValidationIssue>) {
    for failure in &aggregate.metadata().unit_failures {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            failure.unit.as_str(),
            format!("{} analyzer contributed no facts", failure.family),
            failure.message.as_str(),
        ));
    }
}

fn check_option_names(aggregate: &ResultAggregate, issues: &mut Vec<ValidationIssue>) {
    if let Some(option) = aggregate.config_options().get("unknown") {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            option.class_name.as_str(),
            "configuration option name could not be derived",
            format!("{} `unknown`", FactKind::ConfigOption),
        ));
    }
}

fn check_native_peers(aggregate: &ResultAggregate, issues: &mut Vec<ValidationIssue>) {
    let models: BTreeSet<&str> = aggregate
        .model_classes()
        .keys()
        .flat_map(|name| [name, simple_name(name)])
        .collect();
    for peer in aggregate.native_peers().values() {
        if !models.contains(peer.model_name.as_str()) {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                peer.name.as_str(),
                "native peer has no matching model class",
                format!("expected model `{}`", peer.model_name),
            ));
        }
    }
}

fn check_supertypes(aggregate: &ResultAggregate, issues: &mut Vec<ValidationIssue>) {
    for info in aggregate.types().values() {
        if info.super_name != OBJECT_TYPE && !aggregate.types().contains_key(&info.super_name) {
            issues.push(ValidationIssue::new(
                Severity::Info,
                info.name.as_str(),
                "supertype is outside the analyzed corpus",
                info.super_name.as_str(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AnalyzerFailure, PartialResult};
    use crate::analyzer::AnalyzerFamily;
    use crate::facts::{Fact, NativePeer};
    use crate::settings::AnalysisConfig;

    #[test]
    fn validity_is_driven_by_error_severity() {
        let report = ValidationReport::new(vec![ValidationIssue::new(
            Severity::Warning,
            "x",
            "warn",
            "",
        )]);
        assert!(report.is_valid());

        let report = ValidationReport::new(vec![
            ValidationIssue::new(Severity::Info, "x", "info", ""),
            ValidationIssue::new(Severity::Critical, "y", "boom", ""),
        ]);
        assert!(!report.is_valid());
        assert_eq!(report.issue_count(), 2);
        assert_eq!(report.issues_by_severity(Severity::Critical).len(), 1);
        assert_eq!(report.summary(), "2 issue(s): 1 critical, 1 info");
    }

    #[test]
    fn empty_aggregate_is_valid_with_info() {
        let aggregate = ResultAggregate::new(AnalysisConfig::default(), None);
        let report = validate(&aggregate);
        assert!(report.is_valid());
        assert_eq!(report.issues_by_severity(Severity::Info).len(), 1);
    }

    #[test]
    fn reports_failures_and_orphan_peers() {
        let mut aggregate = ResultAggregate::new(AnalysisConfig::default(), None);
        aggregate.merge(PartialResult {
            seq: 0,
            unit_name: "gov.nasa.jpf.StringNativePeer".to_string(),
            facts: vec![Fact::NativePeer(NativePeer {
                name: "gov.nasa.jpf.StringNativePeer".to_string(),
                model_name: "StringModel".to_string(),
                model_methods: Vec::new(),
            })],
            failures: vec![AnalyzerFailure {
                unit: "gov.nasa.jpf.Broken".to_string(),
                family: AnalyzerFamily::Types,
                message: "malformed".to_string(),
            }],
        });

        let report = validate(&aggregate);
        assert!(report.is_valid());
        let warnings = report.issues_by_severity(Severity::Warning);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|i| i.source == "gov.nasa.jpf.Broken"));
        assert!(warnings.iter().any(|i| i.details == "expected model `StringModel`"));
    }
}
