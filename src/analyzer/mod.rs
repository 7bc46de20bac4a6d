//! Per-unit analyzers.
//!
//! An analyzer is a pure function from one [`Unit`] to a list of facts. Both
//! families shipped here are instances of [`HeuristicAnalyzer`]: a scope
//! predicate plus an explicit table of [`Classifier`]s, each a predicate and a
//! constructor. Swapping a classifier, or replacing the whole table with a
//! structural parser, never touches the coordinator.

pub mod configuration;
pub mod types;

use serde::Serialize;
use std::fmt;

use crate::error::AnalyzerError;
use crate::facts::Fact;
use crate::unit::{CLASS_MAGIC, Unit};

pub use configuration::configuration_analyzer;
pub use types::type_analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerFamily {
    Configuration,
    Types,
}

impl fmt::Display for AnalyzerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => f.write_str("configuration"),
            Self::Types => f.write_str("types"),
        }
    }
}

pub trait Analyzer: Send + Sync {
    fn family(&self) -> AnalyzerFamily;

    /// Appends facts for `unit` to `sink`. On error the caller discards
    /// whatever this call appended.
    fn analyze(&self, unit: &Unit, sink: &mut Vec<Fact>) -> Result<(), AnalyzerError>;
}

/// Both built-in analyzers, in dispatch order.
pub fn default_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(configuration_analyzer()),
        Box::new(type_analyzer()),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassHeader {
    pub major_version: Option<u16>,
}

/// Checks the class-file magic. Empty content carries no header and is
/// classified by name alone.
pub fn probe_header(unit: &Unit) -> Result<Option<ClassHeader>, AnalyzerError> {
    let bytes = unit.content();
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() < CLASS_MAGIC.len() || bytes[..CLASS_MAGIC.len()] != CLASS_MAGIC {
        return Err(AnalyzerError::MalformedHeader {
            unit: unit.logical_name().to_string(),
            reason: "missing CAFEBABE magic".to_string(),
        });
    }
    let major_version = bytes
        .get(6..8)
        .map(|b| u16::from_be_bytes([b[0], b[1]]));
    Ok(Some(ClassHeader { major_version }))
}

/// What a classifier gets to look at.
#[derive(Debug)]
pub struct Subject<'a> {
    pub unit: &'a Unit,
    pub header: Option<ClassHeader>,
}

impl Subject<'_> {
    pub fn class_name(&self) -> &str {
        self.unit.logical_name()
    }

    pub fn simple_name(&self) -> &str {
        self.unit.simple_name()
    }

    pub fn name_contains_any(&self, needles: &[&str]) -> bool {
        let name = self.class_name();
        needles.iter().any(|n| name.contains(n))
    }
}

#[derive(Clone, Copy)]
pub struct Classifier {
    pub label: &'static str,
    pub matches: fn(&Subject<'_>) -> bool,
    pub build: fn(&Subject<'_>) -> Fact,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    family: AnalyzerFamily,
    scope: fn(&str) -> bool,
    classifiers: Vec<Classifier>,
}

impl HeuristicAnalyzer {
    pub fn new(family: AnalyzerFamily, scope: fn(&str) -> bool) -> Self {
        Self {
            family,
            scope,
            classifiers: Vec::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifiers.push(classifier);
        self
    }

    /// Replaces the classifier with the same label, or appends it.
    pub fn replace_classifier(mut self, classifier: Classifier) -> Self {
        match self
            .classifiers
            .iter_mut()
            .find(|c| c.label == classifier.label)
        {
            Some(slot) => *slot = classifier,
            None => self.classifiers.push(classifier),
        }
        self
    }

    pub fn without_classifier(mut self, label: &str) -> Self {
        self.classifiers.retain(|c| c.label != label);
        self
    }

    pub fn classifier_labels(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.label).collect()
    }

    pub fn in_scope(&self, class_name: &str) -> bool {
        (self.scope)(class_name)
    }
}

impl Analyzer for HeuristicAnalyzer {
    fn family(&self) -> AnalyzerFamily {
        self.family
    }

    fn analyze(&self, unit: &Unit, sink: &mut Vec<Fact>) -> Result<(), AnalyzerError> {
        let header = probe_header(unit)?;
        if !self.in_scope(unit.logical_name()) {
            return Ok(());
        }
        let subject = Subject { unit, header };
        sink.extend(
            self.classifiers
                .iter()
                .filter(|c| (c.matches)(&subject))
                .map(|c| (c.build)(&subject)),
        );
        Ok(())
    }
}

/// Removes every occurrence of any token in one left-to-right pass. At each
/// position the first listed token that matches wins.
pub(crate) fn strip_tokens(name: &str, tokens: &[&str]) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    'scan: while let Some(ch) = rest.chars().next() {
        for token in tokens {
            if !token.is_empty()
                && let Some(after) = rest.strip_prefix(token)
            {
                rest = after;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

pub(crate) fn or_unknown(name: String) -> String {
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}
