//! The merged result of one run.
//!
//! Callers only ever see `&ResultAggregate`; every mutator is crate-private and
//! driven by the coordinator, so facts can only be added during merge and
//! cross-references only during resolution.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::analyzer::AnalyzerFamily;
use crate::facts::{
    ChoiceGenerator, ConfigAnnotation, ConfigOption, Fact, FactKind, FactMap, Listener,
    LoggerConfig, ModelClass, NativePeer, TypeInfo,
};
use crate::reader::SkippedSource;
use crate::settings::AnalysisConfig;
use crate::validation::ValidationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    Implementation,
    Configuration,
    Inheritance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReference {
    pub id: String,
    pub source_kind: FactKind,
    pub target_kind: FactKind,
    pub source_key: String,
    pub target_key: String,
    pub relationship: Relationship,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzerFailure {
    pub unit: String,
    pub family: AnalyzerFamily,
    pub message: String,
}

/// Facts produced for one unit, tagged with the unit's dispatch position.
#[derive(Debug, Clone, Default)]
pub struct PartialResult {
    pub seq: usize,
    pub unit_name: String,
    pub facts: Vec<Fact>,
    pub failures: Vec<AnalyzerFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub source_path: Option<PathBuf>,
    #[serde(serialize_with = "serialize_millis")]
    pub started_at: SystemTime,
    pub config: AnalysisConfig,
    pub units_analyzed: usize,
    pub unit_failures: Vec<AnalyzerFailure>,
    pub skipped_sources: Vec<SkippedSource>,
}

fn serialize_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(millis)
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultAggregate {
    config_options: FactMap<ConfigOption>,
    config_annotations: FactMap<ConfigAnnotation>,
    choice_generators: FactMap<ChoiceGenerator>,
    loggers: FactMap<LoggerConfig>,
    types: FactMap<TypeInfo>,
    model_classes: FactMap<ModelClass>,
    native_peers: FactMap<NativePeer>,
    listeners: FactMap<Listener>,
    cross_references: BTreeMap<String, CrossReference>,
    validation: Option<ValidationReport>,
    metadata: RunMetadata,
}

impl ResultAggregate {
    pub(crate) fn new(config: AnalysisConfig, source_path: Option<PathBuf>) -> Self {
        Self {
            config_options: FactMap::default(),
            config_annotations: FactMap::default(),
            choice_generators: FactMap::default(),
            loggers: FactMap::default(),
            types: FactMap::default(),
            model_classes: FactMap::default(),
            native_peers: FactMap::default(),
            listeners: FactMap::default(),
            cross_references: BTreeMap::new(),
            validation: None,
            metadata: RunMetadata {
                source_path,
                started_at: SystemTime::now(),
                config,
                units_analyzed: 0,
                unit_failures: Vec::new(),
                skipped_sources: Vec::new(),
            },
        }
    }

    pub fn config_options(&self) -> &FactMap<ConfigOption> {
        &self.config_options
    }

    pub fn config_annotations(&self) -> &FactMap<ConfigAnnotation> {
        &self.config_annotations
    }

    pub fn choice_generators(&self) -> &FactMap<ChoiceGenerator> {
        &self.choice_generators
    }

    pub fn loggers(&self) -> &FactMap<LoggerConfig> {
        &self.loggers
    }

    pub fn types(&self) -> &FactMap<TypeInfo> {
        &self.types
    }

    pub fn model_classes(&self) -> &FactMap<ModelClass> {
        &self.model_classes
    }

    pub fn native_peers(&self) -> &FactMap<NativePeer> {
        &self.native_peers
    }

    pub fn listeners(&self) -> &FactMap<Listener> {
        &self.listeners
    }

    pub fn cross_references(&self) -> &BTreeMap<String, CrossReference> {
        &self.cross_references
    }

    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn has_configurations(&self) -> bool {
        self.total_configurations() > 0
    }

    pub fn has_types(&self) -> bool {
        self.total_types() > 0
    }

    pub fn total_configurations(&self) -> usize {
        self.config_options.len()
            + self.config_annotations.len()
            + self.choice_generators.len()
            + self.loggers.len()
    }

    pub fn total_types(&self) -> usize {
        self.types.len() + self.model_classes.len() + self.native_peers.len() + self.listeners.len()
    }

    pub fn total_facts(&self) -> usize {
        self.total_configurations() + self.total_types()
    }

    pub fn is_empty(&self) -> bool {
        self.total_facts() == 0 && self.cross_references.is_empty()
    }

    pub fn contains(&self, kind: FactKind, key: &str) -> bool {
        match kind {
            FactKind::ConfigOption => self.config_options.contains_key(key),
            FactKind::ConfigAnnotation => self.config_annotations.contains_key(key),
            FactKind::ChoiceGenerator => self.choice_generators.contains_key(key),
            FactKind::LoggerConfig => self.loggers.contains_key(key),
            FactKind::TypeInfo => self.types.contains_key(key),
            FactKind::ModelClass => self.model_classes.contains_key(key),
            FactKind::NativePeer => self.native_peers.contains_key(key),
            FactKind::Listener => self.listeners.contains_key(key),
        }
    }

    /// Sole write path for facts.
    pub(crate) fn merge(&mut self, partial: PartialResult) {
        let seq = partial.seq;
        for fact in partial.facts {
            let key = fact.key().to_string();
            match fact {
                Fact::ConfigOption(f) => self.config_options.put(seq, key, f),
                Fact::ConfigAnnotation(f) => self.config_annotations.put(seq, key, f),
                Fact::ChoiceGenerator(f) => self.choice_generators.put(seq, key, f),
                Fact::LoggerConfig(f) => self.loggers.put(seq, key, f),
                Fact::TypeInfo(f) => self.types.put(seq, key, f),
                Fact::ModelClass(f) => self.model_classes.put(seq, key, f),
                Fact::NativePeer(f) => self.native_peers.put(seq, key, f),
                Fact::Listener(f) => self.listeners.put(seq, key, f),
            };
        }
        self.metadata.unit_failures.extend(partial.failures);
        self.metadata.units_analyzed += 1;
    }

    pub(crate) fn add_cross_reference(&mut self, xref: CrossReference) {
        self.cross_references.insert(xref.id.clone(), xref);
    }

    pub(crate) fn record_skipped(&mut self, skipped: Vec<SkippedSource>) {
        self.metadata.skipped_sources.extend(skipped);
    }

    pub(crate) fn set_validation(&mut self, report: ValidationReport) {
        self.validation = Some(report);
    }

    // Workers finish in any order; sort so reruns compare equal.
    pub(crate) fn sort_failures(&mut self) {
        self.metadata
            .unit_failures
            .sort_by(|a, b| (&a.unit, a.family).cmp(&(&b.unit, b.family)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(name: &str) -> Fact {
        Fact::Listener(Listener {
            name: name.to_string(),
            listener_type: "GenericListener".to_string(),
        })
    }

    fn partial(seq: usize, facts: Vec<Fact>) -> PartialResult {
        PartialResult {
            seq,
            unit_name: format!("unit{seq}"),
            facts,
            failures: Vec::new(),
        }
    }

    #[test]
    fn merge_routes_facts_by_kind() {
        let mut aggregate = ResultAggregate::new(AnalysisConfig::default(), None);
        assert!(aggregate.is_empty());

        aggregate.merge(partial(
            0,
            vec![
                listener("gov.nasa.jpf.AListener"),
                Fact::LoggerConfig(LoggerConfig {
                    name: "JPF".to_string(),
                    class_name: "gov.nasa.jpf.JPFLogger".to_string(),
                    logger_type: "Logger".to_string(),
                }),
            ],
        ));

        assert!(aggregate.has_types());
        assert!(aggregate.has_configurations());
        assert_eq!(aggregate.total_types(), 1);
        assert_eq!(aggregate.total_configurations(), 1);
        assert!(aggregate.contains(FactKind::Listener, "gov.nasa.jpf.AListener"));
        assert!(aggregate.contains(FactKind::LoggerConfig, "JPF"));
        assert!(!aggregate.contains(FactKind::TypeInfo, "gov.nasa.jpf.AListener"));
        assert_eq!(aggregate.metadata().units_analyzed, 1);
    }

    #[test]
    fn duplicate_keys_collapse_to_later_unit() {
        let mut aggregate = ResultAggregate::new(AnalysisConfig::default(), None);
        aggregate.merge(partial(1, vec![listener("a.Listener")]));
        aggregate.merge(partial(0, vec![listener("a.Listener")]));
        assert_eq!(aggregate.listeners().len(), 1);
        assert_eq!(aggregate.total_facts(), 1);
    }

    #[test]
    fn serializes_relationship_in_upper_case() {
        let xref = CrossReference {
            id: "xref-00000001".to_string(),
            source_kind: FactKind::TypeInfo,
            target_kind: FactKind::TypeInfo,
            source_key: "a.B".to_string(),
            target_key: "a.C".to_string(),
            relationship: Relationship::Inheritance,
        };
        let json = serde_json::to_value(&xref).unwrap();
        assert_eq!(json["relationship"], "INHERITANCE");
        assert_eq!(json["source_kind"], "TypeInfo");
    }
}
