//! Cross-reference resolution over a closed aggregate.
//!
//! Four independent correlation passes read the fact mappings and propose
//! links; the resolver stamps each link with a fresh id and inserts it. A pass
//! that fails is logged and skipped, the remaining passes still run.

use tracing::{debug, warn};

use crate::aggregate::{CrossReference, Relationship, ResultAggregate};
use crate::error::ResolveError;
use crate::facts::FactKind;
use crate::unit::simple_name;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    source_kind: FactKind,
    target_kind: FactKind,
    source_key: String,
    target_key: String,
    relationship: Relationship,
}

type Pass = fn(&ResultAggregate) -> Result<Vec<Link>, ResolveError>;

const PASSES: [(&str, Pass); 4] = [
    ("config-type", config_type_links),
    ("listener-config", listener_config_links),
    ("model-peer", model_peer_links),
    ("inheritance", inheritance_links),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub added: usize,
    pub failed: Vec<ResolveError>,
}

/// Issues ids `xref-00000001`, `xref-00000002`, ... for one run.
#[derive(Debug, Default)]
pub struct CrossReferenceResolver {
    next_id: u64,
}

impl CrossReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, aggregate: &mut ResultAggregate) -> ResolveOutcome {
        let mut outcome = ResolveOutcome::default();
        for (name, pass) in PASSES {
            match pass(aggregate) {
                Ok(links) => {
                    debug!(pass = name, links = links.len(), "correlation pass finished");
                    outcome.added += links.len();
                    for link in links {
                        let xref = self.stamp(link);
                        aggregate.add_cross_reference(xref);
                    }
                }
                Err(err) => {
                    warn!(pass = name, error = %err, "correlation pass failed, skipping");
                    outcome.failed.push(err);
                }
            }
        }
        outcome
    }

    fn stamp(&mut self, link: Link) -> CrossReference {
        self.next_id += 1;
        CrossReference {
            id: format!("xref-{:08}", self.next_id),
            source_kind: link.source_kind,
            target_kind: link.target_kind,
            source_key: link.source_key,
            target_key: link.target_key,
            relationship: link.relationship,
        }
    }
}

fn checked<'a>(pass: &'static str, kind: FactKind, key: &'a str) -> Result<&'a str, ResolveError> {
    if key.trim().is_empty() {
        return Err(ResolveError::MalformedKey {
            pass,
            kind,
            key: key.to_string(),
        });
    }
    Ok(key)
}

fn link(
    (source_kind, source_key): (FactKind, &str),
    (target_kind, target_key): (FactKind, &str),
    relationship: Relationship,
) -> Link {
    Link {
        source_kind,
        target_kind,
        source_key: source_key.to_string(),
        target_key: target_key.to_string(),
        relationship,
    }
}

// An option implemented by the type it was read from.
fn config_type_links(aggregate: &ResultAggregate) -> Result<Vec<Link>, ResolveError> {
    const PASS: &str = "config-type";
    let mut links = Vec::new();
    for (option_key, option) in aggregate.config_options().iter() {
        let option_key = checked(PASS, FactKind::ConfigOption, option_key)?;
        for type_key in aggregate.types().keys() {
            let type_key = checked(PASS, FactKind::TypeInfo, type_key)?;
            if option.class_name == type_key {
                links.push(link(
                    (FactKind::ConfigOption, option_key),
                    (FactKind::TypeInfo, type_key),
                    Relationship::Implementation,
                ));
            }
        }
    }
    Ok(links)
}

fn listener_config_links(aggregate: &ResultAggregate) -> Result<Vec<Link>, ResolveError> {
    const PASS: &str = "listener-config";
    let mut links = Vec::new();
    for listener_key in aggregate.listeners().keys() {
        let listener_key = checked(PASS, FactKind::Listener, listener_key)?;
        for (option_key, option) in aggregate.config_options().iter() {
            let option_key = checked(PASS, FactKind::ConfigOption, option_key)?;
            if option.class_name.contains("Listener") || listener_key.contains(option_key) {
                links.push(link(
                    (FactKind::Listener, listener_key),
                    (FactKind::ConfigOption, option_key),
                    Relationship::Configuration,
                ));
            }
        }
    }
    Ok(links)
}

// Peers name their model by simple name, so both forms are accepted.
fn model_peer_links(aggregate: &ResultAggregate) -> Result<Vec<Link>, ResolveError> {
    const PASS: &str = "model-peer";
    let mut links = Vec::new();
    for (model_key, model) in aggregate.model_classes().iter() {
        let model_key = checked(PASS, FactKind::ModelClass, model_key)?;
        for (peer_key, peer) in aggregate.native_peers().iter() {
            let peer_key = checked(PASS, FactKind::NativePeer, peer_key)?;
            if peer.model_name == model_key
                || peer.model_name == simple_name(model_key)
                || model.std_name.contains(peer_key)
            {
                links.push(link(
                    (FactKind::ModelClass, model_key),
                    (FactKind::NativePeer, peer_key),
                    Relationship::Implementation,
                ));
            }
        }
    }
    Ok(links)
}

fn inheritance_links(aggregate: &ResultAggregate) -> Result<Vec<Link>, ResolveError> {
    const PASS: &str = "inheritance";
    let types = aggregate.types();
    let mut links = Vec::new();
    for (sub_key, sub) in types.iter() {
        let sub_key = checked(PASS, FactKind::TypeInfo, sub_key)?;
        if sub.super_name == sub_key {
            continue;
        }
        if types.contains_key(&sub.super_name) {
            links.push(link(
                (FactKind::TypeInfo, sub_key),
                (FactKind::TypeInfo, sub.super_name.as_str()),
                Relationship::Inheritance,
            ));
        }
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PartialResult;
    use crate::facts::{ConfigOption, Fact, Listener, ModelClass, NativePeer, TypeInfo};
    use crate::settings::AnalysisConfig;

    fn type_info(name: &str, super_name: &str) -> Fact {
        Fact::TypeInfo(TypeInfo {
            name: name.to_string(),
            super_name: super_name.to_string(),
            category: "Listener".to_string(),
            interfaces: Vec::new(),
            methods: Vec::new(),
            major_version: None,
        })
    }

    fn option(name: &str, class_name: &str) -> Fact {
        Fact::ConfigOption(ConfigOption {
            name: name.to_string(),
            class_name: class_name.to_string(),
            value_type: "String".to_string(),
            source_method: format!("get{name}Option"),
            values: Vec::new(),
            comment: String::new(),
        })
    }

    fn aggregate_of(facts: Vec<Fact>) -> ResultAggregate {
        let mut aggregate = ResultAggregate::new(AnalysisConfig::default(), None);
        aggregate.merge(PartialResult {
            seq: 0,
            unit_name: "test".to_string(),
            facts,
            failures: Vec::new(),
        });
        aggregate
    }

    fn relationships(aggregate: &ResultAggregate) -> Vec<Relationship> {
        aggregate
            .cross_references()
            .values()
            .map(|x| x.relationship)
            .collect()
    }

    #[test]
    fn inheritance_links_subtype_to_declared_supertype() {
        let mut aggregate = aggregate_of(vec![
            type_info("gov.nasa.jpf.Listener", "gov.nasa.jpf.Listener"),
            type_info("gov.nasa.jpf.search.SearchListener", "gov.nasa.jpf.Listener"),
        ]);
        let outcome = CrossReferenceResolver::new().resolve(&mut aggregate);
        assert_eq!(outcome.added, 1);
        assert!(outcome.failed.is_empty());

        let xref = aggregate.cross_references().get("xref-00000001").unwrap();
        assert_eq!(xref.relationship, Relationship::Inheritance);
        assert_eq!(xref.source_key, "gov.nasa.jpf.search.SearchListener");
        assert_eq!(xref.target_key, "gov.nasa.jpf.Listener");
    }

    #[test]
    fn config_and_listener_passes_do_not_dedup() {
        let mut aggregate = aggregate_of(vec![
            option("search", "gov.nasa.jpf.SearchConfigListener"),
            type_info("gov.nasa.jpf.SearchConfigListener", "gov.nasa.jpf.Object"),
            Fact::Listener(Listener {
                name: "gov.nasa.jpf.SearchConfigListener".to_string(),
                listener_type: "SearchListener".to_string(),
            }),
        ]);
        CrossReferenceResolver::new().resolve(&mut aggregate);
        assert_eq!(
            relationships(&aggregate),
            vec![Relationship::Implementation, Relationship::Configuration]
        );
    }

    #[test]
    fn model_peer_matches_on_simple_model_name() {
        let mut aggregate = aggregate_of(vec![
            Fact::ModelClass(ModelClass {
                name: "gov.nasa.jpf.vm.StringModel".to_string(),
                std_name: "java.lang.String".to_string(),
                std_methods: Vec::new(),
            }),
            Fact::NativePeer(NativePeer {
                name: "gov.nasa.jpf.vm.StringNativePeer".to_string(),
                model_name: "StringModel".to_string(),
                model_methods: Vec::new(),
            }),
        ]);
        CrossReferenceResolver::new().resolve(&mut aggregate);
        assert_eq!(relationships(&aggregate), vec![Relationship::Implementation]);
    }

    #[test]
    fn failing_pass_does_not_stop_the_others() {
        let mut aggregate = aggregate_of(vec![
            Fact::ModelClass(ModelClass {
                name: " ".to_string(),
                std_name: "java.lang.".to_string(),
                std_methods: Vec::new(),
            }),
            type_info("gov.nasa.jpf.Listener", "java.lang.Object"),
            type_info("gov.nasa.jpf.AListener", "gov.nasa.jpf.Listener"),
        ]);
        let outcome = CrossReferenceResolver::new().resolve(&mut aggregate);
        assert_eq!(outcome.failed.len(), 1);
        assert!(matches!(
            outcome.failed[0],
            ResolveError::MalformedKey { pass: "model-peer", kind: FactKind::ModelClass, .. }
        ));
        assert_eq!(relationships(&aggregate), vec![Relationship::Inheritance]);
    }

    #[test]
    fn every_endpoint_exists_in_the_aggregate() {
        let mut aggregate = aggregate_of(vec![
            option("search", "gov.nasa.jpf.SearchListener"),
            type_info("gov.nasa.jpf.Listener", "java.lang.Object"),
            type_info("gov.nasa.jpf.SearchListener", "gov.nasa.jpf.Listener"),
            Fact::Listener(Listener {
                name: "gov.nasa.jpf.SearchListener".to_string(),
                listener_type: "SearchListener".to_string(),
            }),
        ]);
        CrossReferenceResolver::new().resolve(&mut aggregate);
        assert!(!aggregate.cross_references().is_empty());
        for xref in aggregate.cross_references().values() {
            assert!(aggregate.contains(xref.source_kind, &xref.source_key));
            assert!(aggregate.contains(xref.target_kind, &xref.target_key));
        }
    }
}
