//! Type-side classifiers: type info, model classes, native peers and
//! listeners.

use super::{AnalyzerFamily, Classifier, HeuristicAnalyzer, Subject, strip_tokens};
use crate::facts::{Fact, Listener, ModelClass, NativePeer, TypeInfo};

pub const OBJECT_TYPE: &str = "java.lang.Object";

pub fn type_analyzer() -> HeuristicAnalyzer {
    HeuristicAnalyzer::new(AnalyzerFamily::Types, in_scope)
        .with_classifier(TYPE_INFO)
        .with_classifier(MODEL_CLASS)
        .with_classifier(NATIVE_PEER)
        .with_classifier(LISTENER)
}

fn in_scope(class_name: &str) -> bool {
    class_name.contains("gov.nasa.jpf")
}

pub const TYPE_INFO: Classifier = Classifier {
    label: "type-info",
    matches: has_category,
    build: build_type_info,
};

pub const MODEL_CLASS: Classifier = Classifier {
    label: "model-class",
    matches: names_model,
    build: build_model_class,
};

pub const NATIVE_PEER: Classifier = Classifier {
    label: "native-peer",
    matches: names_peer,
    build: build_native_peer,
};

pub const LISTENER: Classifier = Classifier {
    label: "listener",
    matches: names_listener,
    build: build_listener,
};

// First match wins.
const CATEGORIES: [(&str, &str); 6] = [
    ("Listener", "Listener"),
    ("InstructionFactory", "InstructionFactory"),
    ("NativePeer", "NativePeer"),
    ("Model", "ModelClass"),
    ("ChoiceGenerator", "ChoiceGenerator"),
    ("Config", "Configuration"),
];

const SUPERTYPES: [(&str, &str); 4] = [
    ("Listener", "gov.nasa.jpf.Listener"),
    ("InstructionFactory", "gov.nasa.jpf.InstructionFactory"),
    ("NativePeer", "gov.nasa.jpf.NativePeer"),
    ("ChoiceGenerator", "gov.nasa.jpf.ChoiceGenerator"),
];

const LISTENER_TYPES: [(&str, &str); 4] = [
    ("Search", "SearchListener"),
    ("Property", "PropertyListener"),
    ("Error", "ErrorListener"),
    ("State", "StateListener"),
];

fn first_match(class_name: &str, table: &[(&str, &'static str)]) -> Option<&'static str> {
    table
        .iter()
        .find(|(needle, _)| class_name.contains(needle))
        .map(|&(_, value)| value)
}

pub fn category(class_name: &str) -> Option<&'static str> {
    first_match(class_name, &CATEGORIES)
}

pub fn declared_supertype(class_name: &str) -> &'static str {
    first_match(class_name, &SUPERTYPES).unwrap_or(OBJECT_TYPE)
}

pub fn listener_type(class_name: &str) -> &'static str {
    first_match(class_name, &LISTENER_TYPES).unwrap_or("GenericListener")
}

fn object_methods() -> Vec<String> {
    ["toString", "equals", "hashCode"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn has_category(s: &Subject<'_>) -> bool {
    category(s.class_name()).is_some()
}

fn names_model(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["Model", "model"])
}

fn names_peer(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["NativePeer", "Peer"])
}

fn names_listener(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["Listener", "listener"])
}

fn build_type_info(s: &Subject<'_>) -> Fact {
    let name = s.class_name();
    Fact::TypeInfo(TypeInfo {
        name: name.to_string(),
        super_name: declared_supertype(name).to_string(),
        category: category(name).unwrap_or_default().to_string(),
        interfaces: vec!["java.io.Serializable".to_string()],
        methods: object_methods(),
        major_version: s.header.and_then(|h| h.major_version),
    })
}

fn build_model_class(s: &Subject<'_>) -> Fact {
    Fact::ModelClass(ModelClass {
        name: s.class_name().to_string(),
        std_name: format!("java.lang.{}", strip_tokens(s.simple_name(), &["Model", "Peer"])),
        std_methods: object_methods(),
    })
}

fn build_native_peer(s: &Subject<'_>) -> Fact {
    Fact::NativePeer(NativePeer {
        name: s.class_name().to_string(),
        model_name: format!("{}Model", strip_tokens(s.simple_name(), &["NativePeer", "Peer"])),
        model_methods: vec!["nativeMethod".to_string(), "getPeer".to_string()],
    })
}

fn build_listener(s: &Subject<'_>) -> Fact {
    Fact::Listener(Listener {
        name: s.class_name().to_string(),
        listener_type: listener_type(s.class_name()).to_string(),
    })
}
