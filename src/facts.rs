use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FactKind {
    ConfigOption,
    ConfigAnnotation,
    ChoiceGenerator,
    LoggerConfig,
    TypeInfo,
    ModelClass,
    NativePeer,
    Listener,
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionValue {
    pub value: String,
    pub value_type: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigOption {
    pub name: String,
    pub class_name: String,
    pub value_type: String,
    pub source_method: String,
    pub values: Vec<OptionValue>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigAnnotation {
    pub name: String,
    pub class_name: String,
    pub value_type: String,
    pub value: String,
    pub comment: String,
    pub annotation_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceGenerator {
    pub name: String,
    pub class_name: String,
    pub method_name: String,
    pub generator_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggerConfig {
    pub name: String,
    pub class_name: String,
    pub logger_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub name: String,
    pub super_name: String,
    pub category: String,
    pub interfaces: Vec<String>,
    pub methods: Vec<String>,
    pub major_version: Option<u16>,
}

/// A model class standing in for a standard library class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelClass {
    pub name: String,
    pub std_name: String,
    pub std_methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativePeer {
    pub name: String,
    pub model_name: String,
    pub model_methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub name: String,
    pub listener_type: String,
}

/// One extracted fact, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Fact {
    ConfigOption(ConfigOption),
    ConfigAnnotation(ConfigAnnotation),
    ChoiceGenerator(ChoiceGenerator),
    LoggerConfig(LoggerConfig),
    TypeInfo(TypeInfo),
    ModelClass(ModelClass),
    NativePeer(NativePeer),
    Listener(Listener),
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        match self {
            Self::ConfigOption(_) => FactKind::ConfigOption,
            Self::ConfigAnnotation(_) => FactKind::ConfigAnnotation,
            Self::ChoiceGenerator(_) => FactKind::ChoiceGenerator,
            Self::LoggerConfig(_) => FactKind::LoggerConfig,
            Self::TypeInfo(_) => FactKind::TypeInfo,
            Self::ModelClass(_) => FactKind::ModelClass,
            Self::NativePeer(_) => FactKind::NativePeer,
            Self::Listener(_) => FactKind::Listener,
        }
    }

    /// Natural key used for merge deduplication within the fact's kind.
    pub fn key(&self) -> &str {
        match self {
            Self::ConfigOption(f) => &f.name,
            Self::ConfigAnnotation(f) => &f.name,
            Self::ChoiceGenerator(f) => &f.name,
            Self::LoggerConfig(f) => &f.name,
            Self::TypeInfo(f) => &f.name,
            Self::ModelClass(f) => &f.name,
            Self::NativePeer(f) => &f.name,
            Self::Listener(f) => &f.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamped<T> {
    seq: usize,
    fact: T,
}

/// Facts of one kind keyed by natural key.
///
/// Each entry remembers the dispatch sequence number of the unit that produced
/// it. A put only replaces an entry whose sequence number is not higher, so the
/// later unit wins no matter which worker finished first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactMap<T> {
    entries: BTreeMap<String, Stamped<T>>,
}

impl<T> Default for FactMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> FactMap<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key).map(|s| &s.fact)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|s| &s.fact)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), &s.fact))
    }

    /// Returns false when an entry from a later unit is already present.
    pub(crate) fn put(&mut self, seq: usize, key: String, fact: T) -> bool {
        match self.entries.get_mut(&key) {
            Some(existing) if existing.seq > seq => false,
            Some(existing) => {
                *existing = Stamped { seq, fact };
                true
            }
            None => {
                self.entries.insert(key, Stamped { seq, fact });
                true
            }
        }
    }
}

impl<T: Serialize> Serialize for FactMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, stamped) in &self.entries {
            map.serialize_entry(key, &stamped.fact)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(name: &str, listener_type: &str) -> Listener {
        Listener {
            name: name.to_string(),
            listener_type: listener_type.to_string(),
        }
    }

    #[test]
    fn later_sequence_wins_regardless_of_arrival() {
        let mut in_order = FactMap::default();
        in_order.put(0, "a".to_string(), listener("a", "first"));
        in_order.put(1, "a".to_string(), listener("a", "second"));

        let mut reversed = FactMap::default();
        assert!(reversed.put(1, "a".to_string(), listener("a", "second")));
        assert!(!reversed.put(0, "a".to_string(), listener("a", "first")));

        assert_eq!(in_order, reversed);
        assert_eq!(in_order.get("a").unwrap().listener_type, "second");
        assert_eq!(in_order.len(), 1);
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut map = FactMap::default();
        map.put(3, "gov.nasa.jpf.L".to_string(), listener("gov.nasa.jpf.L", "GenericListener"));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["gov.nasa.jpf.L"]["listener_type"], "GenericListener");
    }

    #[test]
    fn fact_key_and_kind() {
        let fact = Fact::Listener(listener("x.YListener", "GenericListener"));
        assert_eq!(fact.kind(), FactKind::Listener);
        assert_eq!(fact.key(), "x.YListener");
        assert_eq!(FactKind::TypeInfo.to_string(), "TypeInfo");
    }
}
