use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::settings::NameFilter;

pub const CLASS_SUFFIX: &str = ".class";
pub const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    File,
    ArchiveMember,
    DirectoryMember,
}

/// One class-file blob. Immutable once built; cloning shares the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    logical_name: String,
    content: Arc<[u8]>,
    provenance: Provenance,
    provenance_path: String,
}

impl Unit {
    pub fn new(
        logical_name: impl Into<String>,
        content: impl Into<Arc<[u8]>>,
        provenance: Provenance,
        provenance_path: impl Into<String>,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            content: content.into(),
            provenance,
            provenance_path: provenance_path.into(),
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn provenance_path(&self) -> &str {
        &self.provenance_path
    }

    /// Last segment of the dotted logical name.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.logical_name)
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        hex::encode(hasher.finalize())
    }
}

pub fn simple_name(logical_name: &str) -> &str {
    logical_name
        .rsplit_once('.')
        .map_or(logical_name, |(_, simple)| simple)
}

/// Maps an archive entry or relative path such as `a/b/C.class` to `a.b.C`.
pub fn entry_name_to_logical_name(entry_name: &str) -> String {
    entry_name
        .strip_suffix(CLASS_SUFFIX)
        .unwrap_or(entry_name)
        .trim_start_matches(['/', '\\'])
        .replace(['/', '\\'], ".")
}

/// Units indexed by logical name. A later insert with the same name replaces
/// the earlier unit in place, so the list and the index stay one-to-one.
#[derive(Debug, Clone, Default)]
pub struct UnitSet {
    units: Vec<Unit>,
    index: HashMap<String, usize>,
}

impl UnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unit that was replaced, if any.
    pub fn add(&mut self, unit: Unit) -> Option<Unit> {
        match self.index.get(unit.logical_name()) {
            Some(&slot) => {
                let previous = std::mem::replace(&mut self.units[slot], unit);
                let current = &self.units[slot];
                if previous.content() == current.content() {
                    debug!(unit = current.logical_name(), "duplicate unit replaced");
                } else {
                    warn!(
                        unit = current.logical_name(),
                        previous = previous.provenance_path(),
                        current = current.provenance_path(),
                        previous_digest = %previous.digest(),
                        current_digest = %current.digest(),
                        "conflicting unit replaced, keeping the later one"
                    );
                }
                Some(previous)
            }
            None => {
                self.index
                    .insert(unit.logical_name().to_string(), self.units.len());
                self.units.push(unit);
                None
            }
        }
    }

    pub fn add_all(&mut self, units: impl IntoIterator<Item = Unit>) {
        for unit in units {
            self.add(unit);
        }
    }

    pub fn get(&self, logical_name: &str) -> Option<&Unit> {
        self.index.get(logical_name).map(|&slot| &self.units[slot])
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.index.contains_key(logical_name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(Unit::logical_name).collect()
    }

    pub fn filter_by_provenance(&self, provenance: Provenance) -> Vec<&Unit> {
        self.units
            .iter()
            .filter(|u| u.provenance() == provenance)
            .collect()
    }

    /// `pattern` must match the whole logical name.
    pub fn filter_by_name_pattern(&self, pattern: &str) -> Result<Vec<&Unit>, regex::Error> {
        let re = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(self
            .units
            .iter()
            .filter(|u| re.is_match(u.logical_name()))
            .collect())
    }

    pub fn filter_by(&self, filter: &NameFilter) -> Vec<&Unit> {
        self.units
            .iter()
            .filter(|u| filter.accepts(u.logical_name()))
            .collect()
    }
}

impl FromIterator<Unit> for UnitSet {
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        let mut set = Self::new();
        set.add_all(iter);
        set
    }
}

impl<'a> IntoIterator for &'a UnitSet {
    type Item = &'a Unit;
    type IntoIter = std::slice::Iter<'a, Unit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
