//! Locating a local jpf-core checkout through `site.properties`.
//!
//! Lookup is an explicit `enabled` flag on the value, so tests and the
//! `--no-site` flag build a disabled instance instead of toggling global state.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::properties::load_properties;

pub const JPF_CORE_KEY: &str = "jpf-core";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProperties {
    enabled: bool,
    locations: Vec<PathBuf>,
}

impl SiteProperties {
    pub fn new(locations: Vec<PathBuf>) -> Self {
        Self {
            enabled: true,
            locations,
        }
    }

    /// `../site.properties`, then `~/.jpf/site.properties`.
    pub fn standard() -> Self {
        let mut locations = vec![PathBuf::from("..").join("site.properties")];
        if let Some(home) = dirs::home_dir() {
            locations.push(home.join(".jpf").join("site.properties"));
        }
        Self::new(locations)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            locations: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    /// First non-blank `jpf-core` entry across the locations, resolved.
    pub fn jpf_core_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.locations
            .iter()
            .find_map(|location| read_jpf_core(location))
    }

    pub fn jpf_core_jar_locations(&self) -> Vec<PathBuf> {
        self.jpf_core_path()
            .map(|core| jar_candidates(&core).to_vec())
            .unwrap_or_default()
    }

    /// First candidate jar that exists on disk.
    pub fn jpf_core_jar(&self) -> Option<PathBuf> {
        self.jpf_core_jar_locations()
            .into_iter()
            .find(|p| p.is_file())
    }
}

fn jar_candidates(core: &Path) -> [PathBuf; 2] {
    [
        core.join("build")
            .join("libs")
            .join("jpf-core-DEVELOPMENT-SNAPSHOT.jar"),
        core.join("build").join("jpf.jar"),
    ]
}

fn read_jpf_core(location: &Path) -> Option<PathBuf> {
    if !location.is_file() {
        return None;
    }
    match load_properties(location) {
        Ok(props) => {
            let raw = props.get(JPF_CORE_KEY)?;
            if raw.trim().is_empty() {
                return None;
            }
            let resolved = resolve_path(raw);
            debug!(location = %location.display(), jpf_core = %resolved, "site properties found");
            Some(PathBuf::from(resolved))
        }
        Err(err) => {
            warn!(location = %location.display(), error = %err, "could not read site properties");
            None
        }
    }
}

/// Expands `${user.home}` and drops `${jpf-core}`, which would refer to itself.
pub fn resolve_path(raw: &str) -> String {
    let mut resolved = raw.to_string();
    if resolved.contains("${user.home}") {
        let home = dirs::home_dir()
            .map(|h| h.display().to_string())
            .unwrap_or_default();
        resolved = resolved.replace("${user.home}", &home);
    }
    resolved.replace("${jpf-core}", "").trim().to_string()
}
