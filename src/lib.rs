//! # jpf-autodoc
//!
//! Extracts configuration and type metadata from compiled JPF class files and
//! correlates it into one queryable aggregate per source.
//!
//! ## Architecture
//!
//! - **reader**: Turns class files, directories and jar/zip containers into units
//! - **unit**: Units and the deduplicating, name-indexed unit set
//! - **analyzer**: Pluggable per-unit heuristic analyzers (configuration, types)
//! - **facts**: Fact kinds and the per-kind, last-write-wins fact mappings
//! - **coordinator**: Sequential or pooled dispatch, merge, timeout and phases
//! - **resolver**: Cross-reference passes over the closed aggregate
//! - **aggregate**: The merged result with run metadata
//! - **validation**: Consistency checks producing a validation report
//! - **settings**: Immutable analysis configuration and name filters
//! - **config**: Resolution of CLI flags and config files into settings
//! - **site**: jpf-core discovery through `site.properties`

pub mod aggregate;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod facts;
pub mod properties;
pub mod reader;
pub mod resolver;
pub mod settings;
pub mod site;
pub mod unit;
pub mod validation;

pub use aggregate::{CrossReference, Relationship, ResultAggregate};
pub use coordinator::{Coordinator, Phase};
pub use error::{AnalyzerError, AutodocError, ConfigError, CoordinatorError, ReadError};
pub use settings::AnalysisConfig;
pub use unit::{Unit, UnitSet};
