use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::coordinator::Phase;
use crate::facts::FactKind;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("source path does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("unsupported container format {}: missing {capability} capability", path.display())]
    UnsupportedFormat { path: PathBuf, capability: String },
    #[error("{} is neither a class file nor a recognized archive", .0.display())]
    Unrecognized(PathBuf),
}

impl ReadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("malformed class header in {unit}: {reason}")]
    MalformedHeader { unit: String, reason: String },
    #[error("analyzer panicked on {unit}: {message}")]
    Panicked { unit: String, message: String },
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to build worker pool during {phase}: {source}")]
    PoolBuild {
        phase: Phase,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
    #[error("unit task lost during {phase}: received {received} of {expected} unit results")]
    WorkerLost {
        phase: Phase,
        expected: usize,
        received: usize,
    },
    #[error("analysis exceeded its {budget:?} budget during {phase}")]
    Timeout { phase: Phase, budget: Duration },
}

impl CoordinatorError {
    pub fn phase(&self) -> Phase {
        match self {
            Self::PoolBuild { phase, .. }
            | Self::WorkerLost { phase, .. }
            | Self::Timeout { phase, .. } => *phase,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{pass} pass: malformed {kind} key {key:?}")]
    MalformedKey {
        pass: &'static str,
        kind: FactKind,
        key: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid name pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("thread count must be between 1 and 32, got {0}")]
    ThreadCount(usize),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Run-level failure for one analyzed source.
#[derive(Debug, Error)]
pub enum AutodocError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}
