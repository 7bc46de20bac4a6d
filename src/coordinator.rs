//! Drives one analysis run.
//!
//! A run moves through `Idle -> Dispatching -> Merging -> CrossReferencing ->
//! Validating -> Done` and never goes back. In parallel mode units are analyzed
//! on a bounded rayon pool while the calling thread is the only writer to the
//! aggregate: workers send per-unit partial results over a channel and the
//! caller merges them as they arrive. The pool scope ends before resolution
//! starts, so the resolver always sees a closed aggregate.

use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::aggregate::{AnalyzerFailure, PartialResult, ResultAggregate};
use crate::analyzer::{Analyzer, default_analyzers};
use crate::error::{AnalyzerError, AutodocError, CoordinatorError};
use crate::reader;
use crate::resolver::CrossReferenceResolver;
use crate::settings::AnalysisConfig;
use crate::unit::{Unit, UnitSet};
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Dispatching,
    Merging,
    CrossReferencing,
    Validating,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Merging => "merging",
            Self::CrossReferencing => "cross-referencing",
            Self::Validating => "validating",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
struct RunState {
    phase: Phase,
}

impl RunState {
    fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "phase {next} after {}", self.phase);
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }
}

/// Wall-clock budget for a whole run, reading included.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// `None` when there is no budget.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .map(|budget| budget.saturating_sub(self.start.elapsed()))
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    fn check(&self, phase: Phase) -> Result<(), CoordinatorError> {
        match self.budget {
            Some(budget) if self.expired() => Err(CoordinatorError::Timeout { phase, budget }),
            _ => Ok(()),
        }
    }

    fn timeout(&self, phase: Phase) -> CoordinatorError {
        CoordinatorError::Timeout {
            phase,
            budget: self.budget.unwrap_or_default(),
        }
    }
}

pub struct Coordinator {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families: Vec<_> = self.analyzers.iter().map(|a| a.family()).collect();
        f.debug_struct("Coordinator")
            .field("analyzers", &families)
            .finish()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self::with_analyzers(default_analyzers())
    }

    pub fn with_analyzers(analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        Self { analyzers }
    }

    /// Analyzes an already-built unit set. The config's name filter is applied
    /// before dispatch.
    pub fn run(
        &self,
        units: &UnitSet,
        config: &AnalysisConfig,
    ) -> Result<ResultAggregate, CoordinatorError> {
        let aggregate = ResultAggregate::new(config.clone(), None);
        self.execute(units, config, aggregate, Deadline::new(config.timeout()))
    }

    /// Reads one source and analyzes it. The timeout budget starts before
    /// reading.
    pub fn analyze_source(
        &self,
        path: &Path,
        config: &AnalysisConfig,
    ) -> Result<ResultAggregate, AutodocError> {
        let deadline = Deadline::new(config.timeout());
        let report = reader::read_path(path)?;
        info!(
            source = %path.display(),
            units = report.units.len(),
            skipped = report.skipped.len(),
            "source read"
        );

        let units: UnitSet = report.units.into_iter().collect();
        let mut aggregate = ResultAggregate::new(config.clone(), Some(path.to_path_buf()));
        aggregate.record_skipped(report.skipped);
        Ok(self.execute(&units, config, aggregate, deadline)?)
    }

    /// One independent run per source; a failing source does not stop the
    /// others.
    pub fn analyze_sources<P: AsRef<Path>>(
        &self,
        paths: &[P],
        config: &AnalysisConfig,
    ) -> Vec<(PathBuf, Result<ResultAggregate, AutodocError>)> {
        paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let result = self.analyze_source(path, config);
                if let Err(err) = &result {
                    warn!(source = %path.display(), error = %err, "source analysis failed");
                }
                (path.to_path_buf(), result)
            })
            .collect()
    }

    fn execute(
        &self,
        units: &UnitSet,
        config: &AnalysisConfig,
        mut aggregate: ResultAggregate,
        deadline: Deadline,
    ) -> Result<ResultAggregate, CoordinatorError> {
        let mut state = RunState::new();
        let active: Vec<&dyn Analyzer> = self
            .analyzers
            .iter()
            .filter(|a| config.analyzes(a.family()))
            .map(|a| a.as_ref())
            .collect();
        let selected = units.filter_by(config.name_filter());
        debug!(
            units = units.len(),
            selected = selected.len(),
            analyzers = active.len(),
            parallel = config.parallel(),
            "starting analysis"
        );

        state.advance(Phase::Dispatching);
        deadline.check(Phase::Dispatching)?;
        if config.parallel() {
            dispatch_parallel(&selected, &active, config, &deadline, &mut state, &mut aggregate)?;
        } else {
            dispatch_sequential(&selected, &active, config, &deadline, &mut state, &mut aggregate)?;
        }
        aggregate.sort_failures();

        if config.analyze_types() {
            state.advance(Phase::CrossReferencing);
            deadline.check(Phase::CrossReferencing)?;
            let outcome = CrossReferenceResolver::new().resolve(&mut aggregate);
            debug!(
                added = outcome.added,
                failed_passes = outcome.failed.len(),
                "cross-references resolved"
            );
            deadline.check(Phase::CrossReferencing)?;
        }

        if config.validate() {
            state.advance(Phase::Validating);
            let report = validation::validate(&aggregate);
            if !report.is_valid() {
                warn!(summary = report.summary(), "validation found errors");
            }
            aggregate.set_validation(report);
        }

        state.advance(Phase::Done);
        info!(
            units = aggregate.metadata().units_analyzed,
            configurations = aggregate.total_configurations(),
            types = aggregate.total_types(),
            cross_references = aggregate.cross_references().len(),
            failures = aggregate.metadata().unit_failures.len(),
            "analysis complete"
        );
        Ok(aggregate)
    }
}

fn dispatch_sequential(
    units: &[&Unit],
    analyzers: &[&dyn Analyzer],
    config: &AnalysisConfig,
    deadline: &Deadline,
    state: &mut RunState,
    aggregate: &mut ResultAggregate,
) -> Result<(), CoordinatorError> {
    for (seq, unit) in units.iter().enumerate() {
        deadline.check(Phase::Dispatching)?;
        let Some(partial) = guarded_unit(seq, unit, analyzers) else {
            return Err(CoordinatorError::WorkerLost {
                phase: Phase::Dispatching,
                expected: units.len(),
                received: seq,
            });
        };
        log_progress(config, &partial);
        aggregate.merge(partial);
    }
    state.advance(Phase::Merging);
    Ok(())
}

fn dispatch_parallel(
    units: &[&Unit],
    analyzers: &[&dyn Analyzer],
    config: &AnalysisConfig,
    deadline: &Deadline,
    state: &mut RunState,
    aggregate: &mut ResultAggregate,
) -> Result<(), CoordinatorError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.thread_count())
        .thread_name(|i| format!("autodoc-worker-{i}"))
        .build()
        .map_err(|source| CoordinatorError::PoolBuild {
            phase: Phase::Dispatching,
            source,
        })?;
    let cancelled = AtomicBool::new(false);
    let expected = units.len();
    let (tx, rx) = mpsc::channel::<PartialResult>();

    // The scope does not return until every spawned task has finished, on the
    // error paths too.
    pool.in_place_scope(|scope| {
        for (seq, &unit) in units.iter().enumerate() {
            let tx = tx.clone();
            let cancelled = &cancelled;
            scope.spawn(move |_| {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                if let Some(partial) = guarded_unit(seq, unit, analyzers) {
                    let _ = tx.send(partial);
                }
            });
        }
        drop(tx);
        state.advance(Phase::Merging);

        let mut received = 0;
        while received < expected {
            let next = match deadline.remaining() {
                Some(left) => rx.recv_timeout(left),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(partial) => {
                    received += 1;
                    log_progress(config, &partial);
                    aggregate.merge(partial);
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancelled.store(true, Ordering::Relaxed);
                    warn!(received, expected, "run budget exhausted, cancelling queued units");
                    return Err(deadline.timeout(Phase::Merging));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CoordinatorError::WorkerLost {
                        phase: Phase::Merging,
                        expected,
                        received,
                    });
                }
            }
        }
        Ok(())
    })
}

/// `None` when the per-unit machinery itself panicked, outside any single
/// analyzer call. The missing partial result surfaces as `WorkerLost`.
fn guarded_unit(seq: usize, unit: &Unit, analyzers: &[&dyn Analyzer]) -> Option<PartialResult> {
    match catch_unwind(AssertUnwindSafe(|| analyze_unit(seq, unit, analyzers))) {
        Ok(partial) => Some(partial),
        Err(payload) => {
            error!(
                unit = unit.logical_name(),
                panic = %panic_message(&*payload),
                "unit task panicked"
            );
            None
        }
    }
}

/// Runs every analyzer on one unit. A failing or panicking analyzer is
/// recorded and contributes nothing; the others still run.
fn analyze_unit(seq: usize, unit: &Unit, analyzers: &[&dyn Analyzer]) -> PartialResult {
    let mut partial = PartialResult {
        seq,
        unit_name: unit.logical_name().to_string(),
        ..PartialResult::default()
    };
    for analyzer in analyzers {
        let mut sink = Vec::new();
        let outcome = catch_unwind(AssertUnwindSafe(|| analyzer.analyze(unit, &mut sink)))
            .unwrap_or_else(|payload| {
                Err(AnalyzerError::Panicked {
                    unit: unit.logical_name().to_string(),
                    message: panic_message(&*payload),
                })
            });
        match outcome {
            Ok(()) => partial.facts.extend(sink),
            Err(err) => {
                warn!(
                    unit = unit.logical_name(),
                    analyzer = %analyzer.family(),
                    error = %err,
                    "analyzer failed on unit"
                );
                partial.failures.push(AnalyzerFailure {
                    unit: unit.logical_name().to_string(),
                    family: analyzer.family(),
                    message: err.to_string(),
                });
            }
        }
    }
    partial
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_progress(config: &AnalysisConfig, partial: &PartialResult) {
    if config.verbose() {
        info!(unit = %partial.unit_name, facts = partial.facts.len(), "unit analyzed");
    } else {
        debug!(unit = %partial.unit_name, facts = partial.facts.len(), "unit analyzed");
    }
}
