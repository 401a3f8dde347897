//! Drives the registry through the thread, size and alignment grids.
//!
//! One configuration runs at a time: parallelism only exists inside a kernel invocation.
//! Benchmarks whose feature the host lacks are skipped, and each (label, feature) pair is
//! reported once after its suite finishes.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, info_span};

use crate::core::config::{HarnessConfig, Suite};
use crate::core::grid::{admits, thread_grid, MemParams, ThreadConfig};
use crate::core::hardware::FeatureSet;
use crate::core::record::{MemResult, OpResult};
use crate::core::registry::Registry;
use crate::core::trial::{run_trials, Executor};
use crate::error::HarnessError;

const CYAN: &str = "\x1b[0;36m";
const RESET: &str = "\x1b[0m";
const DIVIDER_WIDTH: usize = 52;

/// A benchmark that could not run because the host lacks its feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkipReason {
    pub label: String,
    pub feature: String,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skipping test '{}' due to missing feature {}",
            self.label, self.feature
        )
    }
}

/// Records of one suite, in run order, plus the deduplicated skip reasons.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<R> {
    pub results: Vec<R>,
    pub skipped: BTreeSet<SkipReason>,
}

impl<R> Default for Outcome<R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            skipped: BTreeSet::new(),
        }
    }
}

/// Outcome of every suite the config enables. `None` for a suite that did not run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunOutput {
    pub ops: Option<Outcome<OpResult>>,
    pub memory: Option<Outcome<MemResult>>,
}

pub struct Harness<'a, E: Executor + ?Sized> {
    registry: &'a Registry,
    features: &'a FeatureSet,
    executor: &'a E,
    config: &'a HarnessConfig,
}

impl<'a, E: Executor + ?Sized> Harness<'a, E> {
    pub fn new(
        registry: &'a Registry,
        features: &'a FeatureSet,
        executor: &'a E,
        config: &'a HarnessConfig,
    ) -> Self {
        Self {
            registry,
            features,
            executor,
            config,
        }
    }

    /// Run every enabled suite with the grids the config describes.
    pub fn run_all(&self) -> Result<RunOutput, HarnessError> {
        let mut output = RunOutput::default();
        if self.config.runs(Suite::Ops) {
            output.ops = Some(self.ops_suite()?);
        }
        if self.config.runs(Suite::Memory) {
            output.memory = Some(self.memory_suite()?);
        }
        Ok(output)
    }

    pub fn ops_suite(&self) -> Result<Outcome<OpResult>, HarnessError> {
        let threads = thread_grid(self.features, self.config.ops_multi_core);
        self.run_ops(&threads)
    }

    pub fn memory_suite(&self) -> Result<Outcome<MemResult>, HarnessError> {
        let threads = thread_grid(self.features, self.config.memory_multi_core);
        let sizes = self.config.sizes.sizes();
        self.run_memory(&threads, &sizes, &self.config.alignments)
    }

    pub fn run_ops(&self, threads: &[ThreadConfig]) -> Result<Outcome<OpResult>, HarnessError> {
        let _span = info_span!("ops_suite", configs = threads.len()).entered();
        let mut outcome = Outcome::default();
        let mut last_category = None;

        for bench in self.registry.ops() {
            if !self.admit(bench.label, bench.feature, &mut outcome.skipped) {
                continue;
            }
            if last_category != Some(bench.category) {
                self.divider(bench.category);
                last_category = Some(bench.category);
            }

            for &t in threads {
                debug!(label = bench.label, ilp = bench.ilp, threads = %t, "running");
                let samples = run_trials(
                    self.executor,
                    bench.kernel,
                    None,
                    t,
                    self.config.ops_trials,
                    self.config.warmup,
                )
                .map_err(|e| e.in_benchmark(bench.label))?;

                let result = OpResult::new(bench, t, &samples);
                self.progress(&result);
                outcome.results.push(result);
            }
        }

        self.report_skipped(&outcome.skipped);
        info!(records = outcome.results.len(), skipped = outcome.skipped.len(), "ops suite done");
        Ok(outcome)
    }

    /// Sweep sizes, then alignments, then thread splits. Splits whose combined footprint
    /// exceeds twice the largest size are left out.
    pub fn run_memory(
        &self,
        threads: &[ThreadConfig],
        sizes: &[usize],
        alignments: &[usize],
    ) -> Result<Outcome<MemResult>, HarnessError> {
        let _span = info_span!("memory_suite", sizes = sizes.len()).entered();
        let mut outcome = Outcome::default();
        let max_size = sizes.iter().copied().max().unwrap_or(0);
        let mut last_label = None;

        for bench in self.registry.memory() {
            if !self.admit(bench.label, bench.feature, &mut outcome.skipped) {
                continue;
            }
            if last_label != Some(bench.label) {
                self.divider(bench.label);
                last_label = Some(bench.label);
            }

            for &size in sizes {
                for &alignment in alignments {
                    let params = MemParams { size, alignment };
                    for &t in threads {
                        if !admits(t, size, max_size) {
                            continue;
                        }
                        let samples = run_trials(
                            self.executor,
                            bench.kernel,
                            Some(&params),
                            t,
                            self.config.memory_trials,
                            self.config.warmup,
                        )
                        .map_err(|e| e.in_benchmark(bench.label))?;

                        let result = MemResult::new(bench, params, t, &samples);
                        self.progress(&result);
                        outcome.results.push(result);
                    }
                }
            }
        }

        self.report_skipped(&outcome.skipped);
        info!(records = outcome.results.len(), skipped = outcome.skipped.len(), "memory suite done");
        Ok(outcome)
    }

    fn admit(&self, label: &str, feature: &str, skipped: &mut BTreeSet<SkipReason>) -> bool {
        if self.features.supports(feature) {
            return true;
        }
        skipped.insert(SkipReason {
            label: label.to_string(),
            feature: feature.to_string(),
        });
        false
    }

    fn divider(&self, name: &str) {
        if self.config.quiet {
            return;
        }
        let header = format!("== {} ", name);
        println!("\n{CYAN}{:=<width$}{RESET}\n", header, width = DIVIDER_WIDTH);
    }

    fn progress(&self, line: &dyn fmt::Display) {
        if !self.config.quiet {
            println!("{}", line);
        }
    }

    fn report_skipped(&self, skipped: &BTreeSet<SkipReason>) {
        if skipped.is_empty() {
            return;
        }
        println!();
        for reason in skipped {
            println!("* {}", reason);
        }
    }
}
