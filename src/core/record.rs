//! Result records: one per (benchmark, configuration), serialized field-for-field into the
//! JSON reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::grid::{MemParams, ThreadConfig};
use crate::core::registry::{MemBenchmark, OpBenchmark};
use crate::core::stats::{median, median_elapsed, throughputs, TrialSample};

const GREEN: &str = "\x1b[0;32m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult {
    pub category: String,
    pub label: String,
    pub feature: String,
    pub encoding: String,
    pub opcode: String,
    pub output_data: String,
    pub output_elements: usize,
    pub output_vectors: usize,
    pub input_data: String,
    pub input_elements: usize,
    pub input_vectors: usize,
    pub ops_per_instruction: usize,
    pub ilp: usize,
    pub threads_h: usize,
    pub threads_l: usize,
    /// Throughput of every measured trial, in billions of operations per second
    pub gops: Vec<f64>,
    /// Median elapsed seconds
    pub elapsed: f64,
}

impl OpResult {
    pub fn new(bench: &OpBenchmark, threads: ThreadConfig, samples: &[TrialSample]) -> Self {
        Self {
            category: bench.category.to_string(),
            label: bench.label.to_string(),
            feature: bench.feature.to_string(),
            encoding: bench.encoding.to_string(),
            opcode: bench.opcode.to_string(),
            output_data: bench.output_data.to_string(),
            output_elements: bench.output_elements,
            output_vectors: bench.output_vectors,
            input_data: bench.input_data.to_string(),
            input_elements: bench.input_elements,
            input_vectors: bench.input_vectors,
            ops_per_instruction: bench.ops_per_instruction,
            ilp: bench.ilp,
            threads_h: threads.high,
            threads_l: threads.low,
            gops: throughputs(samples),
            elapsed: median_elapsed(samples),
        }
    }

    pub fn threads(&self) -> ThreadConfig {
        ThreadConfig::new(self.threads_h, self.threads_l)
    }

    pub fn median_gops(&self) -> f64 {
        median(&self.gops)
    }
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<50} | {:<6} | {:<5} | threads {:<6} | {GREEN}{:>18}{RESET} ({:.2} ms)",
            self.label,
            format!("ILP={}", self.ilp),
            format!("VLx{}", self.output_vectors * self.ilp),
            self.threads().to_string(),
            format!("{:.2} GOP/s", self.median_gops()),
            self.elapsed * 1000.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemResult {
    pub label: String,
    pub encoding: String,
    pub feature: String,
    pub op_type: String,
    pub n_vectors: usize,
    /// Bytes per buffer, same as `size`
    pub data_size: usize,
    pub ilp: usize,
    /// Per-thread buffer size in bytes
    pub size: usize,
    pub alignment: usize,
    pub threads_h: usize,
    pub threads_l: usize,
    /// Throughput of every measured trial, in GB/s
    pub gbps: Vec<f64>,
    pub elapsed: f64,
}

impl MemResult {
    pub fn new(
        bench: &MemBenchmark,
        params: MemParams,
        threads: ThreadConfig,
        samples: &[TrialSample],
    ) -> Self {
        Self {
            label: bench.label.to_string(),
            encoding: bench.encoding.to_string(),
            feature: bench.feature.to_string(),
            op_type: bench.op_type.to_string(),
            n_vectors: bench.n_vectors,
            data_size: params.size,
            ilp: bench.ilp,
            size: params.size,
            alignment: params.alignment,
            threads_h: threads.high,
            threads_l: threads.low,
            gbps: throughputs(samples),
            elapsed: median_elapsed(samples),
        }
    }

    pub fn threads(&self) -> ThreadConfig {
        ThreadConfig::new(self.threads_h, self.threads_l)
    }

    pub fn median_gbps(&self) -> f64 {
        median(&self.gbps)
    }
}

impl fmt::Display for MemResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<40} | {:<6} | {:<5} | {:<8}  {:<5} | threads {:<6} | {GREEN}{:>18}{RESET} ({:.2} ms)",
            self.label,
            format!("ILP={}", self.ilp),
            format!("VLx{}", self.n_vectors * self.ilp),
            format_bytes(self.size),
            format!("@{}", self.alignment),
            self.threads().to_string(),
            format!("{:.2} GB/s", self.median_gbps()),
            self.elapsed * 1000.0,
        )
    }
}

/// Binary byte count: `4 KB`, `1.5 MB`, `64 MB`.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value.fract() == 0.0 {
        format!("{} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
