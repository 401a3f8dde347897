//! vecbench: microbenchmarks for SIMD arithmetic and memory throughput on
//! heterogeneous (performance/efficiency) multi-core CPUs.

pub mod core;
pub mod error;
pub mod simd;
pub mod storage;

pub use crate::error::HarnessError;
