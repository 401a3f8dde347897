use crate::simd::{self, KernelFn, ILP_LEVELS};

/// One arithmetic microbenchmark: an instruction run in a loop of `ilp` independent chains.
#[derive(Clone, Copy)]
pub struct OpBenchmark {
    /// Operation class (e.g. fma, add, mul)
    pub category: &'static str,
    pub label: &'static str,
    /// Required CPU feature
    pub feature: &'static str,
    /// Register class the result lands in (e.g. ymm, xmm, q-register)
    pub encoding: &'static str,
    pub opcode: &'static str,
    pub output_data: &'static str,
    pub output_elements: usize,
    pub output_vectors: usize,
    pub input_data: &'static str,
    pub input_elements: usize,
    pub input_vectors: usize,
    pub ops_per_instruction: usize,
    /// Data-independent instructions per loop iteration
    pub ilp: usize,
    pub kernel: KernelFn,
}

/// One memory throughput microbenchmark.
#[derive(Clone, Copy)]
pub struct MemBenchmark {
    pub label: &'static str,
    pub encoding: &'static str,
    pub feature: &'static str,
    /// load, store or copy
    pub op_type: &'static str,
    /// Vectors transferred per instruction
    pub n_vectors: usize,
    pub ilp: usize,
    pub kernel: KernelFn,
}

impl std::fmt::Debug for OpBenchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpBenchmark")
            .field("category", &self.category)
            .field("label", &self.label)
            .field("feature", &self.feature)
            .field("ilp", &self.ilp)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for MemBenchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBenchmark")
            .field("label", &self.label)
            .field("feature", &self.feature)
            .field("op_type", &self.op_type)
            .field("ilp", &self.ilp)
            .finish_non_exhaustive()
    }
}

/// Expand one operation into its ILP variants.
pub fn op_family(base: OpBenchmark, kernels: [KernelFn; 4]) -> impl Iterator<Item = OpBenchmark> {
    ILP_LEVELS
        .into_iter()
        .zip(kernels)
        .map(move |(ilp, kernel)| OpBenchmark { ilp, kernel, ..base })
}

pub fn mem_family(base: MemBenchmark, kernels: [KernelFn; 4]) -> impl Iterator<Item = MemBenchmark> {
    ILP_LEVELS
        .into_iter()
        .zip(kernels)
        .map(move |(ilp, kernel)| MemBenchmark { ilp, kernel, ..base })
}

/// Immutable catalog of benchmark definitions, run in the order they were given.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    ops: Vec<OpBenchmark>,
    memory: Vec<MemBenchmark>,
}

impl Registry {
    pub fn new(ops: Vec<OpBenchmark>, memory: Vec<MemBenchmark>) -> Self {
        Self { ops, memory }
    }

    /// Every benchmark compiled for the current architecture.
    pub fn builtin() -> Self {
        Self::new(simd::op_benchmarks(), simd::mem_benchmarks())
    }

    pub fn ops(&self) -> &[OpBenchmark] {
        &self.ops
    }

    pub fn memory(&self) -> &[MemBenchmark] {
        &self.memory
    }

    pub fn len(&self) -> usize {
        self.ops.len() + self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
