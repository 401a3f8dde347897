pub mod buffer;
#[cfg(target_arch = "aarch64")]
pub mod neon;
#[cfg(target_arch = "x86_64")]
pub mod x86;

use crate::core::grid::MemParams;
use crate::core::registry::{MemBenchmark, OpBenchmark};
use crate::error::HarnessError;
use buffer::AlignedBuffer;

/// A benchmark kernel: runs its loop over `Workspace` and returns the number of
/// operations (or bytes) it executed.
///
/// Unsafe because kernels are compiled with `#[target_feature]`; callers must only invoke
/// a kernel when its benchmark's feature was probed as present.
pub type KernelFn = unsafe fn(&mut Workspace) -> f64;

/// Unroll factors generated for every kernel family.
pub const ILP_LEVELS: [usize; 4] = [1, 2, 4, 8];

/// Memory kernels make at least this many passes over their buffer.
pub const MIN_PASSES: usize = 16;

/// Instantiate a const-generic kernel at every `ILP_LEVELS` unroll factor.
macro_rules! ilp_kernels {
    ($kernel:ident) => {
        [
            $kernel::<1> as $crate::simd::KernelFn,
            $kernel::<2> as $crate::simd::KernelFn,
            $kernel::<4> as $crate::simd::KernelFn,
            $kernel::<8> as $crate::simd::KernelFn,
        ]
    };
}
#[allow(unused_imports)]
pub(crate) use ilp_kernels;

/// Per-thread kernel state, built before the timed region starts.
pub struct Workspace {
    /// Loop trip count: instruction iterations for arithmetic kernels, buffer passes for
    /// memory kernels.
    pub iterations: usize,
    /// Buffer size in bytes (0 for arithmetic kernels).
    pub size: usize,
    src: Option<AlignedBuffer>,
    dst: Option<AlignedBuffer>,
}

impl Workspace {
    pub fn for_ops(iterations: usize) -> Self {
        Self {
            iterations,
            size: 0,
            src: None,
            dst: None,
        }
    }

    /// Source and destination buffers of `params.size` bytes, passed over enough times to
    /// move roughly `volume` bytes.
    pub fn for_memory(params: &MemParams, volume: usize) -> Result<Self, HarnessError> {
        let src = AlignedBuffer::new(params.size, params.alignment)?;
        let dst = AlignedBuffer::new(params.size, params.alignment)?;
        Ok(Self {
            iterations: (volume / params.size).max(MIN_PASSES),
            size: params.size,
            src: Some(src),
            dst: Some(dst),
        })
    }

    pub fn src_ptr(&self) -> *const u8 {
        self.src
            .as_ref()
            .map_or(std::ptr::null(), AlignedBuffer::as_ptr)
    }

    pub fn dst_ptr(&mut self) -> *mut u8 {
        self.dst
            .as_mut()
            .map_or(std::ptr::null_mut(), AlignedBuffer::as_mut_ptr)
    }

    /// Bytes one pass-set moves in one direction.
    pub fn bytes(&self) -> f64 {
        self.size as f64 * self.iterations as f64
    }
}

/// Arithmetic benchmarks compiled for this architecture.
pub fn op_benchmarks() -> Vec<OpBenchmark> {
    #[cfg(target_arch = "x86_64")]
    {
        x86::op_benchmarks()
    }
    #[cfg(target_arch = "aarch64")]
    {
        neon::op_benchmarks()
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        Vec::new()
    }
}

/// Memory benchmarks compiled for this architecture.
pub fn mem_benchmarks() -> Vec<MemBenchmark> {
    #[cfg(target_arch = "x86_64")]
    {
        x86::mem_benchmarks()
    }
    #[cfg(target_arch = "aarch64")]
    {
        neon::mem_benchmarks()
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_workspace_passes() {
        let params = MemParams {
            size: 4096,
            alignment: 64,
        };
        let ws = Workspace::for_memory(&params, 1 << 20).unwrap();
        assert_eq!(ws.iterations, 256);
        assert_eq!(ws.bytes(), (1 << 20) as f64);

        // large buffers still get the minimum pass count
        let ws = Workspace::for_memory(&params, 4096).unwrap();
        assert_eq!(ws.iterations, MIN_PASSES);
    }

    #[test]
    fn test_ops_workspace_has_no_buffers() {
        let mut ws = Workspace::for_ops(1000);
        assert!(ws.src_ptr().is_null());
        assert!(ws.dst_ptr().is_null());
        assert_eq!(ws.bytes(), 0.0);
    }
}
