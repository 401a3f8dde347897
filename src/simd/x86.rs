//! x86_64 kernels: AVX/FMA (ymm) and SSE/SSE2 (xmm) arithmetic and memory loops.
//!
//! Arithmetic kernels keep `ILP` independent accumulators so the loop is bound by issue
//! width rather than latency. Every constant goes through `black_box` so the compiler can
//! neither fold the chain nor drop it.

use std::arch::x86_64::*;
use std::hint::black_box;

use super::{ilp_kernels, Workspace};
use crate::core::registry::{mem_family, op_family, MemBenchmark, OpBenchmark};

macro_rules! arith_kernel {
    // acc = a * b + acc
    ($name:ident, $feature:literal, $splat:ident, $op:ident, fused, $ops:expr) => {
        #[target_feature(enable = $feature)]
        unsafe fn $name<const ILP: usize>(ws: &mut Workspace) -> f64 {
            let n = ws.iterations / ILP;
            let a = $splat(black_box(1.000_001));
            let b = $splat(black_box(0.999_999));
            let mut acc = [$splat(black_box(0.0)); ILP];
            for _ in 0..n {
                for r in acc.iter_mut() {
                    *r = $op(a, b, *r);
                }
            }
            black_box(acc);
            ($ops * ILP * n) as f64
        }
    };
    // acc = acc (op) b
    ($name:ident, $feature:literal, $splat:ident, $op:ident, binary, $ops:expr) => {
        #[target_feature(enable = $feature)]
        unsafe fn $name<const ILP: usize>(ws: &mut Workspace) -> f64 {
            let n = ws.iterations / ILP;
            let b = $splat(black_box(1.0));
            let mut acc = [$splat(black_box(1.0)); ILP];
            for _ in 0..n {
                for r in acc.iter_mut() {
                    *r = $op(*r, b);
                }
            }
            black_box(acc);
            ($ops * ILP * n) as f64
        }
    };
}

arith_kernel!(fmadd_ps_ymm, "avx,fma", _mm256_set1_ps, _mm256_fmadd_ps, fused, 16);
arith_kernel!(fmadd_pd_ymm, "avx,fma", _mm256_set1_pd, _mm256_fmadd_pd, fused, 8);
arith_kernel!(add_ps_ymm, "avx", _mm256_set1_ps, _mm256_add_ps, binary, 8);
arith_kernel!(mul_pd_ymm, "avx", _mm256_set1_pd, _mm256_mul_pd, binary, 4);
arith_kernel!(add_ps_xmm, "sse", _mm_set1_ps, _mm_add_ps, binary, 4);
arith_kernel!(mul_pd_xmm, "sse2", _mm_set1_pd, _mm_mul_pd, binary, 2);

macro_rules! mem_kernels {
    (
        $load:ident, $store:ident, $copy:ident, $feature:literal, $width:expr,
        zero = $zero:ident, ld = $ld:ident, st = $st:ident, or = $or:ident
    ) => {
        #[target_feature(enable = $feature)]
        unsafe fn $load<const ILP: usize>(ws: &mut Workspace) -> f64 {
            let size = ws.size;
            let step = $width * ILP;
            let main = size - size % step;
            let mut acc = [$zero(); ILP];
            for _ in 0..ws.iterations {
                let src = black_box(ws.src_ptr());
                let mut off = 0;
                while off < main {
                    for (i, r) in acc.iter_mut().enumerate() {
                        *r = $or(*r, $ld(src.add(off + i * $width) as *const _));
                    }
                    off += step;
                }
                // tail, one vector at a time
                while off < size {
                    acc[0] = $or(acc[0], $ld(src.add(off) as *const _));
                    off += $width;
                }
            }
            black_box(acc);
            ws.bytes()
        }

        #[target_feature(enable = $feature)]
        unsafe fn $store<const ILP: usize>(ws: &mut Workspace) -> f64 {
            let size = ws.size;
            let step = $width * ILP;
            let main = size - size % step;
            let value = black_box($zero());
            for _ in 0..ws.iterations {
                let dst = black_box(ws.dst_ptr());
                let mut off = 0;
                while off < main {
                    for i in 0..ILP {
                        $st(dst.add(off + i * $width) as *mut _, value);
                    }
                    off += step;
                }
                while off < size {
                    $st(dst.add(off) as *mut _, value);
                    off += $width;
                }
            }
            ws.bytes()
        }

        #[target_feature(enable = $feature)]
        unsafe fn $copy<const ILP: usize>(ws: &mut Workspace) -> f64 {
            let size = ws.size;
            let step = $width * ILP;
            let main = size - size % step;
            for _ in 0..ws.iterations {
                let src = black_box(ws.src_ptr());
                let dst = black_box(ws.dst_ptr());
                let mut off = 0;
                while off < main {
                    for i in 0..ILP {
                        let v = $ld(src.add(off + i * $width) as *const _);
                        $st(dst.add(off + i * $width) as *mut _, v);
                    }
                    off += step;
                }
                while off < size {
                    $st(dst.add(off) as *mut _, $ld(src.add(off) as *const _));
                    off += $width;
                }
            }
            // read and written
            2.0 * ws.bytes()
        }
    };
}

mem_kernels!(
    load_ymm, store_ymm, copy_ymm, "avx", 32,
    zero = _mm256_setzero_ps, ld = _mm256_loadu_ps, st = _mm256_storeu_ps, or = _mm256_or_ps
);
mem_kernels!(
    load_xmm, store_xmm, copy_xmm, "sse2", 16,
    zero = _mm_setzero_si128, ld = _mm_loadu_si128, st = _mm_storeu_si128, or = _mm_or_si128
);

#[allow(clippy::too_many_arguments)]
fn op(
    category: &'static str,
    label: &'static str,
    feature: &'static str,
    encoding: &'static str,
    opcode: &'static str,
    data: &'static str,
    lanes: usize,
    ops_per_instruction: usize,
) -> OpBenchmark {
    OpBenchmark {
        category,
        label,
        feature,
        encoding,
        opcode,
        output_data: data,
        output_elements: lanes,
        output_vectors: 1,
        input_data: data,
        input_elements: lanes * 2,
        input_vectors: 2,
        ops_per_instruction,
        ilp: 1,
        kernel: fmadd_ps_ymm::<1>,
    }
}

pub fn op_benchmarks() -> Vec<OpBenchmark> {
    let families = [
        (
            op("fma", "VFMADD231PS (ymm, f32)", "fma", "ymm", "vfmadd231ps", "f32", 8, 16),
            ilp_kernels!(fmadd_ps_ymm),
        ),
        (
            op("fma", "VFMADD231PD (ymm, f64)", "fma", "ymm", "vfmadd231pd", "f64", 4, 8),
            ilp_kernels!(fmadd_pd_ymm),
        ),
        (
            op("add", "VADDPS (ymm, f32)", "avx", "ymm", "vaddps", "f32", 8, 8),
            ilp_kernels!(add_ps_ymm),
        ),
        (
            op("add", "ADDPS (xmm, f32)", "sse", "xmm", "addps", "f32", 4, 4),
            ilp_kernels!(add_ps_xmm),
        ),
        (
            op("mul", "VMULPD (ymm, f64)", "avx", "ymm", "vmulpd", "f64", 4, 4),
            ilp_kernels!(mul_pd_ymm),
        ),
        (
            op("mul", "MULPD (xmm, f64)", "sse2", "xmm", "mulpd", "f64", 2, 2),
            ilp_kernels!(mul_pd_xmm),
        ),
    ];

    families
        .into_iter()
        .flat_map(|(base, kernels)| op_family(base, kernels))
        .collect()
}

fn mem(
    label: &'static str,
    encoding: &'static str,
    feature: &'static str,
    op_type: &'static str,
) -> MemBenchmark {
    MemBenchmark {
        label,
        encoding,
        feature,
        op_type,
        n_vectors: 1,
        ilp: 1,
        kernel: load_ymm::<1>,
    }
}

pub fn mem_benchmarks() -> Vec<MemBenchmark> {
    let families = [
        (mem("VMOVUPS LOAD (ymm)", "ymm", "avx", "load"), ilp_kernels!(load_ymm)),
        (mem("VMOVUPS STORE (ymm)", "ymm", "avx", "store"), ilp_kernels!(store_ymm)),
        (mem("VMOVUPS LOAD/STORE (ymm)", "ymm", "avx", "copy"), ilp_kernels!(copy_ymm)),
        (mem("MOVDQU LOAD (xmm)", "xmm", "sse2", "load"), ilp_kernels!(load_xmm)),
        (mem("MOVDQU STORE (xmm)", "xmm", "sse2", "store"), ilp_kernels!(store_xmm)),
        (mem("MOVDQU LOAD/STORE (xmm)", "xmm", "sse2", "copy"), ilp_kernels!(copy_xmm)),
    ];

    families
        .into_iter()
        .flat_map(|(base, kernels)| mem_family(base, kernels))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::MemParams;

    #[test]
    fn test_fma_kernel_counts_ops() {
        if !(is_x86_feature_detected!("avx") && is_x86_feature_detected!("fma")) {
            println!("Skipping FMA test (instruction set not supported)");
            return;
        }
        for (ilp, kernel) in [1, 2, 4, 8].into_iter().zip(ilp_kernels!(fmadd_ps_ymm)) {
            let mut ws = Workspace::for_ops(1000);
            let ops = unsafe { kernel(&mut ws) };
            assert_eq!(ops, (16 * ilp * (1000 / ilp)) as f64);
        }
    }

    #[test]
    fn test_sse_kernels_count_ops() {
        if !is_x86_feature_detected!("sse2") {
            return;
        }
        let mut ws = Workspace::for_ops(64);
        assert_eq!(unsafe { add_ps_xmm::<4>(&mut ws) }, (4 * 64) as f64);
        assert_eq!(unsafe { mul_pd_xmm::<8>(&mut ws) }, (2 * 64) as f64);
    }

    #[test]
    fn test_memory_kernels_move_bytes() {
        if !is_x86_feature_detected!("avx") {
            println!("Skipping AVX memory test (instruction set not supported)");
            return;
        }
        let params = MemParams {
            size: 4096 + 64,
            alignment: 16,
        };
        let mut ws = Workspace::for_memory(&params, 64 * 1024).unwrap();
        let bytes = ws.bytes();
        unsafe {
            assert_eq!(load_ymm::<8>(&mut ws), bytes);
            assert_eq!(store_ymm::<4>(&mut ws), bytes);
            assert_eq!(copy_ymm::<2>(&mut ws), 2.0 * bytes);
            assert_eq!(copy_xmm::<8>(&mut ws), 2.0 * bytes);
        }
        // the last copy overwrote the stored zeros with the source pattern
        assert!(ws.dst.as_ref().unwrap().as_slice().iter().all(|&b| b == 0x5a));
    }

    #[test]
    fn test_catalog_shape() {
        let ops = op_benchmarks();
        assert_eq!(ops.len(), 6 * 4);
        let mem = mem_benchmarks();
        assert_eq!(mem.len(), 6 * 4);
        assert!(mem.iter().all(|b| b.n_vectors == 1));
    }
}
