//! aarch64 NEON kernels on 128-bit q-registers.

use std::arch::aarch64::*;
use std::hint::black_box;

use super::{ilp_kernels, Workspace};
use crate::core::registry::{mem_family, op_family, MemBenchmark, OpBenchmark};

macro_rules! neon_kernel {
    // acc += a * b
    ($name:ident, $splat:ident, $op:ident, fused, $ops:expr) => {
        #[target_feature(enable = "neon")]
        unsafe fn $name<const ILP: usize>(ws: &mut Workspace) -> f64 {
            let n = ws.iterations / ILP;
            let a = $splat(black_box(1.000_001));
            let b = $splat(black_box(0.999_999));
            let mut acc = [$splat(black_box(0.0)); ILP];
            for _ in 0..n {
                for r in acc.iter_mut() {
                    *r = $op(*r, a, b);
                }
            }
            black_box(acc);
            ($ops * ILP * n) as f64
        }
    };
    ($name:ident, $splat:ident, $op:ident, binary, $ops:expr) => {
        #[target_feature(enable = "neon")]
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

neon_kernel!(fmla_4s, vdupq_n_f32, vfmaq_f32, fused, 8);
neon_kernel!(fmla_2d, vdupq_n_f64, vfmaq_f64, fused, 4);
neon_kernel!(fadd_4s, vdupq_n_f32, vaddq_f32, binary, 4);
neon_kernel!(fmul_2d, vdupq_n_f64, vmulq_f64, binary, 2);

const Q_WIDTH: usize = 16;

#[target_feature(enable = "neon")]
unsafe fn load_q<const ILP: usize>(ws: &mut Workspace) -> f64 {
    let size = ws.size;
    let step = Q_WIDTH * ILP;
    let main = size - size % step;
    let mut acc = [vdupq_n_u8(0); ILP];
    for _ in 0..ws.iterations {
        let src = black_box(ws.src_ptr());
        let mut off = 0;
        while off < main {
            for (i, r) in acc.iter_mut().enumerate() {
                *r = vorrq_u8(*r, vld1q_u8(src.add(off + i * Q_WIDTH)));
            }
            off += step;
        }
        while off < size {
            acc[0] = vorrq_u8(acc[0], vld1q_u8(src.add(off)));
            off += Q_WIDTH;
        }
    }
    black_box(acc);
    ws.bytes()
}

#[target_feature(enable = "neon")]
unsafe fn store_q<const ILP: usize>(ws: &mut Workspace) -> f64 {
    let size = ws.size;
    let step = Q_WIDTH * ILP;
    let main = size - size % step;
    let value = black_box(vdupq_n_u8(0));
    for _ in 0..ws.iterations {
        let dst = black_box(ws.dst_ptr());
        let mut off = 0;
        while off < main {
            for i in 0..ILP {
                vst1q_u8(dst.add(off + i * Q_WIDTH), value);
            }
            off += step;
        }
        while off < size {
            vst1q_u8(dst.add(off), value);
            off += Q_WIDTH;
        }
    }
    ws.bytes()
}

#[target_feature(enable = "neon")]
unsafe fn copy_q<const ILP: usize>(ws: &mut Workspace) -> f64 {
    let size = ws.size;
    let step = Q_WIDTH * ILP;
    let main = size - size % step;
    for _ in 0..ws.iterations {
        let src = black_box(ws.src_ptr());
        let dst = black_box(ws.dst_ptr());
        let mut off = 0;
        while off < main {
            for i in 0..ILP {
                let v = vld1q_u8(src.add(off + i * Q_WIDTH));
                vst1q_u8(dst.add(off + i * Q_WIDTH), v);
            }
            off += step;
        }
        while off < size {
            vst1q_u8(dst.add(off), vld1q_u8(src.add(off)));
            off += Q_WIDTH;
        }
    }
    2.0 * ws.bytes()
}

fn op(
    category: &'static str,
    label: &'static str,
    opcode: &'static str,
    data: &'static str,
    lanes: usize,
    ops_per_instruction: usize,
) -> OpBenchmark {
    OpBenchmark {
        category,
        label,
        feature: "neon",
        encoding: "q-register",
        opcode,
        output_data: data,
        output_elements: lanes,
        output_vectors: 1,
        input_data: data,
        input_elements: lanes * 2,
        input_vectors: 2,
        ops_per_instruction,
        ilp: 1,
        kernel: fmla_4s::<1>,
    }
}

pub fn op_benchmarks() -> Vec<OpBenchmark> {
    let families = [
        (op("fma", "FMLA (4s, f32)", "fmla", "f32", 4, 8), ilp_kernels!(fmla_4s)),
        (op("fma", "FMLA (2d, f64)", "fmla", "f64", 2, 4), ilp_kernels!(fmla_2d)),
        (op("add", "FADD (4s, f32)", "fadd", "f32", 4, 4), ilp_kernels!(fadd_4s)),
        (op("mul", "FMUL (2d, f64)", "fmul", "f64", 2, 2), ilp_kernels!(fmul_2d)),
    ];

    families
        .into_iter()
        .flat_map(|(base, kernels)| op_family(base, kernels))
        .collect()
}

fn mem(label: &'static str, op_type: &'static str) -> MemBenchmark {
    MemBenchmark {
        label,
        encoding: "q-register",
        feature: "neon",
        op_type,
        n_vectors: 1,
        ilp: 1,
        kernel: load_q::<1>,
    }
}

pub fn mem_benchmarks() -> Vec<MemBenchmark> {
    let families = [
        (mem("LDR LOAD (q-register)", "load"), ilp_kernels!(load_q)),
        (mem("STR STORE (q-register)", "store"), ilp_kernels!(store_q)),
        (mem("LDR/STR COPY (q-register)", "copy"), ilp_kernels!(copy_q)),
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
    fn test_fmla_counts_ops() {
        if !std::arch::is_aarch64_feature_detected!("neon") {
            println!("Skipping NEON test (instruction set not supported)");
            return;
        }
        for (ilp, kernel) in [1, 2, 4, 8].into_iter().zip(ilp_kernels!(fmla_4s)) {
            let mut ws = Workspace::for_ops(1000);
            let ops = unsafe { kernel(&mut ws) };
            assert_eq!(ops, (8 * ilp * (1000 / ilp)) as f64);
        }
    }

    #[test]
    fn test_memory_kernels_move_bytes() {
        if !std::arch::is_aarch64_feature_detected!("neon") {
            return;
        }
        let params = MemParams {
            size: 4096 + 64,
            alignment: 16,
        };
        let mut ws = Workspace::for_memory(&params, 64 * 1024).unwrap();
        let bytes = ws.bytes();
        unsafe {
            assert_eq!(load_q::<4>(&mut ws), bytes);
            assert_eq!(store_q::<8>(&mut ws), bytes);
            assert_eq!(copy_q::<2>(&mut ws), 2.0 * bytes);
        }
    }

    #[test]
    fn test_catalog_shape() {
        assert_eq!(op_benchmarks().len(), 4 * 4);
        assert_eq!(mem_benchmarks().len(), 3 * 4);
    }
}
