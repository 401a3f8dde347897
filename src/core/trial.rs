use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::time::Instant;

use tracing::trace;

use crate::core::grid::{MemParams, ThreadConfig};
use crate::core::runtime::{Placement, WorkerRole};
use crate::core::stats::TrialSample;
use crate::error::HarnessError;
use crate::simd::{KernelFn, Workspace};

/// Runs one kernel invocation under a thread split and reports (elapsed, ops).
///
/// Implementations are handed only kernels whose required feature the host supports; the
/// harness filters on the probed feature set before dispatching.
pub trait Executor {
    fn execute(
        &self,
        kernel: KernelFn,
        params: Option<&MemParams>,
        threads: ThreadConfig,
    ) -> Result<TrialSample, HarnessError>;
}

/// Spawns `threads.high + threads.low` workers per invocation, each with its own workspace.
#[derive(Debug, Clone)]
pub struct ThreadedExecutor {
    placement: Placement,
    op_iterations: usize,
    mem_volume: usize,
}

impl ThreadedExecutor {
    pub fn new(placement: Placement, op_iterations: usize, mem_volume: usize) -> Self {
        Self {
            placement,
            op_iterations,
            mem_volume,
        }
    }

    fn workspace(&self, params: Option<&MemParams>) -> Result<Workspace, HarnessError> {
        match params {
            Some(p) => Workspace::for_memory(p, self.mem_volume),
            None => Ok(Workspace::for_ops(self.op_iterations)),
        }
    }
}

impl Executor for ThreadedExecutor {
    fn execute(
        &self,
        kernel: KernelFn,
        params: Option<&MemParams>,
        threads: ThreadConfig,
    ) -> Result<TrialSample, HarnessError> {
        if threads.total() == 0 {
            return Err(HarnessError::NoThreads);
        }

        let roles: Vec<WorkerRole> = (0..threads.high)
            .map(WorkerRole::High)
            .chain((0..threads.low).map(WorkerRole::Low))
            .collect();
        // Allocate and touch every buffer before any thread starts the clock
        let mut workspaces = roles
            .iter()
            .map(|_| self.workspace(params))
            .collect::<Result<Vec<_>, _>>()?;

        let ready = Barrier::new(roles.len() + 1);
        let go = AtomicBool::new(false);
        let placement = &self.placement;

        std::thread::scope(|s| {
            let handles: Vec<_> = roles
                .iter()
                .zip(workspaces.iter_mut())
                .map(|(&role, ws)| {
                    let ready = &ready;
                    let go = &go;
                    s.spawn(move || {
                        placement.apply(role);
                        ready.wait();
                        while !go.load(Ordering::Acquire) {
                            std::hint::spin_loop();
                        }
                        unsafe { kernel(ws) }
                    })
                })
                .collect();

            ready.wait();
            let start = Instant::now();
            go.store(true, Ordering::Release);

            let mut total_ops = 0.0;
            let mut panicked = 0;
            for handle in handles {
                match handle.join() {
                    Ok(ops) => total_ops += ops,
                    Err(_) => panicked += 1,
                }
            }
            let elapsed = start.elapsed().as_secs_f64();

            if panicked > 0 {
                return Err(HarnessError::WorkerPanicked(panicked));
            }
            trace!(%threads, elapsed, total_ops, "kernel invocation");
            Ok(TrialSample { elapsed, total_ops })
        })
    }
}

/// Invoke `kernel` `warmup + trials` times and keep the last `trials` samples.
pub fn run_trials<E: Executor + ?Sized>(
    executor: &E,
    kernel: KernelFn,
    params: Option<&MemParams>,
    threads: ThreadConfig,
    trials: usize,
    warmup: usize,
) -> Result<Vec<TrialSample>, HarnessError> {
    let mut samples = Vec::with_capacity(trials);
    for i in 0..warmup + trials {
        let sample = executor.execute(kernel, params, threads)?;
        if i >= warmup {
            samples.push(sample);
        }
    }
    Ok(samples)
}
