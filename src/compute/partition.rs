//! Vertical-strip decomposition and the phase-3 worker pool.
//!
//! The grid's columns split into one strip per worker with a one-column gap
//! between strips, so a search started inside a strip cannot write across
//! the border in a single step. Workers are long-lived: they block on the
//! start barrier, scan their strip, meet the driver at the end barrier, and
//! wait for the next sub-pass. Cross-border points land in per-worker
//! deferred vectors that the driver drains serially in worker order, which
//! keeps the phase deterministic for a fixed worker count.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::numeric::Scalar;

use super::flow::{FlowPass, FlowPtrs, PassColors, Strip};

/// Stack size for flow workers. The depth-first search recurses once per
/// cell along a path, so large fields need deep stacks.
const WORKER_STACK_BYTES: usize = 64 << 20;

/// Split `cols` into `workers` strips with a one-column gap between
/// consecutive strips. The last strip absorbs the remainder and runs to the
/// grid edge, where the wall ring terminates every search anyway.
pub(crate) fn strips(cols: usize, workers: usize) -> Vec<Strip> {
    debug_assert!(workers >= 1 && cols / workers >= 2);
    let bucket = cols / workers;
    (0..workers)
        .map(|i| {
            let lo = i * bucket;
            let hi = if i + 1 == workers {
                cols - 1
            } else {
                (i + 1) * bucket - 2
            };
            Strip { lo, hi }
        })
        .collect()
}

/// State shared between the driver and the workers.
struct FlowShared<V: Scalar, Vf: Scalar> {
    ptrs: FlowPtrs<V, Vf>,
    strips: Vec<Strip>,
    /// One deferred vector per worker; each is written only by its owner
    /// during a sub-pass and only by the driver between sub-passes.
    queues: Vec<UnsafeCell<Vec<(usize, usize)>>>,
    /// Epoch published by the driver before releasing the start barrier.
    ut: AtomicU32,
    progress: AtomicBool,
    shutdown: AtomicBool,
    start: Barrier,
    end: Barrier,
}

// The raw grid pointers and queue cells are shared under the partition
// contract: workers write column-disjoint cells while the driver waits at
// the barriers, and the barriers order everything else. The atomics use
// relaxed ordering for the same reason.
unsafe impl<V: Scalar, Vf: Scalar> Send for FlowShared<V, Vf> {}
unsafe impl<V: Scalar, Vf: Scalar> Sync for FlowShared<V, Vf> {}

/// Long-lived worker pool driving the parallel flow phase.
pub(crate) struct FlowPool<V: Scalar, Vf: Scalar> {
    shared: Arc<FlowShared<V, Vf>>,
    workers: Vec<JoinHandle<()>>,
}

impl<V: Scalar, Vf: Scalar> FlowPool<V, Vf> {
    pub fn new(ptrs: FlowPtrs<V, Vf>, workers: usize) -> Self {
        let shared = Arc::new(FlowShared {
            strips: strips(ptrs.cols, workers),
            queues: (0..workers).map(|_| UnsafeCell::new(Vec::new())).collect(),
            ut: AtomicU32::new(0),
            progress: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            start: Barrier::new(workers + 1),
            end: Barrier::new(workers + 1),
            ptrs,
        });
        let handles = (0..workers)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("flow-worker-{index}"))
                    .stack_size(WORKER_STACK_BYTES)
                    .spawn(move || worker_loop(shared, index))
                    .expect("failed to spawn flow worker")
            })
            .collect();
        debug!("spawned {workers} flow workers over {} columns", ptrs.cols);
        Self { shared, workers: handles }
    }

    #[inline]
    pub fn ptrs(&self) -> FlowPtrs<V, Vf> {
        self.shared.ptrs
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run one interior sub-pass: publish the epoch, release the workers,
    /// and block until they all reach the end barrier.
    pub fn interior_pass(&self, ut: u32) {
        self.shared.ut.store(ut, Ordering::Relaxed);
        self.shared.progress.store(false, Ordering::Relaxed);
        self.shared.start.wait();
        self.shared.end.wait();
    }

    pub fn progress(&self) -> bool {
        self.shared.progress.load(Ordering::Relaxed)
    }

    /// Drain every worker's deferred points in worker order, returning how
    /// many were queued. Runs strictly between sub-passes, when all workers
    /// sit at the start barrier, so the queue cells are exclusively ours.
    pub fn drain_deferred<F: FnMut(usize, usize)>(&self, mut f: F) -> usize {
        let mut drained = 0;
        for cell in &self.shared.queues {
            let queue = unsafe { &mut *cell.get() };
            drained += queue.len();
            for (x, y) in queue.drain(..) {
                f(x, y);
            }
        }
        drained
    }
}

impl<V: Scalar, Vf: Scalar> Drop for FlowPool<V, Vf> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.start.wait();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<V: Scalar, Vf: Scalar>(shared: Arc<FlowShared<V, Vf>>, index: usize) {
    let strip = shared.strips[index];
    loop {
        shared.start.wait();
        if shared.shutdown.load(Ordering::Relaxed) {
            break;
        }
        let colors = PassColors::interior(shared.ut.load(Ordering::Relaxed));
        // Exclusive until the end barrier: this queue belongs to this worker.
        let queue = unsafe { &mut *shared.queues[index].get() };
        // Writes stay inside this strip; cross-border points are deferred.
        let mut pass = unsafe { FlowPass::interior(shared.ptrs, colors, strip, queue) };
        let mut progress = false;
        for x in 0..shared.ptrs.rows {
            for y in strip.lo..=strip.hi {
                if !pass.kind(x, y).is_wall() && pass.last_use(x, y) != colors.done {
                    let (moved, _, _) = pass.propagate(x, y, V::one());
                    if moved > V::zero() {
                        progress = true;
                    }
                }
            }
        }
        if progress {
            shared.progress.store(true, Ordering::Relaxed);
        }
        shared.end.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_worker_owns_every_column() {
        let s = strips(10, 1);
        assert_eq!(s, vec![Strip { lo: 0, hi: 9 }]);
    }

    #[test]
    fn strips_leave_a_one_column_gap() {
        let s = strips(10, 2);
        assert_eq!(s, vec![Strip { lo: 0, hi: 3 }, Strip { lo: 5, hi: 9 }]);
        // Column 4 belongs to nobody; it is reachable only via the drain.
    }

    #[test]
    fn last_strip_absorbs_the_remainder() {
        let s = strips(11, 3);
        assert_eq!(
            s,
            vec![
                Strip { lo: 0, hi: 1 },
                Strip { lo: 3, hi: 4 },
                Strip { lo: 6, hi: 10 },
            ]
        );
    }
}
