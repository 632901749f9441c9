// Licensed under the Apache-2.0 license

//! Bottom half: completion work deferred out of the interrupt handler.
//!
//! The top half only marks a task pending. Whoever owns the blocking
//! context (the driver task's notification loop, a thread, a low-priority
//! software interrupt) calls [`CompletionTask::run`], which drains the
//! pending mark into calls of the engine's resume. Schedules that land
//! while a run is in progress are coalesced into that run, and two runs of
//! the same task never overlap.

use core::sync::atomic::{AtomicBool, Ordering};

pub struct CompletionTask {
    pending: AtomicBool,
    running: AtomicBool,
}

impl CompletionTask {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Marks the task as needing to run. Safe from interrupt context:
    /// no locks, no allocation.
    pub fn schedule(&self) {
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Calls `work` once per observed schedule until none is pending.
    ///
    /// Returns how many times `work` ran. If another context is already
    /// running this task, returns 0 and leaves the pending mark for it.
    pub fn run(&self, mut work: impl FnMut()) -> usize {
        let mut ran = 0;
        loop {
            if self
                .running
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                return ran;
            }
            while self.pending.swap(false, Ordering::AcqRel) {
                work();
                ran += 1;
            }
            self.running.store(false, Ordering::Release);

            // A schedule between the last swap and the release above would
            // otherwise sit unnoticed until the next interrupt.
            if !self.pending.load(Ordering::Acquire) {
                return ran;
            }
        }
    }
}

impl Default for CompletionTask {
    fn default() -> Self {
        Self::new()
    }
}
