//! Scheduling strategy: who runs next.
//!
//! The strategy only orders TCBs; states are driven by the kernel's trap
//! path. The TCB's queued flag is the single source of truth for ready
//! queue membership, which makes `make_task_ready` idempotent across
//! interleaved signal and task code paths.

use core::ptr::NonNull;

use crate::collections::List;
use crate::task::TaskControlBlock;
use crate::KernelBuilder;

/// Ready-queue policy. One concrete implementation exists today
/// ([`RoundRobin`]); the seam is kept open for priority-aware policies.
pub trait SchedulingStrategy {
    /// Enqueue `tcb` unless its queued flag says it is already waiting.
    fn make_task_ready(&mut self, tcb: NonNull<TaskControlBlock>);

    /// Pop the next task to run, clearing its queued flag.
    fn pick_next_ready_task(&mut self) -> Option<NonNull<TaskControlBlock>>;

    /// Remove `tcb` from the queue wherever it sits.
    fn remove_task(&mut self, tcb: NonNull<TaskControlBlock>);

    /// Number of queued tasks.
    fn ready_count(&self) -> usize;
}

/// Strict-FIFO round robin. Priorities are not consulted; ties break by
/// insertion order.
pub struct RoundRobin {
    ready: List<NonNull<TaskControlBlock>>,
}

impl RoundRobin {
    /// An empty ready queue.
    #[must_use]
    pub fn new(builder: &'static KernelBuilder) -> Self {
        Self {
            ready: List::new(builder),
        }
    }
}

impl SchedulingStrategy for RoundRobin {
    fn make_task_ready(&mut self, mut tcb: NonNull<TaskControlBlock>) {
        // SAFETY: TCBs stay alive while registered with the lifecycle; the
        // queued flag is only touched by the strategy.
        unsafe {
            if tcb.as_ref().is_queued() {
                return;
            }
            if self.ready.push_back(tcb).is_err() {
                // A task that cannot be queued would never run again; make
                // the condition loud.
                log::error!("ready queue node allocation failed for task {}", tcb.as_ref().id());
                return;
            }
            tcb.as_mut().set_queued(true);
        }
    }

    fn pick_next_ready_task(&mut self) -> Option<NonNull<TaskControlBlock>> {
        let mut tcb = self.ready.pop_front()?;
        // SAFETY: As in `make_task_ready`; a popped task must be markable
        // as dequeued or it could never be re-queued.
        unsafe { tcb.as_mut().set_queued(false) };
        Some(tcb)
    }

    fn remove_task(&mut self, mut tcb: NonNull<TaskControlBlock>) {
        // SAFETY: As in `make_task_ready`.
        unsafe {
            if !tcb.as_ref().is_queued() {
                return;
            }
            self.ready.remove_match(|&queued| queued == tcb);
            tcb.as_mut().set_queued(false);
        }
    }

    fn ready_count(&self) -> usize {
        self.ready.len()
    }
}
