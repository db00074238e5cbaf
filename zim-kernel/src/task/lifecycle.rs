//! Task lifecycle: the registry of every live TCB.
//!
//! The lifecycle alone owns TCBs. Spawn goes through the factory and then
//! registers the result; destruction unwinds through the factory so that
//! stack, context, id and TCB memory all return to their sources.
//!
//! A task that terminates itself cannot be reclaimed while the kernel is
//! still executing on its stack, so termination *retires* the TCB into a
//! graveyard; the next trap handled on another task's stack reaps it.

use core::ptr::NonNull;

use zim_common::task::TaskState;

use crate::collections::List;
use crate::error::{KernelError, SpawnError};
use crate::sched::SchedulingStrategy;
use crate::task::factory::TaskFactory;
use crate::task::{TaskControlBlock, TaskExecutionInfo, TaskName, TaskResourceConfig};
use crate::KernelBuilder;

/// Registry of all live tasks plus the current-task pointer.
pub struct TaskLifecycle {
    all_tasks: List<NonNull<TaskControlBlock>>,
    graveyard: List<NonNull<TaskControlBlock>>,
    factory: NonNull<TaskFactory>,
    current: Option<NonNull<TaskControlBlock>>,
}

impl TaskLifecycle {
    /// Lifecycle producing TCBs through `factory`.
    #[must_use]
    pub fn new(builder: &'static KernelBuilder, factory: NonNull<TaskFactory>) -> Self {
        Self {
            all_tasks: List::new(builder),
            graveyard: List::new(builder),
            factory,
            current: None,
        }
    }

    /// Create a TCB through the factory and register it. On any sub-step
    /// failure nothing remains registered or allocated.
    pub fn spawn_task(
        &mut self,
        name: TaskName,
        exec: TaskExecutionInfo,
        res: TaskResourceConfig,
    ) -> Result<NonNull<TaskControlBlock>, SpawnError> {
        // SAFETY: The factory lives in kernel memory for the kernel's
        // lifetime; single-flow access per the concurrency discipline.
        let factory = unsafe { &mut *self.factory.as_ptr() };
        let tcb = factory.create_tcb(name, exec, res)?;

        if self.register_task(tcb).is_err() {
            // SAFETY: Fresh TCB from this factory, not yet visible
            // anywhere else.
            unsafe { factory.destroy_tcb(tcb) };
            return Err(SpawnError::OutOfMemory);
        }
        Ok(tcb)
    }

    /// Add an externally produced TCB to the registry.
    pub fn register_task(&mut self, tcb: NonNull<TaskControlBlock>) -> Result<(), KernelError> {
        self.all_tasks.push_back(tcb)
    }

    /// Destroy a task that is *not* currently running: dequeue it if
    /// queued, unregister it and return all its resources.
    pub fn destroy_task(
        &mut self,
        tcb: NonNull<TaskControlBlock>,
        strategy: &mut dyn SchedulingStrategy,
    ) {
        // SAFETY: Registered TCBs are alive.
        if unsafe { tcb.as_ref() }.is_queued() {
            strategy.remove_task(tcb);
        }
        self.all_tasks.remove_match(|&t| t == tcb);
        if self.current == Some(tcb) {
            self.current = None;
        }
        // SAFETY: The TCB came from this lifecycle's factory and is no
        // longer referenced by the registry or the queue.
        unsafe { (*self.factory.as_ptr()).destroy_tcb(tcb) };
    }

    /// Retire the TCB of a terminating task: mark it dead, unregister it
    /// and park it in the graveyard until [`reap`](Self::reap) runs on a
    /// different stack.
    pub fn retire(&mut self, mut tcb: NonNull<TaskControlBlock>) {
        // SAFETY: Registered TCBs are alive; state transitions are the
        // lifecycle's to make.
        unsafe { tcb.as_mut().set_state(TaskState::Dead) };
        self.all_tasks.remove_match(|&t| t == tcb);
        if self.current == Some(tcb) {
            self.current = None;
        }
        if self.graveyard.push_back(tcb).is_err() {
            // Without a graveyard slot the resources cannot be reclaimed
            // safely; leak the task rather than free the stack we may
            // still be running on.
            // SAFETY: As above.
            log::error!("graveyard full, leaking task {}", unsafe { tcb.as_ref() }.id());
        }
    }

    /// Reclaim every retired task. Must run on a stack that belongs to
    /// none of them; in practice, the trap path of the *next* task.
    pub fn reap(&mut self) {
        while let Some(tcb) = self.graveyard.pop_front() {
            // SAFETY: Retired TCBs came from this lifecycle's factory and
            // are unreachable from the registry and the queue.
            unsafe { (*self.factory.as_ptr()).destroy_tcb(tcb) };
        }
    }

    /// Linear-scan lookup by id.
    #[must_use]
    pub fn get_task(&self, id: u32) -> Option<NonNull<TaskControlBlock>> {
        self.all_tasks
            // SAFETY: Registered TCBs are alive.
            .find_match(|&tcb| unsafe { tcb.as_ref() }.id() == id)
            .copied()
    }

    /// The task currently executing, if any.
    #[inline]
    #[must_use]
    pub fn get_current_task(&self) -> Option<NonNull<TaskControlBlock>> {
        self.current
    }

    /// Update the current-task pointer. Dispatcher path only.
    pub fn set_current_task(&mut self, tcb: Option<NonNull<TaskControlBlock>>) {
        self.current = tcb;
    }

    /// Number of live (registered, unretired) tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.all_tasks.len()
    }

    /// Number of retired tasks awaiting reclamation.
    #[must_use]
    pub fn graveyard_count(&self) -> usize {
        self.graveyard.len()
    }

    /// Visit every live TCB in insertion order.
    pub fn enumerate_tasks(&self, mut visit: impl FnMut(&TaskControlBlock)) {
        // SAFETY: Registered TCBs are alive for the duration of the call.
        self.all_tasks.for_each(|&tcb| visit(unsafe { tcb.as_ref() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::RoundRobin;
    use crate::stack::StackBuffer;
    use crate::testutil::static_builder;
    use core::ptr::NonNull;
    use std::boxed::Box;
    use std::vec::Vec;
    use zim_common::task::{TaskContext, TaskContextFactory, TaskEntry, TaskPriority};

    extern "C" fn entry(_rt: *mut (), _cfg: *mut ()) {}

    struct NullContext {
        top: Option<NonNull<u8>>,
    }
    impl TaskContext for NullContext {
        unsafe fn setup_flow(&mut self, _entry: TaskEntry, top: NonNull<u8>) {
            self.top = Some(top);
        }
        fn load_argument(&mut self, _index: usize, _value: usize) {}
        unsafe fn transit_to(&mut self, _target: &mut dyn TaskContext) {}
        fn stack_pointer(&self) -> Option<NonNull<u8>> {
            self.top
        }
    }

    struct BoxFactory;
    impl TaskContextFactory for BoxFactory {
        fn create_context(&self) -> Option<NonNull<dyn TaskContext>> {
            let ctx: Box<dyn TaskContext> = Box::new(NullContext { top: None });
            NonNull::new(Box::into_raw(ctx))
        }
        unsafe fn destroy_context(&self, ctx: NonNull<dyn TaskContext>) {
            // SAFETY: Contexts come from Box::into_raw above.
            drop(unsafe { Box::from_raw(ctx.as_ptr()) });
        }
    }

    fn lifecycle(builder: &'static KernelBuilder) -> TaskLifecycle {
        let factory = builder
            .construct(TaskFactory::new(builder, Box::leak(Box::new(BoxFactory))))
            .unwrap();
        TaskLifecycle::new(builder, factory)
    }

    fn spawn(lc: &mut TaskLifecycle, builder: &'static KernelBuilder, name: &str) -> NonNull<TaskControlBlock> {
        lc.spawn_task(
            TaskName::new(name),
            TaskExecutionInfo {
                entry,
                runtime: core::ptr::null_mut(),
                config: core::ptr::null_mut(),
            },
            TaskResourceConfig {
                priority: TaskPriority::Normal,
                stack: StackBuffer::create(builder, 512).unwrap(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_spawn_registers_and_lookup_works() {
        let builder = static_builder(64 * 1024);
        let mut lc = lifecycle(builder);

        let a = spawn(&mut lc, builder, "alpha");
        let b = spawn(&mut lc, builder, "beta");
        assert_eq!(lc.task_count(), 2);

        // SAFETY: TCBs are registered and alive.
        let a_id = unsafe { a.as_ref() }.id();
        assert_eq!(lc.get_task(a_id), Some(a));
        assert_eq!(lc.get_task(999), None);

        let mut names = Vec::new();
        lc.enumerate_tasks(|tcb| names.push(std::string::String::from(tcb.name().as_str())));
        assert_eq!(names, ["alpha", "beta"]);
        let _ = b;
    }

    #[test]
    fn test_destroy_releases_everything() {
        let builder = static_builder(64 * 1024);
        let mut lc = lifecycle(builder);
        let mut rr = RoundRobin::new(builder);
        let live_before = builder.live_objects();

        let a = spawn(&mut lc, builder, "alpha");
        rr.make_task_ready(a);

        lc.destroy_task(a, &mut rr);
        assert_eq!(lc.task_count(), 0);
        assert_eq!(rr.ready_count(), 0);
        // Lists gave their nodes back, TCB and stack returned.
        assert_eq!(builder.live_objects(), live_before);
    }

    #[test]
    fn test_retire_then_reap() {
        let builder = static_builder(64 * 1024);
        let mut lc = lifecycle(builder);

        let a = spawn(&mut lc, builder, "alpha");
        lc.set_current_task(Some(a));

        lc.retire(a);
        assert_eq!(lc.task_count(), 0);
        assert_eq!(lc.graveyard_count(), 1);
        assert_eq!(lc.get_current_task(), None);
        // SAFETY: Retired TCBs stay alive until reaped.
        assert!(unsafe { a.as_ref() }.state().is_dead());

        lc.reap();
        assert_eq!(lc.graveyard_count(), 0);
    }
}
