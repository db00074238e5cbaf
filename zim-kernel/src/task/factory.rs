//! Task factory: produces fully armed TCBs.
//!
//! The factory is the single caller of the platform context's `setup_flow`
//! and `load_argument`. A spawn that fails part-way rolls back the id and
//! context it already claimed; no partial state is observable afterwards.

use core::ptr::NonNull;

use zim_common::task::TaskContextFactory;

use crate::config;
use crate::error::SpawnError;
use crate::ids::BitmapIdAllocator;
use crate::task::{TaskControlBlock, TaskExecutionInfo, TaskName, TaskResourceConfig};
use crate::KernelBuilder;

/// The kernel's task-id bitmap.
pub type TaskIds = BitmapIdAllocator<{ config::TASK_ID_WORDS }>;

/// Produces TCBs with initialised context, stack frame and identity.
pub struct TaskFactory {
    builder: &'static KernelBuilder,
    context_factory: &'static dyn TaskContextFactory,
    ids: TaskIds,
}

impl TaskFactory {
    /// Factory drawing contexts from the platform and memory from
    /// `builder`.
    #[must_use]
    pub fn new(
        builder: &'static KernelBuilder,
        context_factory: &'static dyn TaskContextFactory,
    ) -> Self {
        Self {
            builder,
            context_factory,
            ids: TaskIds::new(),
        }
    }

    /// Build a TCB in `Ready` state, its context armed so that the first
    /// resume enters `exec.entry` with the runtime and config arguments in
    /// place. The factory never enqueues; that is the caller's choice.
    pub fn create_tcb(
        &mut self,
        name: TaskName,
        exec: TaskExecutionInfo,
        res: TaskResourceConfig,
    ) -> Result<NonNull<TaskControlBlock>, SpawnError> {
        let id = match self.ids.acquire() {
            Some(id) => id,
            None => {
                // SAFETY: `res.stack` was created through this builder.
                unsafe { res.stack.release(self.builder) };
                return Err(SpawnError::IdsExhausted);
            }
        };

        let Some(mut ctx) = self.context_factory.create_context() else {
            self.ids.release(id);
            // SAFETY: As above.
            unsafe { res.stack.release(self.builder) };
            return Err(SpawnError::ContextUnavailable);
        };

        let top = res.stack.aligned_top(16);
        // SAFETY: `top` tops the freshly allocated, exclusively owned
        // stack inside `res`.
        unsafe {
            let ctx_ref = ctx.as_mut();
            ctx_ref.setup_flow(exec.entry, top);
            ctx_ref.load_argument(0, exec.runtime as usize);
            ctx_ref.load_argument(1, exec.config as usize);
        }

        // Remember the stack bytes in case the TCB allocation fails after
        // `res` has been consumed.
        let stack_base = res.stack.base();
        let stack_size = res.stack.size();

        match self
            .builder
            .construct(TaskControlBlock::new(id, name, ctx, exec, res))
        {
            Some(tcb) => Ok(tcb),
            None => {
                // SAFETY: `ctx` came from the platform factory above; the
                // stack bytes were allocated from this builder and the
                // handle struct was already dropped with the failed value.
                unsafe {
                    self.context_factory.destroy_context(ctx);
                    self.builder.release_raw(stack_base, stack_size);
                }
                self.ids.release(id);
                Err(SpawnError::OutOfMemory)
            }
        }
    }

    /// Tear a TCB down completely: context back to the platform, stack and
    /// TCB memory back to the allocator, id back to the bitmap.
    ///
    /// # Safety
    ///
    /// `tcb` must come from [`create_tcb`](Self::create_tcb) on this
    /// factory, must not be the running task, and must not be used
    /// afterwards.
    pub unsafe fn destroy_tcb(&mut self, tcb: NonNull<TaskControlBlock>) {
        // SAFETY: Caller guarantees a live TCB from this factory; `take`
        // moves it out and frees its memory.
        let tcb = unsafe { self.builder.take(tcb) };
        let id = tcb.id();
        let (ctx, stack) = tcb.into_parts();

        // SAFETY: Context and stack were claimed in `create_tcb` from the
        // platform factory and this builder respectively.
        unsafe {
            self.context_factory.destroy_context(ctx);
            stack.release(self.builder);
        }
        self.ids.release(id);
    }

    /// Whether `id` belongs to a live task.
    #[must_use]
    pub fn id_is_active(&self, id: u32) -> bool {
        self.ids.is_active(id)
    }
}
