//! Read-only views into a running kernel, for tests and diagnostics.

use crate::kernel::Kernel;

/// Non-invasive window over the kernel's internals.
///
/// All accessors are reads through the kernel's component pointers; under
/// the single-flow discipline they are safe to call whenever the kernel is
/// not mid-trap.
pub struct KernelInspector<'k> {
    kernel: &'k Kernel,
}

impl<'k> KernelInspector<'k> {
    /// Inspect `kernel`.
    #[must_use]
    pub fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    /// Bytes the arena has handed out.
    #[must_use]
    pub fn arena_used(&self) -> usize {
        self.kernel.arena_ref().used()
    }

    /// Bytes the arena still holds.
    #[must_use]
    pub fn arena_free(&self) -> usize {
        self.kernel.arena_ref().free_size()
    }

    /// Free bytes in the heap, `None` before phase 1.
    #[must_use]
    pub fn heap_free_size(&self) -> Option<usize> {
        // SAFETY: The heap is alive for the kernel's lifetime.
        self.kernel.heap_ptr().map(|h| unsafe { h.as_ref() }.free_size())
    }

    /// Total bytes the heap manages, `None` before phase 1.
    #[must_use]
    pub fn heap_managed_size(&self) -> Option<usize> {
        // SAFETY: As above.
        self.kernel
            .heap_ptr()
            .map(|h| unsafe { h.as_ref() }.managed_size())
    }

    /// Live objects the builder tracks, `None` before phase 1.
    #[must_use]
    pub fn live_objects(&self) -> Option<usize> {
        // SAFETY: The builder is alive for the kernel's lifetime.
        self.kernel
            .builder_ptr()
            .map(|b| unsafe { b.as_ref() }.live_objects())
    }

    /// Registered live tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        // SAFETY: The lifecycle is alive for the kernel's lifetime.
        self.kernel
            .lifecycle_ptr()
            .map_or(0, |lc| unsafe { lc.as_ref() }.task_count())
    }

    /// Retired tasks awaiting reclamation.
    #[must_use]
    pub fn graveyard_count(&self) -> usize {
        // SAFETY: As above.
        self.kernel
            .lifecycle_ptr()
            .map_or(0, |lc| unsafe { lc.as_ref() }.graveyard_count())
    }

    /// Id of the task the kernel considers current.
    #[must_use]
    pub fn current_task_id(&self) -> Option<u32> {
        // SAFETY: As above; current TCBs are alive.
        self.kernel.lifecycle_ptr().and_then(|lc| {
            unsafe { lc.as_ref() }
                .get_current_task()
                .map(|tcb| unsafe { tcb.as_ref() }.id())
        })
    }

    /// Tasks sitting in the ready queue.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        use crate::sched::SchedulingStrategy;
        // SAFETY: The strategy is alive for the kernel's lifetime.
        self.kernel
            .strategy_ptr()
            .map_or(0, |s| unsafe { s.as_ref() }.ready_count())
    }

    /// Undelivered bus messages.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        // SAFETY: The bus is alive for the kernel's lifetime.
        self.kernel
            .bus_ptr()
            .map_or(0, |bus| unsafe { bus.as_ref() }.pending_count())
    }

    /// Whether `id` is a live task id in the factory's bitmap.
    #[must_use]
    pub fn task_id_active(&self, id: u32) -> bool {
        // SAFETY: The factory is alive for the kernel's lifetime.
        self.kernel
            .factory_ptr()
            .map_or(false, |f| unsafe { f.as_ref() }.id_is_active(id))
    }

    /// Archived task records.
    #[must_use]
    pub fn archive_count(&self) -> usize {
        // SAFETY: The archive list is alive for the kernel's lifetime.
        self.kernel
            .archives_ptr()
            .map_or(0, |a| unsafe { a.as_ref() }.len())
    }
}
