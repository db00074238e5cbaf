//! Task contracts shared between the kernel core and the platform layer.
//!
//! The kernel never sees a concrete register image. It drives execution
//! through the [`TaskContext`] capability set, and obtains contexts from a
//! platform-supplied [`TaskContextFactory`].

use core::ptr::NonNull;

/// Entry point of a task.
///
/// The first argument is the runtime handle (the kernel proxy, passed as an
/// opaque pointer), the second the task's private configuration. Both are
/// delivered through the platform ABI's first two argument slots.
pub type TaskEntry = extern "C" fn(runtime: *mut (), config: *mut ());

/// Scheduling priority of a task.
///
/// The ready queue does not consult this yet; it only selects the two
/// bootstrap tasks (`Root` and `Idle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TaskPriority {
    /// Idle task, runs only when nothing else is ready.
    Idle = 0,
    /// Background work.
    Low = 1,
    /// Ordinary application task.
    Normal = 2,
    /// Critical service task.
    High = 3,
    /// Real-time task.
    Realtime = 4,
    /// The bootstrap root task.
    Root = 5,
}

impl TaskPriority {
    /// Decode a priority from its wire discriminant.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Idle),
            1 => Some(Self::Low),
            2 => Some(Self::Normal),
            3 => Some(Self::High),
            4 => Some(Self::Realtime),
            5 => Some(Self::Root),
            _ => None,
        }
    }
}

/// Lifecycle state of a task.
///
/// Transitions are performed only by the lifecycle and scheduling
/// components, never by the task itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TaskState {
    /// Resources allocated, not yet runnable.
    Created,
    /// Sitting in (or eligible for) the ready queue.
    Ready,
    /// Currently executing.
    Running,
    /// Waiting for an event.
    Blocked,
    /// Suspended or timer-parked.
    Sleeping,
    /// Finished; awaiting reclamation.
    Dead,
}

impl TaskState {
    /// Check whether the task can still be scheduled.
    #[inline]
    #[must_use]
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Check whether the task has terminated.
    #[inline]
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// Platform task-context contract.
///
/// An implementation owns an opaque register image plus the recipe for the
/// initial stack frame. After [`setup_flow`](TaskContext::setup_flow) and
/// any number of [`load_argument`](TaskContext::load_argument) calls, the
/// first instruction of the entry function must observe the platform ABI:
/// stack alignment, shadow space and argument registers.
pub trait TaskContext {
    /// Lay out the initial frame so that resuming this context begins
    /// execution at `entry` with a fresh register set and `stack_top` as
    /// the initial stack pointer.
    ///
    /// # Safety
    ///
    /// `stack_top` must be the top of a writable stack owned by the task
    /// being armed, with room below it for the platform's initial frame.
    unsafe fn setup_flow(&mut self, entry: TaskEntry, stack_top: NonNull<u8>);

    /// Place `value` into the register or stack slot the ABI dedicates to
    /// the `index`-th argument of the entry function. `index` is in 0..4;
    /// out-of-range indices are ignored.
    fn load_argument(&mut self, index: usize, value: usize);

    /// Save the live register state into `self` and resume `target`.
    ///
    /// From the caller's viewpoint this appears to return only when some
    /// later party transits back into `self`.
    ///
    /// # Safety
    ///
    /// `target` must have been armed with `setup_flow` (or previously
    /// suspended by a transit), and both contexts' stacks must be live.
    unsafe fn transit_to(&mut self, target: &mut dyn TaskContext);

    /// The saved stack pointer. Diagnostic only; `None` before the first
    /// `setup_flow`.
    fn stack_pointer(&self) -> Option<NonNull<u8>>;
}

/// Factory for platform task contexts.
///
/// Supplied by the embedder through the platform hooks; the task factory is
/// its only kernel-side caller.
pub trait TaskContextFactory {
    /// Allocate and initialise a fresh context. `None` on exhaustion.
    fn create_context(&self) -> Option<NonNull<dyn TaskContext>>;

    /// Destroy a context previously returned by
    /// [`create_context`](TaskContextFactory::create_context).
    ///
    /// # Safety
    ///
    /// `ctx` must originate from this factory and must not be used again.
    unsafe fn destroy_context(&self, ctx: NonNull<dyn TaskContext>);
}
