//! Task control blocks and task metadata.
//!
//! A TCB outlives both its context and its stack; the lifecycle alone owns
//! TCBs and hands them out as raw references. State transitions and the
//! queued flag are driven exclusively by the lifecycle and the scheduling
//! strategy.

pub mod factory;
pub mod lifecycle;

use core::ptr::NonNull;

use zim_common::task::{TaskContext, TaskEntry, TaskPriority, TaskState};

use crate::stack::StackBuffer;

/// Upper bound on task name length.
pub const TASK_NAME_LEN: usize = 32;

/// Short printable task label, NUL-padded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName([u8; TASK_NAME_LEN]);

impl TaskName {
    /// Build a name from `label`, truncated to [`TASK_NAME_LEN`] bytes.
    #[must_use]
    pub fn new(label: &str) -> Self {
        let mut bytes = [0u8; TASK_NAME_LEN];
        let n = label.len().min(TASK_NAME_LEN);
        bytes[..n].copy_from_slice(&label.as_bytes()[..n]);
        Self(bytes)
    }

    /// The label, trimmed at the first NUL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(TASK_NAME_LEN);
        core::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl core::fmt::Debug for TaskName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Where a task runs and what it is handed.
#[derive(Debug, Clone, Copy)]
pub struct TaskExecutionInfo {
    /// The entry function.
    pub entry: TaskEntry,
    /// Runtime handle (kernel proxy), delivered as the first argument.
    pub runtime: *mut (),
    /// Task-private configuration, delivered as the second argument.
    pub config: *mut (),
}

/// The resources a task is granted.
pub struct TaskResourceConfig {
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// The task's stack, owned by this config until the TCB absorbs it.
    pub stack: StackBuffer,
}

/// Task control block: the kernel's handle to a task.
pub struct TaskControlBlock {
    id: u32,
    name: TaskName,
    state: TaskState,
    queued: bool,
    context: NonNull<dyn TaskContext>,
    exec: TaskExecutionInfo,
    res: TaskResourceConfig,
}

impl TaskControlBlock {
    /// Assemble a TCB. Fresh TCBs start `Ready` and unqueued.
    pub(crate) fn new(
        id: u32,
        name: TaskName,
        context: NonNull<dyn TaskContext>,
        exec: TaskExecutionInfo,
        res: TaskResourceConfig,
    ) -> Self {
        Self {
            id,
            name,
            state: TaskState::Ready,
            queued: false,
            context,
            exec,
            res,
        }
    }

    /// Task id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Task label.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &TaskName {
        &self.name
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Transition the task. Lifecycle/scheduling components only.
    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    /// Whether the TCB currently sits in the ready queue.
    #[inline]
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Flip the queued flag. Strategy only; the flag is the single source
    /// of truth for ready-queue membership.
    pub(crate) fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
    }

    /// The platform context. The kernel only ever drives it through the
    /// `TaskContext` contract.
    #[inline]
    #[must_use]
    pub fn context(&self) -> NonNull<dyn TaskContext> {
        self.context
    }

    /// Execution info the task was spawned with.
    #[inline]
    #[must_use]
    pub fn exec(&self) -> &TaskExecutionInfo {
        &self.exec
    }

    /// Scheduling priority.
    #[inline]
    #[must_use]
    pub fn priority(&self) -> TaskPriority {
        self.res.priority
    }

    /// The task's stack.
    #[inline]
    #[must_use]
    pub fn stack(&self) -> &StackBuffer {
        &self.res.stack
    }

    /// Tear the TCB open for reclamation: context and stack ownership move
    /// back to the caller.
    pub(crate) fn into_parts(self) -> (NonNull<dyn TaskContext>, StackBuffer) {
        (self.context, self.res.stack)
    }
}

/// Static task metadata kept in a kernel-owned list.
#[derive(Clone, Copy)]
pub struct TaskArchive {
    /// Task id.
    pub id: u32,
    /// Entry function the task was created with.
    pub entry: TaskEntry,
    /// Priority at spawn time.
    pub priority: TaskPriority,
    /// Task label.
    pub name: TaskName,
    /// The live TCB.
    pub tcb: NonNull<TaskControlBlock>,
}
