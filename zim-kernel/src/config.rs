//! Bootstrap tunables.

/// Heap size the kernel asks for when the arena is large enough.
pub const PREFERRED_HEAP_SIZE: usize = 1024 * 1024;

/// The heap never takes more than this share of the arena's free space:
/// `free * HEAP_SHARE_NUM / HEAP_SHARE_DEN` (80 %).
pub const HEAP_SHARE_NUM: usize = 4;
/// See [`HEAP_SHARE_NUM`].
pub const HEAP_SHARE_DEN: usize = 5;

/// Stack handed to the root task.
pub const ROOT_STACK_SIZE: usize = 4 * 1024;

/// Stack handed to the idle task.
pub const IDLE_STACK_SIZE: usize = 1024;

/// Stack for service-spawned tasks that do not request a size.
pub const DEFAULT_TASK_STACK_SIZE: usize = 16 * 1024;

/// Task-id capacity, in 64-id bitmap words.
pub const TASK_ID_WORDS: usize = 1;
