//! Kernel error types.

use core::fmt;

use zim_alloc::AllocError;

/// Errors surfaced by kernel bootstrap and infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The boot record failed magic/version validation.
    InvalidBootRecord,
    /// The RAM region cannot hold the kernel and its minimum
    /// infrastructure.
    RegionTooSmall,
    /// The arena could not fund a bootstrap allocation. Fatal.
    ArenaExhausted,
    /// A heap allocation failed.
    OutOfMemory,
    /// A fixed-capacity table is full.
    TableFull,
    /// An operation ran before the infrastructure it needs was set up.
    NotBootstrapped,
    /// A boot task could not be spawned.
    Spawn(SpawnError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBootRecord => write!(f, "invalid boot record"),
            Self::RegionTooSmall => write!(f, "RAM region too small"),
            Self::ArenaExhausted => write!(f, "arena exhausted during bootstrap"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::TableFull => write!(f, "table full"),
            Self::NotBootstrapped => write!(f, "kernel not bootstrapped"),
            Self::Spawn(err) => write!(f, "task spawn failed: {}", err),
        }
    }
}

impl From<SpawnError> for KernelError {
    fn from(err: SpawnError) -> Self {
        Self::Spawn(err)
    }
}

impl From<AllocError> for KernelError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::ArenaExhausted => Self::ArenaExhausted,
            AllocError::RegionTooSmall => Self::RegionTooSmall,
            _ => Self::OutOfMemory,
        }
    }
}

/// Errors surfaced by task spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The id bitmap has no free ids.
    IdsExhausted,
    /// The platform could not produce a task context.
    ContextUnavailable,
    /// TCB or stack allocation failed.
    OutOfMemory,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdsExhausted => write!(f, "task ids exhausted"),
            Self::ContextUnavailable => write!(f, "no task context available"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

/// Errors surfaced by the message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// No node could be obtained for the pending queue; the message was
    /// dropped.
    QueueExhausted,
    /// A subscriber entry or callback node could not be allocated.
    RegistryExhausted,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueExhausted => write!(f, "pending queue exhausted"),
            Self::RegistryExhausted => write!(f, "subscriber registry exhausted"),
        }
    }
}
