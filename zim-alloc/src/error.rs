//! Error types for the memory economy.

use core::fmt;

/// Errors surfaced by the allocator layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The arena cannot satisfy the request.
    ArenaExhausted,
    /// The heap has no free block large enough.
    HeapExhausted,
    /// The requested alignment exceeds what the heap guarantees.
    UnsupportedAlignment,
    /// The region handed to a constructor is too small to manage.
    RegionTooSmall,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaExhausted => write!(f, "arena exhausted"),
            Self::HeapExhausted => write!(f, "heap exhausted"),
            Self::UnsupportedAlignment => write!(f, "unsupported alignment"),
            Self::RegionTooSmall => write!(f, "region too small"),
        }
    }
}
