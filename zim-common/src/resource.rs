//! Hardware resource descriptors.
//!
//! Platforms register named resources (frame buffers, register banks) with
//! their resource registry; tasks look them up through the kernel proxy.

/// Broad classification of a hardware resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResourceKind {
    /// Plain memory region.
    Memory = 0,
    /// Linear frame buffer.
    Framebuffer = 1,
    /// Memory-mapped register bank.
    Registers = 2,
    /// Legacy I/O port range.
    IoPort = 3,
}

/// A physical resource exposed to tasks by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareResource {
    /// Physical base address of the resource.
    pub base_address: usize,
    /// Size of the region in bytes.
    pub size: usize,
    /// What the region is.
    pub kind: ResourceKind,
}

impl HardwareResource {
    /// Describe a resource.
    #[inline]
    #[must_use]
    pub const fn new(base_address: usize, size: usize, kind: ResourceKind) -> Self {
        Self {
            base_address,
            size,
            kind,
        }
    }
}
