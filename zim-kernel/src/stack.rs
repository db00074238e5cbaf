//! Task stack buffers.

use core::ptr::NonNull;

use crate::KernelBuilder;

/// A heap allocation serving as a task stack.
///
/// The buffer is released explicitly by whoever tears the task down (the
/// factory on spawn failure, the lifecycle on destruction); there is no
/// drop glue, because the TCB carrying it lives in raw kernel memory.
pub struct StackBuffer {
    base: NonNull<u8>,
    size: usize,
}

impl StackBuffer {
    /// Allocate a `size`-byte stack through `builder`.
    #[must_use]
    pub fn create(builder: &KernelBuilder, size: usize) -> Option<Self> {
        let base = builder.allocate_raw(size, 16)?;
        Some(Self { base, size })
    }

    /// Lowest address of the buffer.
    #[inline]
    #[must_use]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The highest address floor-aligned to `align`: the task's initial
    /// stack pointer. Encapsulates the fact that stacks grow downwards.
    #[must_use]
    pub fn aligned_top(&self, align: usize) -> NonNull<u8> {
        let top = self.base.as_ptr() as usize + self.size;
        let aligned = zim_common::align::align_down(top, align);
        // SAFETY: `aligned` is between `base` and `base + size`, both
        // derived from a non-null allocation.
        unsafe { NonNull::new_unchecked(aligned as *mut u8) }
    }

    /// Return the buffer to `builder`.
    ///
    /// # Safety
    ///
    /// `builder` must be the builder the stack was created through, and no
    /// flow may still be running on the stack.
    pub unsafe fn release(self, builder: &KernelBuilder) {
        // SAFETY: Forwarded caller contract.
        unsafe { builder.release_raw(self.base, self.size) };
    }
}
