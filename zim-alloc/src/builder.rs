//! Object builder: typed construct/destroy facade over an allocator.
//!
//! The builder is the only creator of kernel-visible objects outside
//! bootstrap, which makes it the single choke point for future
//! instrumentation (type tags, object ids, leak tracking). For now it
//! tracks a live-object count.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::RawAllocator;

/// Typed construct/destroy over a [`RawAllocator`].
pub struct ObjectBuilder<'a> {
    alloc: &'a dyn RawAllocator,
    live: AtomicUsize,
}

impl<'a> ObjectBuilder<'a> {
    /// Create a builder charging `alloc` for every object.
    #[must_use]
    pub fn new(alloc: &'a dyn RawAllocator) -> Self {
        Self {
            alloc,
            live: AtomicUsize::new(0),
        }
    }

    /// Allocate space for a `T` and move `value` into it.
    ///
    /// Returns `None` when the allocator cannot satisfy the request; the
    /// value is dropped in that case.
    pub fn construct<T>(&self, value: T) -> Option<NonNull<T>> {
        let ptr = self
            .alloc
            .allocate(core::mem::size_of::<T>(), core::mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: Freshly allocated, properly sized and aligned for `T`.
        unsafe { ptr.as_ptr().write(value) };
        self.live.fetch_add(1, Ordering::Relaxed);
        Some(ptr)
    }

    /// Drop the object and return its memory to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`construct`](Self::construct) on this builder
    /// and must not be used afterwards.
    pub unsafe fn destroy<T>(&self, ptr: NonNull<T>) {
        // SAFETY: Caller guarantees `ptr` is a live object from this
        // builder.
        unsafe {
            core::ptr::drop_in_place(ptr.as_ptr());
            self.alloc
                .deallocate(ptr.cast::<u8>(), core::mem::size_of::<T>());
        }
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    /// Move the object out and return its memory to the allocator.
    ///
    /// # Safety
    ///
    /// Same contract as [`destroy`](Self::destroy).
    pub unsafe fn take<T>(&self, ptr: NonNull<T>) -> T {
        // SAFETY: Caller guarantees `ptr` is a live object from this
        // builder; reading moves the value out before the memory is
        // returned.
        let value = unsafe {
            let value = ptr.as_ptr().read();
            self.alloc
                .deallocate(ptr.cast::<u8>(), core::mem::size_of::<T>());
            value
        };
        self.live.fetch_sub(1, Ordering::Relaxed);
        value
    }

    /// Allocate untyped bytes (stack buffers and the like). Not counted as
    /// a live object.
    pub fn allocate_raw(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        self.alloc.allocate(size, align)
    }

    /// Return bytes obtained from [`allocate_raw`](Self::allocate_raw).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_raw(size, _)` on this builder and
    /// must not be used afterwards.
    pub unsafe fn release_raw(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: Forwarded caller contract.
        unsafe { self.alloc.deallocate(ptr, size) };
    }

    /// Number of currently live constructed objects.
    #[inline]
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}
