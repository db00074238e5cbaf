//! # zim-alloc
//!
//! The Zim kernel's bootstrap memory economy.
//!
//! Three layers, each funding the next:
//! - [`Arena`](arena::Arena): bump allocator over the single physical RAM
//!   region; never frees. Funds permanent infrastructure.
//! - [`Heap`](heap::Heap): first-fit free-list allocator carved out of the
//!   arena; supports free and coalescing.
//! - [`ObjectBuilder`](builder::ObjectBuilder): typed construct/destroy
//!   facade over an allocator; the single choke point through which every
//!   kernel-visible object outside bootstrap is created.
//!
//! The [`RawAllocator`] trait is the seam between the layers: the arena and
//! the heap both implement it, and the builder is generic over it.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod arena;
pub mod builder;
pub mod error;
pub mod heap;

use core::ptr::NonNull;

pub use arena::Arena;
pub use builder::ObjectBuilder;
pub use error::AllocError;
pub use heap::Heap;

/// Default allocation alignment when a caller has no stricter need.
pub const DEFAULT_ALIGN: usize = 8;

/// Raw byte allocation seam implemented by the arena and the heap.
///
/// Methods take `&self`: implementations guard their internal state, so an
/// allocator can be shared by every subsystem that needs memory.
pub trait RawAllocator {
    /// Allocate `size` bytes aligned to `align`. `None` when the request
    /// cannot be satisfied.
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// Return an allocation.
    ///
    /// Bump-style allocators are free to treat this as a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must come from a previous `allocate(size, _)` on this
    /// allocator and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);
}
