//! Object pool and pooled list.
//!
//! The pool keeps a free list of previously released node-sized chunks and
//! only falls back to the builder when the free list is empty. Chunks are
//! recycled forever; the pool never returns memory to the heap, which
//! keeps high-frequency message traffic off the allocator.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::collections::list::ListNode;
use crate::KernelBuilder;

/// Chunk alignment; covers every pooled payload the kernel stores
/// (messages are 16-byte aligned).
const CHUNK_ALIGN: usize = 16;

struct FreeChunk {
    next: Option<NonNull<FreeChunk>>,
}

/// Free-list pool of `T`-sized chunks.
pub struct ObjectPool<T> {
    free: Option<NonNull<FreeChunk>>,
    chunk_size: usize,
    builder: &'static KernelBuilder,
    _marker: PhantomData<T>,
}

impl<T> ObjectPool<T> {
    /// An empty pool charging `builder` for fresh chunks.
    #[must_use]
    pub fn new(builder: &'static KernelBuilder) -> Self {
        let base = core::mem::size_of::<T>().max(core::mem::size_of::<FreeChunk>());
        Self {
            free: None,
            chunk_size: zim_common::align::align_up(base, CHUNK_ALIGN),
            builder,
            _marker: PhantomData,
        }
    }

    /// Obtain a chunk and move `value` into it. `None` when both the free
    /// list and the allocator are exhausted.
    pub fn acquire(&mut self, value: T) -> Option<NonNull<T>> {
        debug_assert!(core::mem::align_of::<T>() <= CHUNK_ALIGN);

        let chunk = match self.free {
            Some(chunk) => {
                // SAFETY: Free chunks are owned by the pool and dead.
                self.free = unsafe { chunk.as_ref().next };
                chunk.cast::<T>()
            }
            None => self
                .builder
                .allocate_raw(self.chunk_size, CHUNK_ALIGN)?
                .cast::<T>(),
        };

        // SAFETY: The chunk is unowned, properly sized and aligned.
        unsafe { chunk.as_ptr().write(value) };
        Some(chunk)
    }

    /// Drop the value and recycle its chunk.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`acquire`](Self::acquire) on this pool and
    /// must not be used afterwards.
    pub unsafe fn release(&mut self, ptr: NonNull<T>) {
        // SAFETY: Caller guarantees a live pooled value.
        unsafe {
            core::ptr::drop_in_place(ptr.as_ptr());
            self.recycle(ptr);
        }
    }

    /// Recycle a chunk whose value has already been moved out.
    ///
    /// # Safety
    ///
    /// As for [`release`](Self::release), except the value must already be
    /// dead.
    pub unsafe fn recycle(&mut self, ptr: NonNull<T>) {
        let chunk = ptr.cast::<FreeChunk>();
        // SAFETY: The chunk is at least `FreeChunk`-sized (see `new`) and
        // no longer carries a live value.
        unsafe { chunk.as_ptr().write(FreeChunk { next: self.free }) };
        self.free = Some(chunk);
    }

    /// Number of chunks parked on the free list.
    #[must_use]
    pub fn free_chunks(&self) -> usize {
        let mut count = 0;
        let mut cur = self.free;
        while let Some(chunk) = cur {
            count += 1;
            // SAFETY: Free chunks are owned by the pool.
            cur = unsafe { chunk.as_ref().next };
        }
        count
    }
}

/// FIFO list whose nodes come from an [`ObjectPool`].
///
/// The pool is shared (the bus keeps several queues on one pool), so it is
/// referenced raw; the owner guarantees the pool outlives its lists.
pub struct PooledList<T> {
    head: Option<NonNull<ListNode<T>>>,
    tail: Option<NonNull<ListNode<T>>>,
    len: usize,
    pool: NonNull<ObjectPool<ListNode<T>>>,
}

impl<T> PooledList<T> {
    /// An empty list drawing nodes from `pool`.
    #[must_use]
    pub fn new(pool: NonNull<ObjectPool<ListNode<T>>>) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            pool,
        }
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append `data` at the tail. `false` when no node could be obtained.
    pub fn push_back(&mut self, data: T) -> bool {
        // SAFETY: The pool outlives this list (owner contract) and is only
        // touched from one flow at a time.
        let pool = unsafe { &mut *self.pool.as_ptr() };
        let Some(node) = pool.acquire(ListNode::new(data)) else {
            return false;
        };

        match self.tail {
            Some(mut tail) => {
                // SAFETY: Tail node is owned by this list and live.
                unsafe { tail.as_mut().next = Some(node) };
            }
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
        true
    }

    /// Remove and return the head element; its node goes back to the pool.
    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.head?;
        // SAFETY: The head node is owned by this list; the value is moved
        // out before the chunk is recycled.
        let (data, next) = unsafe {
            let taken = node.as_ptr().read();
            (&mut *self.pool.as_ptr()).recycle(node);
            (taken.data, taken.next)
        };
        self.head = next;
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(data)
    }

    /// Detach the whole chain into a new list over the same pool, leaving
    /// `self` empty. Used to drain a queue exactly once even when new
    /// elements arrive during the drain.
    #[must_use]
    pub fn take_all(&mut self) -> PooledList<T> {
        let detached = PooledList {
            head: self.head.take(),
            tail: self.tail.take(),
            len: self.len,
            pool: self.pool,
        };
        self.len = 0;
        detached
    }

    /// Drop every element and recycle its node.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }
}

impl<T> Drop for PooledList<T> {
    fn drop(&mut self) {
        self.clear();
    }
}
