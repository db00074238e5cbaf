//! Kernel heap: first-fit free-list allocator carved out of the arena.
//!
//! The managed region is covered by a contiguous chain of blocks. Each
//! block starts with a header and `size` includes that header. Invariants
//! maintained at every public entry/exit:
//!
//! - the chain covers the region with no gaps,
//! - no two adjacent blocks are both free (every free runs a single
//!   coalescing pass),
//! - every block can hold a header.
//!
//! Blocks are 16-byte granules, so payload addresses satisfy alignments up
//! to 16 without per-block gap bookkeeping; stricter requests are refused.

use core::ptr::NonNull;

use spin::Mutex;
use zim_common::align::{align_down, align_up};

use crate::{AllocError, RawAllocator};

/// Block granularity; also the strongest payload alignment the heap serves.
pub const GRANULE: usize = 16;

/// Size of the per-block header, included in every block's `size`.
pub const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

/// A split only happens when the remainder can hold a header plus this
/// many payload bytes.
const SPLIT_MIN: usize = 8;

#[repr(C, align(16))]
struct BlockHeader {
    /// Block size in bytes, header included. Always a multiple of
    /// [`GRANULE`].
    size: usize,
    used: bool,
    next: Option<NonNull<BlockHeader>>,
}

struct HeapInner {
    first: NonNull<BlockHeader>,
}

/// Snapshot of one block, for diagnostics and invariant checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the block header.
    pub addr: usize,
    /// Block size, header included.
    pub size: usize,
    /// Whether the block is allocated.
    pub used: bool,
}

/// First-fit free-list heap.
pub struct Heap {
    region: NonNull<u8>,
    region_size: usize,
    inner: Mutex<HeapInner>,
}

// SAFETY: All block state lives inside the exclusively-owned region and is
// only touched while holding `inner`.
unsafe impl Send for Heap {}
unsafe impl Sync for Heap {}

impl Heap {
    /// Create a heap managing `size` bytes at `region`.
    ///
    /// The managed range is trimmed inward to [`GRANULE`] boundaries.
    ///
    /// # Safety
    ///
    /// The region must be valid for reads and writes, exclusively owned by
    /// the heap, and outlive it.
    pub unsafe fn new(region: NonNull<u8>, size: usize) -> Result<Self, AllocError> {
        let start = align_up(region.as_ptr() as usize, GRANULE);
        let end = align_down(region.as_ptr() as usize + size, GRANULE);
        if end <= start || end - start < HEADER_SIZE + GRANULE {
            return Err(AllocError::RegionTooSmall);
        }
        let managed = end - start;

        let first = start as *mut BlockHeader;
        // SAFETY: `first` lies within the caller-owned region and is
        // GRANULE-aligned, which satisfies the header's alignment.
        unsafe {
            first.write(BlockHeader {
                size: managed,
                used: false,
                next: None,
            });
        }

        Ok(Self {
            // SAFETY: `start` is derived from a NonNull pointer.
            region: unsafe { NonNull::new_unchecked(start as *mut u8) },
            region_size: managed,
            inner: Mutex::new(HeapInner {
                // SAFETY: just written above.
                first: unsafe { NonNull::new_unchecked(first) },
            }),
        })
    }

    /// Construct a heap manager in place at the head of `block`, managing
    /// the rest of the block. Returns a pointer to the installed manager.
    ///
    /// # Safety
    ///
    /// Same region contract as [`Heap::new`]; additionally nothing else may
    /// alias the block, since the manager itself now lives inside it.
    pub unsafe fn install(block: NonNull<u8>, size: usize) -> Result<NonNull<Heap>, AllocError> {
        let head = align_up(block.as_ptr() as usize, core::mem::align_of::<Heap>());
        let body = head + core::mem::size_of::<Heap>();
        let block_end = block.as_ptr() as usize + size;
        if body >= block_end {
            return Err(AllocError::RegionTooSmall);
        }

        // SAFETY: `body..block_end` is inside the caller-owned block and
        // disjoint from the manager's own bytes.
        let heap = unsafe { Heap::new(NonNull::new_unchecked(body as *mut u8), block_end - body)? };

        let slot = head as *mut Heap;
        // SAFETY: `head..body` is inside the caller-owned block.
        unsafe { slot.write(heap) };
        // SAFETY: just written.
        Ok(unsafe { NonNull::new_unchecked(slot) })
    }

    /// Total managed bytes (headers included).
    #[inline]
    #[must_use]
    pub fn managed_size(&self) -> usize {
        self.region_size
    }

    /// Sum of the sizes of all free blocks, headers included.
    #[must_use]
    pub fn free_size(&self) -> usize {
        let mut total = 0;
        self.for_each_block(|b| {
            if !b.used {
                total += b.size;
            }
        });
        total
    }

    /// Size of the largest free block, header included.
    #[must_use]
    pub fn largest_free(&self) -> usize {
        let mut largest = 0;
        self.for_each_block(|b| {
            if !b.used && b.size > largest {
                largest = b.size;
            }
        });
        largest
    }

    /// Number of blocks in the chain.
    #[must_use]
    pub fn block_count(&self) -> usize {
        let mut count = 0;
        self.for_each_block(|_| count += 1);
        count
    }

    /// Visit every block in address order.
    pub fn for_each_block(&self, mut visit: impl FnMut(BlockInfo)) {
        let inner = self.inner.lock();
        let mut cur = Some(inner.first);
        while let Some(block) = cur {
            // SAFETY: Chain pointers only ever reference headers inside the
            // managed region.
            let hdr = unsafe { block.as_ref() };
            visit(BlockInfo {
                addr: block.as_ptr() as usize,
                size: hdr.size,
                used: hdr.used,
            });
            cur = hdr.next;
        }
    }
}

impl RawAllocator for Heap {
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if !align.is_power_of_two() || align > GRANULE {
            return None;
        }
        let size = size.max(1);
        let total = align_up(size + HEADER_SIZE, GRANULE);

        let inner = self.inner.lock();
        let mut cur = Some(inner.first);
        while let Some(mut block) = cur {
            // SAFETY: Chain pointers only ever reference headers inside the
            // managed region; the lock gives exclusive access.
            let hdr = unsafe { block.as_mut() };
            if !hdr.used && hdr.size >= total {
                if hdr.size - total >= HEADER_SIZE + SPLIT_MIN {
                    let rest = (block.as_ptr() as usize + total) as *mut BlockHeader;
                    // SAFETY: `rest` lies within this block, past the
                    // `total` bytes being carved off, and is
                    // GRANULE-aligned.
                    unsafe {
                        rest.write(BlockHeader {
                            size: hdr.size - total,
                            used: false,
                            next: hdr.next,
                        });
                        hdr.next = Some(NonNull::new_unchecked(rest));
                    }
                    hdr.size = total;
                }
                hdr.used = true;
                let payload = block.as_ptr() as usize + HEADER_SIZE;
                return NonNull::new(payload as *mut u8);
            }
            cur = hdr.next;
        }
        None
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _size: usize) {
        let inner = self.inner.lock();

        let hdr = (ptr.as_ptr() as usize - HEADER_SIZE) as *mut BlockHeader;
        // SAFETY: `ptr` came from `allocate`, so a header sits directly in
        // front of it.
        unsafe { (*hdr).used = false };

        // Single pass: merge every run of adjacent free blocks. After a
        // merge the cursor stays put so the run keeps collapsing into it.
        let mut cur = inner.first;
        loop {
            // SAFETY: Chain pointers stay inside the managed region; the
            // lock gives exclusive access.
            let cur_hdr = unsafe { cur.as_mut() };
            let Some(next) = cur_hdr.next else { break };
            // SAFETY: As above.
            let next_hdr = unsafe { next.as_ref() };

            if !cur_hdr.used && !next_hdr.used {
                cur_hdr.size += next_hdr.size;
                cur_hdr.next = next_hdr.next;
            } else {
                cur = next;
            }
        }
    }
}
