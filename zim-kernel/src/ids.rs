//! Bitmap allocator for small integer handles (task ids).
//!
//! One bit per id; a set bit means the id is live. Id 0 is reserved at
//! construction so external consumers can keep treating 0 as "no task".

/// Bitmap id allocator over `WORDS * 64` ids.
pub struct BitmapIdAllocator<const WORDS: usize> {
    words: [u64; WORDS],
    limit: u32,
}

impl<const WORDS: usize> BitmapIdAllocator<WORDS> {
    /// Allocator over the full `WORDS * 64` id range.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit((WORDS * 64) as u32)
    }

    /// Allocator handing out ids strictly below `limit` (clamped to the
    /// bitmap capacity). Id 0 is pre-reserved.
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        let mut words = [0u64; WORDS];
        words[0] = 1;
        Self {
            words,
            limit: limit.min((WORDS * 64) as u32),
        }
    }

    /// Claim the lowest free id, or `None` when the range is exhausted.
    pub fn acquire(&mut self) -> Option<u32> {
        for (i, word) in self.words.iter_mut().enumerate() {
            if *word != u64::MAX {
                let bit = (!*word).trailing_zeros();
                let id = (i as u32) * 64 + bit;
                if id >= self.limit {
                    return None;
                }
                *word |= 1 << bit;
                return Some(id);
            }
        }
        None
    }

    /// Return `id` to the pool. Releasing id 0 or an out-of-range id is a
    /// no-op.
    pub fn release(&mut self, id: u32) {
        if id == 0 || id >= self.limit {
            return;
        }
        self.words[(id / 64) as usize] &= !(1 << (id % 64));
    }

    /// Check whether `id` is currently claimed.
    #[must_use]
    pub fn is_active(&self, id: u32) -> bool {
        if id >= self.limit {
            return false;
        }
        self.words[(id / 64) as usize] & (1 << (id % 64)) != 0
    }

    /// Number of claimed ids, the reserved id 0 included.
    #[must_use]
    pub fn active_count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}

impl<const WORDS: usize> Default for BitmapIdAllocator<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}
