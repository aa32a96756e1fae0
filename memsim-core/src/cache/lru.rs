//! # Age-Counter LRU Bookkeeping (C6)
//!
//! Grounded in `original_source/lru.h`: each way of each set carries an age
//! counter rather than a linked list. Touching a way resets its counter to
//! zero and bumps every other *more recently used* way (smaller counter) in
//! the same set by one; the victim is whichever way holds the largest
//! counter. This is the classic saturating-counter LRU used
//! when the associativity is small and fixed, which is why the cache
//! hierarchy (C7) uses it instead of the doubly-linked list C4 uses for the
//! fully-associative TLB.

/// Per-set age counters for an `N`-way set-associative structure.
pub struct LruCounters {
    ways: usize,
    ages: Vec<u8>,
}

impl LruCounters {
    /// Build counters for `sets` sets of `ways` ways each, all at age 0.
    #[must_use]
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            ways,
            ages: vec![0; sets * ways],
        }
    }

    fn set_slice(&self, set: usize) -> &[u8] {
        &self.ages[set * self.ways..(set + 1) * self.ways]
    }

    fn set_slice_mut(&mut self, set: usize) -> &mut [u8] {
        &mut self.ages[set * self.ways..(set + 1) * self.ways]
    }

    /// Record that `way` within `set` was just used: its age resets to 0,
    /// and every way that was more recently used than it (smaller age) is
    /// aged by one.
    pub fn touch(&mut self, set: usize, way: usize) {
        let touched_age = self.set_slice(set)[way];
        let slice = self.set_slice_mut(set);
        for (w, age) in slice.iter_mut().enumerate() {
            if w == way {
                *age = 0;
            } else if *age < touched_age {
                *age = age.saturating_add(1);
            }
        }
    }

    /// The way within `set` with the largest age: the next eviction victim.
    /// Ties (e.g. every way still at age 0) resolve to the lowest way index,
    /// not `Iterator::max_by_key`'s last-match behavior.
    #[must_use]
    pub fn victim(&self, set: usize) -> usize {
        let slice = self.set_slice(set);
        let mut best_way = 0;
        let mut best_age = slice[0];
        for (way, &age) in slice.iter().enumerate().skip(1) {
            if age > best_age {
                best_age = age;
                best_way = way;
            }
        }
        best_way
    }

    /// Reset every counter in every set to 0.
    pub fn clear(&mut self) {
        self.ages.fill(0);
    }
}
