//! # Split L1 + Unified L2 Cache Hierarchy (C7)
//!
//! Three set-associative, write-through caches: a read-only L1-I, a
//! read/write L1-D, and a unified L2 backing both. Grounded in the
//! structure `original_source/cache_mng.c` describes (the C source itself
//! is a near-stub; the set/tag/way arithmetic and the write-through,
//! write-no-allocate policy are built out from there, reusing the
//! age-counter replacement policy of [`super::lru`]).
//!
//! A line promoted from L2 into an L1 evicts that L1 set's LRU way; the
//! evicted line is written back down into L2 at its own set/tag so L2 never
//! loses a line an L1 still logically covers. Because both levels are
//! write-through to physical memory, a demoted line is never dirty with
//! respect to memory.

use super::lru::LruCounters;
use crate::addr::PhysicalAddress;
use crate::error::CoreResult;
use crate::memory::PhysicalMemory;

#[derive(Clone)]
struct CacheLine {
    valid: bool,
    tag: u64,
    data: Vec<u32>,
}

impl CacheLine {
    fn invalid(words_per_line: usize) -> Self {
        Self {
            valid: false,
            tag: 0,
            data: vec![0; words_per_line],
        }
    }
}

/// Geometry shared by every level of the cache hierarchy.
#[derive(Copy, Clone)]
pub struct CacheConfig {
    /// Number of sets.
    pub sets: usize,
    /// Associativity (ways per set).
    pub ways: usize,
    /// Line size, in 32-bit words.
    pub words_per_line: usize,
}

impl CacheConfig {
    fn line_size_bytes(self) -> u32 {
        (self.words_per_line * 4) as u32
    }

    fn line_base(self, paddr: u32) -> u32 {
        paddr & !(self.line_size_bytes() - 1)
    }

    fn set_index(self, line_base: u32) -> usize {
        ((line_base / self.line_size_bytes()) as usize) % self.sets
    }

    fn tag(self, line_base: u32) -> u64 {
        u64::from(line_base / self.line_size_bytes()) / self.sets as u64
    }

    /// Reconstruct the physical line base a `(tag, set)` pair under *this*
    /// config refers to. Inverse of `set_index`/`tag`.
    fn line_base_of(self, tag: u64, set: usize) -> u32 {
        let line_number = tag * self.sets as u64 + set as u64;
        (line_number * u64::from(self.line_size_bytes())) as u32
    }

    fn word_index(self, paddr: u32, line_base: u32) -> usize {
        ((paddr - line_base) / 4) as usize
    }
}

struct SetAssocCache {
    config: CacheConfig,
    lines: Vec<CacheLine>,
    lru: LruCounters,
}

impl SetAssocCache {
    fn new(config: CacheConfig) -> Self {
        Self {
            lines: vec![CacheLine::invalid(config.words_per_line); config.sets * config.ways],
            lru: LruCounters::new(config.sets, config.ways),
            config,
        }
    }

    fn way_slot(&self, set: usize, way: usize) -> usize {
        set * self.config.ways + way
    }

    fn find_way(&self, set: usize, tag: u64) -> Option<usize> {
        (0..self.config.ways).find(|&way| {
            let line = &self.lines[self.way_slot(set, way)];
            line.valid && line.tag == tag
        })
    }

    /// The first invalid way in `set`, if any.
    fn first_invalid_way(&self, set: usize) -> Option<usize> {
        (0..self.config.ways).find(|&way| !self.lines[self.way_slot(set, way)].valid)
    }

    /// An invalid way fills before anything is evicted; only once `set` is
    /// full does the LRU policy choose a victim.
    fn pick_victim(&self, set: usize) -> usize {
        self.first_invalid_way(set).unwrap_or_else(|| self.lru.victim(set))
    }

    fn flush(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
        }
        self.lru.clear();
    }

    /// Read one word; returns `(value, hit)`.
    fn read_word(&mut self, paddr: u32) -> Option<(u32, bool)> {
        let line_base = self.config.line_base(paddr);
        let set = self.config.set_index(line_base);
        let tag = self.config.tag(line_base);
        let way = self.find_way(set, tag)?;
        self.lru.touch(set, way);
        let idx = self.config.word_index(paddr, line_base);
        Some((self.lines[self.way_slot(set, way)].data[idx], true))
    }

    /// Write one word into an existing line; returns whether it hit.
    fn write_word_if_present(&mut self, paddr: u32, value: u32) -> bool {
        let line_base = self.config.line_base(paddr);
        let set = self.config.set_index(line_base);
        let tag = self.config.tag(line_base);
        let Some(way) = self.find_way(set, tag) else {
            return false;
        };
        self.lru.touch(set, way);
        let idx = self.config.word_index(paddr, line_base);
        self.lines[self.way_slot(set, way)].data[idx] = value;
        true
    }

    /// Install a freshly fetched line, preferring an invalid way and only
    /// evicting under the LRU policy once `set` is full. Returns the
    /// evicted line's own `(line_base, data)` — recomputed from *this*
    /// cache's own geometry, not the caller's — if a valid line was
    /// evicted, so the caller can demote it into the next level.
    fn install(&mut self, line_base: u32, data: Vec<u32>) -> Option<(u32, Vec<u32>)> {
        let set = self.config.set_index(line_base);
        let tag = self.config.tag(line_base);
        let way = self.pick_victim(set);
        let slot = self.way_slot(set, way);
        let evicted = self.lines[slot].valid.then(|| {
            let evicted_line_base = self.config.line_base_of(self.lines[slot].tag, set);
            (evicted_line_base, self.lines[slot].data.clone())
        });
        self.lines[slot] = CacheLine { valid: true, tag, data };
        self.lru.touch(set, way);
        evicted
    }

    /// Re-insert a previously evicted line verbatim (demotion), recomputing
    /// `set`/`tag` from `line_base` under this cache's own geometry, and
    /// skipping the LRU bump so a demoted line doesn't look freshly touched.
    fn demote(&mut self, line_base: u32, data: Vec<u32>) {
        let set = self.config.set_index(line_base);
        let tag = self.config.tag(line_base);
        if self.find_way(set, tag).is_some() {
            return;
        }
        let way = self.pick_victim(set);
        let slot = self.way_slot(set, way);
        self.lines[slot] = CacheLine { valid: true, tag, data };
    }

    /// Clone the data of the line covering `line_base`, if present.
    fn line_data(&self, line_base: u32) -> Option<Vec<u32>> {
        let set = self.config.set_index(line_base);
        let tag = self.config.tag(line_base);
        let way = self.find_way(set, tag)?;
        Some(self.lines[self.way_slot(set, way)].data.clone())
    }
}

fn fetch_line(mem: &PhysicalMemory, config: CacheConfig, line_base: u32) -> CoreResult<Vec<u32>> {
    (0..config.words_per_line)
        .map(|i| mem.read_word(line_base + (i as u32) * 4))
        .collect()
}

/// Split L1-I/L1-D caches backed by a unified, write-through L2.
pub struct CacheHierarchy {
    l1i: SetAssocCache,
    l1d: SetAssocCache,
    l2: SetAssocCache,
    l2_config: CacheConfig,
}

impl CacheHierarchy {
    /// Build a hierarchy from the L1 (shared by I and D) and L2 geometries.
    #[must_use]
    pub fn new(l1_config: CacheConfig, l2_config: CacheConfig) -> Self {
        Self {
            l1i: SetAssocCache::new(l1_config),
            l1d: SetAssocCache::new(l1_config),
            l2: SetAssocCache::new(l2_config),
            l2_config,
        }
    }

    /// Flush every level.
    pub fn flush(&mut self) {
        self.l1i.flush();
        self.l1d.flush();
        self.l2.flush();
    }

    /// Promote `line_base`'s data into the requested L1, demoting any line
    /// it evicts back down into L2.
    fn promote_into_l1(&mut self, instruction: bool, line_base: u32, data: Vec<u32>) {
        let l1 = if instruction { &mut self.l1i } else { &mut self.l1d };
        if let Some((evicted_line_base, evicted_data)) = l1.install(line_base, data) {
            self.l2.demote(evicted_line_base, evicted_data);
        }
    }

    fn read(&mut self, mem: &PhysicalMemory, paddr: PhysicalAddress, instruction: bool) -> CoreResult<(u32, bool)> {
        let addr = paddr.as_u32();
        let l1 = if instruction { &mut self.l1i } else { &mut self.l1d };
        if let Some((value, _)) = l1.read_word(addr) {
            return Ok((value, true));
        }

        let line_base = self.l2_config.line_base(addr);
        if let Some((value, _)) = self.l2.read_word(addr) {
            let data = fetch_line(mem, self.l2_config, line_base)?;
            self.promote_into_l1(instruction, line_base, data);
            log::trace!("cache l2 hit, refilled l1 for line={line_base:#x}");
            return Ok((value, false));
        }

        let data = fetch_line(mem, self.l2_config, line_base)?;
        // L2 has no further level to demote an evicted line into.
        self.l2.install(line_base, data.clone());
        let idx = self.l2_config.word_index(addr, line_base);
        let value = data[idx];
        self.promote_into_l1(instruction, line_base, data);
        log::trace!("cache line fetched from memory line={line_base:#x}");
        Ok((value, false))
    }

    /// Fetch an instruction word. L1-I never takes writes, so a miss always
    /// resolves through L2 or a line fetch, never allocates on the write
    /// path (there is no write path for instructions).
    pub fn read_instruction(&mut self, mem: &PhysicalMemory, paddr: PhysicalAddress) -> CoreResult<(u32, bool)> {
        self.read(mem, paddr, true)
    }

    /// Read a data word.
    pub fn read_data(&mut self, mem: &PhysicalMemory, paddr: PhysicalAddress) -> CoreResult<(u32, bool)> {
        self.read(mem, paddr, false)
    }

    /// Write a data word: write-through, write-no-allocate on a full miss.
    /// The physical memory word is always updated first. An L1-D hit
    /// updates that line in place. An L1-D miss with an L2 hit updates the
    /// L2 line in place and refills L1-D from it. A miss at both levels
    /// touches only memory.
    pub fn write_data(&mut self, mem: &mut PhysicalMemory, paddr: PhysicalAddress, value: u32) -> CoreResult<bool> {
        let addr = paddr.as_u32();
        mem.write_word(addr & !0x3, value)?;

        if self.l1d.write_word_if_present(addr, value) {
            log::trace!("cache write-through hit in l1d addr={addr:#x}");
            return Ok(true);
        }

        if self.l2.write_word_if_present(addr, value) {
            let line_base = self.l2_config.line_base(addr);
            let data = self.l2.line_data(line_base).expect("line was just updated");
            self.promote_into_l1(false, line_base, data);
            log::trace!("cache write-through hit in l2, refilled l1d addr={addr:#x}");
            return Ok(false);
        }

        log::trace!("cache write-through miss at every level (write-no-allocate) addr={addr:#x}");
        Ok(false)
    }
}
