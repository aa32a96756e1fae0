//! # Fully-Associative TLB with Pluggable Replacement (C4)
//!
//! Grounded in `original_source/tlb_mng.c` (`tlb_hit`/`tlb_search`) and the
//! generic doubly-linked list of `original_source/list.c`. The replacement
//! policy is a [`ReplacementPolicy`] collaborator so the TLB's hit/miss
//! logic doesn't know how eviction order is tracked; [`ListLru`] is the one
//! concrete policy, a doubly-linked list over line indices mirroring the
//! source's `move_back`/`push_back`/`pop_front` shape.

use crate::addr::{PhysicalAddress, VirtualAddress};
use crate::error::{CoreError, CoreResult};
use crate::pagewalk::walk;
use crate::memory::PhysicalMemory;

/// A replacement-policy collaborator for the fully-associative TLB.
///
/// The policy owns one node per line index, seeded once at construction; it
/// never gains or loses nodes afterward, only reorders them.
pub trait ReplacementPolicy {
    /// Build a policy already containing `0..lines`, in order.
    fn seeded(lines: usize) -> Self
    where
        Self: Sized;

    /// Line indices, most-recently-used first.
    fn most_recent_first(&self) -> Vec<usize>;

    /// Move `value` (already a member) to the most-recently-used end.
    fn move_to_back(&mut self, value: usize);

    /// Remove and return the next eviction candidate.
    fn pop_front(&mut self) -> CoreResult<usize>;

    /// Re-insert `value` at the most-recently-used end after an eviction.
    fn push_back(&mut self, value: usize);
}

/// A doubly-linked list of line indices: front is the next eviction
/// candidate, back is the most recently used.
pub struct ListLru {
    prev: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    front: Option<usize>,
    back: Option<usize>,
}

impl ReplacementPolicy for ListLru {
    fn seeded(lines: usize) -> Self {
        let mut list = Self {
            prev: vec![None; lines],
            next: vec![None; lines],
            front: None,
            back: None,
        };
        for i in 0..lines {
            list.push_back(i);
        }
        list
    }

    fn most_recent_first(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = self.back;
        while let Some(value) = cur {
            out.push(value);
            cur = self.prev[value];
        }
        out
    }

    fn move_to_back(&mut self, value: usize) {
        if self.back == Some(value) {
            return;
        }
        let prev = self.prev[value];
        let next = self.next[value];
        if let Some(next) = next {
            self.prev[next] = prev;
        }
        if let Some(prev) = prev {
            self.next[prev] = next;
        } else {
            self.front = next;
        }
        if let Some(back) = self.back {
            self.next[back] = Some(value);
        }
        self.prev[value] = self.back;
        self.next[value] = None;
        self.back = Some(value);
    }

    fn pop_front(&mut self) -> CoreResult<usize> {
        let front = self.front.ok_or(CoreError::Size)?;
        self.front = self.next[front];
        if let Some(new_front) = self.front {
            self.prev[new_front] = None;
        } else {
            self.back = None;
        }
        Ok(front)
    }

    fn push_back(&mut self, value: usize) {
        if let Some(back) = self.back {
            self.next[back] = Some(value);
            self.prev[value] = Some(back);
            self.next[value] = None;
            self.back = Some(value);
        } else {
            self.prev[value] = None;
            self.next[value] = None;
            self.front = Some(value);
            self.back = Some(value);
        }
    }
}

/// One line of the fully-associative TLB.
#[derive(Copy, Clone, Default)]
struct SimpleTlbEntry {
    valid: bool,
    tag: u64,
    ppn: u32,
}

/// A fully-associative TLB of `lines` entries, driven by replacement policy
/// `P`. Defaults to [`ListLru`], the policy the source actually implements.
pub struct SimpleTlb<P: ReplacementPolicy = ListLru> {
    entries: Vec<SimpleTlbEntry>,
    policy: P,
    lines: usize,
}

impl SimpleTlb<ListLru> {
    /// Build a fully-associative TLB with `lines` lines, all invalid, using
    /// the list-based LRU policy.
    #[must_use]
    pub fn new(lines: usize) -> Self {
        Self::with_policy(lines, ListLru::seeded(lines))
    }
}

impl<P: ReplacementPolicy> SimpleTlb<P> {
    /// Build a fully-associative TLB over an already-seeded policy.
    #[must_use]
    pub fn with_policy(lines: usize, policy: P) -> Self {
        Self {
            entries: vec![SimpleTlbEntry::default(); lines],
            policy,
            lines,
        }
    }

    /// Reset every line to invalid and reseed the policy.
    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            *entry = SimpleTlbEntry::default();
        }
        self.policy = P::seeded(self.lines);
    }

    /// Scan entries most-recently-used first; on a tag match, rebuild the
    /// physical address, move the hit line to the back of the policy list,
    /// and return it.
    fn hit(&mut self, vaddr: VirtualAddress) -> Option<PhysicalAddress> {
        let vpn = vaddr.vpn();
        let hit_line = self
            .policy
            .most_recent_first()
            .into_iter()
            .find(|&line| self.entries[line].valid && self.entries[line].tag == vpn)?;
        let ppn = self.entries[hit_line].ppn;
        self.policy.move_to_back(hit_line);
        Some(PhysicalAddress::from_ppn(ppn, vaddr.page_offset()))
    }

    /// Try a hit; on miss, page-walk and install the result at the current
    /// eviction candidate line, moving that line to the most-recently-used
    /// end.
    ///
    /// Returns `(paddr, hit)`.
    pub fn search(
        &mut self,
        mem: &PhysicalMemory,
        vaddr: VirtualAddress,
    ) -> CoreResult<(PhysicalAddress, bool)> {
        if let Some(paddr) = self.hit(vaddr) {
            return Ok((paddr, true));
        }
        let paddr = walk(mem, vaddr)?;
        let victim = self.policy.pop_front()?;
        self.entries[victim] = SimpleTlbEntry {
            valid: true,
            tag: vaddr.vpn(),
            ppn: paddr.ppn(),
        };
        self.policy.push_back(victim);
        log::trace!("simple tlb refill line={victim} vpn={:#x}", vaddr.vpn());
        Ok((paddr, false))
    }
}
