//! # Split L1 + Unified L2 TLB Hierarchy (C5)
//!
//! Three direct-mapped tables (L1-I, L1-D, L2), each with its own line
//! count, grounded in `original_source/tlb_hrchy_mng.c`. Implements a
//! MIPS-R10k-style inclusion rule: a VPN newly resolved into one L1 is
//! invalidated from the other L1 whenever it is found there, whether the
//! resolution came from an L2 hit or from a full page walk.
//! (`tlb_hrchy_mng.c`'s `tlb_search` macro only performs this check on the
//! page-walk path, and even there it inspects the entry about to be
//! evicted from L2 rather than the VPN just resolved — a bug flagged by
//! the source's own "correcteur" comments; this implementation invalidates
//! on both paths and checks the right VPN.)

use crate::addr::{PhysicalAddress, VirtualAddress};
use crate::error::CoreResult;
use crate::memory::PhysicalMemory;
use crate::pagewalk::walk;
use log::trace;

/// Which side of the split L1 an access belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// Instruction fetch — routed through L1-I.
    Instruction,
    /// Data read/write — routed through L1-D.
    Data,
}

#[derive(Copy, Clone, Default)]
struct HierEntry {
    valid: bool,
    tag: u64,
    ppn: u32,
}

/// A direct-mapped TLB with `lines` sets (`lines` must be a power of two).
struct DirectMappedTlb {
    lines: usize,
    lines_bits: u32,
    entries: Vec<HierEntry>,
}

impl DirectMappedTlb {
    fn new(lines: usize) -> Self {
        assert!(lines.is_power_of_two(), "TLB line count must be a power of two");
        Self {
            lines,
            lines_bits: lines.trailing_zeros(),
            entries: vec![HierEntry::default(); lines],
        }
    }

    fn flush(&mut self) {
        for e in &mut self.entries {
            *e = HierEntry::default();
        }
    }

    fn index(&self, vpn: u64) -> usize {
        (vpn % self.lines as u64) as usize
    }

    fn tag(&self, vpn: u64) -> u64 {
        vpn >> self.lines_bits
    }

    fn probe(&self, vpn: u64) -> Option<u32> {
        let idx = self.index(vpn);
        let entry = self.entries[idx];
        (entry.valid && entry.tag == self.tag(vpn)).then_some(entry.ppn)
    }

    fn install(&mut self, vpn: u64, ppn: u32) {
        let idx = self.index(vpn);
        let tag = self.tag(vpn);
        self.entries[idx] = HierEntry { valid: true, tag, ppn };
    }

    /// If `vpn` is present, invalidate it and report the previous PPN.
    fn invalidate_if_present(&mut self, vpn: u64) -> bool {
        let idx = self.index(vpn);
        let entry = &mut self.entries[idx];
        if entry.valid && entry.tag == self.tag(vpn) {
            entry.valid = false;
            true
        } else {
            false
        }
    }
}

/// Split L1 instruction/data TLBs backed by a unified L2 TLB.
pub struct TlbHierarchy {
    l1i: DirectMappedTlb,
    l1d: DirectMappedTlb,
    l2: DirectMappedTlb,
}

impl TlbHierarchy {
    /// Build a hierarchy with `l1_lines` lines per L1 TLB and `l2_lines`
    /// lines in the unified L2 TLB.
    #[must_use]
    pub fn new(l1_lines: usize, l2_lines: usize) -> Self {
        Self {
            l1i: DirectMappedTlb::new(l1_lines),
            l1d: DirectMappedTlb::new(l1_lines),
            l2: DirectMappedTlb::new(l2_lines),
        }
    }

    /// Flush all three TLBs.
    pub fn flush(&mut self) {
        self.l1i.flush();
        self.l1d.flush();
        self.l2.flush();
    }

    fn this_and_other(&mut self, access: AccessKind) -> (&mut DirectMappedTlb, &mut DirectMappedTlb) {
        match access {
            AccessKind::Instruction => (&mut self.l1i, &mut self.l1d),
            AccessKind::Data => (&mut self.l1d, &mut self.l1i),
        }
    }

    /// Resolve `vaddr` through the hierarchy: probe `this` L1 first, then
    /// L2, then fall back to a full page walk.
    ///
    /// Returns `(paddr, l1_hit)`; `l1_hit` is true only when the requested
    /// L1 TLB itself held the translation.
    pub fn search(
        &mut self,
        mem: &PhysicalMemory,
        vaddr: VirtualAddress,
        access: AccessKind,
    ) -> CoreResult<(PhysicalAddress, bool)> {
        let vpn = vaddr.vpn();

        {
            let (this, _other) = self.this_and_other(access);
            if let Some(ppn) = this.probe(vpn) {
                return Ok((PhysicalAddress::from_ppn(ppn, vaddr.page_offset()), true));
            }
        }

        if let Some(ppn) = self.l2.probe(vpn) {
            let (this, other) = self.this_and_other(access);
            this.install(vpn, ppn);
            trace!("tlb l2 hit, refilled l1 for vpn={vpn:#x}");
            if other.invalidate_if_present(vpn) {
                log::warn!("tlb inclusion: invalidated opposite l1 entry for vpn={vpn:#x}");
            }
            return Ok((PhysicalAddress::from_ppn(ppn, vaddr.page_offset()), false));
        }

        let paddr = walk(mem, vaddr)?;
        let ppn = paddr.ppn();
        self.l2.install(vpn, ppn);
        let (this, other) = self.this_and_other(access);
        this.install(vpn, ppn);
        trace!("tlb page-walked vpn={vpn:#x} -> ppn={ppn:#x}");
        if other.invalidate_if_present(vpn) {
            log::warn!("tlb inclusion: invalidated opposite l1 entry for vpn={vpn:#x}");
        }
        Ok((paddr, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_memory() -> PhysicalMemory {
        let mut mem = PhysicalMemory::zeroed(0x5000);
        mem.write_word(0, 0x1000).unwrap();
        mem.write_word(0x1000, 0x2000).unwrap();
        mem.write_word(0x2000, 0x3000).unwrap();
        mem.write_word(0x3000, 0x0000).unwrap();
        mem
    }

    #[test]
    fn cold_miss_then_l1_hit() {
        let mem = identity_memory();
        let mut tlb = TlbHierarchy::new(4, 8);
        let v = VirtualAddress::from_u64(0xabc).unwrap();
        let (_, hit1) = tlb.search(&mem, v, AccessKind::Data).unwrap();
        assert!(!hit1);
        let (paddr, hit2) = tlb.search(&mem, v, AccessKind::Data).unwrap();
        assert!(hit2);
        assert_eq!(paddr.as_u32(), 0xabc);
    }

    /// An instruction read fills L1-I and L2 for V; a subsequent data read
    /// at V must invalidate the L1-I entry and install L1-D, while L2 keeps
    /// mapping V.
    #[test]
    fn data_access_invalidates_the_other_l1_after_an_instruction_fetch() {
        let mem = identity_memory();
        let mut tlb = TlbHierarchy::new(4, 8);
        let v = VirtualAddress::from_u64(0xabc).unwrap();

        tlb.search(&mem, v, AccessKind::Instruction).unwrap();
        assert!(tlb.l1i.probe(v.vpn()).is_some());

        let (paddr, l1d_hit) = tlb.search(&mem, v, AccessKind::Data).unwrap();
        assert!(!l1d_hit, "first data access after an instruction fetch is an L1-D miss");
        assert_eq!(paddr.as_u32(), 0xabc);
        assert!(tlb.l1i.probe(v.vpn()).is_none(), "L1-I entry must be invalidated");
        assert!(tlb.l1d.probe(v.vpn()).is_some(), "L1-D must now hold the translation");
        assert!(tlb.l2.probe(v.vpn()).is_some(), "L2 still maps V");
    }

    #[test]
    fn flush_clears_every_level() {
        let mem = identity_memory();
        let mut tlb = TlbHierarchy::new(4, 8);
        let v = VirtualAddress::from_u64(0xabc).unwrap();
        tlb.search(&mem, v, AccessKind::Data).unwrap();
        tlb.flush();
        let (_, hit) = tlb.search(&mem, v, AccessKind::Data).unwrap();
        assert!(!hit);
    }
}
