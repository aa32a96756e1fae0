//! # Command Executor (C8)
//!
//! Wires the TLB hierarchy and the cache hierarchy together the way
//! `original_source/commands.c`'s `handle_line_*` family drives the
//! simulator core: translate first, then read or write through the cache.
//! Illegal states (a write command with no value to write) are ruled out by
//! [`Access`]'s shape rather than checked at runtime.

use crate::addr::{PhysicalAddress, VirtualAddress};
use crate::cache::CacheHierarchy;
use crate::error::{BadParameter, CoreResult};
use crate::memory::PhysicalMemory;
use crate::tlb::{AccessKind, TlbHierarchy};

/// One command to execute against the hierarchy.
#[derive(Copy, Clone, Debug)]
pub enum Access {
    /// Fetch `data_size` bytes as an instruction at `vaddr`.
    Instruction { vaddr: VirtualAddress, data_size: u8 },
    /// Read `data_size` bytes of data at `vaddr`.
    Read { vaddr: VirtualAddress, data_size: u8 },
    /// Write `value`'s low `data_size` bytes of data at `vaddr`.
    Write { vaddr: VirtualAddress, data_size: u8, value: u32 },
}

impl Access {
    fn vaddr(self) -> VirtualAddress {
        match self {
            Self::Instruction { vaddr, .. } | Self::Read { vaddr, .. } | Self::Write { vaddr, .. } => vaddr,
        }
    }

    fn data_size(self) -> u8 {
        match self {
            Self::Instruction { data_size, .. } | Self::Read { data_size, .. } | Self::Write { data_size, .. } => {
                data_size
            }
        }
    }
}

/// Result of executing one [`Access`].
#[derive(Copy, Clone, Debug)]
pub struct AccessOutcome {
    /// Physical address the access resolved to.
    pub paddr: PhysicalAddress,
    /// Whether the requested L1 TLB itself held the translation.
    pub tlb_hit: bool,
    /// Whether the requested L1 cache itself held the line.
    pub cache_hit: bool,
    /// The value read, for [`Access::Instruction`] and [`Access::Read`].
    pub read_value: Option<u32>,
}

fn require_size(data_size: u8) -> CoreResult<()> {
    if data_size != 1 && data_size != 4 {
        return Err(BadParameter::FieldOutOfRange {
            field: "data_size",
            value: u64::from(data_size),
            max: 4,
        }
        .into());
    }
    Ok(())
}

fn require_alignment(vaddr: VirtualAddress, data_size: u8) -> CoreResult<()> {
    if data_size == 4 && vaddr.as_u64() % 4 != 0 {
        return Err(BadParameter::UnalignedAccess {
            vaddr: vaddr.as_u64(),
            size: data_size,
        }
        .into());
    }
    Ok(())
}

fn byte_shift(vaddr: VirtualAddress) -> u32 {
    (vaddr.as_u64() % 4) as u32 * 8
}

fn extract_byte(word: u32, vaddr: VirtualAddress) -> u32 {
    (word >> byte_shift(vaddr)) & 0xFF
}

fn merge_byte(word: u32, vaddr: VirtualAddress, byte: u32) -> u32 {
    let shift = byte_shift(vaddr);
    let mask = !(0xFFu32 << shift);
    (word & mask) | ((byte & 0xFF) << shift)
}

/// Drives a [`TlbHierarchy`] and a [`CacheHierarchy`] against one
/// [`PhysicalMemory`], one [`Access`] at a time.
pub struct Executor {
    tlb: TlbHierarchy,
    cache: CacheHierarchy,
}

impl Executor {
    /// Build an executor from an already-configured TLB and cache hierarchy.
    #[must_use]
    pub fn new(tlb: TlbHierarchy, cache: CacheHierarchy) -> Self {
        Self { tlb, cache }
    }

    /// Flush both hierarchies.
    pub fn flush(&mut self) {
        self.tlb.flush();
        self.cache.flush();
    }

    /// Execute one access against `mem`.
    pub fn execute(&mut self, mem: &mut PhysicalMemory, access: Access) -> CoreResult<AccessOutcome> {
        require_size(access.data_size())?;
        require_alignment(access.vaddr(), access.data_size())?;

        match access {
            Access::Instruction { vaddr, data_size } => {
                let (paddr, tlb_hit) = self.tlb.search(mem, vaddr, AccessKind::Instruction)?;
                let (word, cache_hit) = self.cache.read_instruction(mem, paddr)?;
                let value = if data_size == 4 { word } else { extract_byte(word, vaddr) };
                Ok(AccessOutcome { paddr, tlb_hit, cache_hit, read_value: Some(value) })
            }
            Access::Read { vaddr, data_size } => {
                let (paddr, tlb_hit) = self.tlb.search(mem, vaddr, AccessKind::Data)?;
                let (word, cache_hit) = self.cache.read_data(mem, paddr)?;
                let value = if data_size == 4 { word } else { extract_byte(word, vaddr) };
                Ok(AccessOutcome { paddr, tlb_hit, cache_hit, read_value: Some(value) })
            }
            Access::Write { vaddr, data_size, value } => {
                let (paddr, tlb_hit) = self.tlb.search(mem, vaddr, AccessKind::Data)?;
                let word_to_write = if data_size == 4 {
                    value
                } else {
                    let (current, _) = self.cache.read_data(mem, paddr)?;
                    merge_byte(current, vaddr, value)
                };
                let cache_hit = self.cache.write_data(mem, paddr, word_to_write)?;
                Ok(AccessOutcome { paddr, tlb_hit, cache_hit, read_value: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    fn identity_memory() -> PhysicalMemory {
        let mut mem = PhysicalMemory::zeroed(0x6000);
        mem.write_word(0, 0x1000).unwrap();
        mem.write_word(0x1000, 0x2000).unwrap();
        mem.write_word(0x2000, 0x3000).unwrap();
        mem.write_word(0x3000 + 5 * 4, 0x5000).unwrap(); // PTE[5] maps vaddr 0x5000's VPN
        mem.write_word(0x5000, 0x1122_3344).unwrap();
        mem
    }

    fn executor() -> Executor {
        let l1 = CacheConfig { sets: 4, ways: 2, words_per_line: 4 };
        let l2 = CacheConfig { sets: 8, ways: 4, words_per_line: 4 };
        Executor::new(TlbHierarchy::new(4, 8), CacheHierarchy::new(l1, l2))
    }

    #[test]
    fn word_read_round_trips_through_every_level() {
        let mut mem = identity_memory();
        let mut exec = executor();
        let vaddr = VirtualAddress::from_u64(0x5000).unwrap();
        let outcome = exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
        assert_eq!(outcome.read_value, Some(0x1122_3344));
        assert!(!outcome.tlb_hit);
        assert!(!outcome.cache_hit);
    }

    #[test]
    fn byte_write_merges_into_the_containing_word() {
        let mut mem = identity_memory();
        let mut exec = executor();
        let vaddr = VirtualAddress::from_u64(0x5001).unwrap();
        exec.execute(&mut mem, Access::Write { vaddr, data_size: 1, value: 0xFF }).unwrap();
        assert_eq!(mem.read_word(0x5000).unwrap(), 0x1122_FF44);
    }

    #[test]
    fn unaligned_word_access_is_rejected() {
        let mut mem = identity_memory();
        let mut exec = executor();
        let vaddr = VirtualAddress::from_u64(0x5001).unwrap();
        assert!(exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).is_err());
    }

    #[test]
    fn second_word_read_hits_every_level() {
        let mut mem = identity_memory();
        let mut exec = executor();
        let vaddr = VirtualAddress::from_u64(0x5000).unwrap();
        exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
        let outcome = exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
        assert!(outcome.tlb_hit);
        assert!(outcome.cache_hit);
    }
}
