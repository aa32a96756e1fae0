//! # Virtual and Physical Address Codec (C1)
//!
//! Strongly typed wrappers over the packed virtual/physical bit layouts:
//!
//! - [`VirtualAddress`] — 64 bits: 16 reserved MSBs, four 9-bit page-table
//!   indices (PGD, PUD, PMD, PTE, high to low), a 12-bit page offset.
//! - [`PhysicalAddress`] — 32 bits: a 20-bit physical page number and a
//!   12-bit page offset.
//!
//! Both are `#[repr(transparent)]` newtypes over their raw integer so they
//! remain zero-cost and so virtual/physical addresses can never be mixed up
//! at the type level, in the same spirit as `kernel-memory-addresses`'
//! `VirtualAddress`/`PhysicalAddress` pair.

use crate::error::{BadParameter, CoreError, CoreResult};
use bitfield_struct::bitfield;
use core::fmt;

/// Page size in bytes (4 KiB), shared by both address spaces.
pub const PAGE_SIZE: u32 = 4096;
/// Number of bits in the page offset.
pub const PAGE_OFFSET_BITS: u32 = 12;
/// Number of bits per page-table level index.
pub const LEVEL_INDEX_BITS: u32 = 9;
/// Largest value a 9-bit page-table index may hold.
const MAX_INDEX: u16 = 0x1FF;
/// Largest value the 12-bit page offset may hold.
const MAX_OFFSET: u16 = 0xFFF;
/// Largest 48-bit virtual address value (16 reserved MSBs must be zero).
const MAX_VADDR64: u64 = (1u64 << 48) - 1;

#[bitfield(u64)]
struct VirtualAddressBits {
    #[bits(12)]
    page_offset: u16,
    #[bits(9)]
    pte_entry: u16,
    #[bits(9)]
    pmd_entry: u16,
    #[bits(9)]
    pud_entry: u16,
    #[bits(9)]
    pgd_entry: u16,
    #[bits(16)]
    reserved: u16,
}

/// A 64-bit virtual address, decomposed into four 9-bit page-table indices
/// and a 12-bit page offset.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VirtualAddress(u64);

fn require_index(field: &'static str, value: u16) -> CoreResult<()> {
    if value > MAX_INDEX {
        return Err(BadParameter::FieldOutOfRange {
            field,
            value: value as u64,
            max: MAX_INDEX as u64,
        }
        .into());
    }
    Ok(())
}

impl VirtualAddress {
    /// Build a virtual address from its five fields, rejecting any field
    /// that exceeds its bit width.
    pub fn new(
        pgd_entry: u16,
        pud_entry: u16,
        pmd_entry: u16,
        pte_entry: u16,
        page_offset: u16,
    ) -> CoreResult<Self> {
        require_index("pgd_entry", pgd_entry)?;
        require_index("pud_entry", pud_entry)?;
        require_index("pmd_entry", pmd_entry)?;
        require_index("pte_entry", pte_entry)?;
        if page_offset > MAX_OFFSET {
            return Err(BadParameter::FieldOutOfRange {
                field: "page_offset",
                value: page_offset as u64,
                max: MAX_OFFSET as u64,
            }
            .into());
        }
        let bits = VirtualAddressBits::new()
            .with_page_offset(page_offset)
            .with_pte_entry(pte_entry)
            .with_pmd_entry(pmd_entry)
            .with_pud_entry(pud_entry)
            .with_pgd_entry(pgd_entry)
            .with_reserved(0);
        Ok(Self(bits.into_bits()))
    }

    /// Build a virtual address from a raw 64-bit integer, rejecting values
    /// that use more than the 48 meaningful bits.
    pub fn from_u64(vaddr64: u64) -> CoreResult<Self> {
        if vaddr64 > MAX_VADDR64 {
            return Err(BadParameter::VirtualAddressTooWide(vaddr64).into());
        }
        Ok(Self(vaddr64))
    }

    /// The raw 64-bit value: `(vpn << 12) | offset`.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    fn bits(self) -> VirtualAddressBits {
        VirtualAddressBits::from_bits(self.0)
    }

    /// PGD (outermost) page-table index.
    #[must_use]
    pub fn pgd(self) -> u16 {
        self.bits().pgd_entry()
    }

    /// PUD page-table index.
    #[must_use]
    pub fn pud(self) -> u16 {
        self.bits().pud_entry()
    }

    /// PMD page-table index.
    #[must_use]
    pub fn pmd(self) -> u16 {
        self.bits().pmd_entry()
    }

    /// PTE (innermost) page-table index.
    #[must_use]
    pub fn pte(self) -> u16 {
        self.bits().pte_entry()
    }

    /// The 12-bit in-page offset.
    #[must_use]
    pub fn page_offset(self) -> u16 {
        (self.0 & u64::from(MAX_OFFSET)) as u16
    }

    /// The 36-bit virtual page number: `(pgd<<27)|(pud<<18)|(pmd<<9)|pte`.
    #[must_use]
    pub const fn vpn(self) -> u64 {
        self.0 >> PAGE_OFFSET_BITS
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualAddress(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PGD=0x{:X}; PUD=0x{:X}; PMD=0x{:X}; PTE=0x{:X}; offset=0x{:X}",
            self.pgd(),
            self.pud(),
            self.pmd(),
            self.pte(),
            self.page_offset()
        )
    }
}

#[bitfield(u32)]
struct PhysicalAddressBits {
    #[bits(12)]
    page_offset: u16,
    #[bits(20)]
    phy_page_num: u32,
}

/// A 32-bit physical address: a 20-bit physical page number and a 12-bit
/// page offset.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    /// Build a physical address from a page base (must be a multiple of
    /// [`PAGE_SIZE`]) and a 12-bit offset.
    pub fn new(page_begin: u32, page_offset: u16) -> CoreResult<Self> {
        if page_offset > MAX_OFFSET {
            return Err(BadParameter::FieldOutOfRange {
                field: "page_offset",
                value: page_offset as u64,
                max: MAX_OFFSET as u64,
            }
            .into());
        }
        if page_begin % PAGE_SIZE != 0 {
            return Err(BadParameter::UnalignedPageBase(page_begin).into());
        }
        let bits = PhysicalAddressBits::new()
            .with_page_offset(page_offset)
            .with_phy_page_num(page_begin >> PAGE_OFFSET_BITS);
        Ok(Self(bits.into_bits()))
    }

    /// Build a physical address directly from a 20-bit physical page number
    /// and a 12-bit offset, without the page-base alignment check.
    #[must_use]
    pub fn from_ppn(ppn: u32, page_offset: u16) -> Self {
        let bits = PhysicalAddressBits::new()
            .with_page_offset(page_offset & MAX_OFFSET)
            .with_phy_page_num(ppn & 0xF_FFFF);
        Self(bits.into_bits())
    }

    /// The raw 32-bit value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The 20-bit physical page number.
    #[must_use]
    pub const fn ppn(self) -> u32 {
        self.0 >> PAGE_OFFSET_BITS
    }

    /// The 12-bit in-page offset.
    #[must_use]
    pub fn page_offset(self) -> u16 {
        (self.0 & MAX_OFFSET as u32) as u16
    }

    /// The 4 KiB-aligned page base this address falls within.
    #[must_use]
    pub const fn page_base(self) -> u32 {
        self.0 & !(PAGE_SIZE - 1)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress(0x{:08X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page num=0x{:X}; offset=0x{:X}",
            self.ppn(),
            self.page_offset()
        )
    }
}

/// A 32-bit page-table entry: the high 20 bits are the physical page number
/// of the next level (or the leaf data page); the low 12 bits are zero.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct PageTableEntry(u32);

impl PageTableEntry {
    /// Wrap a raw 32-bit word read from memory as a page-table entry.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self(word & !(PAGE_SIZE - 1))
    }

    /// The 4 KiB-aligned physical base address this entry points to.
    #[must_use]
    pub const fn next_table_base(self) -> u32 {
        self.0
    }
}
