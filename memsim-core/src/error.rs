//! Error taxonomy shared by every core component.
//!
//! Mirrors the exit-code kinds a caller ultimately sees:
//! `BadParameter`, `Mem`, `Size`. `Io` is not produced here — the core never
//! touches a file — but the variant exists so [`CoreError`] composes with
//! [`memsim_cli`](../../memsim-cli)'s own I/O errors under one taxonomy.

use core::fmt;

/// A field value, address, or replacement policy that violates a
/// documented width/alignment/kind constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadParameter {
    /// A page-table index or offset field exceeded its bit width.
    FieldOutOfRange {
        /// Name of the offending field, e.g. `"pgd_entry"`.
        field: &'static str,
        /// The out-of-range value.
        value: u64,
        /// The maximum value the field may hold.
        max: u64,
    },
    /// A 64-bit virtual address used more than the 48 meaningful bits.
    VirtualAddressTooWide(u64),
    /// A physical page base was not a multiple of the page size.
    UnalignedPageBase(u32),
    /// An access was not aligned to its declared data size.
    UnalignedAccess {
        /// The offending virtual address.
        vaddr: u64,
        /// The requested access size in bytes (1 or 4).
        size: u8,
    },
    /// An instruction-type write was requested; the cache layer only
    /// supports instruction reads.
    WriteToInstructionStream,
}

impl fmt::Display for BadParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldOutOfRange { field, value, max } => {
                write!(f, "field `{field}` = {value:#x} exceeds maximum {max:#x}")
            }
            Self::VirtualAddressTooWide(v) => {
                write!(f, "virtual address {v:#x} uses more than 48 bits")
            }
            Self::UnalignedPageBase(p) => {
                write!(f, "page base {p:#x} is not a multiple of the page size")
            }
            Self::UnalignedAccess { vaddr, size } => {
                write!(f, "address {vaddr:#x} is not aligned to a {size}-byte access")
            }
            Self::WriteToInstructionStream => {
                write!(f, "instruction-stream writes are not supported")
            }
        }
    }
}

/// Errors produced by the core (page walker, TLB hierarchy, cache hierarchy).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An out-of-range field, unaligned address, or unsupported write kind.
    #[error("bad parameter: {0}")]
    BadParameter(#[from] BadParameter),

    /// A physical address (or memory-relative offset) fell outside the
    /// bounds of the backing physical memory buffer.
    #[error("address {addr:#x} is out of bounds for a {size}-byte memory")]
    OutOfBounds {
        /// The offending physical address or byte offset.
        addr: u64,
        /// The size of the backing buffer in bytes.
        size: usize,
    },

    /// A fixed-size internal allocation (TLB or cache storage) could not be
    /// sized to the requested line/way count.
    #[error("allocation failed: {0}")]
    Mem(&'static str),

    /// A pop was attempted on an empty list-based LRU policy.
    #[error("pop from empty replacement-policy list")]
    Size,
}

/// Convenience alias used throughout `memsim-core`.
pub type CoreResult<T> = Result<T, CoreError>;
