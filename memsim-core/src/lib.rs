//! Address translation, TLB hierarchy and cache hierarchy of the
//! memory-system simulator.
//!
//! This crate is the hard-engineering core: it never touches a file or the
//! network, and every operation is expressed over [`memory::PhysicalMemory`]
//! so it can be exercised directly from tests. Parsing command files,
//! loading memory images and presenting results to a terminal are external
//! collaborators' jobs.

pub mod addr;
pub mod cache;
pub mod error;
pub mod executor;
pub mod memory;
pub mod pagewalk;
pub mod tlb;

pub use error::{CoreError, CoreResult};
