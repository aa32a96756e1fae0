//! Translation Lookaside Buffers: a simple fully-associative design (C4)
//! and the split L1/unified L2 hierarchy with inclusion enforcement (C5).

mod hierarchy;
mod simple;

pub use hierarchy::{AccessKind, TlbHierarchy};
pub use simple::{ListLru, ReplacementPolicy, SimpleTlb};
