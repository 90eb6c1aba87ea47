//! Copy-on-write buddy block allocator for a log-structured filesystem.
//!
//! This crate answers three questions at high throughput with
//! crash-consistency guarantees: which physical block region may be
//! written to now, how a previously-allocated region is returned to the
//! free pool, and whether a region was free at the last durable
//! checkpoint. Because metadata is cow-updated, the allocator must never
//! hand out space that an older, still-referenced metadata snapshot
//! points at, even if that space is free in the current working set.
//!
//! The crate is organized leaves-first:
//! - [`region`] (C1) classifies a blkno into `PAIR`/`BITMAP`/`BUDDY` and
//!   provides the slot/bit addressing arithmetic every other module uses.
//! - [`bitmap`] (C2) hands out the blocks that back the buddy index
//!   itself, from a fixed-location bitmap block plus its stable twin.
//! - [`buddy`] (C3) is the hierarchical per-slot order index: find/split
//!   on allocate, merge on free.
//! - [`indirect`] (C4) is the single parent index over all slots and the
//!   public [`Allocator`] entry point.
//! - [`block`] defines the block I/O façade the embedding filesystem
//!   implements, plus the crash-consistent block reference type.
//! - [`error`] defines the error type surfaced by the public API.
//!
//! Out of scope: the file-data block-mapping layer, the inode B-tree,
//! the page/buffer cache, the trace subsystem, VFS glue, and
//! mkfs/superblock loading. This crate's only contract with them is the
//! [`block::BlockIo`] façade and the [`block::SuperRefs`] view.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bitmap;
pub mod block;
pub mod buddy;
pub mod error;
pub mod indirect;
pub mod region;

pub use block::{BlockBuf, BlockIo, BlockRef, SuperRefs};
pub use error::{AllocError, Result};
pub use indirect::Allocator;
pub use region::{Geometry, Region};
