//! Block I/O façade (spec.md §6): the interface the embedding filesystem
//! implements so this crate can read, cow, and create blocks, plus the
//! crash-consistent block reference and superblock-pair view.

use core::ops::{Deref, DerefMut};

use crate::error::Result;

/// Crash-consistent identity for a block: its device address plus the
/// write-sequence number the block layer stamped it with. A mismatch on
/// read means a stale cached block, not this crate's concern to detect —
/// `BlockIo::read_ref` surfaces it as `AllocError::Io`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRef {
    pub blkno: u64,
    pub seq: u64,
}

impl BlockRef {
    /// The null reference: "this slot/field has never been populated".
    pub const NULL: BlockRef = BlockRef { blkno: 0, seq: 0 };

    /// Decode a 16-byte little-endian `(blkno, seq)` pair.
    pub fn decode(buf: &[u8]) -> Self {
        BlockRef {
            blkno: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            seq: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
        }
    }

    /// Encode into a 16-byte little-endian `(blkno, seq)` pair.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.blkno.to_le_bytes());
        buf[8..16].copy_from_slice(&self.seq.to_le_bytes());
    }
}

/// A writable, byte-addressable view of one block's contents, released
/// (per spec.md §9's "scoped owner" design note) whenever the handle is
/// dropped, on every exit path including error returns.
pub trait BlockBuf: Deref<Target = [u8]> + DerefMut<Target = [u8]> {}

impl<T> BlockBuf for T where T: Deref<Target = [u8]> + DerefMut<Target = [u8]> {}

/// The block layer's contract with this crate (spec.md §6).
///
/// Implemented by the embedding filesystem. Methods take `&self` because
/// the façade is expected to provide its own interior synchronization
/// (mirrors `driver::BlockDevice`'s `&self`-based trait methods elsewhere
/// in this workspace) — `Allocator`'s own mutex only serializes the
/// *sequence* of façade calls that make up one logical allocator
/// mutation, not each call in isolation.
pub trait BlockIo {
    type Buf: BlockBuf;

    /// Read the block named by `r`. Fails with `Io` on a seq mismatch
    /// (stale cache) or an underlying device error.
    fn read_ref(&self, r: BlockRef) -> Result<Self::Buf>;

    /// Return a cow-writable copy of the block named by `r`, updating `r`
    /// in place to the new location if a new copy was made (the fast path
    /// returns the existing copy unchanged when it's already dirty in
    /// this transaction).
    fn dirty_ref(&self, r: &mut BlockRef) -> Result<Self::Buf>;

    /// Produce an uninitialized writable buffer at a brand-new `blkno`
    /// (used right after a bitmap allocation, for a slot's first buddy
    /// block), together with the reference the block layer assigned it —
    /// the new block's `seq` is the block layer's to stamp, not this
    /// crate's.
    fn dirty_new(&self, blkno: u64) -> Result<(Self::Buf, BlockRef)>;
}

/// The minimal view of the superblock pair this crate needs (spec.md §6).
/// Mkfs and superblock loading are out of scope; the embedder owns the
/// rest of the superblock and hands this view to [`crate::Allocator::new`],
/// then swaps dirty into stable at commit (spec.md §3 lifecycle) via
/// [`crate::Allocator::commit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SuperRefs {
    pub total_blocks: u64,
    pub buddy_blocks: u32,
    pub buddy_bm_ref: BlockRef,
    pub buddy_ind_ref: BlockRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ref_round_trips() {
        let r = BlockRef { blkno: 0x0102_0304_0506_0708, seq: 42 };
        let mut buf = [0u8; 16];
        r.encode(&mut buf);
        assert_eq!(BlockRef::decode(&buf), r);
    }

    #[test]
    fn null_ref_is_zero() {
        assert_eq!(BlockRef::NULL, BlockRef { blkno: 0, seq: 0 });
    }
}
