//! Allocator error types.

use core::fmt;

/// Errors surfaced by the allocator's public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free region satisfied the request at any order down to zero.
    NoSpace,
    /// The block layer failed to read or cow a referenced block (I/O
    /// failure or stale-cache seq mismatch).
    Io,
    /// Programming error: order out of range, or blkno not aligned to
    /// the order claimed on free.
    Invalid,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::NoSpace => write!(f, "no free region of the requested order"),
            AllocError::Io => write!(f, "block I/O or stale reference"),
            AllocError::Invalid => write!(f, "invalid order or misaligned blkno"),
        }
    }
}

pub type Result<T> = core::result::Result<T, AllocError>;
