//! Resynchronization scanner.
//!
//! # How it works
//!
//! After a bad block has been read in full, the medium sits just past it.
//! The scanner reads forward in header-sized units (256 bytes) and tests
//! each one with [`BlockHeader::is_resync_candidate`]: correct header size,
//! declared block size equal to the negotiated one, data tag, and sane
//! counted-name lengths.  On the first hit it steps the medium back by one
//! unit so the next block read starts on the recovered header.
//!
//! A short read while scanning means the medium ran out before a header
//! turned up; the saveset is unreadable past that point.
//!
//! Scanning needs byte addressing, so it only runs on disk images.  On
//! tape every block is its own record and the session skips a bad one
//! without scanning.

use serde::Serialize;

use super::ScanError;
use crate::block::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::medium::Medium;

/// Where one resynchronization started and ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resync {
    /// Offset of the block that failed validation.
    pub from:  u64,
    /// Offset of the recovered block header.
    pub to:    u64,
    /// Units inspected, the recovered one included.
    pub units: u64,
}

impl Resync {
    /// Bytes given up between the bad block and the recovered one.
    pub fn skipped(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }
}

/// Scan forward from the current position for the next plausible block
/// header of `block_size` bytes.  `scratch` must hold at least one header.
pub fn resync<M: Medium + ?Sized>(
    medium:     &mut M,
    block_size: usize,
    scratch:    &mut [u8],
) -> Result<Resync, ScanError> {
    let from = medium.position().saturating_sub(block_size as u64);
    tracing::warn!(offset = %format!("{from:#010x}"), "start scanning for backup block header");

    let unit = &mut scratch[..BLOCK_HEADER_SIZE];
    let mut units = 0u64;
    loop {
        let at = medium.position();
        let n = medium
            .read_record(unit)
            .map_err(|source| ScanError::Io { offset: at, source })?;
        if n != BLOCK_HEADER_SIZE {
            return Err(ScanError::Exhausted { offset: at + n as u64 });
        }
        units += 1;

        let header = BlockHeader::from_bytes(unit)
            .map_err(|source| ScanError::Io { offset: at, source })?;
        tracing::debug!(
            offset = %format!("{at:#010x}"),
            header_size = header.header_size,
            block_size = header.block_size,
            applic = header.applic,
            "candidate",
        );
        if !header.is_resync_candidate(block_size) {
            continue;
        }

        medium
            .step_back(BLOCK_HEADER_SIZE as u64)
            .map_err(|source| ScanError::Io { offset: at, source })?;
        tracing::warn!(
            offset = %format!("{at:#010x}"),
            skipped = at - from,
            "found backup block header, resuming",
        );
        return Ok(Resync { from, to: at, units });
    }
}
