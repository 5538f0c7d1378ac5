//! Recovery from damaged blocks.
//!
//! A block whose header fails validation is not trusted.  The scanner in
//! [`scanner`] walks forward until it finds something that looks like the
//! next block header, then leaves the medium positioned on it.

pub mod scanner;

pub use scanner::{resync, Resync};

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no backup block header found before the end of the medium at {offset:#x}")]
    Exhausted { offset: u64 },
    #[error("read failed at {offset:#x} while scanning for a block header: {source}")]
    Io { offset: u64, source: io::Error },
}
