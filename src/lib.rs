pub mod endian;
pub mod vmstime;
pub mod block;
pub mod item;
pub mod rms;
pub mod recovery;
pub mod label;
pub mod medium;
pub mod sink;
pub mod select;
pub mod listing;
pub mod session;
pub mod saveset;

pub use block::{BlockHeader, RecordType, BLOCK_HEADER_SIZE, DEFAULT_BLOCK_SIZE};
pub use item::{FileMetadata, SavesetSummary};
pub use medium::{DiskImage, Medium, TapeImage};
pub use rms::{Reconstructor, RecordFormat, RmsError};
pub use saveset::{process, ExtractOptions, MediumFormat};
pub use session::{run, FileAction, SessionError, SessionOptions, SessionReport, Visitor};
