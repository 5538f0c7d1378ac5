//! Backup block header and backup record (sub-record) header.
//!
//! # Block layout
//!
//! Every saveset block starts with a 256-byte header followed by packed
//! sub-records up to the block size the header declares:
//!
//! ```text
//! [ BlockHeader (256 B) | RecordHeader (16 B) | payload | RecordHeader | payload | ... ]
//! ```
//!
//! All fields are little-endian.  `ssname` and `filename` are counted
//! strings: the first byte is the length.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};
use thiserror::Error;

use crate::endian::{read_u16, read_u32};

/// Size of the block header on the medium.
pub const BLOCK_HEADER_SIZE: usize = 256;
/// Size of each sub-record header.
pub const RECORD_HEADER_SIZE: usize = 16;
/// Block size used when neither the caller nor a tape label says otherwise.
pub const DEFAULT_BLOCK_SIZE: usize = 32256;

const SSNAME_LEN:   usize = 32;
const FILENAME_LEN: usize = 128;

// ── Application tag ──────────────────────────────────────────────────────────

/// `w_applic`: what the block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Ordinary data block with sub-records.
    Data,
    /// XOR redundancy block; valid but carries nothing to decode.
    Xor,
    Other(u16),
}

impl From<u16> for BlockKind {
    fn from(v: u16) -> Self {
        match v {
            1 => BlockKind::Data,
            2 => BlockKind::Xor,
            n => BlockKind::Other(n),
        }
    }
}

// ── BlockHeader ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub header_size:  u16,
    pub opsys:        u16,
    pub subsys:       u16,
    pub applic:       u16,
    pub number:       u32,
    pub struclev:     u16,
    pub volnum:       u16,
    pub crc:          u32,
    pub block_size:   u32,
    pub flags:        u32,
    pub ssname:       [u8; SSNAME_LEN],
    pub fid:          [u16; 3],
    pub did:          [u16; 3],
    pub filename:     [u8; FILENAME_LEN],
    pub rtype:        u8,
    pub rattrib:      u8,
    pub rsize:        u16,
    pub bktsize:      u8,
    pub vfcsize:      u8,
    pub maxrec:       u16,
    pub filesize:     u32,
    pub checksum:     u16,
}

/// Why a block header cannot be trusted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFault {
    #[error("invalid header block size: expected 256 got {0:#x}/{0}")]
    HeaderSize(u16),
    #[error("invalid block size: got {declared}, expected {expected:#x}/{expected}")]
    BlockSize { declared: u32, expected: usize },
    #[error("unexpected application tag {0}")]
    NotData(u16),
    #[error("counted name exceeds its field")]
    NameLength,
}

impl BlockHeader {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let header_size = reader.read_u16::<LittleEndian>()?;
        let opsys       = reader.read_u16::<LittleEndian>()?;
        let subsys      = reader.read_u16::<LittleEndian>()?;
        let applic      = reader.read_u16::<LittleEndian>()?;
        let number      = reader.read_u32::<LittleEndian>()?;
        let mut spare1  = [0u8; 20];
        reader.read_exact(&mut spare1)?;
        let struclev    = reader.read_u16::<LittleEndian>()?;
        let volnum      = reader.read_u16::<LittleEndian>()?;
        let crc         = reader.read_u32::<LittleEndian>()?;
        let block_size  = reader.read_u32::<LittleEndian>()?;
        let flags       = reader.read_u32::<LittleEndian>()?;
        let mut ssname  = [0u8; SSNAME_LEN];
        reader.read_exact(&mut ssname)?;
        let mut fid = [0u16; 3];
        reader.read_u16_into::<LittleEndian>(&mut fid)?;
        let mut did = [0u16; 3];
        reader.read_u16_into::<LittleEndian>(&mut did)?;
        let mut filename = [0u8; FILENAME_LEN];
        reader.read_exact(&mut filename)?;
        let rtype       = reader.read_u8()?;
        let rattrib     = reader.read_u8()?;
        let rsize       = reader.read_u16::<LittleEndian>()?;
        let bktsize     = reader.read_u8()?;
        let vfcsize     = reader.read_u8()?;
        let maxrec      = reader.read_u16::<LittleEndian>()?;
        let filesize    = reader.read_u32::<LittleEndian>()?;
        let mut spare2  = [0u8; 22];
        reader.read_exact(&mut spare2)?;
        let checksum    = reader.read_u16::<LittleEndian>()?;
        Ok(Self {
            header_size, opsys, subsys, applic, number, struclev, volnum, crc,
            block_size, flags, ssname, fid, did, filename, rtype, rattrib,
            rsize, bktsize, vfcsize, maxrec, filesize, checksum,
        })
    }

    /// Decode from the first 256 bytes of a block buffer.
    pub fn from_bytes(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < BLOCK_HEADER_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short block header"));
        }
        Self::read(&buf[..BLOCK_HEADER_SIZE])
    }

    pub fn kind(&self) -> BlockKind {
        BlockKind::from(self.applic)
    }

    /// Saveset name from the counted `ssname` field.
    pub fn saveset_name(&self) -> String {
        counted(&self.ssname)
    }

    /// Validation applied to every block read at the negotiated size.
    ///
    /// XOR blocks pass; the caller skips them.  A zero declared size is
    /// accepted as-is.
    pub fn check(&self, bytes_read: usize) -> Result<(), HeaderFault> {
        if self.header_size as usize != BLOCK_HEADER_SIZE {
            return Err(HeaderFault::HeaderSize(self.header_size));
        }
        if self.block_size != 0 && self.block_size as usize != bytes_read {
            return Err(HeaderFault::BlockSize { declared: self.block_size, expected: bytes_read });
        }
        match self.kind() {
            BlockKind::Data | BlockKind::Xor => {}
            BlockKind::Other(t) => return Err(HeaderFault::NotData(t)),
        }
        self.check_names()
    }

    /// Stricter test used while resynchronizing: the declared size must equal
    /// the negotiated one exactly and only data blocks are accepted.
    pub fn is_resync_candidate(&self, block_size: usize) -> bool {
        self.header_size as usize == BLOCK_HEADER_SIZE
            && self.block_size as usize == block_size
            && self.kind() == BlockKind::Data
            && self.check_names().is_ok()
    }

    fn check_names(&self) -> Result<(), HeaderFault> {
        if self.filename[0] as usize > FILENAME_LEN - 1 || self.ssname[0] as usize > SSNAME_LEN - 1 {
            return Err(HeaderFault::NameLength);
        }
        Ok(())
    }
}

fn counted(field: &[u8]) -> String {
    let len = (field[0] as usize).min(field.len() - 1);
    String::from_utf8_lossy(&field[1..=len]).into_owned()
}

// ── Record type ──────────────────────────────────────────────────────────────

/// `w_rtype` of a backup record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Padding to the end of a block.
    Null,
    Summary,
    Volume,
    File,
    /// File content (virtual block).
    Vbn,
    PhysVol,
    Lbn,
    Fid,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(v: u16) -> Self {
        match v {
            0 => RecordType::Null,
            1 => RecordType::Summary,
            2 => RecordType::Volume,
            3 => RecordType::File,
            4 => RecordType::Vbn,
            5 => RecordType::PhysVol,
            6 => RecordType::Lbn,
            7 => RecordType::Fid,
            n => RecordType::Unknown(n),
        }
    }
}

// ── RecordHeader ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub size:    u16,
    pub rtype:   RecordType,
    pub flags:   u32,
    pub address: u32,
}

impl RecordHeader {
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            size:    read_u16(buf),
            rtype:   RecordType::from(read_u16(&buf[2..])),
            flags:   read_u32(&buf[4..]),
            address: read_u32(&buf[8..]),
        }
    }
}

/// One framed sub-record borrowed from the block buffer.
#[derive(Debug, Clone, Copy)]
pub struct SubRecord<'a> {
    /// Offset of the record header within the block.
    pub offset:  usize,
    pub header:  RecordHeader,
    pub payload: &'a [u8],
}

/// Iterates the sub-records of a validated block.
///
/// Stops at a null record, or as soon as the next header or payload would
/// cross `limit` (the declared block size, clamped to the buffer).
pub struct SubRecords<'a> {
    block:  &'a [u8],
    pos:    usize,
    limit:  usize,
    done:   bool,
}

impl<'a> SubRecords<'a> {
    pub fn new(block: &'a [u8], declared_size: usize) -> Self {
        Self {
            block,
            pos:   BLOCK_HEADER_SIZE,
            limit: declared_size.min(block.len()),
            done:  false,
        }
    }
}

impl<'a> Iterator for SubRecords<'a> {
    type Item = SubRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos + RECORD_HEADER_SIZE > self.limit {
            return None;
        }
        let offset = self.pos;
        let header = RecordHeader::from_bytes(&self.block[offset..offset + RECORD_HEADER_SIZE]);
        if header.rtype == RecordType::Null {
            self.done = true;
            return None;
        }
        let start = offset + RECORD_HEADER_SIZE;
        let end   = start + header.size as usize;
        if end > self.limit {
            tracing::warn!(offset, size = header.size, "sub-record overruns its block; rest of block ignored");
            self.done = true;
            return None;
        }
        self.pos = end;
        Some(SubRecord { offset, header, payload: &self.block[start..end] })
    }
}
