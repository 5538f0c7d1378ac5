//! RMS record reconstruction.
//!
//! A saved file's content arrives as the raw on-disk bytes of an RMS file,
//! split across any number of VBN records.  [`Reconstructor`] turns that raw
//! stream back into a host file according to the file's record format:
//!
//! | Format | Raw framing | Output (text mode) |
//! |--------|-------------|--------------------|
//! | Fixed | records of `record_size` bytes | verbatim |
//! | Variable | `len u16`, data, pad to even | data + `\n` per record |
//! | VFC | `len u16`, control (`vfc_size` B), data, pad | data + `\n` per record |
//! | Stream, Stream_LF | bytes | verbatim |
//! | Stream_CR | bytes | `\r` becomes `\n` |
//!
//! In binary mode the length words, control bytes and pad bytes are copied
//! through and no terminators are added, so the output is the raw stream.
//!
//! State carries across [`Reconstructor::feed`] calls, so a record may
//! straddle VBN records.  Consumption stops at the file's logical size;
//! anything beyond it is slack in the last block.

use std::io::{self, Write};
use thiserror::Error;

use crate::item::{FileMetadata, RecordAttributes};

/// Soft chunk length for stream formats.
const STREAM_CHUNK: u32 = 512;
const LINE_END: u8 = b'\n';

// ── RecordFormat ─────────────────────────────────────────────────────────────

/// `FAB$B_RFM` record format.  The whole byte is significant: a non-zero
/// organization nibble makes the format unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Undefined,
    Fixed,
    Variable,
    Vfc,
    Stream,
    StreamLf,
    StreamCr,
    Other(u8),
}

impl From<u8> for RecordFormat {
    fn from(v: u8) -> Self {
        match v {
            0 => RecordFormat::Undefined,
            1 => RecordFormat::Fixed,
            2 => RecordFormat::Variable,
            3 => RecordFormat::Vfc,
            4 => RecordFormat::Stream,
            5 => RecordFormat::StreamLf,
            6 => RecordFormat::StreamCr,
            n => RecordFormat::Other(n),
        }
    }
}

impl RecordFormat {
    pub fn code(self) -> u8 {
        match self {
            RecordFormat::Undefined => 0,
            RecordFormat::Fixed     => 1,
            RecordFormat::Variable  => 2,
            RecordFormat::Vfc       => 3,
            RecordFormat::Stream    => 4,
            RecordFormat::StreamLf  => 5,
            RecordFormat::StreamCr  => 6,
            RecordFormat::Other(n)  => n,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Failures that end extraction of the current file only.
#[derive(Error, Debug)]
pub enum RmsError {
    #[error("Invalid record format =0x{code:02x}/{code}")]
    UnsupportedFormat { code: u8 },
    #[error("write to output failed: {0}")]
    Sink(#[from] io::Error),
}

// ── Reconstructor ────────────────────────────────────────────────────────────

/// Position inside a variable-length record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Expecting the length word; holds its low byte once seen.
    Length(Option<u8>),
    /// Skipping the fixed control area of a VFC record.
    Control(usize),
    Data,
    /// One byte to restore word alignment.
    Pad,
}

/// Per-file reconstruction state, created when the output opens.
#[derive(Debug)]
pub struct Reconstructor {
    format:      RecordFormat,
    attributes:  RecordAttributes,
    record_size: u16,
    vfc_size:    usize,
    binary:      bool,
    /// Raw bytes this file has on disk.
    limit:       u64,
    /// Raw bytes consumed so far.
    consumed:    u64,
    /// Bytes left in the current record or stream chunk.
    remaining:   u32,
    /// Length word of the current variable record.
    declared:    u32,
    phase:       Phase,
    records:     u64,
}

impl Reconstructor {
    pub fn new(meta: &FileMetadata, binary: bool) -> Self {
        Self {
            format:      meta.format(),
            attributes:  meta.attributes,
            record_size: meta.record_size,
            vfc_size:    meta.vfc_size as usize,
            binary,
            limit:       meta.logical_size(),
            consumed:    0,
            remaining:   0,
            declared:    0,
            phase:       Phase::Length(None),
            records:     0,
        }
    }

    pub fn format(&self) -> RecordFormat { self.format }

    /// Raw bytes consumed so far; never exceeds the logical size.
    pub fn consumed(&self) -> u64 { self.consumed }

    /// Records completed so far (lines for the stream formats).
    pub fn records(&self) -> u64 { self.records }

    pub fn is_complete(&self) -> bool { self.consumed >= self.limit }

    /// Consume one VBN payload and write the reconstructed bytes to `out`.
    pub fn feed<W: Write + ?Sized>(&mut self, data: &[u8], out: &mut W) -> Result<(), RmsError> {
        let take = (self.limit - self.consumed).min(data.len() as u64) as usize;
        let data = &data[..take];
        if data.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::with_capacity(data.len() + data.len() / 8);
        match self.format {
            RecordFormat::Fixed    => self.fixed(data, &mut buf),
            RecordFormat::Variable => self.variable(data, 0, &mut buf),
            RecordFormat::Vfc      => self.variable(data, self.vfc_size, &mut buf),
            RecordFormat::Stream | RecordFormat::StreamLf => self.stream_lf(data, &mut buf),
            RecordFormat::StreamCr => self.stream_cr(data, &mut buf),
            RecordFormat::Undefined | RecordFormat::Other(_) => {
                return Err(RmsError::UnsupportedFormat { code: self.format.code() });
            }
        }
        self.consumed += data.len() as u64;
        out.write_all(&buf)?;
        Ok(())
    }

    fn fixed(&mut self, data: &[u8], buf: &mut Vec<u8>) {
        buf.extend_from_slice(data);
        if self.record_size == 0 {
            return;
        }
        for _ in data {
            if self.remaining == 0 {
                self.remaining = self.record_size as u32;
            }
            self.remaining -= 1;
            if self.remaining == 0 {
                self.records += 1;
            }
        }
    }

    fn variable(&mut self, data: &[u8], control: usize, buf: &mut Vec<u8>) {
        let mut pos = self.consumed;
        for &b in data {
            pos += 1;
            match self.phase {
                Phase::Length(None) => {
                    self.keep_raw(b, buf);
                    self.phase = Phase::Length(Some(b));
                }
                Phase::Length(Some(low)) => {
                    self.keep_raw(b, buf);
                    self.declared = u16::from_le_bytes([low, b]) as u32;
                    if control > 0 {
                        // A length shorter than the control area ends the
                        // record at the control area.
                        self.remaining = self.declared.saturating_sub(control as u32);
                        self.phase = Phase::Control(control);
                    } else {
                        self.remaining = self.declared;
                        self.phase = Phase::Data;
                        if self.remaining == 0 {
                            self.end_record(pos, buf);
                        }
                    }
                }
                Phase::Control(left) => {
                    self.keep_raw(b, buf);
                    if left > 1 {
                        self.phase = Phase::Control(left - 1);
                    } else {
                        self.phase = Phase::Data;
                        if self.remaining == 0 {
                            self.end_record(pos, buf);
                        }
                    }
                }
                Phase::Data => {
                    if self.remaining == self.declared && self.attributes.is_fortran_only() {
                        // Fortran carriage control byte: passed through as
                        // data, not translated.
                        tracing::trace!(control = b, "fortran carriage control");
                    }
                    buf.push(b);
                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.end_record(pos, buf);
                    }
                }
                Phase::Pad => {
                    self.keep_raw(b, buf);
                    self.phase = Phase::Length(None);
                }
            }
        }
    }

    /// Close a variable record that ended at stream offset `pos`.
    fn end_record(&mut self, pos: u64, buf: &mut Vec<u8>) {
        if !self.binary {
            buf.push(LINE_END);
        }
        self.records += 1;
        self.phase = if pos % 2 == 1 { Phase::Pad } else { Phase::Length(None) };
    }

    fn keep_raw(&self, b: u8, buf: &mut Vec<u8>) {
        if self.binary {
            buf.push(b);
        }
    }

    fn stream_lf(&mut self, data: &[u8], buf: &mut Vec<u8>) {
        buf.extend_from_slice(data);
        for &b in data {
            if self.remaining == 0 {
                self.remaining = STREAM_CHUNK;
            }
            self.remaining -= 1;
            if b == LINE_END {
                self.remaining = 0;
                self.records += 1;
            }
        }
    }

    fn stream_cr(&mut self, data: &[u8], buf: &mut Vec<u8>) {
        for &b in data {
            if b == b'\r' {
                self.records += 1;
                buf.push(if self.binary { b } else { LINE_END });
            } else {
                buf.push(b);
            }
        }
    }
}
