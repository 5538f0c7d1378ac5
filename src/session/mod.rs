//! One decode run over a medium.
//!
//! # Flow
//!
//! ```text
//! rewind ── Ok ─────────► tape:  labels → blocks … <TM> → trailer → labels …
//!        └─ Unsupported ► disk:  blocks … EOF
//! ```
//!
//! Every block is read at the negotiated size and validated.  A bad block
//! is resynchronized past (disk) or skipped (tape); XOR blocks are skipped;
//! data blocks go to the [`dispatch`] layer.  Medium failures end the run.

pub mod dispatch;

pub use dispatch::Totals;

use serde::Serialize;
use std::io;
use thiserror::Error;

use crate::block::{BlockHeader, BlockKind, BLOCK_HEADER_SIZE, DEFAULT_BLOCK_SIZE};
use crate::item::{FileMetadata, SavesetSummary};
use crate::label::{Label, SavesetLabel, LABEL_SIZE};
use crate::medium::Medium;
use crate::recovery::{resync, Resync, ScanError};
use crate::rms::RmsError;
use crate::select::{NameOptions, Selection};
use crate::sink::OutputSink;
use dispatch::Dispatcher;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Conditions that end the whole run.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("error reading saveset at {offset:#x}: {source}")]
    Read { offset: u64, source: io::Error },
    #[error("bad block read at {offset:#x}: got {got} bytes, expected {expected}")]
    ShortBlock { offset: u64, got: usize, expected: usize },
    #[error("bad label record at {offset:#x}: {got} bytes")]
    BadLabel { offset: u64, got: usize },
    #[error(transparent)]
    Resync(#[from] ScanError),
    #[error("-s not supported for disk savesets")]
    SavesetSelectionOnDisk,
    #[error("block size {size} is smaller than a block header")]
    BlockSize { size: usize },
    #[error("memory allocation for a {size} byte block failed")]
    Allocation { size: usize },
    #[error("medium operation failed at {offset:#x}: {source}")]
    Medium { offset: u64, source: io::Error },
    #[error("cannot write report: {0}")]
    Report(io::Error),
}

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Block size for disk images; tapes take theirs from `HDR2`.
    pub block_size: usize,
    /// Only process the saveset with this number (tape only).
    pub saveset:    Option<u32>,
    /// Copy record framing through instead of translating it.
    pub binary:     bool,
    pub selection:  Selection,
    pub names:      NameOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            saveset:    None,
            binary:     false,
            selection:  Selection::all(),
            names:      NameOptions::default(),
        }
    }
}

// ── Visitor ──────────────────────────────────────────────────────────────────

/// What to do with a selected file.
pub enum FileAction {
    Skip,
    Extract(Box<dyn OutputSink>),
}

/// Receives what the session decodes.  All methods default to doing nothing.
pub trait Visitor {
    fn volume(&mut self, _name: &str) -> io::Result<()> { Ok(()) }

    fn saveset_begin(&mut self, _label: &SavesetLabel) -> io::Result<()> { Ok(()) }

    fn summary(&mut self, _summary: &SavesetSummary) -> io::Result<()> { Ok(()) }

    /// Called for every file that passes selection.  An error skips the
    /// file.
    fn file(&mut self, _meta: &FileMetadata) -> io::Result<FileAction> { Ok(FileAction::Skip) }

    fn file_done(&mut self, _meta: &FileMetadata, _records: u64) -> io::Result<()> { Ok(()) }

    fn file_aborted(&mut self, _meta: &FileMetadata, _err: &RmsError) -> io::Result<()> { Ok(()) }

    /// End of one saveset's data.  `name` comes from the `EOF1` label.
    fn saveset_end(&mut self, _name: Option<&str>, _totals: &Totals) -> io::Result<()> { Ok(()) }

    fn end(&mut self, _report: &SessionReport) -> io::Result<()> { Ok(()) }
}

// ── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub tape:       bool,
    pub files:      u64,
    pub blocks:     u64,
    pub savesets:   u64,
    /// Blocks whose header failed validation.
    pub bad_blocks: u64,
    pub resyncs:    Vec<Resync>,
    pub xor_blocks: u64,
    /// Files whose output was removed mid-way.
    pub aborted:    u64,
}

// ── Session ──────────────────────────────────────────────────────────────────

/// Decode everything on `medium`, reporting to `visitor`.
pub fn run<M, V>(medium: &mut M, visitor: &mut V, opts: &SessionOptions) -> Result<SessionReport, SessionError>
where
    M: Medium + ?Sized,
    V: Visitor + ?Sized,
{
    let tape = match medium.rewind() {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::Unsupported => false,
        Err(source) => return Err(SessionError::Medium { offset: medium.position(), source }),
    };
    tracing::debug!(tape, "medium opened");
    if !tape && opts.saveset.is_some() {
        return Err(SessionError::SavesetSelectionOnDisk);
    }

    let mut s = Session {
        medium,
        visitor,
        opts,
        tape,
        block: Vec::new(),
        label: SavesetLabel { block_size: opts.block_size, ..SavesetLabel::default() },
        dispatcher: Dispatcher::new(opts.binary, &opts.selection, opts.names),
        report: SessionReport { tape, ..SessionReport::default() },
    };
    s.run()?;
    Ok(s.report)
}

struct Session<'a, M: Medium + ?Sized, V: Visitor + ?Sized> {
    medium:     &'a mut M,
    visitor:    &'a mut V,
    opts:       &'a SessionOptions,
    tape:       bool,
    block:      Vec<u8>,
    label:      SavesetLabel,
    dispatcher: Dispatcher<'a>,
    report:     SessionReport,
}

impl<'a, M: Medium + ?Sized, V: Visitor + ?Sized> Session<'a, M, V> {
    fn run(&mut self) -> Result<(), SessionError> {
        let mut more = if self.tape {
            self.header_labels()?
        } else {
            self.allocate(self.opts.block_size)?;
            true
        };

        while more {
            let selected = self.opts.saveset.map_or(true, |n| n == self.label.number);
            let n = if selected {
                let at = self.medium.position();
                self.medium
                    .read_record(&mut self.block)
                    .map_err(|source| SessionError::Read { offset: at, source })?
            } else {
                tracing::info!(number = self.label.number, "skipping saveset");
                let at = self.medium.position();
                self.medium
                    .skip_file()
                    .map_err(|source| SessionError::Medium { offset: at, source })?;
                0
            };

            if n == 0 {
                more = self.end_of_saveset()?;
            } else {
                self.process_block(n)?;
            }
        }

        self.sync_totals();
        tracing::info!(files = self.report.files, blocks = self.report.blocks, "end of session");
        self.visitor.end(&self.report).map_err(SessionError::Report)
    }

    fn allocate(&mut self, size: usize) -> Result<(), SessionError> {
        if size < BLOCK_HEADER_SIZE {
            return Err(SessionError::BlockSize { size });
        }
        if self.block.len() != size {
            let mut block = Vec::new();
            block
                .try_reserve_exact(size)
                .map_err(|_| SessionError::Allocation { size })?;
            block.resize(size, 0);
            self.block = block;
        }
        Ok(())
    }

    fn process_block(&mut self, n: usize) -> Result<(), SessionError> {
        let size = self.block.len();
        let at = self.medium.position() - n as u64;
        if n != size {
            return Err(SessionError::ShortBlock { offset: at, got: n, expected: size });
        }
        let header = BlockHeader::from_bytes(&self.block)
            .map_err(|source| SessionError::Read { offset: at, source })?;
        tracing::debug!(
            offset = %format!("{at:#010x}"),
            header_size = header.header_size,
            size = header.block_size,
            applic = header.applic,
            number = header.number,
            checksum = %format!("{:#06x}", header.checksum),
            "backup block",
        );

        if let Err(fault) = header.check(n) {
            tracing::warn!(offset = %format!("{at:#010x}"), "{fault}");
            self.report.bad_blocks += 1;
            if self.tape {
                tracing::warn!(offset = %format!("{at:#010x}"), "skipping damaged tape block");
            } else {
                let r = resync(&mut *self.medium, size, &mut self.block)?;
                self.report.resyncs.push(r);
            }
            return Ok(());
        }

        if header.kind() == BlockKind::Xor {
            self.report.xor_blocks += 1;
            return Ok(());
        }
        self.dispatcher.block(&self.block, header.block_size as usize, &mut *self.visitor)
    }

    /// Zero-length read: end of this saveset.  Returns whether another
    /// saveset follows.
    fn end_of_saveset(&mut self) -> Result<bool, SessionError> {
        self.dispatcher.close(&mut *self.visitor)?;
        self.report.savesets += 1;
        self.sync_totals();
        let totals = self.dispatcher.totals;
        if !self.tape {
            self.visitor.saveset_end(None, &totals).map_err(SessionError::Report)?;
            return Ok(false);
        }
        let trailer = self.trailer_labels()?;
        tracing::info!(name = ?trailer, files = totals.files, blocks = totals.blocks, "end of saveset");
        self.visitor
            .saveset_end(trailer.as_deref(), &totals)
            .map_err(SessionError::Report)?;
        self.header_labels()
    }

    fn sync_totals(&mut self) {
        self.report.files = self.dispatcher.totals.files;
        self.report.blocks = self.dispatcher.totals.blocks;
        self.report.aborted = self.dispatcher.aborted;
    }

    // ── Labels ───────────────────────────────────────────────────────────────

    /// Read label records up to the next tape mark.
    fn labels(&mut self) -> Result<Vec<Label>, SessionError> {
        let mut labels = Vec::new();
        let mut rec = [0u8; LABEL_SIZE];
        loop {
            let at = self.medium.position();
            let n = self
                .medium
                .read_record(&mut rec)
                .map_err(|source| SessionError::Read { offset: at, source })?;
            match n {
                0 => return Ok(labels),
                LABEL_SIZE => labels.push(Label::parse(&rec)),
                got => return Err(SessionError::BadLabel { offset: at, got }),
            }
        }
    }

    /// Header group of the next saveset.  `false` when the tape holds no
    /// more savesets.
    fn header_labels(&mut self) -> Result<bool, SessionError> {
        let mut found = false;
        for label in self.labels()? {
            match label {
                Label::Volume { name } => {
                    self.visitor.volume(&name).map_err(SessionError::Report)?;
                    self.label.volume = Some(name);
                }
                Label::Header1 { name, set_number } => {
                    self.label.name = name;
                    if let Some(n) = set_number {
                        self.label.number = n;
                    }
                }
                Label::Header2 { block_size } => {
                    found = true;
                    if let Some(bs) = block_size {
                        self.label.block_size = bs as usize;
                    }
                    tracing::debug!(block_size = self.label.block_size, "HDR2");
                }
                Label::EndOfFile1 { .. } | Label::Other(_) => {}
            }
        }
        if !found {
            return Ok(false);
        }
        tracing::info!(name = %self.label.name, number = self.label.number, "saveset");
        self.visitor.saveset_begin(&self.label).map_err(SessionError::Report)?;
        self.allocate(self.label.block_size)?;
        Ok(true)
    }

    fn trailer_labels(&mut self) -> Result<Option<String>, SessionError> {
        let mut name = None;
        for label in self.labels()? {
            if let Label::EndOfFile1 { name: n } = label {
                name = Some(n);
            }
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::file::tests::fat;
    use crate::item::tests::item_list;
    use crate::medium::DiskImage;
    use crate::sink::MemorySink;
    use std::io::Cursor;

    const BS: usize = 1024;

    fn block(records: &[(u16, Vec<u8>)]) -> Vec<u8> {
        let mut b = vec![0u8; BLOCK_HEADER_SIZE];
        b[0..2].copy_from_slice(&(BLOCK_HEADER_SIZE as u16).to_le_bytes());
        b[6..8].copy_from_slice(&1u16.to_le_bytes());
        b[40..44].copy_from_slice(&(BS as u32).to_le_bytes());
        for (rtype, payload) in records {
            b.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            b.extend_from_slice(&rtype.to_le_bytes());
            b.extend_from_slice(&[0u8; 12]);
            b.extend_from_slice(payload);
        }
        b.resize(BS, 0);
        b
    }

    fn file_with(name: &str, format: u8, content: &[u8]) -> [(u16, Vec<u8>); 2] {
        let attrs = fat(format, 0, 0, 1, content.len() as u16);
        let mut vbn = content.to_vec();
        vbn.resize(512, 0);
        [(3, item_list(&[(0x2a, name.as_bytes()), (0x34, &attrs)])), (4, vbn)]
    }

    #[derive(Default)]
    struct Capture {
        sinks:   Vec<(String, MemorySink)>,
        done:    Vec<String>,
        aborted: Vec<String>,
    }

    impl Visitor for Capture {
        fn file(&mut self, meta: &FileMetadata) -> io::Result<FileAction> {
            let sink = MemorySink::default();
            self.sinks.push((meta.name.clone(), sink.clone()));
            Ok(FileAction::Extract(Box::new(sink)))
        }

        fn file_done(&mut self, meta: &FileMetadata, _records: u64) -> io::Result<()> {
            self.done.push(meta.name.clone());
            Ok(())
        }

        fn file_aborted(&mut self, meta: &FileMetadata, _err: &RmsError) -> io::Result<()> {
            self.aborted.push(meta.name.clone());
            Ok(())
        }
    }

    fn opts() -> SessionOptions {
        SessionOptions { block_size: BS, ..SessionOptions::default() }
    }

    #[test]
    fn extracts_into_memory_sinks() {
        let mut image = block(&file_with("[A]ONE.LIS;1", 6, b"one\rtwo\r"));
        image.extend(block(&file_with("[A]BAD.IDX;1", 0x12, b"xxxx")));
        image.extend(block(&file_with("[A]TWO.LIS;1", 5, b"last\n")));

        let mut medium = DiskImage::new(Cursor::new(image));
        let mut v = Capture::default();
        let report = run(&mut medium, &mut v, &opts()).unwrap();

        assert!(!report.tape);
        assert_eq!(report.files, 3);
        assert_eq!(report.aborted, 1);
        assert_eq!(v.done, ["[A]ONE.LIS;1", "[A]TWO.LIS;1"]);
        assert_eq!(v.aborted, ["[A]BAD.IDX;1"]);
        let contents: Vec<Vec<u8>> = v.sinks.iter().map(|(_, s)| s.contents()).collect();
        assert_eq!(contents, [b"one\ntwo\n".to_vec(), Vec::new(), b"last\n".to_vec()]);
    }

    #[test]
    fn saveset_number_on_disk_is_refused() {
        let mut medium = DiskImage::new(Cursor::new(block(&[])));
        let opts = SessionOptions { saveset: Some(1), ..opts() };
        let err = run(&mut medium, &mut Capture::default(), &opts).unwrap_err();
        assert!(matches!(err, SessionError::SavesetSelectionOnDisk));
    }

    #[test]
    fn tiny_block_size_is_refused() {
        let mut medium = DiskImage::new(Cursor::new(Vec::new()));
        let opts = SessionOptions { block_size: 100, ..opts() };
        let err = run(&mut medium, &mut Capture::default(), &opts).unwrap_err();
        assert!(matches!(err, SessionError::BlockSize { size: 100 }));
    }
}
