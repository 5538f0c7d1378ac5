//! Sub-record dispatch within one validated block.
//!
//! Owns the single open output file.  A new file record always closes the
//! previous file first; content records go to whatever file is open.

use serde::Serialize;

use super::{FileAction, SessionError, Visitor};
use crate::block::{RecordType, SubRecords};
use crate::item::{FileMetadata, SavesetSummary};
use crate::rms::Reconstructor;
use crate::select::{selection_key, NameOptions, Selection};
use crate::sink::OutputSink;

/// Running counts, cumulative over the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub files:  u64,
    pub blocks: u64,
}

struct OpenFile {
    meta: FileMetadata,
    sink: Box<dyn OutputSink>,
    rms:  Reconstructor,
}

pub(crate) struct Dispatcher<'o> {
    binary:         bool,
    selection:      &'o Selection,
    names:          NameOptions,
    open:           Option<OpenFile>,
    pub(crate) totals:  Totals,
    pub(crate) aborted: u64,
}

impl<'o> Dispatcher<'o> {
    pub(crate) fn new(binary: bool, selection: &'o Selection, names: NameOptions) -> Self {
        Self { binary, selection, names, open: None, totals: Totals::default(), aborted: 0 }
    }

    /// Walk the sub-records of `block` up to its declared size.
    pub(crate) fn block<V: Visitor + ?Sized>(
        &mut self,
        block:    &[u8],
        declared: usize,
        visitor:  &mut V,
    ) -> Result<(), SessionError> {
        for rec in SubRecords::new(block, declared) {
            let h = rec.header;
            tracing::debug!(
                at = rec.offset,
                rtype = ?h.rtype,
                size = h.size,
                flags = %format!("{:#x}", h.flags),
                addr = %format!("{:#010x}", h.address),
                "record",
            );
            match h.rtype {
                RecordType::Summary => match SavesetSummary::decode(rec.payload) {
                    Ok(s) => visitor.summary(&s).map_err(SessionError::Report)?,
                    Err(e) => tracing::warn!("cannot print summary: {e}"),
                },
                RecordType::File => self.file(rec.payload, visitor)?,
                RecordType::Vbn => self.vbn(rec.payload, visitor)?,
                RecordType::Null
                | RecordType::Volume
                | RecordType::PhysVol
                | RecordType::Lbn
                | RecordType::Fid => {}
                RecordType::Unknown(t) => {
                    tracing::debug!(rtype = t, size = h.size, "unrecognized record type");
                }
            }
        }
        Ok(())
    }

    fn file<V: Visitor + ?Sized>(&mut self, payload: &[u8], visitor: &mut V) -> Result<(), SessionError> {
        self.close(visitor)?;
        let meta = match FileMetadata::decode(payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("skipping file record: {e}");
                return Ok(());
            }
        };
        self.totals.files += 1;
        self.totals.blocks += meta.blocks();

        if !self.selection.matches(selection_key(&meta.name, self.names)) {
            return Ok(());
        }
        match visitor.file(&meta) {
            Ok(FileAction::Skip) => {}
            Ok(FileAction::Extract(sink)) => {
                let rms = Reconstructor::new(&meta, self.binary);
                self.open = Some(OpenFile { meta, sink, rms });
            }
            Err(e) => tracing::warn!(file = %meta.name, "cannot open output: {e}"),
        }
        Ok(())
    }

    fn vbn<V: Visitor + ?Sized>(&mut self, payload: &[u8], visitor: &mut V) -> Result<(), SessionError> {
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };
        let Err(err) = open.rms.feed(payload, open.sink.as_mut()) else {
            return Ok(());
        };
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        tracing::warn!(file = %open.meta.name, "{err}; output removed");
        if let Err(e) = open.sink.discard() {
            tracing::warn!(file = %open.meta.name, "cannot remove partial output: {e}");
        }
        self.aborted += 1;
        visitor.file_aborted(&open.meta, &err).map_err(SessionError::Report)
    }

    /// Finish the open file, if any.
    pub(crate) fn close<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Result<(), SessionError> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let records = open.rms.records();
        match open.sink.finish() {
            Ok(()) => visitor.file_done(&open.meta, records).map_err(SessionError::Report),
            Err(e) => {
                tracing::warn!(file = %open.meta.name, "cannot close output: {e}");
                Ok(())
            }
        }
    }
}
