//! High-level entry point: open a saveset file and list or extract it.
//!
//! ```no_run
//! use std::path::PathBuf;
//! use vmsbackup::saveset::{process, ExtractOptions};
//!
//! let opts = ExtractOptions {
//!     extract:    true,
//!     output_dir: PathBuf::from("out"),
//!     ..ExtractOptions::default()
//! };
//! let report = process("USERS.BCK", &opts, std::io::stdout())?;
//! println!("{} files", report.files);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::item::{FileMetadata, SavesetSummary};
use crate::label::SavesetLabel;
use crate::listing::{self, JsonRecord};
use crate::medium::{DiskImage, Medium, TapeImage};
use crate::select::VmsName;
use crate::session::{self, FileAction, SessionError, SessionOptions, SessionReport, Totals, Visitor};
use crate::sink::FileSink;

// ── MediumFormat ─────────────────────────────────────────────────────────────

/// How to interpret the input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MediumFormat {
    /// `.tap` files are tape images, anything else a disk image.
    #[default]
    Auto,
    Disk,
    Tape,
}

pub fn open_medium<P: AsRef<Path>>(path: P, format: MediumFormat) -> io::Result<Box<dyn Medium>> {
    let path = path.as_ref();
    let tape = match format {
        MediumFormat::Auto => path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("tap")),
        MediumFormat::Disk => false,
        MediumFormat::Tape => true,
    };
    let file = BufReader::new(File::open(path)?);
    Ok(if tape {
        Box::new(TapeImage::new(file))
    } else {
        Box::new(DiskImage::new(file))
    })
}

// ── ExtractOptions ───────────────────────────────────────────────────────────

/// Configuration for [`process`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub session:    SessionOptions,
    /// Print a listing.
    pub list:       bool,
    /// Listing in the `/FULL` layout.
    pub full:       bool,
    /// Write selected files under `output_dir`.
    pub extract:    bool,
    pub verbose:    bool,
    /// JSON lines instead of text.
    pub json:       bool,
    pub output_dir: PathBuf,
    pub format:     MediumFormat,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            session:    SessionOptions::default(),
            list:       false,
            full:       false,
            extract:    false,
            verbose:    false,
            json:       false,
            output_dir: PathBuf::from("."),
            format:     MediumFormat::Auto,
        }
    }
}

/// Open `path` and run one session, writing listing output to `out`.
pub fn process<P: AsRef<Path>, W: Write>(
    path: P,
    opts: &ExtractOptions,
    out:  W,
) -> Result<SessionReport, SessionError> {
    let mut medium = open_medium(path, opts.format)
        .map_err(|source| SessionError::Medium { offset: 0, source })?;
    let mut visitor = Extractor::new(opts, out);
    session::run(&mut medium, &mut visitor, &opts.session)
}

// ── Extractor ────────────────────────────────────────────────────────────────

/// Visitor that lists and/or extracts.
pub struct Extractor<'o, W: Write> {
    opts: &'o ExtractOptions,
    out:  W,
}

impl<'o, W: Write> Extractor<'o, W> {
    pub fn new(opts: &'o ExtractOptions, out: W) -> Self {
        Self { opts, out }
    }

    /// Text output for listings and `-v` progress.
    fn chatty(&self) -> bool {
        !self.opts.json && (self.opts.list || self.opts.verbose)
    }

    /// JSON lines go out only with a listing.
    fn json(&mut self, record: JsonRecord<'_>) -> io::Result<()> {
        if self.opts.list {
            record.write_line(&mut self.out)?;
        }
        Ok(())
    }

    fn open_output(&mut self, meta: &FileMetadata) -> io::Result<FileAction> {
        let Some(rel) = VmsName::parse(&meta.name).host_path(self.opts.session.names) else {
            tracing::warn!(file = %meta.name, "no usable host name; skipped");
            return Ok(FileAction::Skip);
        };
        let path = self.opts.output_dir.join(rel);
        let sink = FileSink::create(&path)?;
        if self.opts.verbose && !self.opts.json {
            writeln!(self.out, "extracting {}", meta.name)?;
        }
        tracing::debug!(file = %meta.name, path = %path.display(), "extracting");
        Ok(FileAction::Extract(Box::new(sink)))
    }
}

impl<W: Write> Visitor for Extractor<'_, W> {
    fn volume(&mut self, name: &str) -> io::Result<()> {
        if self.opts.json {
            return self.json(JsonRecord::Volume { name });
        }
        if self.chatty() {
            writeln!(self.out, "Volume: {name}")?;
        }
        Ok(())
    }

    fn saveset_begin(&mut self, label: &SavesetLabel) -> io::Result<()> {
        if self.opts.json {
            return self.json(JsonRecord::Saveset { label });
        }
        if self.chatty() {
            writeln!(self.out, "Saveset name: {}   number: {}", label.name, label.number)?;
        }
        Ok(())
    }

    fn summary(&mut self, summary: &SavesetSummary) -> io::Result<()> {
        if !self.opts.list {
            return Ok(());
        }
        if self.opts.json {
            JsonRecord::Summary { summary }.write_line(&mut self.out)
        } else {
            listing::summary(&mut self.out, summary)
        }
    }

    fn file(&mut self, meta: &FileMetadata) -> io::Result<FileAction> {
        if self.opts.list {
            if self.opts.json {
                JsonRecord::file(meta).write_line(&mut self.out)?;
            } else if self.opts.full {
                listing::full(&mut self.out, meta)?;
            } else {
                listing::brief(&mut self.out, meta)?;
            }
        }
        if !self.opts.extract {
            return Ok(FileAction::Skip);
        }
        self.open_output(meta)
    }

    fn saveset_end(&mut self, name: Option<&str>, totals: &Totals) -> io::Result<()> {
        if self.opts.json {
            return self.json(JsonRecord::SavesetEnd { name, totals });
        }
        if !self.chatty() {
            return Ok(());
        }
        listing::totals(&mut self.out, totals)?;
        match name {
            Some(name) => writeln!(self.out, "End of saveset: {name}\n\n"),
            None => writeln!(self.out, "End of save set"),
        }
    }

    fn end(&mut self, report: &SessionReport) -> io::Result<()> {
        if self.opts.json {
            self.json(JsonRecord::End { report })?;
        } else if self.chatty() && report.tape {
            writeln!(self.out, "End of tape")?;
        }
        self.out.flush()
    }
}
