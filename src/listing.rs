//! BACKUP/LIST style rendering.
//!
//! Text output follows the layout VMS users know from `BACKUP/LIST`:
//! a brief one-line-per-file form, a `/FULL` form, and the saveset summary
//! block.  JSON lines are available for scripting.

use serde::Serialize;
use std::io::{self, Write};

use crate::item::file::Organization;
use crate::item::{FileMetadata, SavesetSummary};
use crate::label::SavesetLabel;
use crate::rms::RecordFormat;
use crate::session::{SessionReport, Totals};
use crate::vmstime::VmsTime;

const NONE_SPECIFIED: &str = " <None specified>";

/// `(S:RWED,O:RWED,G:RE,W:)`.  A set bit denies the right.
pub fn protection(mask: u16) -> String {
    let mut out = String::from("(");
    for (i, class) in ['S', 'O', 'G', 'W'].into_iter().enumerate() {
        let bits = mask >> (i * 4);
        out.push(class);
        out.push(':');
        for (bit, right) in [(1, 'R'), (2, 'W'), (4, 'E'), (8, 'D')] {
            if bits & bit == 0 {
                out.push(right);
            }
        }
        if i != 3 {
            out.push(',');
        }
    }
    out.push(')');
    out
}

pub fn record_format(meta: &FileMetadata) -> String {
    let size = meta.record_size;
    match RecordFormat::from(meta.record_format & 0x0f) {
        RecordFormat::Undefined => "(UDF/Undefined)".into(),
        RecordFormat::Fixed if size > 0 => format!("Fixed length {size} byte records"),
        RecordFormat::Fixed => "Fixed length".into(),
        RecordFormat::Variable if size > 0 => format!("Variable length, maximum {size} bytes"),
        RecordFormat::Variable => "Variable length".into(),
        RecordFormat::Vfc if size > 0 => format!("VFC, maximum {size} bytes"),
        RecordFormat::Vfc => "VFC".into(),
        RecordFormat::Stream => "Stream".into(),
        RecordFormat::StreamLf => "Stream_LF".into(),
        RecordFormat::StreamCr => "Stream_CR".into(),
        RecordFormat::Other(code) => format!("<Unknown 0x{code:02x}>"),
    }
}

fn organization(meta: &FileMetadata) -> String {
    match meta.organization() {
        Organization::Sequential => "Sequential".into(),
        Organization::Relative   => "Relative".into(),
        Organization::Indexed    => "Indexed".into(),
        Organization::Hashed     => "Hashed".into(),
        Organization::Unknown(n) => format!("<Unknown 0x{n:02x}>"),
    }
}

fn date(t: Option<VmsTime>) -> String {
    t.map_or_else(|| NONE_SPECIFIED.to_owned(), |t| t.to_string())
}

pub fn brief<W: Write + ?Sized>(w: &mut W, meta: &FileMetadata) -> io::Result<()> {
    let created = meta.created.map(|t| t.to_string()).unwrap_or_default();
    writeln!(w, "{:<52} {:>8} {}", meta.name, meta.blocks(), created)
}

pub fn full<W: Write + ?Sized>(w: &mut W, meta: &FileMetadata) -> io::Result<()> {
    let name: String = meta.name.chars().take(30).collect();
    let [f0, f1, f2] = meta.fid;
    writeln!(w, "{name:<30} File ID:  ({f0},{f1},{f2})")?;
    writeln!(
        w,
        "  Size:       {:>6}/{:<6}    Owner:    [{:06o},{:06o}]     Revision:     {:>6}",
        meta.blocks(),
        meta.allocated,
        meta.owner.group,
        meta.owner.member,
        meta.revision,
    )?;
    writeln!(w, "  Protection: {}", protection(meta.protection))?;
    writeln!(w, "  Created:  {}", date(meta.created))?;
    writeln!(w, "  Revised:  {} ({})", date(meta.revised), meta.revision)?;
    writeln!(w, "  Expires:  {}", date(meta.expires))?;
    writeln!(w, "  Backup:   {}", date(meta.backup))?;
    writeln!(w, "  File Organization:  {}", organization(meta))?;
    writeln!(w, "  File attributes:    Allocation {}, Extend {}", meta.allocated, meta.extension)?;
    writeln!(w, "  Record format:      {}", record_format(meta))?;
    writeln!(
        w,
        "  Record attributes (0x{:02x}):  {}",
        meta.attributes.0,
        meta.attributes.names().join(" "),
    )?;
    writeln!(w)
}

pub fn summary<W: Write + ?Sized>(w: &mut W, s: &SavesetSummary) -> io::Result<()> {
    let field = |w: &mut W, label: &str, v: &Option<String>| -> io::Result<()> {
        match v {
            Some(v) => writeln!(w, "{label:<19}{v}"),
            None => Ok(()),
        }
    };
    field(w, "Save set:", &s.name)?;
    field(w, "Command:", &s.command)?;
    field(w, "Comment:", &s.comment)?;
    field(w, "Written by:", &s.written_by)?;
    writeln!(w, "UIC:               [{:06o}, {:06o}]", s.uic.group, s.uic.member)?;
    match s.date {
        Some(Some(t)) => writeln!(w, "Date:              {t}")?,
        Some(None) => writeln!(w, "Date:              error converting date")?,
        None => {}
    }
    if let Some(code) = s.opsys {
        writeln!(w, "Operating system: {} ({code:04x})", s.opsys_name())?;
    }
    if let Some(v) = &s.sys_version {
        writeln!(w, "Operating system version {v}")?;
    }
    field(w, "Node name:", &s.node)?;
    field(w, "Written on:", &s.written_on)?;
    field(w, "BACKUP version:", &s.backup_version)?;
    writeln!(w, "CPU ID register:   {:08x}", s.cpu_id)?;
    writeln!(w, "Block size:        {}", s.block_size)?;
    writeln!(w, "Group size:        {}", s.group_size)?;
    writeln!(w, "Buffer count:      {}", s.buffer_count)?;
    writeln!(w, "\n")
}

pub fn totals<W: Write + ?Sized>(w: &mut W, t: &Totals) -> io::Result<()> {
    writeln!(w, "\nTotal of {} files, {} blocks", t.files, t.blocks)
}

// ── JSON lines ───────────────────────────────────────────────────────────────

/// One line of `--json` output.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JsonRecord<'a> {
    Volume { name: &'a str },
    Saveset { label: &'a SavesetLabel },
    Summary { summary: &'a SavesetSummary },
    File { file: &'a FileMetadata, blocks: u64, logical_size: u64 },
    SavesetEnd { name: Option<&'a str>, totals: &'a Totals },
    End { report: &'a SessionReport },
}

impl<'a> JsonRecord<'a> {
    pub fn file(meta: &'a FileMetadata) -> Self {
        JsonRecord::File { file: meta, blocks: meta.blocks(), logical_size: meta.logical_size() }
    }

    pub fn write_line<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self)?;
        writeln!(w)
    }
}
