//! Saveset summary record (record type 1).

use serde::Serialize;

use super::{dump_item, text, ItemError, Items};
use crate::endian::{read_u16, read_u32, read_u64};
use crate::vmstime::VmsTime;

/// Summary item codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryCode {
    SavesetName,
    Command,
    Comment,
    WrittenBy,
    Uic,
    Date,
    OpSys,
    SysVersion,
    NodeName,
    CpuId,
    WrittenOn,
    BackupVersion,
    BlockSize,
    GroupSize,
    BufferCount,
    Other(u16),
}

impl From<u16> for SummaryCode {
    fn from(v: u16) -> Self {
        match v {
            1  => SummaryCode::SavesetName,
            2  => SummaryCode::Command,
            3  => SummaryCode::Comment,
            4  => SummaryCode::WrittenBy,
            5  => SummaryCode::Uic,
            6  => SummaryCode::Date,
            7  => SummaryCode::OpSys,
            8  => SummaryCode::SysVersion,
            9  => SummaryCode::NodeName,
            10 => SummaryCode::CpuId,
            11 => SummaryCode::WrittenOn,
            12 => SummaryCode::BackupVersion,
            13 => SummaryCode::BlockSize,
            14 => SummaryCode::GroupSize,
            15 => SummaryCode::BufferCount,
            n  => SummaryCode::Other(n),
        }
    }
}

/// Owner UIC as `[group, member]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Uic {
    pub group:  u16,
    pub member: u16,
}

impl Default for Uic {
    fn default() -> Self {
        Self { group: 0o377, member: 0o377 }
    }
}

impl Uic {
    pub(crate) fn from_item(data: &[u8]) -> Option<Self> {
        (data.len() == 4).then(|| Self { member: read_u16(data), group: read_u16(&data[2..]) })
    }
}

/// Saveset-level facts recorded by BACKUP when the saveset was written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SavesetSummary {
    pub name:           Option<String>,
    pub command:        Option<String>,
    pub comment:        Option<String>,
    pub written_by:     Option<String>,
    pub uic:            Uic,
    /// `Some(None)` when a date item was present but could not be converted.
    pub date:           Option<Option<VmsTime>>,
    pub opsys:          Option<u16>,
    pub sys_version:    Option<String>,
    pub node:           Option<String>,
    pub cpu_id:         u32,
    pub written_on:     Option<String>,
    pub backup_version: Option<String>,
    pub block_size:     u32,
    pub group_size:     u16,
    pub buffer_count:   u16,
}

impl SavesetSummary {
    pub fn decode(payload: &[u8]) -> Result<Self, ItemError> {
        let mut s = SavesetSummary::default();
        for item in Items::new(payload)? {
            let d = item.data;
            match SummaryCode::from(item.code) {
                SummaryCode::SavesetName   => s.name = Some(text(d)),
                SummaryCode::Command       => s.command = Some(text(d)),
                SummaryCode::Comment       => s.comment = Some(text(d)),
                SummaryCode::WrittenBy     => s.written_by = Some(text(d)),
                SummaryCode::Uic           => {
                    if let Some(uic) = Uic::from_item(d) { s.uic = uic; }
                }
                SummaryCode::Date          => s.date = Some((d.len() == 8).then(|| VmsTime(read_u64(d)))),
                SummaryCode::OpSys         => {
                    if d.len() == 2 { s.opsys = Some(read_u16(d)); }
                }
                SummaryCode::SysVersion    => s.sys_version = Some(text(d)),
                SummaryCode::NodeName      => s.node = Some(text(d)),
                SummaryCode::CpuId         => {
                    if d.len() >= 4 { s.cpu_id = read_u32(d); }
                }
                SummaryCode::WrittenOn     => s.written_on = Some(text(d)),
                SummaryCode::BackupVersion => s.backup_version = Some(text(d)),
                SummaryCode::BlockSize     => {
                    if d.len() >= 4 { s.block_size = read_u32(d); }
                }
                SummaryCode::GroupSize     => {
                    if d.len() >= 2 { s.group_size = read_u16(d); }
                }
                SummaryCode::BufferCount   => {
                    if d.len() >= 2 { s.buffer_count = read_u16(d); }
                }
                SummaryCode::Other(code)   => {
                    tracing::warn!(code = %format!("{code:#06x}"), "undefined summary item code");
                    dump_item(&item);
                }
            }
        }
        Ok(s)
    }

    /// Operating system name for the `OpSys` code.
    pub fn opsys_name(&self) -> &'static str {
        match self.opsys {
            Some(0x1000) => "OpenVMS IA64",
            Some(0x0800) => "OpenVMS AXP",
            Some(0x0400) => "OpenVMS VAX",
            Some(0x0004) => "RSTS/E",
            _            => "Unknown OS Code",
        }
    }
}
