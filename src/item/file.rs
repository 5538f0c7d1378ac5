//! File record (record type 3): the attributes of one saved file.

use serde::Serialize;

use super::summary::Uic;
use super::{dump_item, ItemError, Items};
use crate::endian::read_u16;
use crate::rms::RecordFormat;
use crate::vmstime::VmsTime;

/// Bytes per VMS disk block; fixed, independent of device or saveset.
pub const VMS_BLOCK: u64 = 512;
const MAX_FILENAME: usize = 127;

/// File item codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCode {
    FileName,
    StructureLevel,
    Fid,
    BackLink,
    FileSize,
    Uic,
    Protection,
    RecordProtection,
    AccessLevel,
    UserCharacteristics,
    RecordAttributes,
    Revision,
    CreationDate,
    RevisionDate,
    ExpirationDate,
    BackupDate,
    /// Seen on real savesets, meaning not established.
    Reserved(u16),
    Other(u16),
}

impl From<u16> for FileCode {
    fn from(v: u16) -> Self {
        match v {
            0x2a => FileCode::FileName,
            0x2b => FileCode::StructureLevel,
            0x2c => FileCode::Fid,
            0x2d => FileCode::BackLink,
            0x2e => FileCode::FileSize,
            0x2f => FileCode::Uic,
            0x30 => FileCode::Protection,
            0x31 => FileCode::RecordProtection,
            0x32 => FileCode::AccessLevel,
            0x33 => FileCode::UserCharacteristics,
            0x34 => FileCode::RecordAttributes,
            0x35 => FileCode::Revision,
            0x36 => FileCode::CreationDate,
            0x37 => FileCode::RevisionDate,
            0x38 => FileCode::ExpirationDate,
            0x39 => FileCode::BackupDate,
            0x47 | 0x48 | 0x4a | 0x4b | 0x4f | 0x50 | 0x57 => FileCode::Reserved(v),
            n => FileCode::Other(n),
        }
    }
}

// ── Record attributes ────────────────────────────────────────────────────────

/// `FAB$B_RAT` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordAttributes(pub u8);

impl RecordAttributes {
    pub const FTN: u8 = 0x01;
    pub const CR:  u8 = 0x02;
    pub const PRN: u8 = 0x04;
    pub const BLK: u8 = 0x08;

    /// Exactly Fortran carriage control and nothing else.
    pub fn is_fortran_only(self) -> bool {
        self.0 == Self::FTN
    }

    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::FTN, "Fortran"),
            (Self::PRN, "Print file"),
            (Self::CR,  "Carriage return carriage control"),
            (Self::BLK, "Non-spanned"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.0 & bit != 0)
        .map(|(_, name)| name)
        .collect()
    }
}

/// File organization from the high nibble of the record format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Organization {
    Sequential,
    Relative,
    Indexed,
    Hashed,
    Unknown(u8),
}

// ── FileMetadata ─────────────────────────────────────────────────────────────

/// Everything decoded from one file record.
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    /// Full VMS name, e.g. `[USER.SRC]MAIN.C;3`.
    pub name:            String,
    pub fid:             [u16; 3],
    pub owner:           Uic,
    pub protection:      u16,
    /// Raw `FAB$B_RFM` byte, organization in the high nibble.
    pub record_format:   u8,
    pub attributes:      RecordAttributes,
    pub record_size:     u16,
    pub vfc_size:        u8,
    pub allocated:       u32,
    pub used:            u32,
    pub last_byte:       u16,
    pub extension:       u16,
    pub revision:        u16,
    pub created:         Option<VmsTime>,
    pub revised:         Option<VmsTime>,
    pub expires:         Option<VmsTime>,
    pub backup:          Option<VmsTime>,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            name:          String::new(),
            fid:           [0; 3],
            owner:         Uic::default(),
            protection:    0,
            record_format: 0,
            attributes:    RecordAttributes::default(),
            record_size:   0,
            vfc_size:      2,
            allocated:     0,
            used:          0,
            last_byte:     0,
            extension:     0,
            revision:      0,
            created:       None,
            revised:       None,
            expires:       None,
            backup:        None,
        }
    }
}

impl FileMetadata {
    pub fn decode(payload: &[u8]) -> Result<Self, ItemError> {
        let mut m = FileMetadata::default();
        for item in Items::new(payload)? {
            let d = item.data;
            match FileCode::from(item.code) {
                FileCode::FileName => {
                    let len = d.len().min(MAX_FILENAME);
                    m.name = String::from_utf8_lossy(&d[..len]).into_owned();
                }
                FileCode::Fid if d.len() >= 6 => {
                    m.fid = [read_u16(d), read_u16(&d[2..]), read_u16(&d[4..])];
                }
                FileCode::Uic => {
                    if let Some(uic) = Uic::from_item(d) { m.owner = uic; }
                }
                FileCode::Protection if d.len() >= 2 => m.protection = read_u16(d),
                FileCode::RecordAttributes => m.apply_record_attributes(d),
                FileCode::Revision if d.len() >= 2 => m.revision = read_u16(d),
                FileCode::CreationDate   => m.created = VmsTime::from_item(d),
                FileCode::RevisionDate   => m.revised = VmsTime::from_item(d),
                FileCode::ExpirationDate => m.expires = VmsTime::from_item(d),
                FileCode::BackupDate     => m.backup  = VmsTime::from_item(d),
                FileCode::Other(code) => {
                    tracing::debug!(code = %format!("{code:#06x}"), "unrecognized file item code");
                    dump_item(&item);
                }
                _ => dump_item(&item),
            }
        }
        tracing::debug!(
            name = %m.name,
            fmt = %format!("{:02x}", m.record_format),
            attr = %format!("{:02x}", m.attributes.0),
            size = m.record_size,
            vfc = m.vfc_size,
            used = m.used,
            allocated = m.allocated,
            lnch = m.last_byte,
            "RMS attributes",
        );
        Ok(m)
    }

    /// The 32-byte record attribute area (`FAT`).
    fn apply_record_attributes(&mut self, d: &[u8]) {
        if d.len() < 20 {
            tracing::warn!(len = d.len(), "short record attribute item");
            return;
        }
        self.record_format = d[0];
        self.attributes    = RecordAttributes(d[1]);
        self.record_size   = read_u16(&d[2..]);
        self.allocated     = read_u16(&d[6..]) as u32;
        // The high-order word is scaled by 64K.  Inherited from an earlier
        // reader and kept as-is.
        self.used = read_u16(&d[10..]) as u32 + 64 * 1024 * read_u16(&d[8..]) as u32;
        self.last_byte     = read_u16(&d[12..]);
        self.vfc_size      = if d[15] == 0 { 2 } else { d[15] };
        self.extension     = read_u16(&d[18..]);
    }

    /// Bytes of raw file content: `(used - 1) * 512 + last_byte`, never negative.
    pub fn logical_size(&self) -> u64 {
        let size = (self.used as i64 - 1) * VMS_BLOCK as i64 + self.last_byte as i64;
        size.max(0) as u64
    }

    /// Blocks shown in listings.
    pub fn blocks(&self) -> u64 {
        self.logical_size().div_ceil(VMS_BLOCK)
    }

    pub fn allocated_size(&self) -> u64 {
        self.allocated as u64 * VMS_BLOCK
    }

    pub fn format(&self) -> RecordFormat {
        RecordFormat::from(self.record_format)
    }

    pub fn organization(&self) -> Organization {
        match self.record_format & 0xf0 {
            0x00 => Organization::Sequential,
            0x10 => Organization::Relative,
            0x20 => Organization::Indexed,
            0x30 => Organization::Hashed,
            n    => Organization::Unknown(n),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::item::tests::item_list;

    pub(crate) fn fat(format: u8, attrs: u8, record_size: u16, used: u32, last_byte: u16) -> [u8; 32] {
        let mut d = [0u8; 32];
        d[0] = format;
        d[1] = attrs;
        d[2..4].copy_from_slice(&record_size.to_le_bytes());
        d[6..8].copy_from_slice(&(used as u16 + 1).to_le_bytes());
        d[8..10].copy_from_slice(&((used >> 16) as u16).to_le_bytes());
        d[10..12].copy_from_slice(&(used as u16).to_le_bytes());
        d[12..14].copy_from_slice(&last_byte.to_le_bytes());
        d
    }

    #[test]
    fn decodes_record_attribute_block() {
        let mut rat = fat(0x02, RecordAttributes::CR, 132, 3, 100);
        rat[15] = 4;
        rat[18..20].copy_from_slice(&7u16.to_le_bytes());
        let raw = item_list(&[(0x2a, b"[USER]NOTES.TXT;2"), (0x34, &rat)]);
        let m = FileMetadata::decode(&raw).unwrap();
        assert_eq!(m.name, "[USER]NOTES.TXT;2");
        assert_eq!(m.format(), RecordFormat::Variable);
        assert_eq!(m.record_size, 132);
        assert_eq!(m.used, 3);
        assert_eq!(m.allocated, 4);
        assert_eq!(m.vfc_size, 4);
        assert_eq!(m.extension, 7);
        assert_eq!(m.logical_size(), 2 * 512 + 100);
        assert_eq!(m.blocks(), 3);
        assert_eq!(m.organization(), Organization::Sequential);
    }

    #[test]
    fn high_word_of_used_blocks_is_scaled() {
        let rat = fat(0x01, 0, 512, 0x0001_0002, 0);
        let m = FileMetadata::decode(&item_list(&[(0x34, &rat)])).unwrap();
        assert_eq!(m.used, 65536 + 2);
    }

    #[test]
    fn vfc_size_defaults_to_two() {
        let rat = fat(0x03, RecordAttributes::PRN, 0, 1, 10);
        let m = FileMetadata::decode(&item_list(&[(0x34, &rat)])).unwrap();
        assert_eq!(m.vfc_size, 2);
    }

    #[test]
    fn zero_used_blocks_has_no_content() {
        let rat = fat(0x01, 0, 80, 0, 0);
        let m = FileMetadata::decode(&item_list(&[(0x34, &rat)])).unwrap();
        assert_eq!(m.logical_size(), 0);
        assert_eq!(m.blocks(), 0);
    }

    #[test]
    fn decodes_identity_and_dates() {
        let created = 0x00a1_b2c3_d4e5_f607u64.to_le_bytes();
        let raw = item_list(&[
            (0x2c, &[0x7a, 0x02, 0x57, 0x00, 0x01, 0x01]),
            (0x2f, &[0x04, 0x00, 0x01, 0x00]),
            (0x30, &[0x00, 0xee]),
            (0x35, &[0x04, 0x00]),
            (0x36, &created),
            (0x38, &[0u8; 8]),
            (0x47, &[1, 0, 0xc6, 0]),
        ]);
        let m = FileMetadata::decode(&raw).unwrap();
        assert_eq!(m.fid, [0x027a, 0x0057, 0x0101]);
        assert_eq!(m.owner, Uic { group: 1, member: 4 });
        assert_eq!(m.protection, 0xee00);
        assert_eq!(m.revision, 4);
        assert_eq!(m.created, Some(VmsTime(0x00a1_b2c3_d4e5_f607)));
        assert_eq!(m.expires, None);
    }

    #[test]
    fn filename_is_truncated() {
        let long = vec![b'A'; 200];
        let m = FileMetadata::decode(&item_list(&[(0x2a, &long)])).unwrap();
        assert_eq!(m.name.len(), 127);
    }

    #[test]
    fn attribute_names() {
        let a = RecordAttributes(RecordAttributes::FTN | RecordAttributes::BLK);
        assert_eq!(a.names(), vec!["Fortran", "Non-spanned"]);
        assert!(!a.is_fortran_only());
        assert!(RecordAttributes(RecordAttributes::FTN).is_fortran_only());
    }
}
