//! Self-describing attribute items carried by summary and file records.
//!
//! # Layout
//!
//! ```text
//! [ marker 0x01 0x01 | size u16 | type u16 | payload (size B) | size | type | ... ]
//! ```
//!
//! Items are packed with no padding.  Iteration ends at a zero type code or
//! when fewer bytes remain than the next item claims.

pub mod file;
pub mod summary;

pub use file::{FileMetadata, RecordAttributes};
pub use summary::SavesetSummary;

use thiserror::Error;

use crate::endian::read_u16;

/// Structure-level word that opens every item list.
pub const ITEM_MARKER: [u8; 2] = [0x01, 0x01];
const ITEM_HEADER_SIZE: usize = 4;
/// Diagnostic dumps are cut to this many bytes.
const DUMP_LIMIT: usize = 128;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ItemError {
    #[error("invalid data header word 0x{0:02x}{1:02x}")]
    BadMarker(u8, u8),
    #[error("item list shorter than its marker")]
    Truncated,
}

/// One decoded `(type, payload)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    pub code: u16,
    pub data: &'a [u8],
}

/// Lazy iterator over an item list.
pub struct Items<'a> {
    rest: &'a [u8],
}

impl<'a> Items<'a> {
    /// Check the marker and position on the first item.
    pub fn new(payload: &'a [u8]) -> Result<Self, ItemError> {
        match payload {
            [0x01, 0x01, rest @ ..] => Ok(Self { rest }),
            [a, b, ..] => Err(ItemError::BadMarker(*a, *b)),
            _ => Err(ItemError::Truncated),
        }
    }
}

impl<'a> Iterator for Items<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Item<'a>> {
        if self.rest.len() < ITEM_HEADER_SIZE {
            return None;
        }
        let size = read_u16(self.rest) as usize;
        let code = read_u16(&self.rest[2..]);
        if code == 0 {
            return None;
        }
        let end = ITEM_HEADER_SIZE + size;
        if end > self.rest.len() {
            tracing::warn!(code, size, remaining = self.rest.len(), "item overruns its record");
            self.rest = &[];
            return None;
        }
        let data = &self.rest[ITEM_HEADER_SIZE..end];
        self.rest = &self.rest[end..];
        Some(Item { code, data })
    }
}

/// Hex dump of an uninterpreted item at debug level.
pub(crate) fn dump_item(item: &Item<'_>) {
    let shown = &item.data[..item.data.len().min(DUMP_LIMIT)];
    tracing::debug!(
        code = %format!("{:#x}", item.code),
        size = item.data.len(),
        dump = %hex::encode(shown),
        "item",
    );
}

/// Text payload helper: bytes are Latin-1/ASCII on the medium.
pub(crate) fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a marker-prefixed item list.
    pub(crate) fn item_list(items: &[(u16, &[u8])]) -> Vec<u8> {
        let mut out = ITEM_MARKER.to_vec();
        for (code, data) in items {
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    #[test]
    fn yields_items_in_order() {
        let raw = item_list(&[(1, b"MYSET"), (13, &32256u32.to_le_bytes())]);
        let items: Vec<_> = Items::new(&raw).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Item { code: 1, data: b"MYSET" });
        assert_eq!(items[1].code, 13);
        assert_eq!(items[1].data.len(), 4);
    }

    #[test]
    fn stops_at_zero_code() {
        let raw = item_list(&[(1, b"A"), (0, b""), (2, b"B")]);
        assert_eq!(Items::new(&raw).unwrap().count(), 1);
    }

    #[test]
    fn stops_when_item_overruns() {
        let mut raw = item_list(&[(1, b"ok")]);
        raw.extend_from_slice(&50u16.to_le_bytes());
        raw.extend_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(b"short");
        let items: Vec<_> = Items::new(&raw).unwrap().collect();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn rejects_bad_marker() {
        assert_eq!(Items::new(&[0x02, 0x01, 0, 0]).err(), Some(ItemError::BadMarker(2, 1)));
        assert_eq!(Items::new(&[0x01]).err(), Some(ItemError::Truncated));
    }

    #[test]
    fn tolerates_trailing_partial_header() {
        let mut raw = item_list(&[(9, b"NODE")]);
        raw.extend_from_slice(&[0x03, 0x00]);
        assert_eq!(Items::new(&raw).unwrap().count(), 1);
    }
}
