//! ANSI tape labels.
//!
//! Each saveset on tape is a file bracketed by 80-byte label records:
//!
//! ```text
//! VOL1 HDR1 HDR2 ... <TM> blocks ... <TM> EOF1 EOF2 ... <TM>
//! ```
//!
//! Only the fields BACKUP needs are decoded: the volume name, the saveset
//! name and number from `HDR1`, and the block size from `HDR2`.

use serde::Serialize;

/// Size of every label record.
pub const LABEL_SIZE: usize = 80;
/// Names are read as one token of at most this many characters.
const NAME_WIDTH: usize = 14;

/// One decoded label record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Volume { name: String },
    Header1 { name: String, set_number: Option<u32> },
    Header2 { block_size: Option<u32> },
    EndOfFile1 { name: String },
    /// HDR3, EOF2, user labels and anything else.
    Other([u8; 4]),
}

impl Label {
    pub fn parse(rec: &[u8; LABEL_SIZE]) -> Self {
        match &rec[..4] {
            b"VOL1" => Label::Volume { name: token(&rec[4..], NAME_WIDTH) },
            b"HDR1" => Label::Header1 {
                name:       token(&rec[4..], NAME_WIDTH),
                set_number: decimal(&rec[31..], 4),
            },
            b"HDR2" => Label::Header2 { block_size: decimal(&rec[5..], 5) },
            b"EOF1" => Label::EndOfFile1 { name: token(&rec[4..], NAME_WIDTH) },
            _ => Label::Other([rec[0], rec[1], rec[2], rec[3]]),
        }
    }
}

/// Identity of one saveset on tape, gathered from its header labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SavesetLabel {
    pub volume:     Option<String>,
    pub name:       String,
    pub number:     u32,
    pub block_size: usize,
}

/// First whitespace-delimited token, cut to `max` characters.
fn token(field: &[u8], max: usize) -> String {
    let tok: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(u8::is_ascii_whitespace)
        .take_while(|b| !b.is_ascii_whitespace() && *b != 0)
        .take(max)
        .collect();
    String::from_utf8_lossy(&tok).into_owned()
}

/// Decimal number of at most `width` digits after optional blanks.
fn decimal(field: &[u8], width: usize) -> Option<u32> {
    let digits: String = field
        .iter()
        .copied()
        .skip_while(|b| *b == b' ')
        .take(width)
        .take_while(u8::is_ascii_digit)
        .map(char::from)
        .collect();
    digits.parse().ok()
}
