//! VMS absolute time: a 64-bit count of 100 ns ticks since the Smithsonian
//! base date, 17-NOV-1858 00:00:00.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::endian::read_u64;

const TICKS_PER_SECOND: u64 = 10_000_000;

/// A raw VMS quadword timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmsTime(pub u64);

impl VmsTime {
    /// Decode an 8-byte item payload.  All-zero means "not specified".
    pub fn from_item(data: &[u8]) -> Option<Self> {
        if data.len() != 8 || data.iter().all(|&b| b == 0) {
            return None;
        }
        Some(Self(read_u64(data)))
    }

    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(1858, 11, 17)?.and_hms_opt(0, 0, 0)?;
        let secs  = (self.0 / TICKS_PER_SECOND) as i64;
        let nanos = ((self.0 % TICKS_PER_SECOND) * 100) as i64;
        base.checked_add_signed(Duration::try_seconds(secs)?)?
            .checked_add_signed(Duration::nanoseconds(nanos))
    }
}

impl fmt::Display for VmsTime {
    /// `DD-MMM-YYYY HH:MM:SS.CC`, the layout of `$ASCTIM`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => {
                let hundredths = dt.and_utc().timestamp_subsec_millis() / 10;
                let text = dt.format("%e-%b-%Y %H:%M:%S").to_string().to_uppercase();
                write!(f, "{text}.{hundredths:02}")
            }
            None => f.write_str("error converting date"),
        }
    }
}

impl Serialize for VmsTime {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.to_datetime() {
            Some(dt) => dt.serialize(s),
            None     => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1970-01-01 00:00:00 is 3_506_716_800 s after the VMS base date.
    const UNIX_EPOCH_TICKS: u64 = 3_506_716_800 * TICKS_PER_SECOND;

    #[test]
    fn zero_payload_is_unspecified() {
        assert_eq!(VmsTime::from_item(&[0u8; 8]), None);
        assert_eq!(VmsTime::from_item(&[1u8; 7]), None);
    }

    #[test]
    fn converts_unix_epoch() {
        let t = VmsTime::from_item(&UNIX_EPOCH_TICKS.to_le_bytes()).unwrap();
        let dt = t.to_datetime().unwrap();
        assert_eq!(dt.and_utc().timestamp(), 0);
        assert_eq!(t.to_string(), " 1-JAN-1970 00:00:00.00");
    }

    #[test]
    fn keeps_hundredths() {
        let t = VmsTime(UNIX_EPOCH_TICKS + 86_400 * 12 * TICKS_PER_SECOND + 4_500_000);
        assert_eq!(t.to_string(), "13-JAN-1970 00:00:00.45");
    }
}
