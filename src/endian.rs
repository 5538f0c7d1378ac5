//! Little-endian field decoding.
//!
//! Every integer in a saveset (block headers, record headers, item headers,
//! item payloads, RMS length prefixes) is little-endian regardless of the
//! host.  Callers guarantee the slice is long enough.

use byteorder::{ByteOrder, LittleEndian};

/// Decode an unsigned 16-bit word from `buf[0..2]`.
#[inline]
pub fn read_u16(buf: &[u8]) -> u16 {
    LittleEndian::read_u16(buf)
}

/// Decode an unsigned 32-bit longword from `buf[0..4]`.
#[inline]
pub fn read_u32(buf: &[u8]) -> u32 {
    LittleEndian::read_u32(buf)
}

/// Decode an unsigned 64-bit quadword from `buf[0..8]`.
#[inline]
pub fn read_u64(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(buf)
}
