//! Input media: a sequential record source.
//!
//! A saveset lives either on a disk image (a plain file of concatenated
//! blocks) or on tape.  Tapes are read from SIMH `.tap` images:
//!
//! ```text
//! [ len u32 | data (len B) | pad to even | len u32 ]   one record
//! [ 0u32 ]                                             tape mark
//! [ 0xFFFF_FFFF ]                                      end of medium
//! [ 0xFFFF_FFFE ] [ 0xFFFE_FFFF ] [ 0xFFFF_0000 ]      erase gaps, skipped
//! ```
//!
//! The session tells the two apart by rewinding: a disk image reports
//! [`io::ErrorKind::Unsupported`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("{what} not supported on this medium"))
}

/// A source of records.  One `read_record` call returns at most one block.
pub trait Medium {
    /// Read the next record into `buf`.  `Ok(0)` is end of data: a tape
    /// mark on tape, end of file on disk.
    fn read_record(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Return to the start of the medium.
    fn rewind(&mut self) -> io::Result<()>;

    /// Skip forward past the next tape mark.
    fn skip_file(&mut self) -> io::Result<()>;

    /// Byte offset of the next read, for diagnostics.
    fn position(&self) -> u64;

    /// Move back `len` bytes.  Only media with byte addressing support it.
    fn step_back(&mut self, len: u64) -> io::Result<()> {
        let _ = len;
        Err(unsupported("seeking back"))
    }
}

impl<M: Medium + ?Sized> Medium for Box<M> {
    fn read_record(&mut self, buf: &mut [u8]) -> io::Result<usize> { (**self).read_record(buf) }
    fn rewind(&mut self) -> io::Result<()> { (**self).rewind() }
    fn skip_file(&mut self) -> io::Result<()> { (**self).skip_file() }
    fn position(&self) -> u64 { (**self).position() }
    fn step_back(&mut self, len: u64) -> io::Result<()> { (**self).step_back(len) }
}

// ── Disk image ───────────────────────────────────────────────────────────────

/// Saveset copied to a plain file.  Reads fill the buffer unless the file
/// ends first.
pub struct DiskImage<R: Read + Seek> {
    inner: R,
    pos:   u64,
}

impl<R: Read + Seek> DiskImage<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }
}

impl<R: Read + Seek> Medium for DiskImage<R> {
    fn read_record(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    fn rewind(&mut self) -> io::Result<()> {
        Err(unsupported("rewind"))
    }

    fn skip_file(&mut self) -> io::Result<()> {
        Err(unsupported("skipping a saveset"))
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn step_back(&mut self, len: u64) -> io::Result<()> {
        let back = len.min(self.pos);
        self.pos = self.inner.seek(SeekFrom::Current(-(back as i64)))?;
        Ok(())
    }
}

// ── SIMH tape image ──────────────────────────────────────────────────────────

const TAPE_MARK:     u32 = 0;
const END_OF_MEDIUM: u32 = 0xFFFF_FFFF;
const ERASE_GAP:     u32 = 0xFFFF_FFFE;
/// Gap that starts mid-word; the next word begins two bytes in.
const HALF_GAP_FWD:  u32 = 0xFFFE_FFFF;
const HALF_GAP_REV:  u32 = 0xFFFF_0000;
const LENGTH_MASK:   u32 = 0x00FF_FFFF;
/// Class nibble for a record the drive flagged as bad; data is still present.
const CLASS_BAD:     u32 = 0x8;

/// Tape drive emulated over a SIMH `.tap` image.
pub struct TapeImage<R: Read + Seek> {
    inner:  R,
    pos:    u64,
    at_end: bool,
}

/// What the next metadata word announced.
enum Mark {
    Record(usize),
    TapeMark,
    End,
}

impl<R: Read + Seek> TapeImage<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0, at_end: false }
    }

    fn next_mark(&mut self) -> io::Result<Mark> {
        loop {
            let word = match self.inner.read_u32::<LittleEndian>() {
                Ok(w) => w,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Mark::End),
                Err(e) => return Err(e),
            };
            self.pos += 4;
            match word {
                TAPE_MARK     => return Ok(Mark::TapeMark),
                END_OF_MEDIUM => return Ok(Mark::End),
                ERASE_GAP | HALF_GAP_REV => continue,
                HALF_GAP_FWD  => {
                    self.pos = self.inner.seek(SeekFrom::Current(-2))?;
                }
                w => {
                    let class = w >> 28;
                    if class != 0 && class != CLASS_BAD {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("unknown tape record class {class:#x} at {}", self.pos - 4),
                        ));
                    }
                    if class == CLASS_BAD {
                        tracing::warn!(offset = self.pos - 4, "tape record flagged bad by the drive");
                    }
                    return Ok(Mark::Record((w & LENGTH_MASK) as usize));
                }
            }
        }
    }

    /// Move past the pad byte and trailing length word of a record.
    fn finish_record(&mut self, len: usize) -> io::Result<()> {
        let skip = (len % 2) as i64 + 4;
        self.pos = self.inner.seek(SeekFrom::Current(skip))?;
        Ok(())
    }
}

impl<R: Read + Seek> Medium for TapeImage<R> {
    fn read_record(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.at_end {
            return Ok(0);
        }
        match self.next_mark()? {
            Mark::TapeMark => Ok(0),
            Mark::End => {
                self.at_end = true;
                Ok(0)
            }
            Mark::Record(len) => {
                if len > buf.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("tape record of {len} bytes exceeds the {} byte buffer", buf.len()),
                    ));
                }
                self.inner.read_exact(&mut buf[..len])?;
                self.pos += len as u64;
                self.finish_record(len)?;
                Ok(len)
            }
        }
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(0))?;
        self.at_end = false;
        Ok(())
    }

    fn skip_file(&mut self) -> io::Result<()> {
        while !self.at_end {
            match self.next_mark()? {
                Mark::TapeMark => return Ok(()),
                Mark::End => self.at_end = true,
                Mark::Record(len) => {
                    self.pos = self.inner.seek(SeekFrom::Current(len as i64))?;
                    self.finish_record(len)?;
                }
            }
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tape(records: &[Option<&[u8]>]) -> Vec<u8> {
        let mut out = Vec::new();
        for r in records {
            match r {
                Some(data) => {
                    let len = (data.len() as u32).to_le_bytes();
                    out.extend_from_slice(&len);
                    out.extend_from_slice(data);
                    if data.len() % 2 == 1 {
                        out.push(0);
                    }
                    out.extend_from_slice(&len);
                }
                None => out.extend_from_slice(&0u32.to_le_bytes()),
            }
        }
        out
    }

    #[test]
    fn disk_reads_full_buffers_then_short() {
        let mut m = DiskImage::new(Cursor::new(vec![7u8; 1000]));
        let mut buf = [0u8; 512];
        assert_eq!(m.read_record(&mut buf).unwrap(), 512);
        assert_eq!(m.read_record(&mut buf).unwrap(), 488);
        assert_eq!(m.read_record(&mut buf).unwrap(), 0);
        assert_eq!(m.position(), 1000);
    }

    #[test]
    fn disk_cannot_rewind_or_skip() {
        let mut m = DiskImage::new(Cursor::new(Vec::new()));
        assert_eq!(m.rewind().unwrap_err().kind(), io::ErrorKind::Unsupported);
        assert_eq!(m.skip_file().unwrap_err().kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn disk_steps_back() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut m = DiskImage::new(Cursor::new(data));
        let mut buf = [0u8; 100];
        m.read_record(&mut buf).unwrap();
        m.step_back(40).unwrap();
        assert_eq!(m.position(), 60);
        m.read_record(&mut buf[..1]).unwrap();
        assert_eq!(buf[0], 60);
    }

    #[test]
    fn tape_records_and_marks() {
        let img = tape(&[Some(b"abc"), Some(b"defg"), None, Some(b"h"), None, None]);
        let mut m = TapeImage::new(Cursor::new(img));
        let mut buf = [0u8; 16];
        assert_eq!(m.read_record(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(m.read_record(&mut buf).unwrap(), 4);
        assert_eq!(m.read_record(&mut buf).unwrap(), 0);
        assert_eq!(m.read_record(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'h');
        assert_eq!(m.read_record(&mut buf).unwrap(), 0);
        assert_eq!(m.read_record(&mut buf).unwrap(), 0);
        // Past the physical end.
        assert_eq!(m.read_record(&mut buf).unwrap(), 0);
        assert!(m.rewind().is_ok());
        assert_eq!(m.read_record(&mut buf).unwrap(), 3);
    }

    #[test]
    fn tape_skips_to_mark() {
        let img = tape(&[Some(b"one"), Some(b"two"), None, Some(b"three")]);
        let mut m = TapeImage::new(Cursor::new(img));
        m.skip_file().unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(m.read_record(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"three");
    }

    #[test]
    fn tape_skips_erase_gaps() {
        let mut img = Vec::new();
        img.extend_from_slice(&0xFFFF_0000u32.to_le_bytes());
        // Half gap overlapping a full gap word.
        img.extend_from_slice(&0xFFFE_FFFFu32.to_le_bytes());
        img.extend_from_slice(&[0xFF, 0xFF]);
        img.extend_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        img.extend(tape(&[Some(b"data"), None]));
        let mut m = TapeImage::new(Cursor::new(img));
        let mut buf = [0u8; 16];
        assert_eq!(m.read_record(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"data");
        assert_eq!(m.read_record(&mut buf).unwrap(), 0);
    }

    #[test]
    fn tape_record_larger_than_buffer_fails() {
        let img = tape(&[Some(&[1u8; 100])]);
        let mut m = TapeImage::new(Cursor::new(img));
        let mut buf = [0u8; 80];
        assert_eq!(m.read_record(&mut buf).unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn tape_cannot_step_back() {
        let mut m = TapeImage::new(Cursor::new(Vec::new()));
        assert_eq!(m.step_back(256).unwrap_err().kind(), io::ErrorKind::Unsupported);
    }
}
