//! Output sinks for extracted files.
//!
//! The session writes each selected file into one sink and then either
//! finishes it (flush and close) or discards it (close and delete) when the
//! file's content cannot be reconstructed.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Destination for one file's reconstructed bytes.
pub trait OutputSink: Write {
    /// Flush and close.
    fn finish(self: Box<Self>) -> io::Result<()>;

    /// Close and remove whatever was written.
    fn discard(self: Box<Self>) -> io::Result<()>;
}

/// A file on the host filesystem.
pub struct FileSink {
    path:   PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create `path`, making missing parent directories first.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl OutputSink for FileSink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    fn discard(self: Box<Self>) -> io::Result<()> {
        let FileSink { path, writer } = *self;
        let (file, _unflushed) = writer.into_parts();
        drop(file);
        fs::remove_file(&path)
    }
}

/// Sink that keeps the output in memory.  Clones share one buffer, so a
/// caller can keep a handle and read the bytes after the session is done
/// with the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Rc<RefCell<Vec<u8>>>,
}

impl MemorySink {
    pub fn contents(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }

    fn discard(self: Box<Self>) -> io::Result<()> {
        self.data.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finish_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/out.txt");
        let mut sink = Box::new(FileSink::create(&path).unwrap());
        sink.write_all(b"hello\n").unwrap();
        sink.finish().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello\n");
    }

    #[test]
    fn discard_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.dat");
        let mut sink = Box::new(FileSink::create(&path).unwrap());
        sink.write_all(b"half").unwrap();
        sink.discard().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn memory_sink_shares_its_buffer() {
        let kept = MemorySink::default();
        let mut sink = Box::new(kept.clone());
        sink.write_all(b"abc").unwrap();
        sink.finish().unwrap();
        assert_eq!(kept.contents(), b"abc");

        let mut sink = Box::new(kept.clone());
        sink.write_all(b"def").unwrap();
        sink.discard().unwrap();
        assert!(kept.contents().is_empty());
    }
}
