//! The runtime boundary between the record pipeline and actual storage.
//!
//! Everything above this trait (buffer, record, stream, format, formula,
//! worksheet, workbook, ole2) only ever talks to a `Sink`; the default
//! implementation writes to a file, and the test suite swaps in an
//! in-memory one to assert on bytes without touching disk.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// A byte destination that the OLE2 container streams its finished output
/// into. Mirrors the source's `create`/`write`/`close` triple.
pub trait Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// Writes to a file opened in binary mode, the default sink for `Workbook::new`.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(FileSink { file: File::create(path)? })
    }
}

impl Sink for FileSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Accumulates written bytes in memory. Used by the test suite to assert on
/// exact byte layout without a filesystem round-trip.
#[derive(Default)]
pub struct MemorySink {
    pub buf: Vec<u8>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for MemorySink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_accumulates_writes_in_order() {
        let mut sink = MemorySink::new();
        sink.write_all(&[1, 2]).unwrap();
        sink.write_all(&[3]).unwrap();
        sink.close().unwrap();
        assert_eq!(sink.buf, vec![1, 2, 3]);
    }
}
