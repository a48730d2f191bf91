//! Stream Accumulator: holds one BIFF substream (the workbook globals, or
//! one worksheet's body) and supports append and prepend.
//!
//! Sealed two-variant design per the source's function-pointer dispatch:
//! `InMemory` backs small worksheets with an `OctetBuffer`; `Scratch` spills
//! large worksheets to a temp file so the whole workbook never has to live
//! in memory at once. Prepend only makes sense while still in memory — by
//! the time a worksheet has spilled to disk, any prependable header record
//! should already have been written.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::buffer::OctetBuffer;

/// Chunk size used when draining a scratch-file-backed accumulator.
const DRAIN_CHUNK: usize = 4096;

enum Backing {
    InMemory(OctetBuffer),
    Scratch { file: tempfile::NamedTempFile, len: usize },
}

/// A single BIFF substream under construction.
pub struct StreamAccumulator {
    backing: Backing,
}

impl StreamAccumulator {
    /// Creates an in-memory accumulator.
    pub fn new_in_memory() -> Self {
        StreamAccumulator {
            backing: Backing::InMemory(OctetBuffer::new()),
        }
    }

    /// Creates a scratch-file-backed accumulator in `dir` (or the system
    /// temp directory if `None`). The file is deleted automatically when
    /// the accumulator is dropped.
    pub fn new_scratch(dir: Option<&std::path::Path>) -> std::io::Result<Self> {
        let file = match dir {
            Some(d) => tempfile::NamedTempFile::new_in(d)?,
            None => tempfile::NamedTempFile::new()?,
        };
        Ok(StreamAccumulator {
            backing: Backing::Scratch { file, len: 0 },
        })
    }

    /// Total bytes appended so far.
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::InMemory(buf) => buf.len(),
            Backing::Scratch { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends bytes at the current end of the substream.
    pub fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.backing {
            Backing::InMemory(buf) => {
                buf.append(bytes);
                Ok(())
            }
            Backing::Scratch { file, len } => {
                file.write_all(bytes)?;
                *len += bytes.len();
                Ok(())
            }
        }
    }

    /// Inserts bytes at the front of the substream, shifting existing
    /// content right. Only defined for in-memory accumulators; calling this
    /// on a scratch-backed accumulator is a programmer error, since the
    /// worksheet protocol emits every prependable record before the first
    /// scratch-triggering append.
    pub fn prepend(&mut self, bytes: &[u8]) {
        match &mut self.backing {
            Backing::InMemory(buf) => buf.prepend(bytes),
            Backing::Scratch { .. } => {
                panic!("prepend is not supported on a scratch-file-backed StreamAccumulator")
            }
        }
    }

    /// Streams the substream's bytes to `sink` in order, in chunks of at
    /// most 4 KiB for scratch-backed accumulators (one call for in-memory
    /// accumulators).
    pub fn drain_into(&mut self, mut sink: impl FnMut(&[u8]) -> std::io::Result<()>) -> std::io::Result<()> {
        match &mut self.backing {
            Backing::InMemory(buf) => sink(buf.as_bytes()),
            Backing::Scratch { file, len } => {
                file.flush()?;
                let mut f: &File = file.as_file();
                f.seek(SeekFrom::Start(0))?;
                let mut remaining = *len;
                let mut chunk = [0u8; DRAIN_CHUNK];
                while remaining > 0 {
                    let want = remaining.min(DRAIN_CHUNK);
                    f.read_exact(&mut chunk[..want])?;
                    sink(&chunk[..want])?;
                    remaining -= want;
                }
                Ok(())
            }
        }
    }
}
