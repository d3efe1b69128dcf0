//! Response body backing stores
//!
//! A downloaded body lives either in memory or in a temporary file. Both are
//! exposed through [`ResponseBody`], which hands out a fresh reader over the
//! whole body on every call to [`ResponseBody::open`].
//!
//! [`BodySpool`] picks the store while the body streams in: memory when the
//! declared length fits under the threshold, a temp file otherwise. A memory
//! spool that outgrows the threshold (a lying or missing Content-Length)
//! spills to a temp file mid-stream.
//!
//! Temp files are owned by a [`tempfile::TempPath`], so they are deleted when
//! the spool or body is dropped, including when a download fails midway.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};

/// Upper bound on the buffer reserved up front from a declared length
const MAX_INITIAL_CAPACITY: u64 = 64 * 1024;

/// Uniform access to a downloaded body, whatever backs it
pub trait ResponseBody: Send + Sync + fmt::Debug {
    /// Body length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a new reader positioned at the start of the body
    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;

    /// Location on disk, for file-backed bodies
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Reads the whole body into memory
    fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.len() as usize);
        self.open()?.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// Body kept in a byte buffer
pub struct InMemoryBody {
    data: Vec<u8>,
}

impl InMemoryBody {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl fmt::Debug for InMemoryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBody")
            .field("len", &self.data.len())
            .finish()
    }
}

impl ResponseBody for InMemoryBody {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }
}

/// Body written to a temporary file, removed on drop
#[derive(Debug)]
pub struct SpooledFileBody {
    path: TempPath,
    len: u64,
}

impl ResponseBody for SpooledFileBody {
    fn len(&self) -> u64 {
        self.len
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

enum SpoolState {
    Memory(Vec<u8>),
    File {
        writer: BufWriter<File>,
        path: TempPath,
    },
}

/// Accumulates a streaming body and produces the matching backing store
pub struct BodySpool {
    state: SpoolState,
    threshold: u64,
    written: u64,
}

impl BodySpool {
    /// Creates a spool for a body of `declared_len` bytes (if known)
    ///
    /// # Arguments
    ///
    /// * `declared_len` - Content-Length, when the server sent one
    /// * `threshold` - Largest body kept in memory
    pub fn new(declared_len: Option<u64>, threshold: u64) -> io::Result<Self> {
        let state = match declared_len {
            Some(len) if len <= threshold => {
                SpoolState::Memory(Vec::with_capacity(len.min(MAX_INITIAL_CAPACITY) as usize))
            }
            _ => open_temp_file()?,
        };

        Ok(Self {
            state,
            threshold,
            written: 0,
        })
    }

    /// Bytes received so far
    pub fn len(&self) -> u64 {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// True once the body has been moved to disk
    pub fn is_file_backed(&self) -> bool {
        matches!(self.state, SpoolState::File { .. })
    }

    /// Appends a chunk, spilling to disk if the memory buffer grows too large
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        let next_len = self.written + chunk.len() as u64;

        if let SpoolState::Memory(buffer) = &mut self.state {
            if next_len <= self.threshold {
                buffer.extend_from_slice(chunk);
                self.written = next_len;
                return Ok(());
            }

            let buffered = std::mem::take(buffer);
            tracing::debug!(
                "Body exceeded {} bytes in memory, spilling to disk",
                self.threshold
            );
            self.state = open_temp_file()?;
            self.write_to_file(&buffered)?;
        }

        self.write_to_file(chunk)?;
        self.written = next_len;
        Ok(())
    }

    fn write_to_file(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.state {
            SpoolState::File { writer, .. } => writer.write_all(bytes),
            SpoolState::Memory(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    /// Finishes the body and returns its backing store
    pub fn finish(self) -> io::Result<Box<dyn ResponseBody>> {
        match self.state {
            SpoolState::Memory(data) => Ok(Box::new(InMemoryBody::new(data))),
            SpoolState::File { writer, path } => {
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                file.sync_all()?;
                Ok(Box::new(SpooledFileBody {
                    path,
                    len: self.written,
                }))
            }
        }
    }
}

fn open_temp_file() -> io::Result<SpoolState> {
    let (file, path) = NamedTempFile::new()?.into_parts();
    Ok(SpoolState::File {
        writer: BufWriter::new(file),
        path,
    })
}
