//! The content-cache capability consumed by a dirty-temp `FileInode`: a
//! temp-file-backed read/write surface with size queries. This crate supplies the default,
//! temp-file-backed implementation; a host is free to substitute its own (e.g. one sharing a
//! block allocator across files) behind the same trait.

use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

use tempfile::NamedTempFile;

/// Local scratch storage backing a file inode's "dirty-temp" state.
pub trait ContentCache: Send {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
    fn write_at(&mut self, data: &[u8], offset: u64) -> io::Result<()>;
    fn truncate(&mut self, size: u64) -> io::Result<()>;
    fn size(&self) -> u64;
}

/// The default `ContentCache`: a single anonymous temp file, seeded either empty or from a known
/// byte source (e.g. the bytes flushed out of a demoted `BufferedWriteHandler`).
pub struct TempFileContentCache {
    file: NamedTempFile,
    size: u64,
}

impl TempFileContentCache {
    pub fn new_empty() -> io::Result<Self> {
        Ok(Self {
            file: NamedTempFile::new()?,
            size: 0,
        })
    }

    /// Seed a new temp file from existing bytes, e.g. when a buffered writer is demoted mid-write.
    pub fn seeded_with(data: &[u8]) -> io::Result<Self> {
        let mut cache = Self::new_empty()?;
        cache.write_at(data, 0)?;
        Ok(cache)
    }
}

impl ContentCache for TempFileContentCache {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        self.file.as_file_mut().seek(SeekFrom::Start(offset))?;
        let available = (self.size - offset) as usize;
        let n = buf.len().min(available);
        self.file.as_file_mut().read_exact(&mut buf[..n])?;
        Ok(n)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> io::Result<()> {
        if offset > self.size {
            // Sparse hole: pad with zeros so subsequent reads see a consistent file.
            self.file.as_file_mut().seek(SeekFrom::Start(self.size))?;
            let padding = vec![0u8; (offset - self.size) as usize];
            self.file.as_file_mut().write_all(&padding)?;
        } else {
            self.file.as_file_mut().seek(SeekFrom::Start(offset))?;
        }
        self.file.as_file_mut().write_all(data)?;
        self.size = self.size.max(offset + data.len() as u64);
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        self.file.as_file_mut().set_len(size)?;
        self.size = size;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}
