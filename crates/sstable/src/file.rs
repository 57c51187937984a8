//! File abstractions the table layer is written against.
//!
//! The builder appends through [`WritableFile`]; the reader pulls ranges
//! through [`RandomAccessFile`]. The std implementations below are what
//! production uses; tests occasionally substitute in-memory stand-ins.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;

/// Append-only sink for table bytes.
pub trait WritableFile: Send {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    /// Forces written data to stable storage.
    fn sync(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Positioned reads from an immutable file. Implementations must be usable
/// from multiple threads through `&self`.
pub trait RandomAccessFile: Send + Sync {
    /// Reads up to `n` bytes starting at `offset`. Returns fewer bytes only
    /// at end-of-file.
    fn read(&self, offset: u64, n: usize) -> Result<Vec<u8>>;
}

/// [`WritableFile`] over `std::fs::File`.
pub struct FsWritableFile {
    file: File,
}

impl FsWritableFile {
    /// Creates (or truncates) the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl WritableFile for FsWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// [`RandomAccessFile`] over `std::fs::File`. The handle sits behind a
/// `Mutex` so shared readers can seek without exclusive ownership.
pub struct FsRandomAccessFile {
    file: Mutex<File>,
}

impl FsRandomAccessFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RandomAccessFile for FsRandomAccessFile {
    fn read(&self, offset: u64, n: usize) -> Result<Vec<u8>> {
        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = file.read(&mut buf[filled..])?;
            if read == 0 {
                break; // end of file
            }
            filled += read;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}
