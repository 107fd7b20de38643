use super::*;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

/// Block-addressed storage. Every call moves exactly one `BSIZE` buffer and
/// is assumed to be all-or-nothing.
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()>;
    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()>;
}

/// A disk image in a regular file.
pub struct FileDisk {
    file: Mutex<File>,
    nblocks: usize,
}

impl FileDisk {
    /// Open an existing image. Its length must be a whole number of blocks.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        if len % BSIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image length {len} is not a multiple of {BSIZE}"),
            ));
        }
        Ok(Self {
            file: Mutex::new(file),
            nblocks: len / BSIZE,
        })
    }

    /// Create (or truncate) an image of `nblocks` zeroed blocks.
    pub fn create<P: AsRef<Path>>(path: P, nblocks: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((nblocks * BSIZE) as u64)?;
        Ok(Self {
            file: Mutex::new(file),
            nblocks,
        })
    }

    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    fn check(&self, blockno: usize, len: usize) -> io::Result<()> {
        if blockno >= self.nblocks {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block {blockno} past end of image ({} blocks)", self.nblocks),
            ));
        }
        if len != BSIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("buffer of {len} bytes, expected {BSIZE}"),
            ));
        }
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
        self.check(blockno, buf.len())?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((blockno * BSIZE) as u64))?;
        file.read_exact(buf)
    }

    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
        self.check(blockno, buf.len())?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((blockno * BSIZE) as u64))?;
        file.write_all(buf)
    }
}
