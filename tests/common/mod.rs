//! Common utilities for tests

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mashifs::{BlockDevice, Volume, BSIZE};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory device that counts calls and can be told to fail writes.
pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    /// writes left before every write fails; usize::MAX means never
    writes_left: AtomicUsize,
}

impl RamDisk {
    pub fn new(num_blocks: usize) -> Arc<Self> {
        Arc::new(RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BSIZE]),
            num_blocks,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            writes_left: AtomicUsize::new(usize::MAX),
        })
    }

    pub fn fail_writes_after(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.reads.load(Ordering::SeqCst),
            self.writes.load(Ordering::SeqCst),
        )
    }

    pub fn raw_block(&self, blockno: usize) -> Vec<u8> {
        let data = self.inner.lock().unwrap();
        data[blockno * BSIZE..(blockno + 1) * BSIZE].to_vec()
    }

    pub fn patch(&self, offset: usize, bytes: &[u8]) {
        let mut data = self.inner.lock().unwrap();
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
        if blockno >= self.num_blocks || buf.len() != BSIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad read"));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[blockno * BSIZE..(blockno + 1) * BSIZE]);
        Ok(())
    }

    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
        if blockno >= self.num_blocks || buf.len() != BSIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad write"));
        }
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "device write failed"));
        }
        if left != usize::MAX {
            self.writes_left.store(left - 1, Ordering::SeqCst);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut data = self.inner.lock().unwrap();
        data[blockno * BSIZE..(blockno + 1) * BSIZE].copy_from_slice(buf);
        Ok(())
    }
}

/// A freshly initialized volume over a RamDisk of `blocks` blocks.
pub fn fresh(blocks: u32) -> (Arc<RamDisk>, Volume) {
    init_logger();
    let disk = RamDisk::new(blocks as usize);
    let vol = Volume::init(disk.clone(), blocks).unwrap();
    (disk, vol)
}

/// A 255-byte name unique per `i`.
pub fn long_name(i: usize) -> String {
    format!("{i:0>255}")
}
