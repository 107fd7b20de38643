//! MashiFS: a small inode filesystem on a block device.
//!
//! Block 0 holds the superblock and the inode map, block 1 the inode table,
//! then a byte-per-block free map, then data. Directories own up to
//! `NDIRECT` data blocks of variable-length entries.

mod bitmap;
mod block_cache;
mod block_device;
mod check;
mod common;
mod dir;
mod disk;
mod error;
mod fs;
mod inode;

pub use block_cache::Block;
pub use block_device::{BlockDevice, FileDisk};
pub use check::CheckReport;
pub use common::*;
pub use dir::{DirBlock, DirEntry, DirHeader, MAX_ENTRY_NAME};
pub use disk::{DiskInode, FileKind, SuperBlock};
pub use error::{FsError, Resource, Result};
pub use fs::Volume;
pub use inode::{InodeMap, InodeTable};
