use std::fmt;
use std::io;

use thiserror::Error;

/// What ran out in a `NoSpace` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inode,
    Block,
    /// all direct blocks of a directory are full
    Directory,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Inode => write!(f, "no free inode"),
            Resource::Block => write!(f, "no free data block"),
            Resource::Directory => write!(f, "directory is at maximum capacity"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("block device I/O failed")]
    Io(#[from] io::Error),
    #[error("corrupt volume: {0}")]
    CorruptVolume(&'static str),
    #[error("{0}")]
    NoSpace(Resource),
    #[error("name is {len} bytes, at most {max} fit in a directory block")]
    NameTooLong { len: usize, max: usize },
    #[error("invalid entry name")]
    InvalidName,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("inode {0} is not a directory")]
    NotDirectory(u16),
    #[error("inode {0} is out of range or not allocated")]
    InvalidInode(u16),
    #[error("block {0} cannot be released")]
    InvalidBlock(u32),
    #[error("{0} blocks leave no room for the root directory")]
    TooSmall(u32),
    #[error("on-disk record codec failed")]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
