/// root i-number
pub const ROOTINO: u16 = 0;

pub const SB_MAGIC: u32 = 0x4D53_4846; // "FHSM"
pub const IN_MAGIC: u16 = 0x1E0D;
pub const DIR_MAGIC: u16 = 0xD1E7;

/// block size
pub const BSIZE: usize = 4096;

/// bitmap bytes per block, one byte per tracked block
pub const BPB: usize = BSIZE;

/// # of inode slots, slot 0 is the root directory
pub const NINODES: usize = 124;

/// direct blocks in inode
pub const NDIRECT: usize = 5;

/// longest name, namelen is a single byte on disk
pub const MAX_NAME: usize = u8::MAX as usize;

/// packed superblock, see `disk::SuperBlock`
pub const SUPERBLOCK_SIZE: usize = 20;

/// packed on-disk inode, see `disk::DiskInode`
pub const INODE_SIZE: usize = 32;

/// fixed part of a directory header: magic, total_entries, namelen, free_space
pub const DIRHDR_SIZE: usize = 7;

/// fixed part of a directory entry: inumber, namelen
pub const DIRENT_SIZE: usize = 3;

/// inodes per block
pub const IPB: usize = BSIZE / INODE_SIZE;

/// block number of the first inode block
pub const INODE_START: u32 = 1;

/// # of blocks holding the inode table
pub const INODE_TABLE_BLOCKS: u32 = NINODES.div_ceil(IPB) as u32;

/// block number of the first free map block
pub const BMAP_START: u32 = INODE_START + INODE_TABLE_BLOCKS;

/// largest entry an empty overflow block can take
pub const MAX_ENTRY: usize = BSIZE - DIRHDR_SIZE;

const _: () = assert!(SUPERBLOCK_SIZE + NINODES <= BSIZE);
const _: () = assert!(BSIZE % INODE_SIZE == 0);
const _: () = assert!(BSIZE <= u16::MAX as usize);
