//! Disk layout:
//! [ super block + inode map | inode table(1) | free byte map(n) | data blocks ]
//! A 4096-block volume has one bitmap block, so data starts at block 3.

use super::*;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    /// Must be SB_MAGIC
    pub magic: u32,
    /// Size of file system image (blocks)
    pub total_blocks: u32,
    /// Inode number of the root directory
    pub root: u32,
    /// Free data blocks, best-effort
    pub total_free_blocks: u32,
    /// Number of free map blocks
    pub total_bitmap_blocks: u32,
}

impl SuperBlock {
    /// Geometry for a fresh volume of `total_blocks`.
    pub fn new(total_blocks: u32) -> Result<Self> {
        let total_bitmap_blocks = Self::bitmap_blocks_for(total_blocks);
        let data_start = BMAP_START + total_bitmap_blocks;
        // at least one data block for the root directory
        if total_blocks <= data_start {
            return Err(FsError::TooSmall(total_blocks));
        }
        Ok(Self {
            magic: SB_MAGIC,
            total_blocks,
            root: ROOTINO as u32,
            total_free_blocks: total_blocks - data_start,
            total_bitmap_blocks,
        })
    }

    pub fn bitmap_blocks_for(total_blocks: u32) -> u32 {
        total_blocks.div_ceil(BPB as u32)
    }

    /// Block number of the first data block.
    pub fn data_start(&self) -> u32 {
        BMAP_START + self.total_bitmap_blocks
    }

    /// Bitmap block holding the byte for `bno`.
    pub fn bblock(&self, bno: u32) -> u32 {
        BMAP_START + bno / BPB as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != SB_MAGIC {
            return Err(FsError::CorruptVolume("bad superblock magic"));
        }
        if self.total_bitmap_blocks != Self::bitmap_blocks_for(self.total_blocks)
            || self.total_blocks <= self.data_start()
        {
            return Err(FsError::CorruptVolume("superblock geometry mismatch"));
        }
        if self.root != ROOTINO as u32 {
            return Err(FsError::CorruptVolume("unexpected root inode number"));
        }
        Ok(())
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory = 1,
    File = 2,
}

impl TryFrom<u8> for FileKind {
    type Error = FsError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(FileKind::Directory),
            2 => Ok(FileKind::File),
            _ => Err(FsError::CorruptVolume("unknown inode type")),
        }
    }
}

/// inode on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiskInode {
    /// Must be IN_MAGIC for a live inode
    pub magic: u16,
    /// Size of file (bytes), 0 for directories
    pub size: u32,
    /// `FileKind` as stored
    pub kind: u8,
    /// # of used entries in `direct`
    pub total_data_blocks: u8,
    /// Data block addresses
    pub direct: [u32; NDIRECT],
    /// Reserved, always 0
    pub indirect: u32,
}

impl DiskInode {
    /// A directory owning a single data block.
    pub fn directory(first_block: u32) -> Self {
        let mut direct = [0; NDIRECT];
        direct[0] = first_block;
        Self {
            magic: IN_MAGIC,
            size: 0,
            kind: FileKind::Directory as u8,
            total_data_blocks: 1,
            direct,
            indirect: 0,
        }
    }

    pub fn kind(&self) -> Result<FileKind> {
        FileKind::try_from(self.kind)
    }

    pub fn is_valid(&self) -> bool {
        self.magic == IN_MAGIC
    }

    pub fn is_dir(&self) -> bool {
        self.is_valid() && self.kind == FileKind::Directory as u8
    }

    /// Direct blocks actually in use.
    pub fn data_blocks(&self) -> &[u32] {
        let n = (self.total_data_blocks as usize).min(NDIRECT);
        &self.direct[..n]
    }

    /// Append a direct block; false if all direct slots are taken.
    pub fn push_block(&mut self, bno: u32) -> bool {
        let n = self.total_data_blocks as usize;
        if n >= NDIRECT {
            return false;
        }
        self.direct[n] = bno;
        self.total_data_blocks += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_sizes() {
        let sb = SuperBlock::new(4096).unwrap();
        assert_eq!(bincode::serialized_size(&sb).unwrap() as usize, SUPERBLOCK_SIZE);
        let inode = DiskInode::directory(3);
        assert_eq!(bincode::serialized_size(&inode).unwrap() as usize, INODE_SIZE);
    }

    #[test]
    fn superblock_geometry() {
        let sb = SuperBlock::new(4096).unwrap();
        assert_eq!(sb.total_bitmap_blocks, 1);
        assert_eq!(sb.data_start(), 3);
        assert_eq!(sb.total_free_blocks, 4093);
        assert_eq!(sb.bblock(4095), 2);

        let sb = SuperBlock::new(4097).unwrap();
        assert_eq!(sb.total_bitmap_blocks, 2);
        assert_eq!(sb.bblock(4096), 3);
        assert!(sb.validate().is_ok());
    }

    #[test]
    fn too_small() {
        assert!(matches!(SuperBlock::new(3), Err(FsError::TooSmall(3))));
        assert!(SuperBlock::new(4).is_ok());
    }

    #[test]
    fn inode_layout_bytes() {
        let mut inode = DiskInode::directory(0x0A0B_0C0D);
        inode.push_block(7);
        let bytes = bincode::serialize(&inode).unwrap();
        assert_eq!(&bytes[0..2], &IN_MAGIC.to_le_bytes());
        assert_eq!(bytes[6], FileKind::Directory as u8);
        assert_eq!(bytes[7], 2);
        assert_eq!(&bytes[8..12], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&bytes[12..16], &7u32.to_le_bytes());
        assert_eq!(inode.data_blocks(), &[0x0A0B_0C0D, 7]);
    }

    #[test]
    fn push_block_stops_at_ndirect() {
        let mut inode = DiskInode::directory(10);
        for bno in 11..15 {
            assert!(inode.push_block(bno));
        }
        assert!(!inode.push_block(15));
        assert_eq!(inode.total_data_blocks as usize, NDIRECT);
    }
}
