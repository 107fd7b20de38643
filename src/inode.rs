use super::*;
use block_cache::Block;
use block_device::BlockDevice;
use disk::DiskInode;

use log::{debug, trace};
use std::sync::Arc;

/// Inode presence map, kept in block 0 right after the superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeMap([u8; NINODES]);

impl InodeMap {
    /// Fresh map with only the root slot taken.
    pub fn new() -> Self {
        let mut map = [0u8; NINODES];
        map[ROOTINO as usize] = 1;
        Self(map)
    }

    pub fn from_block(block: &Block) -> Self {
        let mut map = [0u8; NINODES];
        map.copy_from_slice(&block.bytes()[SUPERBLOCK_SIZE..SUPERBLOCK_SIZE + NINODES]);
        Self(map)
    }

    pub fn write_into(&self, block: &mut Block) {
        block.bytes_mut()[SUPERBLOCK_SIZE..SUPERBLOCK_SIZE + NINODES].copy_from_slice(&self.0);
    }

    pub fn is_set(&self, inum: u16) -> bool {
        self.0.get(inum as usize).is_some_and(|&b| b != 0)
    }

    fn set(&mut self, inum: u16, value: bool) {
        self.0[inum as usize] = value as u8;
    }

    /// Lowest free non-root slot.
    fn first_free(&self) -> Option<u16> {
        (1..NINODES).find(|&i| self.0[i] == 0).map(|i| i as u16)
    }
}

impl Default for InodeMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Inode numbers and the packed inode table starting at INODE_START.
pub struct InodeTable {
    map: InodeMap,
    blk_dev: Arc<dyn BlockDevice>,
}

impl InodeTable {
    pub fn new(map: InodeMap, blk_dev: Arc<dyn BlockDevice>) -> Self {
        Self { map, blk_dev }
    }

    pub fn map(&self) -> &InodeMap {
        &self.map
    }

    pub fn is_allocated(&self, inum: u16) -> bool {
        self.map.is_set(inum)
    }

    pub fn allocated(&self) -> impl Iterator<Item = u16> + '_ {
        (0..NINODES as u16).filter(|&i| self.map.is_set(i))
    }

    /// (block, byte offset) of the record for `inum`
    pub fn iblock(inum: u16) -> (u32, usize) {
        let inum = inum as usize;
        (INODE_START + (inum / IPB) as u32, (inum % IPB) * INODE_SIZE)
    }

    fn check(inum: u16) -> Result<()> {
        if inum as usize >= NINODES {
            return Err(FsError::InvalidInode(inum));
        }
        Ok(())
    }

    /// Take the lowest free slot and persist the map into block 0.
    pub fn alloc(&mut self) -> Result<u16> {
        let inum = self.map.first_free().ok_or(FsError::NoSpace(Resource::Inode))?;
        let mut block = Block::load(&*self.blk_dev, 0)?;
        self.map.set(inum, true);
        self.map.write_into(&mut block);
        if let Err(e) = block.store(&*self.blk_dev) {
            self.map.set(inum, false);
            return Err(e);
        }
        debug!("inode: alloc {inum}");
        Ok(inum)
    }

    pub fn read(&self, inum: u16) -> Result<DiskInode> {
        Self::check(inum)?;
        let (blockno, offset) = Self::iblock(inum);
        let block = Block::load(&*self.blk_dev, blockno)?;
        block.get(offset)
    }

    /// Read-modify-write of the block holding `inum`.
    pub fn write(&self, inum: u16, inode: &DiskInode) -> Result<()> {
        Self::check(inum)?;
        let (blockno, offset) = Self::iblock(inum);
        let mut block = Block::load(&*self.blk_dev, blockno)?;
        block.put(offset, inode)?;
        block.store(&*self.blk_dev)?;
        trace!("inode: wrote {inum} to block {blockno}+{offset}");
        Ok(())
    }
}
