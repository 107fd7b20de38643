//! Directory blocks: a header (magic, entry count, own name, free space)
//! followed by variable-length entries packed in insertion order.
//!
//! Only `direct[0]` carries the directory's name; overflow blocks get a
//! header with an empty name. Entries are appended at `BSIZE - free_space`.

use super::*;
use block_cache::Block;
use block_device::BlockDevice;
use disk::DiskInode;
use fs::Volume;

use log::{debug, info, warn};

/// Longest name that still fits in an empty overflow block.
pub const MAX_ENTRY_NAME: usize = if MAX_ENTRY - DIRENT_SIZE < MAX_NAME {
    MAX_ENTRY - DIRENT_SIZE
} else {
    MAX_NAME
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirHeader {
    pub magic: u16,
    pub total_entries: u16,
    pub name: Vec<u8>,
    /// bytes left for entries
    pub free_space: u16,
}

impl DirHeader {
    pub fn new(name: &[u8]) -> Self {
        let mut header = Self {
            magic: DIR_MAGIC,
            total_entries: 0,
            name: name.to_vec(),
            free_space: 0,
        };
        header.free_space = (BSIZE - header.size()) as u16;
        header
    }

    pub fn size(&self) -> usize {
        DIRHDR_SIZE + self.name.len()
    }

    fn read(block: &Block) -> Result<Self> {
        let magic: u16 = block.get(0)?;
        if magic != DIR_MAGIC {
            return Err(FsError::CorruptVolume("bad directory block magic"));
        }
        let total_entries: u16 = block.get(2)?;
        let namelen: u8 = block.get(4)?;
        let name = block.bytes()[5..5 + namelen as usize].to_vec();
        let free_space: u16 = block.get(5 + namelen as usize)?;
        let header = Self {
            magic,
            total_entries,
            name,
            free_space,
        };
        if header.free_space as usize > BSIZE - header.size() {
            return Err(FsError::CorruptVolume("directory free space out of range"));
        }
        Ok(header)
    }

    fn write(&self, block: &mut Block) -> Result<()> {
        let mut off = block.put(0, &self.magic)?;
        off += block.put(off, &self.total_entries)?;
        off += block.put(off, &(self.name.len() as u8))?;
        block.bytes_mut()[off..off + self.name.len()].copy_from_slice(&self.name);
        off += self.name.len();
        block.put(off, &self.free_space)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inumber: u16,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn size(&self) -> usize {
        DIRENT_SIZE + self.name.len()
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    fn read(block: &Block, offset: usize) -> Result<Self> {
        let inumber: u16 = block.get(offset)?;
        let namelen: u8 = block.get(offset + 2)?;
        let start = offset + DIRENT_SIZE;
        let end = start + namelen as usize;
        if end > BSIZE {
            return Err(FsError::CorruptVolume("directory entry runs past block end"));
        }
        Ok(Self {
            inumber,
            name: block.bytes()[start..end].to_vec(),
        })
    }

    fn write(&self, block: &mut Block, offset: usize) -> Result<()> {
        block.put(offset, &self.inumber)?;
        block.put(offset + 2, &(self.name.len() as u8))?;
        let start = offset + DIRENT_SIZE;
        block.bytes_mut()[start..start + self.name.len()].copy_from_slice(&self.name);
        Ok(())
    }
}

/// A directory data block in memory.
pub struct DirBlock {
    block: Block,
    header: DirHeader,
}

impl DirBlock {
    /// Empty block whose header carries `name`.
    pub fn format(blockno: u32, name: &[u8]) -> Result<Self> {
        let mut block = Block::zeroed(blockno);
        let header = DirHeader::new(name);
        header.write(&mut block)?;
        Ok(Self { block, header })
    }

    pub fn load(blk_dev: &dyn BlockDevice, blockno: u32) -> Result<Self> {
        let block = Block::load(blk_dev, blockno)?;
        let header = DirHeader::read(&block)?;
        Ok(Self { block, header })
    }

    pub fn store(&self, blk_dev: &dyn BlockDevice) -> Result<()> {
        self.block.store(blk_dev)
    }

    pub fn blockno(&self) -> u32 {
        self.block.blockno()
    }

    pub fn header(&self) -> &DirHeader {
        &self.header
    }

    pub fn has_room(&self, required: usize) -> bool {
        self.header.free_space as usize >= required
    }

    /// Append an entry at the first unused byte.
    pub fn push(&mut self, inumber: u16, name: &[u8]) -> Result<()> {
        check_name_len(name)?;
        let entry = DirEntry {
            inumber,
            name: name.to_vec(),
        };
        if !self.has_room(entry.size()) {
            return Err(FsError::NoSpace(Resource::Directory));
        }
        let offset = BSIZE - self.header.free_space as usize;
        entry.write(&mut self.block, offset)?;
        self.header.free_space -= entry.size() as u16;
        self.header.total_entries += 1;
        self.header.write(&mut self.block)
    }

    pub fn entries(&self) -> Result<Vec<DirEntry>> {
        let end = BSIZE - self.header.free_space as usize;
        let mut offset = self.header.size();
        let mut entries = Vec::with_capacity(self.header.total_entries as usize);
        for _ in 0..self.header.total_entries {
            if offset + DIRENT_SIZE > end {
                return Err(FsError::CorruptVolume("directory entry count exceeds used space"));
            }
            let entry = DirEntry::read(&self.block, offset)?;
            offset += entry.size();
            entries.push(entry);
        }
        if offset != end {
            return Err(FsError::CorruptVolume("directory used space mismatch"));
        }
        Ok(entries)
    }
}

pub fn check_name_len(name: &[u8]) -> Result<()> {
    if name.len() > MAX_ENTRY_NAME {
        return Err(FsError::NameTooLong {
            len: name.len(),
            max: MAX_ENTRY_NAME,
        });
    }
    Ok(())
}

fn check_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name == b"." || name == b".." || name.iter().any(|&c| c == b'/' || c == 0) {
        return Err(FsError::InvalidName);
    }
    check_name_len(name)
}

impl Volume {
    /// Write a fresh, empty directory block with `name` in its header.
    pub fn init_dir_block(&self, bno: u32, name: &[u8]) -> Result<()> {
        check_name_len(name)?;
        DirBlock::format(bno, name)?.store(&*self.blk_dev)
    }

    fn dir_inode(&self, dir: u16) -> Result<DiskInode> {
        if !self.inodes.is_allocated(dir) {
            return Err(FsError::InvalidInode(dir));
        }
        let inode = self.inodes.read(dir)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory(dir));
        }
        Ok(inode)
    }

    /// Add `(child, name)` to directory `dir`, growing it by one direct block
    /// when every existing block is full. Returns the block that took it.
    pub fn insert_entry(&mut self, dir: u16, child: u16, name: &[u8]) -> Result<u32> {
        check_name_len(name)?;
        let required = DIRENT_SIZE + name.len();
        let mut inode = self.dir_inode(dir)?;

        for &bno in inode.data_blocks() {
            let mut blk = DirBlock::load(&*self.blk_dev, bno)?;
            if blk.has_room(required) {
                blk.push(child, name)?;
                blk.store(&*self.blk_dev)?;
                debug!("dir {dir}: entry {child} -> block {bno}");
                return Ok(bno);
            }
        }

        if inode.total_data_blocks as usize >= NDIRECT {
            warn!("dir {dir}: all {NDIRECT} direct blocks full");
            return Err(FsError::NoSpace(Resource::Directory));
        }

        let bno = self.alloc_block()?;
        let mut blk = DirBlock::format(bno, b"")?;
        blk.store(&*self.blk_dev)?;
        inode.push_block(bno);
        self.inodes.write(dir, &inode)?;
        debug!("dir {dir}: grew to {} blocks", inode.total_data_blocks);

        blk.push(child, name)?;
        blk.store(&*self.blk_dev)?;
        debug!("dir {dir}: entry {child} -> block {bno}");
        Ok(bno)
    }

    fn has_room(&self, inode: &DiskInode, required: usize) -> Result<bool> {
        if (inode.total_data_blocks as usize) < NDIRECT {
            return Ok(true);
        }
        for &bno in inode.data_blocks() {
            if DirBlock::load(&*self.blk_dev, bno)?.has_room(required) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Create directory `name` under `parent` and return its inode number.
    ///
    /// The child's inode and first block are written before the parent entry,
    /// so a failure part way leaves at worst an unlinked (orphan) directory.
    pub fn create_directory(&mut self, parent: u16, name: &str) -> Result<u16> {
        let name = name.as_bytes();
        check_name(name)?;
        let parent_inode = self.dir_inode(parent)?;
        if self.lookup(parent, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        if !self.has_room(&parent_inode, DIRENT_SIZE + name.len())? {
            return Err(FsError::NoSpace(Resource::Directory));
        }

        let inum = self.alloc_inode()?;
        let bno = self.alloc_block()?;
        self.init_dir_block(bno, name)?;
        self.inodes.write(inum, &DiskInode::directory(bno))?;
        self.insert_entry(parent, inum, name)?;
        info!(
            "mkdir {:?}: inode {inum}, block {bno}, parent {parent}",
            String::from_utf8_lossy(name)
        );
        Ok(inum)
    }

    /// `create_directory` under the current directory.
    pub fn create_dir(&mut self, name: &str) -> Result<u16> {
        self.create_directory(self.cwd(), name)
    }

    /// Every entry of `dir`, in block order then insertion order.
    pub fn read_dir(&self, dir: u16) -> Result<Vec<DirEntry>> {
        let inode = self.dir_inode(dir)?;
        let mut entries = Vec::new();
        for &bno in inode.data_blocks() {
            entries.extend(DirBlock::load(&*self.blk_dev, bno)?.entries()?);
        }
        Ok(entries)
    }

    pub fn lookup(&self, dir: u16, name: &[u8]) -> Result<Option<u16>> {
        Ok(self
            .read_dir(dir)?
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.inumber))
    }

    /// The name kept in the header of the directory's first block.
    pub fn dir_name(&self, dir: u16) -> Result<String> {
        let inode = self.dir_inode(dir)?;
        let blk = DirBlock::load(&*self.blk_dev, inode.direct[0])?;
        Ok(String::from_utf8_lossy(&blk.header().name).into_owned())
    }
}
