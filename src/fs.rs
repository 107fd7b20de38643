use super::*;
use bitmap::BitMap;
use block_cache::Block;
use block_device::BlockDevice;
use disk::{DiskInode, SuperBlock};
use inode::{InodeMap, InodeTable};

use log::{debug, error, info};
use std::sync::Arc;

/// Progress of `Volume::init`. A failure leaves the device at the stage
/// reached; it must be formatted again before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitStage {
    Uninitialized,
    SuperblockWritten,
    BitmapInitialized,
    RootCreated,
    Ready,
}

/// A mounted volume: superblock, inode map and block bitmap over one device.
/// Not synchronized; wrap it in a lock to share it.
pub struct Volume {
    pub(crate) blk_dev: Arc<dyn BlockDevice>,
    pub(crate) super_blk: SuperBlock,
    pub(crate) inodes: InodeTable,
    pub(crate) bitmap: BitMap,
    cwd: u16,
}

impl Volume {
    fn assemble(blk_dev: Arc<dyn BlockDevice>, super_blk: SuperBlock, map: InodeMap) -> Self {
        Self {
            inodes: InodeTable::new(map, blk_dev.clone()),
            bitmap: BitMap::new(
                BMAP_START,
                super_blk.total_bitmap_blocks,
                super_blk.total_blocks,
                blk_dev.clone(),
            ),
            blk_dev,
            super_blk,
            cwd: super_blk.root as u16,
        }
    }

    /// Lay out a fresh volume of `total_blocks` and return it mounted.
    pub fn init(blk_dev: Arc<dyn BlockDevice>, total_blocks: u32) -> Result<Self> {
        let super_blk = SuperBlock::new(total_blocks)?;
        let mut vol = Self::assemble(blk_dev, super_blk, InodeMap::new());
        let mut stage = InitStage::Uninitialized;
        match vol.format(&mut stage) {
            Ok(()) => {
                info!(
                    "init: {} blocks, {} bitmap blocks, data from {}",
                    total_blocks,
                    vol.super_blk.total_bitmap_blocks,
                    vol.super_blk.data_start()
                );
                Ok(vol)
            }
            Err(e) => {
                error!("init aborted after {stage:?}: {e}");
                Err(e)
            }
        }
    }

    fn format(&mut self, stage: &mut InitStage) -> Result<()> {
        self.sync()?;
        for bno in INODE_START..BMAP_START {
            Block::zeroed(bno).store(&*self.blk_dev)?;
        }
        *stage = InitStage::SuperblockWritten;

        self.bitmap.format(self.super_blk.data_start())?;
        *stage = InitStage::BitmapInitialized;

        let root = self.super_blk.root as u16;
        let bno = self.alloc_block()?;
        self.init_dir_block(bno, b"..")?;
        self.inodes.write(root, &DiskInode::directory(bno))?;
        *stage = InitStage::RootCreated;

        self.sync()?;
        *stage = InitStage::Ready;
        Ok(())
    }

    /// Validate block 0 and the root inode, and position at the root.
    pub fn mount(blk_dev: Arc<dyn BlockDevice>) -> Result<Self> {
        let block = Block::load(&*blk_dev, 0)?;
        let super_blk: SuperBlock = block.get(0)?;
        super_blk.validate()?;
        let map = InodeMap::from_block(&block);
        if !map.is_set(super_blk.root as u16) {
            return Err(FsError::CorruptVolume("root inode not allocated"));
        }
        let vol = Self::assemble(blk_dev, super_blk, map);

        let root = vol.inodes.read(vol.root())?;
        if !root.is_valid() {
            return Err(FsError::CorruptVolume("bad root inode magic"));
        }
        if !root.is_dir() {
            return Err(FsError::CorruptVolume("root inode is not a directory"));
        }
        info!(
            "mount: {} blocks, ~{} free",
            super_blk.total_blocks, super_blk.total_free_blocks
        );
        Ok(vol)
    }

    /// Total blocks on the volume.
    pub fn size(&self) -> u32 {
        self.super_blk.total_blocks
    }

    pub fn super_blk(&self) -> &SuperBlock {
        &self.super_blk
    }

    pub fn root(&self) -> u16 {
        self.super_blk.root as u16
    }

    pub fn cwd(&self) -> u16 {
        self.cwd
    }

    pub fn change_dir(&mut self, inum: u16) -> Result<()> {
        if !self.inodes.is_allocated(inum) {
            return Err(FsError::InvalidInode(inum));
        }
        if !self.inodes.read(inum)?.is_dir() {
            return Err(FsError::NotDirectory(inum));
        }
        self.cwd = inum;
        Ok(())
    }

    pub fn is_inode_allocated(&self, inum: u16) -> bool {
        self.inodes.is_allocated(inum)
    }

    pub fn allocated_inodes(&self) -> Vec<u16> {
        self.inodes.allocated().collect()
    }

    pub fn alloc_inode(&mut self) -> Result<u16> {
        self.inodes.alloc()
    }

    pub fn read_inode(&self, inum: u16) -> Result<DiskInode> {
        self.inodes.read(inum)
    }

    pub fn write_inode(&self, inum: u16, inode: &DiskInode) -> Result<()> {
        self.inodes.write(inum, inode)
    }

    /// Lowest free data block. The free counter is only updated in memory;
    /// `sync` persists it.
    pub fn alloc_block(&mut self) -> Result<u32> {
        let bno = self.bitmap.alloc()?;
        self.super_blk.total_free_blocks = self.super_blk.total_free_blocks.saturating_sub(1);
        debug!("alloc block {bno}");
        Ok(bno)
    }

    pub fn release_block(&mut self, bno: u32) -> Result<()> {
        self.bitmap.dealloc(bno, self.super_blk.data_start())?;
        self.super_blk.total_free_blocks = self.super_blk.total_free_blocks.saturating_add(1);
        debug!("release block {bno}");
        Ok(())
    }

    pub fn is_block_allocated(&self, bno: u32) -> Result<bool> {
        self.bitmap.is_allocated(bno)
    }

    /// Rewrite block 0 from the in-memory superblock and inode map.
    pub fn sync(&self) -> Result<()> {
        let mut block = Block::zeroed(0);
        block.put(0, &self.super_blk)?;
        self.inodes.map().write_into(&mut block);
        block.store(&*self.blk_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Accepts `writes_left` writes, then fails every write.
    struct FlakyDisk {
        blocks: Mutex<Vec<[u8; BSIZE]>>,
        writes_left: AtomicUsize,
    }

    impl BlockDevice for FlakyDisk {
        fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
            buf.copy_from_slice(&self.blocks.lock().unwrap()[blockno]);
            Ok(())
        }

        fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
            if self.writes_left.load(Ordering::SeqCst) == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "write failed"));
            }
            self.writes_left.fetch_sub(1, Ordering::SeqCst);
            self.blocks.lock().unwrap()[blockno].copy_from_slice(buf);
            Ok(())
        }
    }

    fn stage_after(writes: usize) -> (InitStage, Result<()>) {
        let disk = Arc::new(FlakyDisk {
            blocks: Mutex::new(vec![[0u8; BSIZE]; 16]),
            writes_left: AtomicUsize::new(writes),
        });
        let super_blk = SuperBlock::new(16).unwrap();
        let mut vol = Volume::assemble(disk, super_blk, InodeMap::new());
        let mut stage = InitStage::Uninitialized;
        let res = vol.format(&mut stage);
        (stage, res)
    }

    #[test]
    fn format_reports_stage_reached() {
        // block 0, inode table, bitmap, bitmap alloc, root block, root inode, block 0
        let (stage, res) = stage_after(0);
        assert_eq!(stage, InitStage::Uninitialized);
        assert!(matches!(res, Err(FsError::Io(_))));

        let (stage, res) = stage_after(2);
        assert_eq!(stage, InitStage::SuperblockWritten);
        assert!(res.is_err());

        let (stage, res) = stage_after(3);
        assert_eq!(stage, InitStage::BitmapInitialized);
        assert!(res.is_err());

        let (stage, res) = stage_after(6);
        assert_eq!(stage, InitStage::RootCreated);
        assert!(res.is_err());

        let (stage, res) = stage_after(7);
        assert_eq!(stage, InitStage::Ready);
        assert!(res.is_ok());
    }
}
