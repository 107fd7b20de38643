use super::*;
use block_cache::Block;
use block_device::BlockDevice;

use log::{debug, trace};
use std::sync::Arc;

/// Free-block map, one byte per block: 1 = allocated, 0 = free.
pub struct BitMap {
    start: u32,
    blocks: u32, // # of bitmap blocks
    total: u32,  // # of tracked blocks, the whole device
    blk_dev: Arc<dyn BlockDevice>,
}

impl BitMap {
    pub fn new(start: u32, blocks: u32, total: u32, blk_dev: Arc<dyn BlockDevice>) -> Self {
        Self {
            start,
            blocks,
            total,
            blk_dev,
        }
    }

    /// (bitmap block, byte offset) for `bno`
    fn locate(&self, bno: u32) -> (u32, usize) {
        (self.start + bno / BPB as u32, (bno % BPB as u32) as usize)
    }

    /// Write every bitmap block, marking blocks below `reserved_end` allocated.
    pub fn format(&self, reserved_end: u32) -> Result<()> {
        for bi in 0..self.blocks {
            let mut block = Block::zeroed(self.start + bi);
            let first = bi * BPB as u32;
            let cache = block.bytes_mut();
            for (j, byte) in cache.iter_mut().enumerate() {
                if first + (j as u32) < reserved_end {
                    *byte = 1;
                }
            }
            block.store(&*self.blk_dev)?;
        }
        debug!("bitmap: {} blocks formatted, 0..{} reserved", self.blocks, reserved_end);
        Ok(())
    }

    /// Lowest free block wins. Reads bitmap blocks in order and writes back
    /// only the one that changed.
    pub fn alloc(&self) -> Result<u32> {
        for bi in 0..self.blocks {
            let first = bi * BPB as u32;
            if first >= self.total {
                break;
            }
            let mut block = Block::load(&*self.blk_dev, self.start + bi)?;
            let tracked = ((self.total - first) as usize).min(BPB);
            let cache = block.bytes_mut();
            if let Some(j) = cache[..tracked].iter().position(|&b| b == 0) {
                cache[j] = 1;
                block.store(&*self.blk_dev)?;
                let bno = first + j as u32;
                trace!("bitmap: alloc block {bno}");
                return Ok(bno);
            }
        }
        Err(FsError::NoSpace(Resource::Block))
    }

    /// Clear the byte for `bno`. Blocks below `data_start` are never released.
    pub fn dealloc(&self, bno: u32, data_start: u32) -> Result<()> {
        if bno < data_start || bno >= self.total {
            return Err(FsError::InvalidBlock(bno));
        }
        let (blockno, byte) = self.locate(bno);
        let mut block = Block::load(&*self.blk_dev, blockno)?;
        let cache = block.bytes_mut();
        if cache[byte] == 0 {
            return Err(FsError::InvalidBlock(bno));
        }
        cache[byte] = 0;
        block.store(&*self.blk_dev)?;
        trace!("bitmap: release block {bno}");
        Ok(())
    }

    /// Every allocated block at or above `from`, ascending. One read per
    /// bitmap block.
    pub fn allocated(&self, from: u32) -> Result<Vec<u32>> {
        let mut used = Vec::new();
        for bi in 0..self.blocks {
            let first = bi * BPB as u32;
            if first >= self.total {
                break;
            }
            let block = Block::load(&*self.blk_dev, self.start + bi)?;
            let tracked = ((self.total - first) as usize).min(BPB);
            used.extend(
                block.bytes()[..tracked]
                    .iter()
                    .enumerate()
                    .filter(|&(_, &b)| b != 0)
                    .map(|(j, _)| first + j as u32)
                    .filter(|&bno| bno >= from),
            );
        }
        Ok(used)
    }

    pub fn is_allocated(&self, bno: u32) -> Result<bool> {
        if bno >= self.total {
            return Err(FsError::InvalidBlock(bno));
        }
        let (blockno, byte) = self.locate(bno);
        let block = Block::load(&*self.blk_dev, blockno)?;
        Ok(block.bytes()[byte] != 0)
    }
}
