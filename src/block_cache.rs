use super::*;
use block_device::BlockDevice;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// One block held in memory. Records are decoded out of it as owned values
/// and encoded back in place; nothing hands out references into the buffer.
pub struct Block {
    cache: [u8; BSIZE],
    blockno: u32,
}

impl Block {
    /// An all-zero block that has not been read from disk.
    pub fn zeroed(blockno: u32) -> Self {
        Self {
            cache: [0u8; BSIZE],
            blockno,
        }
    }

    /// block(disk) -> block(mem).
    pub fn load(blk_dev: &dyn BlockDevice, blockno: u32) -> Result<Self> {
        let mut block = Self::zeroed(blockno);
        blk_dev.read_block(blockno as usize, &mut block.cache)?;
        Ok(block)
    }

    /// block(mem) -> block(disk).
    pub fn store(&self, blk_dev: &dyn BlockDevice) -> Result<()> {
        blk_dev.write_block(self.blockno as usize, &self.cache)?;
        Ok(())
    }

    pub fn blockno(&self) -> u32 {
        self.blockno
    }

    pub fn bytes(&self) -> &[u8] {
        &self.cache
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.cache
    }

    /// Decode a fixed-size record starting at `offset`.
    pub fn get<T: DeserializeOwned>(&self, offset: usize) -> Result<T> {
        assert!(offset < BSIZE);
        Ok(bincode::deserialize(&self.cache[offset..])?)
    }

    /// Encode `value` at `offset`, returning the number of bytes written.
    pub fn put<T: Serialize>(&mut self, offset: usize, value: &T) -> Result<usize> {
        let size = bincode::serialized_size(value)? as usize;
        assert!(offset + size <= BSIZE);
        bincode::serialize_into(&mut self.cache[offset..offset + size], value)?;
        Ok(size)
    }
}
