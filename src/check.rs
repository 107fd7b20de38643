//! Read-only consistency walk over a mounted volume.

use super::*;
use dir::DirBlock;
use fs::Volume;

use log::warn;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct CheckReport {
    pub errors: Vec<String>,
    /// allocated inodes no directory entry points at
    pub orphans: Vec<u16>,
    /// data blocks marked in the bitmap that no inode owns
    pub leaked: Vec<u32>,
    pub inodes_checked: usize,
    pub blocks_checked: usize,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Volume {
    /// Walk every allocated inode and its blocks, then the bitmap. I/O errors
    /// abort the walk; inconsistencies are collected in the report. Orphans
    /// and leaked blocks are what an interrupted update leaves behind and do
    /// not make the volume unclean.
    pub fn check(&self) -> Result<CheckReport> {
        let mut report = CheckReport::default();
        let data_start = self.super_blk.data_start();
        let total = self.super_blk.total_blocks;
        let mut owner: HashMap<u32, u16> = HashMap::new();
        let mut referenced: HashSet<u16> = HashSet::new();
        referenced.insert(self.root());

        for inum in self.allocated_inodes() {
            report.inodes_checked += 1;
            let inode = self.read_inode(inum)?;
            if !inode.is_valid() {
                report.errors.push(format!("inode {inum}: bad magic"));
                continue;
            }
            if inode.kind().is_err() {
                report.errors.push(format!("inode {inum}: unknown type {}", inode.kind));
                continue;
            }
            if inode.total_data_blocks as usize > NDIRECT {
                report.errors.push(format!(
                    "inode {inum}: {} data blocks, at most {NDIRECT}",
                    inode.total_data_blocks
                ));
                continue;
            }
            let used = inode.total_data_blocks as usize;
            if inode.direct[used..].iter().any(|&b| b != 0) {
                report
                    .errors
                    .push(format!("inode {inum}: direct pointer set past block {used}"));
            }
            if inode.indirect != 0 {
                report.errors.push(format!("inode {inum}: reserved indirect pointer set"));
            }

            for &bno in inode.data_blocks() {
                report.blocks_checked += 1;
                if bno < data_start || bno >= total {
                    report.errors.push(format!("inode {inum}: block {bno} outside data region"));
                    continue;
                }
                if !self.is_block_allocated(bno)? {
                    report.errors.push(format!("inode {inum}: block {bno} free in bitmap"));
                }
                if let Some(prev) = owner.insert(bno, inum) {
                    report.errors.push(format!("block {bno} claimed by inodes {prev} and {inum}"));
                }
                if !inode.is_dir() {
                    continue;
                }

                let blk = match DirBlock::load(&*self.blk_dev, bno) {
                    Ok(blk) => blk,
                    Err(FsError::CorruptVolume(why)) => {
                        report.errors.push(format!("inode {inum}: block {bno}: {why}"));
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                match blk.entries() {
                    Ok(entries) => {
                        let h = blk.header();
                        let used: usize = entries.iter().map(|e| e.size()).sum();
                        if h.free_space as usize + used + h.size() != BSIZE {
                            report.errors.push(format!(
                                "inode {inum}: block {bno}: free space {} does not add up",
                                h.free_space
                            ));
                        }
                        for entry in entries {
                            if !self.is_inode_allocated(entry.inumber) {
                                report.errors.push(format!(
                                    "inode {inum}: entry {:?} points at free inode {}",
                                    entry.name_lossy(),
                                    entry.inumber
                                ));
                            }
                            referenced.insert(entry.inumber);
                        }
                    }
                    Err(FsError::CorruptVolume(why)) => {
                        report.errors.push(format!("inode {inum}: block {bno}: {why}"));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        for inum in self.allocated_inodes() {
            if !referenced.contains(&inum) {
                warn!("check: inode {inum} is not linked from any directory");
                report.orphans.push(inum);
            }
        }
        for bno in self.bitmap.allocated(data_start)? {
            if !owner.contains_key(&bno) {
                warn!("check: block {bno} is allocated but owned by no inode");
                report.leaked.push(bno);
            }
        }
        Ok(report)
    }
}
