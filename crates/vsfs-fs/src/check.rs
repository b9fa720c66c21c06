//! Read-only consistency checking: cross-references the bitmaps, the
//! inode table, and the root directory without touching any state.

use thiserror::Error;

use crate::disk::Disk;
use crate::error::FsError;
use crate::fs::{Directory, InodeTable};
use crate::{
    bitmap, DATA_BITMAP_BLOCK, DATA_BLOCKS_COUNT, DATA_BLOCKS_START, INODE_BITMAP_BLOCK,
    MAX_INODES, ROOT_INUM, ZERO_BLOCK,
};

/// One invariant violation. Faults are reported, never propagated as
/// errors; a clean file system yields an empty list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckFault {
    #[error("Root inode not allocated in bitmap")]
    RootNotAllocated,

    #[error("Root directory has no data block")]
    RootNoDataBlock,

    #[error("File '{name}' has invalid inode {inum}")]
    InumOutOfRange { name: String, inum: u32 },

    #[error("File '{name}' inode {inum} not marked in bitmap (dangling pointer)")]
    Dangling { name: String, inum: u32 },

    #[error("File '{name}' has invalid block pointer {block}")]
    BlockOutOfRange { name: String, block: u32 },

    #[error("File '{name}' block {block} not marked in bitmap")]
    BlockNotMarked { name: String, block: u32 },

    #[error("Inode {0} is allocated but not referenced (leak)")]
    Leaked(u32),

    #[error("Inode {inum} referenced by {count} directory entries")]
    MultiplyLinked { inum: u32, count: u32 },
}

pub(crate) fn run(disk: &mut Disk) -> Result<Vec<CheckFault>, FsError> {
    let mut faults = Vec::new();

    let mut inode_bitmap = ZERO_BLOCK;
    disk.read_block(INODE_BITMAP_BLOCK, &mut inode_bitmap)?;
    let mut data_bitmap = ZERO_BLOCK;
    disk.read_block(DATA_BITMAP_BLOCK, &mut data_bitmap)?;
    let table = InodeTable::load(disk)?;

    if !bitmap::get(&inode_bitmap, ROOT_INUM as usize) {
        faults.push(CheckFault::RootNotAllocated);
    }

    let root = table.get(ROOT_INUM)?;
    if root.blocks[0] == 0 {
        // Nothing else can be checked without the root directory.
        faults.push(CheckFault::RootNoDataBlock);
        return Ok(faults);
    }

    let mut dir_block = ZERO_BLOCK;
    disk.read_block(root.blocks[0], &mut dir_block)?;
    let entries = Directory::from_block(dir_block).entries()?;

    for (_slot, entry) in &entries {
        let name = entry.name_as_str().to_string();

        if entry.inum >= MAX_INODES {
            faults.push(CheckFault::InumOutOfRange {
                name,
                inum: entry.inum,
            });
            continue;
        }

        if !bitmap::get(&inode_bitmap, entry.inum as usize) {
            faults.push(CheckFault::Dangling {
                name: name.clone(),
                inum: entry.inum,
            });
        }

        let inode = table.get(entry.inum)?;
        for &block in &inode.blocks {
            if block == 0 {
                continue;
            }
            if block < DATA_BLOCKS_START || block >= DATA_BLOCKS_START + DATA_BLOCKS_COUNT {
                faults.push(CheckFault::BlockOutOfRange {
                    name: name.clone(),
                    block,
                });
                continue;
            }
            if !bitmap::get(&data_bitmap, (block - DATA_BLOCKS_START) as usize) {
                faults.push(CheckFault::BlockNotMarked {
                    name: name.clone(),
                    block,
                });
            }
        }
    }

    // Every allocated non-root inode must be referenced by exactly one entry.
    for inum in 1..MAX_INODES {
        if !bitmap::get(&inode_bitmap, inum as usize) {
            continue;
        }
        let refs = entries.iter().filter(|(_, e)| e.inum == inum).count() as u32;
        match refs {
            0 => faults.push(CheckFault::Leaked(inum)),
            1 => {}
            count => faults.push(CheckFault::MultiplyLinked { inum, count }),
        }
    }

    Ok(faults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DirEntry;
    use crate::{mkfs, Vsfs, INODE_TABLE_START};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fresh() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fs.img");
        mkfs::format(&path).unwrap();
        (dir, path)
    }

    fn read_block(disk: &mut Disk, index: u32) -> crate::Block {
        let mut block = ZERO_BLOCK;
        disk.read_block(index, &mut block).unwrap();
        block
    }

    #[test]
    fn clean_file_system_has_no_faults() {
        let (_dir, path) = fresh();
        let mut fs = Vsfs::open(&path).unwrap();
        fs.create("a").unwrap();
        fs.install().unwrap();
        assert!(fs.check().unwrap().is_empty());
    }

    #[test]
    fn detects_leaked_inode() {
        let (_dir, path) = fresh();
        {
            let mut disk = Disk::open(&path).unwrap();
            let mut inode_bitmap = read_block(&mut disk, INODE_BITMAP_BLOCK);
            bitmap::set(&mut inode_bitmap, 5);
            disk.write_block(INODE_BITMAP_BLOCK, &inode_bitmap).unwrap();
        }
        let mut fs = Vsfs::open(&path).unwrap();
        assert_eq!(fs.check().unwrap(), vec![CheckFault::Leaked(5)]);
    }

    #[test]
    fn detects_dangling_directory_entry() {
        let (_dir, path) = fresh();
        {
            let mut disk = Disk::open(&path).unwrap();
            let mut dir = Directory::from_block(read_block(&mut disk, DATA_BLOCKS_START));
            dir.set_entry(0, &DirEntry::new("ghost", 9)).unwrap();
            disk.write_block(DATA_BLOCKS_START, dir.as_block()).unwrap();
        }
        let mut fs = Vsfs::open(&path).unwrap();
        assert_eq!(
            fs.check().unwrap(),
            vec![CheckFault::Dangling {
                name: "ghost".to_string(),
                inum: 9
            }]
        );
    }

    #[test]
    fn detects_out_of_range_inum() {
        let (_dir, path) = fresh();
        {
            let mut disk = Disk::open(&path).unwrap();
            let mut dir = Directory::from_block(read_block(&mut disk, DATA_BLOCKS_START));
            dir.set_entry(0, &DirEntry::new("wild", 200)).unwrap();
            disk.write_block(DATA_BLOCKS_START, dir.as_block()).unwrap();
        }
        let mut fs = Vsfs::open(&path).unwrap();
        assert_eq!(
            fs.check().unwrap(),
            vec![CheckFault::InumOutOfRange {
                name: "wild".to_string(),
                inum: 200
            }]
        );
    }

    #[test]
    fn detects_multiply_linked_inode() {
        let (_dir, path) = fresh();
        {
            let mut fs = Vsfs::open(&path).unwrap();
            fs.create("a").unwrap();
            fs.install().unwrap();
        }
        {
            let mut disk = Disk::open(&path).unwrap();
            let mut dir = Directory::from_block(read_block(&mut disk, DATA_BLOCKS_START));
            dir.set_entry(1, &DirEntry::new("alias", 1)).unwrap();
            disk.write_block(DATA_BLOCKS_START, dir.as_block()).unwrap();
        }
        let mut fs = Vsfs::open(&path).unwrap();
        assert_eq!(
            fs.check().unwrap(),
            vec![CheckFault::MultiplyLinked { inum: 1, count: 2 }]
        );
    }

    #[test]
    fn missing_root_data_block_aborts_scan() {
        let (_dir, path) = fresh();
        {
            let mut disk = Disk::open(&path).unwrap();
            disk.write_block(INODE_TABLE_START, &ZERO_BLOCK).unwrap();
        }
        let mut fs = Vsfs::open(&path).unwrap();
        assert_eq!(fs.check().unwrap(), vec![CheckFault::RootNoDataBlock]);
    }

    #[test]
    fn unallocated_root_inode_reported() {
        let (_dir, path) = fresh();
        {
            let mut disk = Disk::open(&path).unwrap();
            let mut inode_bitmap = read_block(&mut disk, INODE_BITMAP_BLOCK);
            bitmap::clear(&mut inode_bitmap, 0);
            disk.write_block(INODE_BITMAP_BLOCK, &inode_bitmap).unwrap();
        }
        let mut fs = Vsfs::open(&path).unwrap();
        assert_eq!(fs.check().unwrap(), vec![CheckFault::RootNotAllocated]);
    }
}
