//! Formatter: turns a path into a valid, empty file system with a root
//! directory.

use std::path::Path;

use log::info;

use crate::disk::Disk;
use crate::error::FsError;
use crate::layout::{Inode, InodeKind, SuperBlock};
use crate::{
    bitmap, journal, DATA_BITMAP_BLOCK, DATA_BLOCKS_COUNT, DATA_BLOCKS_START, INODE_BITMAP_BLOCK,
    INODE_TABLE_BLOCKS, INODE_TABLE_START, JOURNAL_BLOCKS, JOURNAL_START, ROOT_INUM,
    SUPERBLOCK_BLOCK, TOTAL_BLOCKS, ZERO_BLOCK,
};

/// Create (truncating) and format the container at `path`.
pub fn format<P: AsRef<Path>>(path: P) -> Result<(), FsError> {
    let mut disk = Disk::create(&path, TOTAL_BLOCKS)?;
    info!(
        "created container: {} blocks, {} bytes",
        TOTAL_BLOCKS,
        TOTAL_BLOCKS as usize * crate::BLOCK_SIZE
    );

    let mut block = ZERO_BLOCK;
    SuperBlock::new().encode_into(&mut block)?;
    disk.write_block(SUPERBLOCK_BLOCK, &block)?;

    // The container may be a reused image; the journal must come up empty.
    journal::clear(&mut disk)?;

    let mut block = ZERO_BLOCK;
    bitmap::set(&mut block, ROOT_INUM as usize);
    disk.write_block(INODE_BITMAP_BLOCK, &block)?;

    let mut block = ZERO_BLOCK;
    bitmap::set(&mut block, 0); // root directory data block
    disk.write_block(DATA_BITMAP_BLOCK, &block)?;

    let mut block = ZERO_BLOCK;
    let root = Inode::new(InodeKind::Directory, DATA_BLOCKS_START);
    root.encode_into(&mut block[..crate::INODE_SIZE])?;
    disk.write_block(INODE_TABLE_START, &block)?;
    disk.write_block(INODE_TABLE_START + 1, &ZERO_BLOCK)?;

    for i in 0..DATA_BLOCKS_COUNT {
        disk.write_block(DATA_BLOCKS_START + i, &ZERO_BLOCK)?;
    }

    info!("superblock:    block {SUPERBLOCK_BLOCK}");
    info!(
        "journal:       blocks {}-{} ({} blocks)",
        JOURNAL_START,
        JOURNAL_START + JOURNAL_BLOCKS - 1,
        JOURNAL_BLOCKS
    );
    info!("inode bitmap:  block {INODE_BITMAP_BLOCK}");
    info!("data bitmap:   block {DATA_BITMAP_BLOCK}");
    info!(
        "inode table:   blocks {}-{}",
        INODE_TABLE_START,
        INODE_TABLE_START + INODE_TABLE_BLOCKS - 1
    );
    info!(
        "data blocks:   blocks {}-{} ({} blocks)",
        DATA_BLOCKS_START,
        DATA_BLOCKS_START + DATA_BLOCKS_COUNT - 1,
        DATA_BLOCKS_COUNT
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::JournalHeader;
    use crate::{Block, RecordKind, Vsfs, BLOCK_SIZE};
    use tempfile::TempDir;

    fn read_block(disk: &mut Disk, index: u32) -> Block {
        let mut block = ZERO_BLOCK;
        disk.read_block(index, &mut block).unwrap();
        block
    }

    #[test]
    fn container_has_exact_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fs.img");
        format(&path).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, TOTAL_BLOCKS as u64 * BLOCK_SIZE as u64);
    }

    #[test]
    fn regions_are_initialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fs.img");
        format(&path).unwrap();
        let mut disk = Disk::open(&path).unwrap();

        let sb = SuperBlock::decode_from(&read_block(&mut disk, SUPERBLOCK_BLOCK)).unwrap();
        assert_eq!(sb, SuperBlock::new());

        for i in 0..JOURNAL_BLOCKS {
            let header =
                JournalHeader::decode_from(&read_block(&mut disk, JOURNAL_START + i)).unwrap();
            assert_eq!(header.kind(), RecordKind::Empty);
        }

        let inode_bitmap = read_block(&mut disk, INODE_BITMAP_BLOCK);
        assert!(bitmap::get(&inode_bitmap, 0));
        assert_eq!(bitmap::count_set(&inode_bitmap, crate::MAX_INODES as usize), 1);

        let data_bitmap = read_block(&mut disk, DATA_BITMAP_BLOCK);
        assert!(bitmap::get(&data_bitmap, 0));
        assert_eq!(bitmap::count_set(&data_bitmap, DATA_BLOCKS_COUNT as usize), 1);

        let table_block = read_block(&mut disk, INODE_TABLE_START);
        let root = Inode::decode_from(&table_block[..crate::INODE_SIZE]).unwrap();
        assert_eq!(root.kind(), InodeKind::Directory);
        assert_eq!(root.size, 0);
        assert_eq!(root.nlink, 1);
        assert_eq!(root.blocks[0], DATA_BLOCKS_START);

        assert_eq!(read_block(&mut disk, INODE_TABLE_START + 1), ZERO_BLOCK);
        assert_eq!(read_block(&mut disk, DATA_BLOCKS_START), ZERO_BLOCK);
    }

    #[test]
    fn reformat_wipes_previous_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fs.img");
        format(&path).unwrap();
        {
            let mut fs = Vsfs::open(&path).unwrap();
            fs.create("old").unwrap();
            fs.install().unwrap();
        }
        format(&path).unwrap();
        let mut fs = Vsfs::open(&path).unwrap();
        assert!(fs.ls().unwrap().is_empty());
        assert!(fs.check().unwrap().is_empty());
        let stats = fs.stat().unwrap();
        assert_eq!(stats.used_inodes, 1);
        assert_eq!(stats.used_data_blocks, 1);
    }
}
