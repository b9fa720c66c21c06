use std::path::Path;

use log::{debug, info};

use crate::disk::Disk;
use crate::error::FsError;
use crate::layout::{DirEntry, Inode, InodeKind, SuperBlock};
use crate::{bitmap, check, journal};
use crate::{
    Block, CheckFault, InstallReport, Transaction, BLOCK_SIZE, DATA_BITMAP_BLOCK,
    DATA_BLOCKS_COUNT, DATA_BLOCKS_START, DIRENTS_PER_BLOCK, DIRENT_SIZE, INODE_BITMAP_BLOCK,
    INODE_SIZE, INODE_TABLE_BLOCKS, INODE_TABLE_START, MAX_FILENAME, MAX_INODES, ROOT_INUM,
    SUPERBLOCK_BLOCK, VSFS_MAGIC, ZERO_BLOCK,
};

const INODE_TABLE_BYTES: usize = BLOCK_SIZE * INODE_TABLE_BLOCKS as usize;

/// All inodes as one contiguous buffer spanning the inode table blocks,
/// addressed by inode number.
pub struct InodeTable {
    buf: [u8; INODE_TABLE_BYTES],
}

impl InodeTable {
    pub fn empty() -> Self {
        Self {
            buf: [0; INODE_TABLE_BYTES],
        }
    }

    pub fn load(disk: &mut Disk) -> Result<Self, FsError> {
        let mut table = Self::empty();
        let mut block = ZERO_BLOCK;
        for i in 0..INODE_TABLE_BLOCKS {
            disk.read_block(INODE_TABLE_START + i, &mut block)?;
            let offset = i as usize * BLOCK_SIZE;
            table.buf[offset..offset + BLOCK_SIZE].copy_from_slice(&block);
        }
        Ok(table)
    }

    pub fn from_blocks(blocks: [Block; INODE_TABLE_BLOCKS as usize]) -> Self {
        let mut table = Self::empty();
        for (i, block) in blocks.iter().enumerate() {
            table.buf[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE].copy_from_slice(block);
        }
        table
    }

    pub fn get(&self, inum: u32) -> Result<Inode, FsError> {
        let offset = self.slot(inum)?;
        Inode::decode_from(&self.buf[offset..offset + INODE_SIZE])
    }

    pub fn set(&mut self, inum: u32, inode: &Inode) -> Result<(), FsError> {
        let offset = self.slot(inum)?;
        self.buf[offset..offset + INODE_SIZE].fill(0);
        inode.encode_into(&mut self.buf[offset..offset + INODE_SIZE])?;
        Ok(())
    }

    /// Copy of one underlying table block, for journaling.
    pub fn block(&self, index: u32) -> Block {
        let offset = index as usize * BLOCK_SIZE;
        let mut block = ZERO_BLOCK;
        block.copy_from_slice(&self.buf[offset..offset + BLOCK_SIZE]);
        block
    }

    fn slot(&self, inum: u32) -> Result<usize, FsError> {
        if inum >= MAX_INODES {
            return Err(FsError::Corrupt(format!("inode {inum} out of range")));
        }
        Ok(inum as usize * INODE_SIZE)
    }
}

/// One directory's data block, addressed by entry slot.
pub struct Directory {
    block: Block,
}

impl Directory {
    pub fn from_block(block: Block) -> Self {
        Self { block }
    }

    pub fn as_block(&self) -> &Block {
        &self.block
    }

    pub fn entry(&self, slot: usize) -> Result<DirEntry, FsError> {
        let offset = slot * DIRENT_SIZE;
        DirEntry::decode_from(&self.block[offset..offset + DIRENT_SIZE])
    }

    pub fn set_entry(&mut self, slot: usize, entry: &DirEntry) -> Result<(), FsError> {
        let offset = slot * DIRENT_SIZE;
        entry.encode_into(&mut self.block[offset..offset + DIRENT_SIZE])?;
        Ok(())
    }

    pub fn find(&self, name: &str) -> Result<Option<usize>, FsError> {
        for slot in 0..DIRENTS_PER_BLOCK {
            let entry = self.entry(slot)?;
            if !entry.is_free() && entry.name_as_str() == name {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    pub fn first_free(&self) -> Result<Option<usize>, FsError> {
        for slot in 0..DIRENTS_PER_BLOCK {
            if self.entry(slot)?.is_free() {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Occupied entries in slot order.
    pub fn entries(&self) -> Result<Vec<(usize, DirEntry)>, FsError> {
        let mut out = Vec::new();
        for slot in 0..DIRENTS_PER_BLOCK {
            let entry = self.entry(slot)?;
            if !entry.is_free() {
                out.push((slot, entry));
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub inum: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub magic: u32,
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub used_inodes: u32,
    pub used_data_blocks: u32,
}

impl FsStats {
    pub fn free_inodes(&self) -> u32 {
        self.total_inodes - self.used_inodes
    }

    pub fn free_data_blocks(&self) -> u32 {
        DATA_BLOCKS_COUNT - self.used_data_blocks
    }
}

/// Outcome of a successful `create`: the allocations the transaction will
/// apply at install time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFile {
    pub inum: u32,
    pub data_block: u32,
    pub dir_slot: usize,
}

/// An opened container. Holds the backing device for the lifetime of one
/// command and validates the superblock up front.
pub struct Vsfs {
    disk: Disk,
    superblock: SuperBlock,
}

impl Vsfs {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FsError> {
        let mut disk = Disk::open(path)?;
        let mut block = ZERO_BLOCK;
        disk.read_block(SUPERBLOCK_BLOCK, &mut block)?;
        let superblock = SuperBlock::decode_from(&block)?;
        if superblock.magic != VSFS_MAGIC {
            return Err(FsError::BadMagic(superblock.magic));
        }
        debug!(
            "mounted vsfs: {} blocks, {} inodes",
            superblock.num_blocks, superblock.num_inodes
        );
        Ok(Self { disk, superblock })
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    /// Build the file-creation transaction for `filename` and log it to
    /// the journal. The live file system is untouched until `install`.
    ///
    /// State is read through the journal, so creations queued earlier in
    /// the same install interval are visible; the pending transaction is
    /// then rewritten to carry the combined result.
    pub fn create(&mut self, filename: &str) -> Result<NewFile, FsError> {
        validate_filename(filename)?;
        info!("creating file: {filename}");

        let snap = journal::snapshot(&mut self.disk)?;
        let mut inode_bitmap = self.effective_block(&snap, INODE_BITMAP_BLOCK)?;
        let mut data_bitmap = self.effective_block(&snap, DATA_BITMAP_BLOCK)?;
        let mut table = InodeTable::from_blocks([
            self.effective_block(&snap, INODE_TABLE_START)?,
            self.effective_block(&snap, INODE_TABLE_START + 1)?,
        ]);

        let mut root = table.get(ROOT_INUM)?;
        if root.blocks[0] == 0 {
            return Err(FsError::Corrupt("root directory has no data block".into()));
        }
        let root_dir_block = root.blocks[0];
        let mut dir = Directory::from_block(self.effective_block(&snap, root_dir_block)?);

        if dir.find(filename)?.is_some() {
            return Err(FsError::Exists(filename.to_string()));
        }

        let free_inum =
            bitmap::find_free(&inode_bitmap, MAX_INODES as usize).ok_or(FsError::NoInodes)? as u32;
        let free_data = bitmap::find_free(&data_bitmap, DATA_BLOCKS_COUNT as usize)
            .ok_or(FsError::NoDataBlocks)? as u32;
        let dir_slot = dir.first_free()?.ok_or(FsError::DirFull)?;
        debug!("allocating inode {free_inum}, data block {free_data}");

        bitmap::set(&mut inode_bitmap, free_inum as usize);
        bitmap::set(&mut data_bitmap, free_data as usize);
        table.set(
            free_inum,
            &Inode::new(InodeKind::File, DATA_BLOCKS_START + free_data),
        )?;
        root.size += DIRENT_SIZE as u32;
        table.set(ROOT_INUM, &root)?;
        dir.set_entry(dir_slot, &DirEntry::new(filename, free_inum))?;

        let mut txn = Transaction::new();
        txn.push(INODE_BITMAP_BLOCK, inode_bitmap);
        txn.push(DATA_BITMAP_BLOCK, data_bitmap);
        txn.push(INODE_TABLE_START, table.block(0));
        txn.push(INODE_TABLE_START + 1, table.block(1));
        txn.push(root_dir_block, *dir.as_block());

        if snap.is_empty() {
            journal::append(&mut self.disk, &txn)?;
        } else {
            journal::replace(&mut self.disk, &txn)?;
        }

        Ok(NewFile {
            inum: free_inum,
            data_block: DATA_BLOCKS_START + free_data,
            dir_slot,
        })
    }

    /// Replay the journal into the live regions and clear it.
    pub fn install(&mut self) -> Result<InstallReport, FsError> {
        journal::install(&mut self.disk)
    }

    /// Occupied root directory entries, in slot order. Reads live state
    /// only; journaled-but-uninstalled creations do not appear.
    pub fn ls(&mut self) -> Result<Vec<FileInfo>, FsError> {
        let table = InodeTable::load(&mut self.disk)?;
        let root = table.get(ROOT_INUM)?;
        if root.blocks[0] == 0 {
            return Err(FsError::Corrupt("root directory has no data block".into()));
        }
        let mut block = ZERO_BLOCK;
        self.disk.read_block(root.blocks[0], &mut block)?;
        let dir = Directory::from_block(block);

        let mut files = Vec::new();
        for (_slot, entry) in dir.entries()? {
            let inode = table.get(entry.inum)?;
            files.push(FileInfo {
                name: entry.name_as_str().to_string(),
                inum: entry.inum,
                size: inode.size,
            });
        }
        Ok(files)
    }

    pub fn stat(&mut self) -> Result<FsStats, FsError> {
        let mut inode_bitmap = ZERO_BLOCK;
        self.disk.read_block(INODE_BITMAP_BLOCK, &mut inode_bitmap)?;
        let mut data_bitmap = ZERO_BLOCK;
        self.disk.read_block(DATA_BITMAP_BLOCK, &mut data_bitmap)?;
        Ok(FsStats {
            magic: self.superblock.magic,
            total_blocks: self.superblock.num_blocks,
            total_inodes: self.superblock.num_inodes,
            used_inodes: bitmap::count_set(&inode_bitmap, MAX_INODES as usize) as u32,
            used_data_blocks: bitmap::count_set(&data_bitmap, DATA_BLOCKS_COUNT as usize) as u32,
        })
    }

    /// Cross-check bitmaps, inode table, and root directory.
    pub fn check(&mut self) -> Result<Vec<CheckFault>, FsError> {
        check::run(&mut self.disk)
    }

    fn effective_block(&mut self, snap: &journal::Snapshot, index: u32) -> Result<Block, FsError> {
        if let Some(payload) = snap.block(index) {
            return Ok(*payload);
        }
        let mut block = ZERO_BLOCK;
        self.disk.read_block(index, &mut block)?;
        Ok(block)
    }
}

fn validate_filename(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name.len() >= MAX_FILENAME || name.contains('\0') {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}
