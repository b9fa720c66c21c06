use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::trace;

use crate::error::FsError;
use crate::{Block, BLOCK_SIZE};

/// File-backed block device. Every transfer is exactly one block at
/// `index * BLOCK_SIZE`; there is no caching, and writes are durable
/// before they return.
pub struct Disk {
    file: std::fs::File,
    block_count: u32,
}

impl Disk {
    /// Open an existing container for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FsError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let block_count = (file.metadata()?.len() / BLOCK_SIZE as u64) as u32;
        Ok(Self { file, block_count })
    }

    /// Create (or truncate) a container of `block_count` zeroed blocks.
    pub fn create<P: AsRef<Path>>(path: P, block_count: u32) -> Result<Self, FsError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(block_count as u64 * BLOCK_SIZE as u64)?;
        Ok(Self { file, block_count })
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn read_block(&mut self, index: u32, buf: &mut Block) -> Result<(), FsError> {
        self.check_range(index)?;
        self.file
            .seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    pub fn write_block(&mut self, index: u32, buf: &Block) -> Result<(), FsError> {
        self.check_range(index)?;
        trace!("write block {index}");
        self.file
            .seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn check_range(&self, index: u32) -> Result<(), FsError> {
        if index >= self.block_count {
            return Err(FsError::BlockOutOfRange(index));
        }
        Ok(())
    }
}
