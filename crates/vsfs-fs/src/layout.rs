//! Typed views over raw blocks. All records are encoded with fixed-width
//! little-endian integers; byte offsets within a block are computed
//! arithmetically from the record sizes in the crate root.

use serde::{Deserialize, Serialize};

use crate::error::FsError;
use crate::{
    DATA_BITMAP_BLOCK, DATA_BLOCKS_START, DIRECT_POINTERS, INODE_BITMAP_BLOCK, INODE_TABLE_START,
    MAX_FILENAME, MAX_INODES, TOTAL_BLOCKS, VSFS_MAGIC,
};

fn codec() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Block 0. Written once at format time, read-only afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub num_blocks: u32,
    pub num_inodes: u32,
    pub inode_bitmap_block: u32,
    pub data_bitmap_block: u32,
    pub inode_table_start: u32,
    pub data_blocks_start: u32,
}

impl SuperBlock {
    pub fn new() -> Self {
        Self {
            magic: VSFS_MAGIC,
            num_blocks: TOTAL_BLOCKS,
            num_inodes: MAX_INODES,
            inode_bitmap_block: INODE_BITMAP_BLOCK,
            data_bitmap_block: DATA_BITMAP_BLOCK,
            inode_table_start: INODE_TABLE_START,
            data_blocks_start: DATA_BLOCKS_START,
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(bincode::serde::encode_into_slice(self, buf, codec())?)
    }

    pub fn decode_from(buf: &[u8]) -> Result<Self, FsError> {
        Ok(bincode::serde::decode_from_slice(buf, codec())?.0)
    }
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Unused,
    Directory,
    File,
    Unknown(u16),
}

impl InodeKind {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => InodeKind::Unused,
            1 => InodeKind::Directory,
            2 => InodeKind::File,
            other => InodeKind::Unknown(other),
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            InodeKind::Unused => 0,
            InodeKind::Directory => 1,
            InodeKind::File => 2,
            InodeKind::Unknown(other) => other,
        }
    }
}

/// One inode table entry: 56 encoded bytes stored on a 64-byte stride;
/// the trailing bytes of each slot stay zero.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub size: u32,
    pub kind: u16,
    pub nlink: u16,
    pub blocks: [u32; DIRECT_POINTERS],
}

impl Inode {
    pub fn new(kind: InodeKind, first_block: u32) -> Self {
        let mut blocks = [0u32; DIRECT_POINTERS];
        blocks[0] = first_block;
        Self {
            size: 0,
            kind: kind.as_raw(),
            nlink: 1,
            blocks,
        }
    }

    pub fn kind(&self) -> InodeKind {
        InodeKind::from_raw(self.kind)
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(bincode::serde::encode_into_slice(self, buf, codec())?)
    }

    pub fn decode_from(buf: &[u8]) -> Result<Self, FsError> {
        Ok(bincode::serde::decode_from_slice(buf, codec())?.0)
    }
}

// Directory entry: 28-byte NUL-terminated name followed by the inode
// number; inum 0 marks a free slot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; MAX_FILENAME],
    pub inum: u32,
}

impl DirEntry {
    pub fn new(name_str: &str, inum: u32) -> Self {
        let mut name = [0u8; MAX_FILENAME];
        let bytes = name_str.as_bytes();
        let len = bytes.len().min(MAX_FILENAME - 1);
        name[0..len].copy_from_slice(&bytes[0..len]);
        Self { name, inum }
    }

    pub fn name_as_str(&self) -> &str {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(MAX_FILENAME);
        core::str::from_utf8(&self.name[0..end]).unwrap_or("<invalid>")
    }

    pub fn is_free(&self) -> bool {
        self.inum == 0
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(bincode::serde::encode_into_slice(self, buf, codec())?)
    }

    pub fn decode_from(buf: &[u8]) -> Result<Self, FsError> {
        Ok(bincode::serde::decode_from_slice(buf, codec())?.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Empty,
    Data,
    Commit,
    Unknown(u32),
}

impl From<u32> for RecordKind {
    fn from(raw: u32) -> Self {
        match raw {
            0 => RecordKind::Empty,
            1 => RecordKind::Data,
            2 => RecordKind::Commit,
            other => RecordKind::Unknown(other),
        }
    }
}

/// Journal record header. Occupies its own journal block; the bytes past
/// the header stay zero.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    pub kind: u32,
    pub block_num: u32,
    pub size: u32,
}

impl JournalHeader {
    /// Header for a DATA record: a full replacement block for `dest`.
    pub fn data(dest: u32) -> Self {
        Self {
            kind: 1,
            block_num: dest,
            size: crate::BLOCK_SIZE as u32,
        }
    }

    pub fn commit() -> Self {
        Self {
            kind: 2,
            block_num: 0,
            size: 0,
        }
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::from(self.kind)
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(bincode::serde::encode_into_slice(self, buf, codec())?)
    }

    pub fn decode_from(buf: &[u8]) -> Result<Self, FsError> {
        Ok(bincode::serde::decode_from_slice(buf, codec())?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DIRENT_SIZE, INODE_SIZE, ZERO_BLOCK};

    #[test]
    fn superblock_layout() {
        let mut block = ZERO_BLOCK;
        let written = SuperBlock::new().encode_into(&mut block).unwrap();
        assert_eq!(written, 28);
        // "VSFS" magic, little-endian.
        assert_eq!(&block[0..4], &[0x53, 0x46, 0x53, 0x56]);
        assert_eq!(u32::from_le_bytes(block[4..8].try_into().unwrap()), 85);
        assert_eq!(u32::from_le_bytes(block[8..12].try_into().unwrap()), 64);
        assert_eq!(u32::from_le_bytes(block[12..16].try_into().unwrap()), 17);
        assert_eq!(u32::from_le_bytes(block[16..20].try_into().unwrap()), 18);
        assert_eq!(u32::from_le_bytes(block[20..24].try_into().unwrap()), 19);
        assert_eq!(u32::from_le_bytes(block[24..28].try_into().unwrap()), 21);

        let decoded = SuperBlock::decode_from(&block).unwrap();
        assert_eq!(decoded, SuperBlock::new());
    }

    #[test]
    fn inode_layout() {
        let mut slot = [0u8; INODE_SIZE];
        let inode = Inode::new(InodeKind::File, 22);
        let written = inode.encode_into(&mut slot).unwrap();
        assert_eq!(written, 56);
        assert_eq!(u32::from_le_bytes(slot[0..4].try_into().unwrap()), 0); // size
        assert_eq!(u16::from_le_bytes(slot[4..6].try_into().unwrap()), 2); // kind
        assert_eq!(u16::from_le_bytes(slot[6..8].try_into().unwrap()), 1); // nlink
        assert_eq!(u32::from_le_bytes(slot[8..12].try_into().unwrap()), 22); // blocks[0]
        assert_eq!(&slot[12..56], &[0u8; 44]);

        assert_eq!(Inode::decode_from(&slot).unwrap(), inode);
    }

    #[test]
    fn inode_does_not_fit_short_buffer() {
        let mut short = [0u8; 55];
        assert!(Inode::new(InodeKind::Directory, 21)
            .encode_into(&mut short)
            .is_err());
    }

    #[test]
    fn dirent_layout() {
        let mut slot = [0u8; DIRENT_SIZE];
        let entry = DirEntry::new("ab", 7);
        let written = entry.encode_into(&mut slot).unwrap();
        assert_eq!(written, 32);
        assert_eq!(&slot[0..2], b"ab");
        assert_eq!(&slot[2..28], &[0u8; 26]);
        assert_eq!(u32::from_le_bytes(slot[28..32].try_into().unwrap()), 7);

        let decoded = DirEntry::decode_from(&slot).unwrap();
        assert_eq!(decoded.name_as_str(), "ab");
        assert_eq!(decoded.inum, 7);
    }

    #[test]
    fn dirent_name_truncates_to_terminator() {
        let long = "x".repeat(40);
        let entry = DirEntry::new(&long, 1);
        assert_eq!(entry.name_as_str().len(), MAX_FILENAME - 1);
        assert_eq!(entry.name[MAX_FILENAME - 1], 0);
    }

    #[test]
    fn journal_header_layout() {
        let mut block = ZERO_BLOCK;
        let written = JournalHeader::data(17).encode_into(&mut block).unwrap();
        assert_eq!(written, 12);
        assert_eq!(&block[0..4], &[1, 0, 0, 0]);
        assert_eq!(&block[4..8], &[17, 0, 0, 0]);
        assert_eq!(&block[8..12], &[0x00, 0x10, 0, 0]); // 4096

        let mut block = ZERO_BLOCK;
        JournalHeader::commit().encode_into(&mut block).unwrap();
        assert_eq!(&block[0..4], &[2, 0, 0, 0]);
        assert_eq!(&block[4..12], &[0u8; 8]);
    }

    #[test]
    fn record_kind_mapping() {
        assert_eq!(RecordKind::from(0), RecordKind::Empty);
        assert_eq!(RecordKind::from(1), RecordKind::Data);
        assert_eq!(RecordKind::from(2), RecordKind::Commit);
        assert_eq!(RecordKind::from(9), RecordKind::Unknown(9));
    }

    #[test]
    fn inode_kind_mapping() {
        assert_eq!(InodeKind::from_raw(0), InodeKind::Unused);
        assert_eq!(InodeKind::from_raw(1), InodeKind::Directory);
        assert_eq!(InodeKind::from_raw(2), InodeKind::File);
        assert_eq!(InodeKind::from_raw(7), InodeKind::Unknown(7));
        assert_eq!(InodeKind::Unknown(7).as_raw(), 7);
    }
}
