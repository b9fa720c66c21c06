pub mod bitmap;
pub mod check;
pub mod disk;
pub mod error;
pub mod fs;
pub mod journal;
pub mod layout;
pub mod mkfs;

pub const BLOCK_SIZE: usize = 4096;
pub const VSFS_MAGIC: u32 = 0x5653_4653; // "VSFS"

// Container layout, in blocks.
pub const TOTAL_BLOCKS: u32 = 85;
pub const SUPERBLOCK_BLOCK: u32 = 0;
pub const JOURNAL_START: u32 = 1;
pub const JOURNAL_BLOCKS: u32 = 16;
pub const INODE_BITMAP_BLOCK: u32 = 17;
pub const DATA_BITMAP_BLOCK: u32 = 18;
pub const INODE_TABLE_START: u32 = 19;
pub const INODE_TABLE_BLOCKS: u32 = 2;
pub const DATA_BLOCKS_START: u32 = 21;
pub const DATA_BLOCKS_COUNT: u32 = 64;

// File system limits.
pub const MAX_INODES: u32 = 64;
pub const MAX_FILENAME: usize = 28;
pub const DIRECT_POINTERS: usize = 12;
pub const ROOT_INUM: u32 = 0;

// On-disk record sizes. Inodes are stored on a 64-byte stride so that a
// whole number of them fits in a block.
pub const INODE_SIZE: usize = 64;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const DIRENT_SIZE: usize = 32;
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

pub type Block = [u8; BLOCK_SIZE];
pub const ZERO_BLOCK: Block = [0u8; BLOCK_SIZE];

pub use check::CheckFault;
pub use disk::Disk;
pub use error::FsError;
pub use fs::{FileInfo, FsStats, NewFile, Vsfs};
pub use journal::{InstallReport, Transaction};
pub use layout::{DirEntry, Inode, InodeKind, JournalHeader, RecordKind, SuperBlock};
