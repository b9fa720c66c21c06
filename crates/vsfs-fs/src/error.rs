use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("disk i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block {0} out of range")]
    BlockOutOfRange(u32),

    #[error("record encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("record decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("bad magic {0:#010x} (not a vsfs image)")]
    BadMagic(u32),

    #[error("Invalid filename '{0}'")]
    InvalidName(String),

    #[error("File '{0}' already exists")]
    Exists(String),

    #[error("No free inodes")]
    NoInodes,

    #[error("No free data blocks")]
    NoDataBlocks,

    #[error("Directory full")]
    DirFull,

    #[error("Not enough journal space (need {needed} blocks, have {available} available)")]
    JournalFull { needed: u32, available: u32 },

    #[error("Unknown journal record type {kind} at block {offset}")]
    CorruptJournal { kind: u32, offset: u32 },

    #[error("file system corrupt: {0}")]
    Corrupt(String),
}
