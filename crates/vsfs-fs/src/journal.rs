//! Write-ahead journal. Records occupy contiguous blocks starting at
//! `JOURNAL_START`: a DATA record is a header block followed by one full
//! payload block, a COMMIT record is a lone header block. A transaction
//! is a run of DATA records terminated by exactly one COMMIT, and is
//! committed once the COMMIT block is durable.

use log::{debug, info, warn};

use crate::disk::Disk;
use crate::error::FsError;
use crate::layout::{JournalHeader, RecordKind};
use crate::{Block, JOURNAL_BLOCKS, JOURNAL_START, ZERO_BLOCK};

/// Ordered set of whole-block overwrites that commit together.
#[derive(Default)]
pub struct Transaction {
    writes: Vec<(u32, Block)>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the complete new content of container block `dest`.
    pub fn push(&mut self, dest: u32, payload: Block) {
        self.writes.push((dest, payload));
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Journal blocks consumed: two per DATA record plus the COMMIT.
    pub fn blocks_required(&self) -> u32 {
        2 * self.writes.len() as u32 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    pub transactions: u32,
    pub records_applied: u32,
}

/// In-memory view of the journal: where the log ends and, per destination
/// block, the payload of its latest *committed* DATA record. Records after
/// the last COMMIT are not part of the view.
pub struct Snapshot {
    end: u32,
    committed: Vec<(u32, Block)>,
}

impl Snapshot {
    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn block(&self, dest: u32) -> Option<&Block> {
        self.committed
            .iter()
            .find(|(d, _)| *d == dest)
            .map(|(_, b)| b)
    }
}

/// Offset of the first free journal block, or `JOURNAL_BLOCKS` when the
/// log is full. Walks record by record so that an all-zero DATA payload
/// is never mistaken for the end of the log.
pub fn find_end(disk: &mut Disk) -> Result<u32, FsError> {
    let mut block = ZERO_BLOCK;
    let mut offset = 0;
    while offset < JOURNAL_BLOCKS {
        disk.read_block(JOURNAL_START + offset, &mut block)?;
        let header = JournalHeader::decode_from(&block)?;
        match header.kind() {
            RecordKind::Empty => return Ok(offset),
            RecordKind::Data => offset += 2,
            RecordKind::Commit => offset += 1,
            RecordKind::Unknown(kind) => return Err(FsError::CorruptJournal { kind, offset }),
        }
    }
    Ok(JOURNAL_BLOCKS)
}

/// Read the journal into a [`Snapshot`].
pub fn snapshot(disk: &mut Disk) -> Result<Snapshot, FsError> {
    let mut header_block = ZERO_BLOCK;
    let mut payload = ZERO_BLOCK;
    let mut committed: Vec<(u32, Block)> = Vec::new();
    let mut staged: Vec<(u32, Block)> = Vec::new();
    let mut offset = 0;
    while offset < JOURNAL_BLOCKS {
        disk.read_block(JOURNAL_START + offset, &mut header_block)?;
        let header = JournalHeader::decode_from(&header_block)?;
        match header.kind() {
            RecordKind::Empty => break,
            RecordKind::Data => {
                if offset + 1 >= JOURNAL_BLOCKS {
                    break;
                }
                disk.read_block(JOURNAL_START + offset + 1, &mut payload)?;
                upsert(&mut staged, header.block_num, payload);
                offset += 2;
            }
            RecordKind::Commit => {
                for (dest, block) in staged.drain(..) {
                    upsert(&mut committed, dest, block);
                }
                offset += 1;
            }
            RecordKind::Unknown(kind) => return Err(FsError::CorruptJournal { kind, offset }),
        }
    }
    Ok(Snapshot { end: offset, committed })
}

fn upsert(list: &mut Vec<(u32, Block)>, dest: u32, payload: Block) {
    match list.iter_mut().find(|(d, _)| *d == dest) {
        Some(entry) => entry.1 = payload,
        None => list.push((dest, payload)),
    }
}

/// Append `txn` after the existing log contents. Fails with `JournalFull`
/// before any block is written if the transaction does not fit.
pub fn append(disk: &mut Disk, txn: &Transaction) -> Result<(u32, u32), FsError> {
    let start = find_end(disk)?;
    let needed = txn.blocks_required();
    if start + needed > JOURNAL_BLOCKS {
        return Err(FsError::JournalFull {
            needed,
            available: JOURNAL_BLOCKS - start,
        });
    }
    let end = write_records(disk, txn, start)?;
    debug!("transaction logged to journal blocks {}-{}", start, end - 1);
    Ok((start, end - 1))
}

/// Rewrite the log from offset 0 with `txn` as its only transaction,
/// dropping whatever the log held before. Used when the pending
/// transaction of the current install interval is superseded.
pub fn replace(disk: &mut Disk, txn: &Transaction) -> Result<(u32, u32), FsError> {
    let needed = txn.blocks_required();
    if needed > JOURNAL_BLOCKS {
        return Err(FsError::JournalFull {
            needed,
            available: JOURNAL_BLOCKS,
        });
    }
    let prev_end = find_end(disk)?;
    let end = write_records(disk, txn, 0)?;
    // Stale records past the new COMMIT would be replayed after it; drop them.
    for offset in end..prev_end.max(end) {
        disk.write_block(JOURNAL_START + offset, &ZERO_BLOCK)?;
    }
    debug!("transaction rewritten at journal blocks 0-{}", end - 1);
    Ok((0, end - 1))
}

// All DATA header+payload pairs go out before the COMMIT; each write is
// durable before the next issues, so the COMMIT is the last write of the
// transaction.
fn write_records(disk: &mut Disk, txn: &Transaction, start: u32) -> Result<u32, FsError> {
    let mut offset = start;
    for (dest, payload) in &txn.writes {
        let mut header_block = ZERO_BLOCK;
        JournalHeader::data(*dest).encode_into(&mut header_block)?;
        disk.write_block(JOURNAL_START + offset, &header_block)?;
        disk.write_block(JOURNAL_START + offset + 1, payload)?;
        offset += 2;
    }
    let mut commit_block = ZERO_BLOCK;
    JournalHeader::commit().encode_into(&mut commit_block)?;
    disk.write_block(JOURNAL_START + offset, &commit_block)?;
    Ok(offset + 1)
}

/// Replay the journal against the live container, then zero it. Every
/// DATA record before the first empty block is applied, committed or not;
/// payloads are whole blocks, so re-application is idempotent.
pub fn install(disk: &mut Disk) -> Result<InstallReport, FsError> {
    let mut header_block = ZERO_BLOCK;
    let mut payload = ZERO_BLOCK;
    let mut report = InstallReport {
        transactions: 0,
        records_applied: 0,
    };
    let mut corrupt = None;
    let mut offset = 0;
    while offset < JOURNAL_BLOCKS {
        disk.read_block(JOURNAL_START + offset, &mut header_block)?;
        let header = JournalHeader::decode_from(&header_block)?;
        match header.kind() {
            RecordKind::Empty => break,
            RecordKind::Data => {
                if offset + 1 >= JOURNAL_BLOCKS {
                    warn!("incomplete DATA record at journal block {offset}");
                    break;
                }
                disk.read_block(JOURNAL_START + offset + 1, &mut payload)?;
                debug!("applying DATA record: block {}", header.block_num);
                disk.write_block(header.block_num, &payload)?;
                report.records_applied += 1;
                offset += 2;
            }
            RecordKind::Commit => {
                report.transactions += 1;
                debug!("found COMMIT record (transaction {} complete)", report.transactions);
                offset += 1;
            }
            RecordKind::Unknown(kind) => {
                warn!("unknown journal record type {kind} at block {offset}");
                corrupt = Some(FsError::CorruptJournal { kind, offset });
                break;
            }
        }
    }
    clear(disk)?;
    if let Some(err) = corrupt {
        return Err(err);
    }
    info!(
        "install complete: {} transactions, {} records applied",
        report.transactions, report.records_applied
    );
    Ok(report)
}

/// Zero every journal block.
pub fn clear(disk: &mut Disk) -> Result<(), FsError> {
    for offset in 0..JOURNAL_BLOCKS {
        disk.write_block(JOURNAL_START + offset, &ZERO_BLOCK)?;
    }
    Ok(())
}
