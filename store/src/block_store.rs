//! The on-disk block log.
//!
//! Writes are serialized by a single-writer discipline at the node level:
//! exactly one task appends to `blocks.json`. Readers stream the log through
//! [`BlockIterator`], which owns its file handle — dropping the iterator
//! closes it, so readers and the writer never contend.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use keel_chain::{SigBlock, SigGenesis};

use crate::error::StoreError;

const GENESIS_FILE: &str = "genesis.json";
const BLOCKS_FILE: &str = "blocks.json";

/// Handle to a chain's on-disk block log.
#[derive(Clone, Debug)]
pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory and an empty block log if missing.
    pub fn init(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(BLOCKS_FILE))?;
        Ok(())
    }

    /// Whether a genesis has been persisted.
    pub fn has_genesis(&self) -> bool {
        self.dir.join(GENESIS_FILE).is_file()
    }

    /// Persist the signed genesis.
    pub fn write_genesis(&self, sgen: &SigGenesis) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let encoded = serde_json::to_vec(sgen)?;
        std::fs::write(self.dir.join(GENESIS_FILE), encoded)?;
        Ok(())
    }

    /// Read the signed genesis back.
    pub fn read_genesis(&self) -> Result<SigGenesis, StoreError> {
        let bytes = match std::fs::read(self.dir.join(GENESIS_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::GenesisNotFound)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Append one signed block to the log.
    pub fn write_block(&self, sblk: &SigBlock) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(sblk)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(BLOCKS_FILE))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Open a streaming reader over the block log, in application order.
    pub fn read_blocks(&self) -> Result<BlockIterator, StoreError> {
        let file = match File::open(self.dir.join(BLOCKS_FILE)) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BlockIterator::empty());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(BlockIterator {
            reader: Some(BufReader::new(file)),
        })
    }
}

/// Streaming reader over the block log.
///
/// Yields blocks in write order; any I/O or decode failure (including a
/// partial trailing record at EOF) is reported once and terminates the
/// stream. Dropping the iterator closes the underlying file.
pub struct BlockIterator {
    reader: Option<BufReader<File>>,
}

impl BlockIterator {
    fn empty() -> Self {
        Self { reader: None }
    }
}

impl Iterator for BlockIterator {
    type Item = Result<SigBlock, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => {
                if !line.ends_with('\n') {
                    // Truncated trailing record: terminal.
                    self.reader = None;
                    return Some(Err(StoreError::PartialRecord));
                }
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    return self.next();
                }
                match serde_json::from_str::<SigBlock>(trimmed) {
                    Ok(blk) => Some(Ok(blk)),
                    Err(_) => {
                        self.reader = None;
                        Some(Err(StoreError::PartialRecord))
                    }
                }
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e.into()))
            }
        }
    }
}
