// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The backing-store collaborator: persists and loads page-sized blocks
//! by block number, held behind a trait object the core calls into
//! during swap.

use crate::addr::PAGESIZE;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// A collaborator that persists and loads page-sized blocks, addressed by
/// an opaque positive block number. Block 0 is reserved and never used by
/// the engine.
pub trait BackingStore {
    /// Writes `data` (exactly one page) to `block`.
    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()>;

    /// Reads `block` into `buf` (exactly one page).
    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> Result<()>;
}

/// A backing store that persists blocks to a regular file, one
/// `PAGESIZE`-byte slot per block number.
pub struct FileBackingStore {
    file: File,
}

impl FileBackingStore {
    /// Opens (creating if necessary) `path` as the backing store file.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| Error::BackingStore { block: 0, source })?;
        Ok(FileBackingStore { file })
    }

    fn seek_to_block(&mut self, block: u32) -> Result<()> {
        let offset = block as u64 * PAGESIZE as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| Error::BackingStore { block, source })?;
        Ok(())
    }
}

impl BackingStore for FileBackingStore {
    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), PAGESIZE as usize);
        self.seek_to_block(block)?;
        self.file
            .write_all(data)
            .map_err(|source| Error::BackingStore { block, source })?;
        Ok(())
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), PAGESIZE as usize);
        self.seek_to_block(block)?;
        self.file
            .read_exact(buf)
            .map_err(|source| Error::BackingStore { block, source })?;
        Ok(())
    }
}

/// An in-memory backing store, used by tests that should not touch the
/// filesystem. Grows on demand as higher block numbers are written.
#[derive(Default)]
pub struct MemoryBackingStore {
    blocks: Vec<[u8; PAGESIZE as usize]>,
}

impl MemoryBackingStore {
    pub fn new() -> Self {
        MemoryBackingStore { blocks: Vec::new() }
    }

    fn ensure_capacity(&mut self, block: u32) {
        let needed = block as usize + 1;
        if self.blocks.len() < needed {
            self.blocks.resize(needed, [0u8; PAGESIZE as usize]);
        }
    }
}

impl BackingStore for MemoryBackingStore {
    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), PAGESIZE as usize);
        self.ensure_capacity(block);
        self.blocks[block as usize].copy_from_slice(data);
        Ok(())
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), PAGESIZE as usize);
        self.ensure_capacity(block);
        buf.copy_from_slice(&self.blocks[block as usize]);
        Ok(())
    }
}
