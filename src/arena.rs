// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The real-memory arena: a contiguous byte buffer divided into a
//! page-table region and a frame region, plus the bump allocators over
//! each. Page tables and frames are never structurally freed, only
//! reassigned.

use crate::addr::{RealAddr, PAGESIZE, PT_ENTRIES};
use crate::error::{Error, Result};

/// Size, in bytes, of the page-table region: room for the upper table plus
/// up to 1024 lower tables.
pub const PT_AREA_SIZE: u32 = PAGESIZE + PT_ENTRIES * PAGESIZE;

/// The minimum real-memory size the arena can be constructed with: enough
/// for the page-table region plus a single frame.
pub const MIN_REAL_SIZE: u32 = PT_AREA_SIZE + PAGESIZE;

/// The real-memory arena and its two bump sub-allocators.
pub struct Arena {
    buf: Vec<u8>,
    real_size: u32,

    /// Bump pointer into `[PAGESIZE, PT_AREA_SIZE)`. Never reclaimed.
    pt_free: u32,

    /// Bump pointer into `[PT_AREA_SIZE, real_size)`. Once it reaches
    /// `real_size`, the frame region is full and further frames come from
    /// eviction rather than this pointer.
    frame_free: u32,
}

impl Arena {
    /// Allocates a fresh arena of `real_size` bytes.
    ///
    /// Fails if `real_size` is too small to hold the page-table region and
    /// at least one frame.
    pub fn new(real_size: u32) -> Result<Self> {
        if real_size < MIN_REAL_SIZE {
            return Err(Error::Configuration(format!(
                "real memory size {real_size} is smaller than the minimum {MIN_REAL_SIZE}"
            )));
        }

        Ok(Arena {
            buf: vec![0u8; real_size as usize],
            real_size,
            pt_free: PAGESIZE,
            frame_free: PT_AREA_SIZE,
        })
    }

    /// The total size of the arena, in bytes.
    pub fn real_size(&self) -> u32 {
        self.real_size
    }

    /// The number of frames the frame region can hold in total.
    pub fn frame_count(&self) -> u32 {
        (self.real_size - PT_AREA_SIZE) / PAGESIZE
    }

    /// Returns the frame-region index of the frame at `addr`, or `None` if
    /// `addr` does not name a frame-aligned address within the frame
    /// region.
    pub fn frame_index_of(&self, addr: RealAddr) -> Option<usize> {
        let raw = addr.as_u32();
        if raw < PT_AREA_SIZE || raw >= self.real_size || (raw - PT_AREA_SIZE) % PAGESIZE != 0 {
            return None;
        }
        Some(((raw - PT_AREA_SIZE) / PAGESIZE) as usize)
    }

    /// Returns the real address of the frame at frame-region index `i`.
    pub fn frame_at(&self, i: usize) -> RealAddr {
        RealAddr::new(PT_AREA_SIZE + (i as u32) * PAGESIZE)
    }

    /// Allocates a fresh, zeroed, page-aligned block within the page-table
    /// region by advancing the region's bump pointer by one page.
    ///
    /// Fails if doing so would exceed the fixed page-table region budget.
    pub fn allocate_page_table(&mut self) -> Result<RealAddr> {
        let free = PT_AREA_SIZE - self.pt_free;
        if self.pt_free + PAGESIZE > PT_AREA_SIZE {
            return Err(Error::PtRegionExhausted { free });
        }

        let addr = self.pt_free;
        self.zero_page(addr);
        self.pt_free += PAGESIZE;
        Ok(RealAddr::new(addr))
    }

    /// Bumps a fresh frame from the untouched tail of the frame region, or
    /// returns `None` if the frame region has already been fully handed
    /// out once (the caller must then fall back to eviction).
    pub fn bump_frame(&mut self) -> Option<RealAddr> {
        if self.frame_free + PAGESIZE > self.real_size {
            return None;
        }

        let addr = self.frame_free;
        self.zero_page(addr);
        self.frame_free += PAGESIZE;
        Some(RealAddr::new(addr))
    }

    /// Whether the frame region's bump pointer has been fully consumed at
    /// least once (i.e. every frame in the region has an owner, and
    /// further allocations must evict).
    pub fn frame_region_full(&self) -> bool {
        self.frame_free >= self.real_size
    }

    /// Zeroes the page at `addr`.
    pub fn zero_page(&mut self, addr: u32) {
        let start = addr as usize;
        let end = start + PAGESIZE as usize;
        self.buf[start..end].fill(0);
    }

    /// Reads a little-endian `u32` at `addr`.
    pub fn read_u32(&self, addr: RealAddr) -> u32 {
        let i = addr.as_usize();
        u32::from_le_bytes(self.buf[i..i + 4].try_into().unwrap())
    }

    /// Writes a little-endian `u32` at `addr`.
    pub fn write_u32(&mut self, addr: RealAddr, value: u32) {
        let i = addr.as_usize();
        self.buf[i..i + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Returns the `len`-byte slice starting at `addr`.
    ///
    /// Fails if `addr + len` would exceed the arena.
    pub fn slice(&self, addr: RealAddr, len: u32) -> Result<&[u8]> {
        self.check_bounds(addr, len)?;
        let start = addr.as_usize();
        Ok(&self.buf[start..start + len as usize])
    }

    /// Returns the `len`-byte mutable slice starting at `addr`.
    ///
    /// Fails if `addr + len` would exceed the arena.
    pub fn slice_mut(&mut self, addr: RealAddr, len: u32) -> Result<&mut [u8]> {
        self.check_bounds(addr, len)?;
        let start = addr.as_usize();
        Ok(&mut self.buf[start..start + len as usize])
    }

    /// Returns the page-table region's current bump pointer. Exposed for
    /// tests that check exactly how many lower tables have been allocated.
    #[cfg(test)]
    pub(crate) fn pt_free_for_test(&self) -> u32 {
        self.pt_free
    }

    fn check_bounds(&self, addr: RealAddr, len: u32) -> Result<()> {
        let end = addr
            .as_u32()
            .checked_add(len)
            .filter(|&end| end <= self.real_size);
        if end.is_none() {
            return Err(Error::ArenaBounds {
                addr: addr.as_u32(),
                len,
                arena_size: self.real_size,
            });
        }
        Ok(())
    }
}
