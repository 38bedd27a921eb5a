// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The engine: process-wide mutable state bundled into a single owning
//! value, and the operations that act on it.

use crate::addr::{RealAddr, SimAddr, PAGESIZE};
use crate::arena::Arena;
use crate::backing_store::{BackingStore, MemoryBackingStore};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::heap::HeapAllocator;
use crate::index::FrameIndex;
use crate::pte::{Pte, PteFlags};
use crate::swap::{self, BlockCounter};

/// Running counters describing the engine's activity so far. Pure
/// diagnostics; nothing reads these back to make a decision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of page faults handled.
    pub faults: u64,
    /// Number of pages evicted to the backing store.
    pub evictions: u64,
    /// Number of pages fetched back from the backing store.
    pub fetches: u64,
}

/// The demand-paged virtual memory engine: real-memory arena, page
/// tables, frame-to-PTE index, CLOCK cursor, block counter, and the
/// backing-store collaborator, bundled into one value.
pub struct Engine {
    arena: Arena,
    index: FrameIndex,
    clock: Clock,
    blocks: BlockCounter,
    store: Box<dyn BackingStore>,
    heap: HeapAllocator,
    upper_pt: RealAddr,
    stats: Stats,
}

impl Engine {
    /// Builds a new engine over a freshly allocated arena of `real_size`
    /// bytes, using `store` as the backing-store collaborator.
    pub fn new(real_size: u32, store: Box<dyn BackingStore>) -> Result<Self> {
        let mut arena = Arena::new(real_size)?;
        let upper_pt = arena.allocate_page_table()?;
        let frame_count = arena.frame_count();

        log::debug!(
            "engine initialized: real_size={real_size}, upper_pt={upper_pt}, frame_count={frame_count}"
        );

        Ok(Engine {
            arena,
            index: FrameIndex::new(frame_count),
            clock: Clock::new(),
            blocks: BlockCounter::new(),
            store,
            heap: HeapAllocator::new(),
            upper_pt,
            stats: Stats::default(),
        })
    }

    /// Builds a new engine backed by an in-memory backing store,
    /// convenient for tests that should not touch the filesystem.
    pub fn new_in_memory(real_size: u32) -> Result<Self> {
        Self::new(real_size, Box::new(MemoryBackingStore::new()))
    }

    /// Returns the real address of the upper page table.
    pub fn upper_pt(&self) -> RealAddr {
        self.upper_pt
    }

    /// Returns a snapshot of the engine's activity counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The total size of the arena, in bytes.
    pub fn real_size(&self) -> u32 {
        self.arena.real_size()
    }

    /// Number of frames in the frame region that currently have an owner.
    pub fn resident_frame_count(&self) -> usize {
        self.index.owned_count()
    }

    /// Total number of frames the frame region can hold.
    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    /// Bump-pointer allocator over the simulated address space, starting
    /// at the first page past the reserved null page. Never reclaims.
    pub fn alloc(&mut self, size: u32) -> SimAddr {
        self.heap.alloc(size)
    }

    /// No-op: the simulated heap never reclaims memory.
    pub fn free(&mut self, addr: SimAddr) {
        self.heap.free(addr);
    }

    /// Translates `sim_addr` to a real address, faulting the page in (or
    /// swapping it back in) if necessary. Pure translation for advanced
    /// callers that want the real address without issuing a read or write.
    pub fn map(&mut self, sim_addr: SimAddr, write: bool) -> Result<RealAddr> {
        self.translate(sim_addr, write)
    }

    /// Translates `sim_addr` and copies `n` bytes from the real arena into
    /// `buf`.
    ///
    /// `n` bytes must not span a page boundary; crossing accesses are the
    /// caller's responsibility to split.
    pub fn read(&mut self, buf: &mut [u8], sim_addr: SimAddr, n: u32) -> Result<()> {
        debug_assert!(
            sim_addr.offset() + n <= PAGESIZE,
            "read of {n} bytes at {sim_addr} crosses a page boundary"
        );
        let real = self.translate(sim_addr, false)?;
        let src = self.arena.slice(real, n)?;
        buf[..n as usize].copy_from_slice(src);
        Ok(())
    }

    /// Translates `sim_addr` and copies `n` bytes from `buf` into the real
    /// arena.
    ///
    /// `n` bytes must not span a page boundary; crossing accesses are the
    /// caller's responsibility to split.
    pub fn write(&mut self, buf: &[u8], sim_addr: SimAddr, n: u32) -> Result<()> {
        debug_assert!(
            sim_addr.offset() + n <= PAGESIZE,
            "write of {n} bytes at {sim_addr} crosses a page boundary"
        );
        let real = self.translate(sim_addr, true)?;
        let dst = self.arena.slice_mut(real, n)?;
        dst.copy_from_slice(&buf[..n as usize]);
        Ok(())
    }

    /// Prints a diagnostic summary of the engine's state: arena layout,
    /// bump pointers, frame occupancy, and activity counters.
    pub fn debug(&self) {
        log::info!(
            "real_size={} frames={}/{} faults={} evictions={} fetches={}",
            self.arena.real_size(),
            self.index.owned_count(),
            self.index.len(),
            self.stats.faults,
            self.stats.evictions,
            self.stats.fetches,
        );
    }

    // -- translation and fault handling --

    fn upper_pte_slot(&self, a: SimAddr) -> RealAddr {
        self.upper_pt
            .checked_add(a.upper_index() as u32 * 4)
            .expect("upper PTE slot address overflowed")
    }

    fn lower_pt_addr(&self, a: SimAddr) -> Option<RealAddr> {
        let raw = self.arena.read_u32(self.upper_pte_slot(a));
        if raw == 0 {
            None
        } else {
            Some(RealAddr::new(raw))
        }
    }

    fn lower_pte_slot(&self, lower_pt: RealAddr, a: SimAddr) -> RealAddr {
        lower_pt
            .checked_add(a.lower_index() as u32 * 4)
            .expect("lower PTE slot address overflowed")
    }

    /// Attempts the two-level walk without faulting. Returns the real
    /// address on success, or `None` if the upper PTE is unmapped, the
    /// lower PTE is unmapped, or the lower PTE is mapped but non-resident.
    fn try_walk(&self, a: SimAddr) -> Option<RealAddr> {
        let lower_pt = self.lower_pt_addr(a)?;
        let lower_slot = self.lower_pte_slot(lower_pt, a);
        let pte = Pte::from_raw(self.arena.read_u32(lower_slot));
        if pte.is_unmapped() || !pte.is_resident() {
            return None;
        }
        Some(RealAddr::new(pte.page().as_u32() | a.offset()))
    }

    /// Translates `a`, faulting it in if necessary, and updates the
    /// referenced (and, for writes, dirty) bit on success.
    fn translate(&mut self, a: SimAddr, write: bool) -> Result<RealAddr> {
        if self.try_walk(a).is_none() {
            self.handle_fault(a)?;
        }

        let lower_pt = self
            .lower_pt_addr(a)
            .expect("upper PTE must be mapped once fault handling has returned");
        let lower_slot = self.lower_pte_slot(lower_pt, a);
        let pte = Pte::from_raw(self.arena.read_u32(lower_slot));
        debug_assert!(
            pte.is_resident(),
            "lower PTE must be resident once fault handling has returned"
        );
        self.check_frame_owner(lower_slot, pte)?;

        let mut updated = pte.with_referenced();
        if write {
            updated = updated.with_dirty();
        }
        self.arena.write_u32(lower_slot, updated.raw());

        Ok(RealAddr::new(pte.page().as_u32() | a.offset()))
    }

    /// Verifies that the frame `pte` (owned by the lower PTE at
    /// `lower_slot`) names has a frame-to-PTE index entry that points back
    /// to `lower_slot`. A mismatch means the index and the page tables have
    /// drifted out of sync, which this engine treats as an unrecoverable
    /// bug rather than a transient condition.
    fn check_frame_owner(&self, lower_slot: RealAddr, pte: Pte) -> Result<()> {
        let frame = pte.page();
        let idx = self
            .arena
            .frame_index_of(frame)
            .ok_or(Error::IndexCorruption { frame, expected: lower_slot, found: None })?;
        match self.index.owner(idx) {
            Some(owner) if owner == lower_slot => Ok(()),
            found => Err(Error::IndexCorruption { frame, expected: lower_slot, found }),
        }
    }

    /// The fault handler: allocates a missing lower table, allocates a
    /// frame for a never-mapped page, or swaps a non-resident page back in.
    fn handle_fault(&mut self, a: SimAddr) -> Result<()> {
        self.stats.faults += 1;
        log::trace!("fault at {a}");

        let upper_slot = self.upper_pte_slot(a);
        let lower_pt = match self.lower_pt_addr(a) {
            Some(addr) => addr,
            None => {
                let addr = self.arena.allocate_page_table()?;
                self.arena.write_u32(upper_slot, addr.as_u32());
                addr
            }
        };

        let lower_slot = self.lower_pte_slot(lower_pt, a);
        let pte = Pte::from_raw(self.arena.read_u32(lower_slot));

        if pte.is_unmapped() {
            let frame = self.allocate_frame()?;
            let i = self
                .arena
                .frame_index_of(frame)
                .expect("allocate_frame always returns a frame-region address");
            self.index.set_owner(i, lower_slot);
            self.arena
                .write_u32(lower_slot, Pte::resident(frame, PteFlags::RESIDENT).raw());
        } else if !pte.is_resident() {
            let victim_slot = self.clock.select_victim(&self.index, &mut self.arena);
            let victim_pte_addr = self
                .index
                .owner(victim_slot)
                .expect("CLOCK must land on a currently-owned frame");
            log::debug!("swapping in {a}, evicting frame owned by {victim_pte_addr}");
            swap::swap(
                &mut self.arena,
                &mut self.index,
                self.store.as_mut(),
                &mut self.blocks,
                lower_slot,
                victim_pte_addr,
            )?;
            self.stats.evictions += 1;
            self.stats.fetches += 1;
        }

        Ok(())
    }

    /// Returns a usable frame: bumped fresh from the untouched tail of the
    /// frame region, or reclaimed from a CLOCK-chosen victim once that
    /// tail is exhausted.
    fn allocate_frame(&mut self) -> Result<RealAddr> {
        if let Some(frame) = self.arena.bump_frame() {
            return Ok(frame);
        }

        let victim_slot = self.clock.select_victim(&self.index, &mut self.arena);
        let victim_pte_addr = self
            .index
            .owner(victim_slot)
            .expect("CLOCK must land on a currently-owned frame");
        let freed = swap::evict(&mut self.arena, self.store.as_mut(), &mut self.blocks, victim_pte_addr)?;
        self.index.clear_owner(victim_slot);
        self.stats.evictions += 1;
        log::debug!("evicted frame {freed} (owner was {victim_pte_addr})");
        Ok(freed)
    }
}
