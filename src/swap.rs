// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The swap protocol: evict, fetch, and swap.

use crate::addr::{RealAddr, PAGESIZE};
use crate::arena::Arena;
use crate::backing_store::BackingStore;
use crate::error::Result;
use crate::index::FrameIndex;
use crate::pte::{Pte, PteFlags};

/// Monotonically increasing backing-store block counter. Block 0 is
/// reserved and never handed out; blocks are never reused.
#[derive(Debug, Default)]
pub struct BlockCounter {
    next: u32,
}

impl BlockCounter {
    pub fn new() -> Self {
        BlockCounter { next: 1 }
    }

    /// Returns a fresh block number, never previously handed out.
    pub fn next_block(&mut self) -> u32 {
        let b = self.next;
        self.next += 1;
        b
    }
}

/// Evicts the page currently owned by the lower PTE at `victim_pte_addr`:
/// writes its frame's contents to a fresh backing-store block, rewrites
/// the PTE to encode that block and clears residency, and zeroes the
/// freed frame.
///
/// The frame-to-PTE index entry for the freed frame is left stale; the
/// caller is responsible for overwriting it once the frame's new owner is
/// known.
pub fn evict(
    arena: &mut Arena,
    store: &mut dyn BackingStore,
    blocks: &mut BlockCounter,
    victim_pte_addr: RealAddr,
) -> Result<RealAddr> {
    let pte = Pte::from_raw(arena.read_u32(victim_pte_addr));
    let frame = pte.page();

    let block = blocks.next_block();
    let data = arena.slice(frame, PAGESIZE)?.to_vec();
    store.write_block(block, &data)?;

    arena.write_u32(victim_pte_addr, Pte::non_resident(block).raw());
    arena.zero_page(frame.as_u32());

    Ok(frame)
}

/// Fetches the page named by the non-resident PTE at `dest_pte_slot_addr`
/// into `free_frame`: reads the encoded block back from the backing
/// store, rewrites the PTE to encode `free_frame` and set residency, and
/// records `free_frame`'s new owner in the frame-to-PTE index.
pub fn fetch(
    arena: &mut Arena,
    index: &mut FrameIndex,
    store: &mut dyn BackingStore,
    dest_pte_slot_addr: RealAddr,
    free_frame: RealAddr,
) -> Result<()> {
    let pte = Pte::from_raw(arena.read_u32(dest_pte_slot_addr));
    let block = pte.block();

    let mut buf = [0u8; PAGESIZE as usize];
    store.read_block(block, &mut buf)?;
    arena.slice_mut(free_frame, PAGESIZE)?.copy_from_slice(&buf);

    arena.write_u32(
        dest_pte_slot_addr,
        Pte::resident(free_frame, PteFlags::RESIDENT).raw(),
    );

    let i = arena
        .frame_index_of(free_frame)
        .expect("fetch destination must be a frame within the frame region");
    index.set_owner(i, dest_pte_slot_addr);

    Ok(())
}

/// Composes [`evict`] and [`fetch`]: evicts `victim_pte_addr` to free a
/// frame, then fetches the page named by `in_slot_addr` into that frame.
pub fn swap(
    arena: &mut Arena,
    index: &mut FrameIndex,
    store: &mut dyn BackingStore,
    blocks: &mut BlockCounter,
    in_slot_addr: RealAddr,
    victim_pte_addr: RealAddr,
) -> Result<()> {
    let freed_frame = evict(arena, store, blocks, victim_pte_addr)?;
    fetch(arena, index, store, in_slot_addr, freed_frame)
}
