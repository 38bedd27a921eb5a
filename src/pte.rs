// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The page-table entry: a single tagged 32-bit word with two mutually
//! exclusive encodings, selected by the resident flag.
//!
//! Callers never poke at the bit layout directly; `Pte` exposes accessors
//! that assert the residency state before extracting the page or block
//! field.

use crate::addr::RealAddr;

bitflags::bitflags! {
    /// Status flags carried in the low 3 bits of a PTE.
    ///
    /// `REFERENCED` and `DIRTY` are only meaningful while `RESIDENT` is set;
    /// they are meaningless on a non-resident entry, and this crate never
    /// sets them on one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const RESIDENT   = 0b001;
        const REFERENCED = 0b010;
        const DIRTY      = 0b100;
    }
}

const PAGE_MASK: u32 = 0xffff_f000;
const BLOCK_SHIFT: u32 = 10;
const BLOCK_BITS: u32 = 14;
const BLOCK_MASK: u32 = ((1u32 << BLOCK_BITS) - 1) << BLOCK_SHIFT;

/// The largest backing-store block number that fits in a PTE.
pub const MAX_BLOCK: u32 = (1u32 << BLOCK_BITS) - 1;

/// A single page-table entry.
///
/// An all-zero `Pte` means unmapped: no lower table has been allocated (in
/// the upper table), or no frame or block has ever been assigned (in the
/// lower table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Pte(u32);

impl Pte {
    /// The unmapped PTE.
    pub const ZERO: Pte = Pte(0);

    /// Wraps a raw PTE word, as read from the arena.
    pub const fn from_raw(raw: u32) -> Self {
        Pte(raw)
    }

    /// Returns the raw PTE word, to be written back into the arena.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns whether this entry is entirely unmapped.
    pub const fn is_unmapped(self) -> bool {
        self.0 == 0
    }

    /// Returns whether this entry's page field is currently backed by a
    /// frame.
    pub const fn is_resident(self) -> bool {
        self.0 & PteFlags::RESIDENT.bits() != 0
    }

    /// Returns whether the referenced bit is set.
    ///
    /// Only meaningful when `is_resident()` is true.
    pub const fn referenced(self) -> bool {
        self.0 & PteFlags::REFERENCED.bits() != 0
    }

    /// Returns whether the dirty bit is set.
    ///
    /// Only meaningful when `is_resident()` is true. Tracked for
    /// observability; never consulted by the replacement policy or the
    /// swap protocol.
    pub const fn dirty(self) -> bool {
        self.0 & PteFlags::DIRTY.bits() != 0
    }

    /// Returns the real address of the frame this entry names.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not resident; this is an implementation bug,
    /// not a reachable runtime condition.
    pub fn page(self) -> RealAddr {
        assert!(self.is_resident(), "page() called on non-resident PTE");
        RealAddr::new(self.0 & PAGE_MASK)
    }

    /// Returns the backing-store block number this entry names.
    ///
    /// # Panics
    ///
    /// Panics if the entry is resident or unmapped.
    pub fn block(self) -> u32 {
        assert!(
            !self.is_resident() && !self.is_unmapped(),
            "block() called on resident or unmapped PTE"
        );
        (self.0 & BLOCK_MASK) >> BLOCK_SHIFT
    }

    /// Builds a resident PTE naming `page`, with the given flags (which
    /// must include `RESIDENT`).
    pub fn resident(page: RealAddr, flags: PteFlags) -> Self {
        debug_assert!(page.is_page_aligned(), "frame address must be page-aligned");
        debug_assert!(
            flags.contains(PteFlags::RESIDENT),
            "resident PTE must carry the resident flag"
        );
        Pte((page.as_u32() & PAGE_MASK) | flags.bits())
    }

    /// Builds a non-resident PTE naming backing-store block `block`.
    ///
    /// Clears everything else: the resident bit and the referenced/dirty
    /// bits, which are meaningless once a page is swapped out.
    pub fn non_resident(block: u32) -> Self {
        debug_assert!(block <= MAX_BLOCK, "block number does not fit in a PTE");
        Pte((block & (MAX_BLOCK)) << BLOCK_SHIFT)
    }

    /// Returns a copy of this entry with the referenced bit set.
    pub fn with_referenced(self) -> Self {
        Pte(self.0 | PteFlags::REFERENCED.bits())
    }

    /// Returns a copy of this entry with the referenced bit cleared.
    pub fn with_referenced_cleared(self) -> Self {
        Pte(self.0 & !PteFlags::REFERENCED.bits())
    }

    /// Returns a copy of this entry with the dirty bit set.
    pub fn with_dirty(self) -> Self {
        Pte(self.0 | PteFlags::DIRTY.bits())
    }
}
