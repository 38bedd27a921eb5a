// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! CLOCK page replacement.
//!
//! Scans the frame-to-PTE index in circular order starting from the
//! cursor, clearing reference bits until a non-referenced entry is found.

use crate::arena::Arena;
use crate::index::FrameIndex;
use crate::pte::Pte;

/// The CLOCK cursor: a single index into the frame-to-PTE index, wrapping
/// modulo its length.
///
/// The cursor's value is only meaningful once the frame region has filled
/// once; until then it is never consulted.
#[derive(Debug, Default)]
pub struct Clock {
    cursor: usize,
}

impl Clock {
    pub fn new() -> Self {
        Clock { cursor: 0 }
    }

    /// Scans the index starting at the cursor, clearing each referenced
    /// frame's reference bit in its owning PTE, until it finds a frame
    /// whose reference bit is already clear. Returns that frame's index
    /// within the frame region.
    ///
    /// Leaves the cursor positioned just past the returned victim, so the
    /// next call resumes from there.
    ///
    /// # Panics
    ///
    /// Panics if `index` has no owned frames (every slot is `None`); the
    /// caller must only invoke this once the frame region has filled at
    /// least once, at which point every slot is owned.
    pub fn select_victim(&mut self, index: &FrameIndex, arena: &mut Arena) -> usize {
        assert!(!index.is_empty(), "cannot select a victim from an empty index");
        let len = index.len();

        loop {
            let slot = self.cursor % len;
            let pte_addr = index
                .owner(slot)
                .expect("CLOCK cursor landed on an unowned frame");
            let pte = Pte::from_raw(arena.read_u32(pte_addr));

            if pte.referenced() {
                let cleared = pte.with_referenced_cleared();
                arena.write_u32(pte_addr, cleared.raw());
                self.cursor = (self.cursor + 1) % len;
                continue;
            }

            self.cursor = (slot + 1) % len;
            return slot;
        }
    }
}
