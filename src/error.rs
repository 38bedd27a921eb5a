// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The error kinds the engine can produce.
//!
//! Every error here is fatal: there is no recovery layer above the engine.
//! Callers are expected to propagate these with `?` and abort (or
//! `panic!`) once they reach the top of their own call stack; the engine
//! itself never retries a failed operation.

use crate::addr::RealAddr;

/// Errors produced by the engine, its allocators, and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `VMSIM_REAL_MEM_SIZE` was unparseable or smaller than the minimum
    /// the page-table region requires.
    #[error("invalid real memory size configuration: {0}")]
    Configuration(String),

    /// A real address plus a length would fall outside the arena.
    #[error("real address {addr:#010x} + {len} bytes exceeds arena of size {arena_size}")]
    ArenaBounds {
        addr: u32,
        len: u32,
        arena_size: u32,
    },

    /// More lower page tables were demanded than the fixed page-table
    /// region budget (1024) allows, or the upper table itself would not
    /// fit.
    #[error("page-table region exhausted: requested a page table but only {free} bytes remain")]
    PtRegionExhausted { free: u32 },

    /// A resident PTE named a frame whose frame-to-PTE index entry did not
    /// point back to it. This indicates an invariant breach, not a
    /// transient condition.
    #[error("frame-to-PTE index corruption at frame {frame:?}: expected owner {expected:?}, found {found:?}")]
    IndexCorruption {
        frame: RealAddr,
        expected: RealAddr,
        found: Option<RealAddr>,
    },

    /// The backing store collaborator failed to service a read or write.
    #[error("backing store failure on block {block}: {source}")]
    BackingStore {
        block: u32,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
