// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! A simulated two-level demand-paged virtual memory subsystem.
//!
//! `vmsim` exposes a 32-bit simulated address space to clients and
//! transparently translates simulated addresses into offsets within a
//! flat, process-owned real-memory arena, materializing pages on first
//! touch, evicting them under memory pressure with CLOCK, and restoring
//! them from a page-sized backing store on subsequent faults.
//!
//! The [`Engine`] bundles all of this process-wide state into a single
//! owning value: the real-memory arena and its sub-allocators
//! ([`arena`]), the two-level page table and fault handler ([`engine`]),
//! the frame-to-PTE index ([`index`]), CLOCK replacement ([`clock`]), the
//! swap protocol ([`swap`]), and the backing-store collaborator
//! ([`backing_store`]).

pub mod addr;
pub mod arena;
pub mod backing_store;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod heap;
pub mod index;
pub mod mmu;
pub mod pte;
pub mod swap;

pub use addr::{RealAddr, SimAddr};
pub use config::Config;
pub use engine::{Engine, Stats};
pub use error::{Error, Result};
pub use mmu::Mmu;
pub use pte::{Pte, PteFlags};
