// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The MMU facade: the thin collaborator clients invoke for translation,
//! which calls back into the engine's fault handler when translation would
//! fail and retries.

use crate::addr::{RealAddr, SimAddr};
use crate::engine::Engine;
use crate::error::Result;

/// A facade over an [`Engine`] that exposes only translation to clients
/// that don't need the rest of the public API.
pub struct Mmu<'a> {
    engine: &'a mut Engine,
}

impl<'a> Mmu<'a> {
    /// Wraps `engine` behind the translation-only facade.
    pub fn new(engine: &'a mut Engine) -> Self {
        Mmu { engine }
    }

    /// Translates `sim_addr`, faulting the page in via the engine's fault
    /// handler if necessary, and retrying once the fault has been
    /// serviced.
    pub fn translate(&mut self, sim_addr: SimAddr, write: bool) -> Result<RealAddr> {
        self.engine.map(sim_addr, write)
    }
}
