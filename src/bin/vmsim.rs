// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! A small host harness for the simulator: reads `VMSIM_REAL_MEM_SIZE`
//! from the environment, opens a file-backed store for swapped-out pages,
//! and runs a scripted workload against the engine, logging every fault
//! and eviction.
//!
//! Grounded on `user/diagnostics-workload`'s role of exercising kernel
//! subsystems from a standalone driver binary.

use std::path::PathBuf;
use vmsim::addr::{PAGESIZE, SimAddr};
use vmsim::backing_store::FileBackingStore;
use vmsim::{Config, Engine};

fn main() {
    env_logger::init();

    let config = Config::from_env().unwrap_or_else(|err| {
        eprintln!("vmsim: {err}");
        std::process::exit(1);
    });

    let store_path = std::env::var("VMSIM_BACKING_STORE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("vmsim.store"));

    let store = FileBackingStore::open(&store_path).unwrap_or_else(|err| {
        eprintln!("vmsim: failed to open backing store at {store_path:?}: {err}");
        std::process::exit(1);
    });

    let mut engine = Engine::new(config.real_mem_size, Box::new(store)).unwrap_or_else(|err| {
        eprintln!("vmsim: failed to initialize engine: {err}");
        std::process::exit(1);
    });

    run_demo_workload(&mut engine);
    engine.debug();
}

/// Touches a handful of pages to demonstrate fault-in, eviction, and
/// swap-back without requiring a scripting language for a minimal harness.
fn run_demo_workload(engine: &mut Engine) {
    let base = engine.alloc(PAGESIZE * 4);
    for i in 0..4u32 {
        let addr = SimAddr::new(base.as_u32() + i * PAGESIZE);
        let page = vec![i as u8; PAGESIZE as usize];
        engine
            .write(&page, addr, PAGESIZE)
            .expect("write should succeed");
    }

    let mut buf = vec![0u8; PAGESIZE as usize];
    for i in 0..4u32 {
        let addr = SimAddr::new(base.as_u32() + i * PAGESIZE);
        engine.read(&mut buf, addr, PAGESIZE).expect("read should succeed");
        assert_eq!(buf, vec![i as u8; PAGESIZE as usize]);
    }
}
