// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! End-to-end scenarios against the public `Engine` API, using an arena
//! sized so the frame region holds exactly 4 frames.

use vmsim::addr::PAGESIZE;
use vmsim::arena::PT_AREA_SIZE;
use vmsim::{Engine, SimAddr};

fn engine_with_frames(frames: u32) -> Engine {
    Engine::new_in_memory(PT_AREA_SIZE + frames * PAGESIZE).unwrap()
}

#[test]
fn fault_in_basic() {
    let mut engine = engine_with_frames(4);
    let addr = SimAddr::new(0x0000_1000);
    let written = vec![b'A'; PAGESIZE as usize];

    engine.write(&written, addr, PAGESIZE).unwrap();

    let mut read_back = vec![0u8; PAGESIZE as usize];
    engine.read(&mut read_back, addr, PAGESIZE).unwrap();

    assert_eq!(read_back, written);
    assert_eq!(engine.resident_frame_count(), 1);
}

#[test]
fn second_lower_table_on_distant_address() {
    let mut engine = engine_with_frames(4);
    let page = vec![b'B'; PAGESIZE as usize];

    engine.write(&page, SimAddr::new(0x0000_1000), PAGESIZE).unwrap();
    // 0x0040_1000 lands in upper index 1, forcing a second lower table.
    engine.write(&page, SimAddr::new(0x0040_1000), PAGESIZE).unwrap();

    assert_eq!(engine.resident_frame_count(), 2);
}

#[test]
fn eviction_trigger_preserves_resident_count() {
    let mut engine = engine_with_frames(4);
    for i in 1..=4u32 {
        let page = vec![i as u8; PAGESIZE as usize];
        engine.write(&page, SimAddr::new(i * 0x1000), PAGESIZE).unwrap();
    }
    assert_eq!(engine.resident_frame_count(), 4);
    assert_eq!(engine.stats().evictions, 0);

    let fifth = vec![5u8; PAGESIZE as usize];
    engine.write(&fifth, SimAddr::new(0x5000), PAGESIZE).unwrap();

    assert_eq!(engine.resident_frame_count(), 4);
    assert_eq!(engine.stats().evictions, 1);

    let mut out = vec![0u8; PAGESIZE as usize];
    engine.read(&mut out, SimAddr::new(0x5000), PAGESIZE).unwrap();
    assert_eq!(out, fifth);
}

#[test]
fn swap_back_after_eviction() {
    let mut engine = engine_with_frames(4);
    let originals: Vec<(SimAddr, u8)> = (1..=4).map(|i| (SimAddr::new(i * 0x1000), i as u8)).collect();
    for (addr, byte) in &originals {
        engine.write(&vec![*byte; PAGESIZE as usize], *addr, PAGESIZE).unwrap();
    }

    // Force an eviction.
    engine
        .write(&vec![9u8; PAGESIZE as usize], SimAddr::new(0x5000), PAGESIZE)
        .unwrap();
    assert_eq!(engine.stats().evictions, 1);

    // Every original page, including whichever was evicted, reads back
    // unchanged (possibly causing further evictions of its own).
    for (addr, byte) in &originals {
        let mut out = vec![0u8; PAGESIZE as usize];
        engine.read(&mut out, *addr, PAGESIZE).unwrap();
        assert_eq!(out, vec![*byte; PAGESIZE as usize]);
    }
    assert!(engine.stats().fetches >= 1);
}

#[test]
fn evict_and_refetch_round_trip_under_churn() {
    let mut engine = engine_with_frames(4);
    let target = SimAddr::new(0x1000);
    engine.write(&vec![0xAAu8; PAGESIZE as usize], target, PAGESIZE).unwrap();

    // Churn through more distinct pages than frames exist, forcing the
    // target page to be evicted and refetched repeatedly.
    for round in 0..10u32 {
        let addr = SimAddr::new((2 + round) * 0x1000);
        engine
            .write(&vec![round as u8; PAGESIZE as usize], addr, PAGESIZE)
            .unwrap();
    }

    let mut out = vec![0u8; PAGESIZE as usize];
    engine.read(&mut out, target, PAGESIZE).unwrap();
    assert_eq!(out, vec![0xAAu8; PAGESIZE as usize]);
    assert!(engine.stats().evictions >= 7);
}

#[test]
fn repeated_reads_are_stable() {
    let mut engine = engine_with_frames(4);
    let addr = SimAddr::new(0x1000);
    engine.write(&vec![0x42u8; PAGESIZE as usize], addr, PAGESIZE).unwrap();

    let mut first = vec![0u8; PAGESIZE as usize];
    let mut second = vec![0u8; PAGESIZE as usize];
    engine.read(&mut first, addr, PAGESIZE).unwrap();
    engine.read(&mut second, addr, PAGESIZE).unwrap();

    assert_eq!(first, second);
}

#[test]
fn same_four_mib_range_shares_one_lower_table() {
    let mut engine = engine_with_frames(4);
    let page = vec![0u8; PAGESIZE as usize];

    // All three addresses share upper index 0: only the first should
    // allocate a lower table; the other two reuse it.
    engine.write(&page, SimAddr::new(0x0000_1000), PAGESIZE).unwrap();
    engine.write(&page, SimAddr::new(0x0000_2000), PAGESIZE).unwrap();
    engine.write(&page, SimAddr::new(0x0000_3000), PAGESIZE).unwrap();

    assert_eq!(engine.resident_frame_count(), 3);
}

#[test]
fn fault_under_pressure_selects_exactly_one_victim() {
    let mut engine = engine_with_frames(2);
    engine.write(&vec![1u8; PAGESIZE as usize], SimAddr::new(0x1000), PAGESIZE).unwrap();
    engine.write(&vec![2u8; PAGESIZE as usize], SimAddr::new(0x2000), PAGESIZE).unwrap();
    assert_eq!(engine.resident_frame_count(), 2);

    engine.write(&vec![3u8; PAGESIZE as usize], SimAddr::new(0x3000), PAGESIZE).unwrap();
    assert_eq!(engine.resident_frame_count(), 2);
    assert_eq!(engine.stats().evictions, 1);
}

#[test]
fn free_does_not_disturb_other_addresses() {
    let mut engine = engine_with_frames(4);
    let kept = SimAddr::new(0x1000);
    let freed = SimAddr::new(0x2000);

    engine.write(&vec![7u8; PAGESIZE as usize], kept, PAGESIZE).unwrap();
    engine.write(&vec![8u8; PAGESIZE as usize], freed, PAGESIZE).unwrap();

    engine.free(freed);
    engine.free(SimAddr::new(0xdead_d000)); // never mapped; still a no-op

    let mut out = vec![0u8; PAGESIZE as usize];
    engine.read(&mut out, kept, PAGESIZE).unwrap();
    assert_eq!(out, vec![7u8; PAGESIZE as usize]);
}

#[test]
fn page_table_and_frame_regions_never_overlap() {
    let mut engine = engine_with_frames(4);
    let real = engine.map(SimAddr::new(0x1000), true).unwrap();
    assert!(real.as_u32() >= PT_AREA_SIZE);
    assert!(real.as_u32() < engine.real_size());
}

#[test]
fn configuration_rejects_undersized_arena() {
    let err = Engine::new_in_memory(1024).unwrap_err();
    assert!(matches!(err, vmsim::Error::Configuration(_)));
}

#[test]
fn reference_bit_sweep_spares_recently_touched_pages() {
    let mut engine = engine_with_frames(4);
    let pages: Vec<SimAddr> = (1..=4).map(|i| SimAddr::new(i * 0x1000)).collect();
    for (i, &addr) in pages.iter().enumerate() {
        engine.write(&vec![i as u8; PAGESIZE as usize], addr, PAGESIZE).unwrap();
    }

    // Touch every resident page again so CLOCK must clear all four
    // reference bits before it can pick a victim.
    let mut scratch = vec![0u8; PAGESIZE as usize];
    for &addr in &pages {
        engine.read(&mut scratch, addr, PAGESIZE).unwrap();
    }

    engine.write(&vec![9u8; PAGESIZE as usize], SimAddr::new(0x5000), PAGESIZE).unwrap();

    assert_eq!(engine.resident_frame_count(), 4);
    assert_eq!(engine.stats().evictions, 1);
}

#[test]
fn clock_completes_within_one_sweep_plus_one_step() {
    let mut engine = engine_with_frames(2);
    engine.write(&vec![1u8; PAGESIZE as usize], SimAddr::new(0x1000), PAGESIZE).unwrap();
    engine.write(&vec![2u8; PAGESIZE as usize], SimAddr::new(0x2000), PAGESIZE).unwrap();

    // Both frames have their reference bit set from the writes above, so
    // CLOCK must clear both before landing on a victim on its second pass.
    engine.write(&vec![3u8; PAGESIZE as usize], SimAddr::new(0x3000), PAGESIZE).unwrap();
    assert_eq!(engine.stats().evictions, 1);
    assert_eq!(engine.resident_frame_count(), 2);

    // A second, immediate fault must still resolve to exactly one more
    // victim: CLOCK never spins past a second full sweep.
    engine.write(&vec![4u8; PAGESIZE as usize], SimAddr::new(0x4000), PAGESIZE).unwrap();
    assert_eq!(engine.stats().evictions, 2);
    assert_eq!(engine.resident_frame_count(), 2);
}
