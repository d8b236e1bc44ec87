//! Heap arena unit tests.
//!
//! Verifies first-fit allocation, alignment, coalescing on free, and the
//! accounting counters behind the meminfo syscall.

use proptest::prelude::*;
use rvbox_core::heap::Arena;

const BASE: u64 = 0x10_0000;
const END: u64 = 0x20_0000;

fn arena() -> Arena {
    Arena::new(BASE, END)
}

// ══════════════════════════════════════════════════════════
// 1. Allocation
// ══════════════════════════════════════════════════════════

#[test]
fn first_allocation_starts_at_base() {
    let mut a = arena();
    assert_eq!(a.malloc(64), BASE);
}

#[test]
fn allocations_are_16_byte_aligned() {
    let mut a = arena();
    for size in [1, 7, 16, 17, 100, 4096] {
        let addr = a.malloc(size);
        assert_ne!(addr, 0);
        assert_eq!(addr % 16, 0, "size {size} produced a misaligned block");
    }
}

#[test]
fn zero_size_still_allocates_a_slot() {
    let mut a = arena();
    let first = a.malloc(0);
    let second = a.malloc(0);
    assert_ne!(first, 0);
    assert_ne!(second, 0);
    assert_ne!(first, second);
}

#[test]
fn exhaustion_returns_null() {
    let mut a = arena();
    assert_ne!(a.malloc(END - BASE), 0);
    assert_eq!(a.malloc(1), 0);
}

#[test]
fn oversized_request_returns_null() {
    let mut a = arena();
    assert_eq!(a.malloc(END - BASE + 1), 0);
    assert_eq!(a.malloc(u64::MAX), 0);
}

// ══════════════════════════════════════════════════════════
// 2. Free and coalescing
// ══════════════════════════════════════════════════════════

#[test]
fn free_unknown_address_fails() {
    let mut a = arena();
    assert_eq!(a.free(BASE), -1);
    let addr = a.malloc(32);
    assert_eq!(a.free(addr + 16), -1);
}

#[test]
fn double_free_fails() {
    let mut a = arena();
    let addr = a.malloc(32);
    assert_eq!(a.free(addr), 0);
    assert_eq!(a.free(addr), -1);
}

#[test]
fn freed_neighbors_coalesce() {
    let mut a = arena();
    let first = a.malloc(64);
    let second = a.malloc(64);
    let third = a.malloc(64);
    assert_eq!(a.free(second), 0);
    assert_eq!(a.free(first), 0);
    // first+second merged back into one hole big enough for both.
    assert_eq!(a.malloc(128), first);
    assert_eq!(a.free(third), 0);
}

#[test]
fn full_release_restores_the_whole_arena() {
    let mut a = arena();
    let blocks: Vec<u64> = (0..8).map(|_| a.malloc(1024)).collect();
    for addr in blocks {
        assert_eq!(a.free(addr), 0);
    }
    assert_eq!(a.bytes_free(), END - BASE);
    assert_eq!(a.chunks_used(), 0);
    assert_eq!(a.malloc(END - BASE), BASE);
}

// ══════════════════════════════════════════════════════════
// 3. Accounting
// ══════════════════════════════════════════════════════════

#[test]
fn counters_track_live_allocations() {
    let mut a = arena();
    assert_eq!(a.bytes_used(), 0);
    assert_eq!(a.chunks_used(), 0);

    let addr = a.malloc(100);
    // Rounded up to the arena alignment.
    assert_eq!(a.bytes_used(), 112);
    assert_eq!(a.chunks_used(), 1);
    assert_eq!(a.bytes_free(), END - BASE - 112);

    a.free(addr);
    assert_eq!(a.bytes_used(), 0);
    assert_eq!(a.bytes_free(), END - BASE);
}

proptest! {
    // Whatever sequence of allocs and frees runs, free + used always covers
    // the arena exactly and live chunks match the bookkeeping.
    #[test]
    fn accounting_invariant_holds(ops in prop::collection::vec(0usize..3, 1..64)) {
        let mut a = arena();
        let mut live: Vec<u64> = Vec::new();
        for op in ops {
            match op {
                0 => {
                    let addr = a.malloc(256);
                    if addr != 0 {
                        live.push(addr);
                    }
                }
                1 => {
                    if let Some(addr) = live.pop() {
                        prop_assert_eq!(a.free(addr), 0);
                    }
                }
                _ => {
                    // Freeing garbage never corrupts the accounting.
                    prop_assert_eq!(a.free(3), -1);
                }
            }
            prop_assert_eq!(a.bytes_free() + a.bytes_used(), END - BASE);
            prop_assert_eq!(a.chunks_used(), live.len() as u64);
        }
    }
}
