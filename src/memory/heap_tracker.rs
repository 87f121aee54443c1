//! C2: per-process heap page tracker.
//!
//! Finds descriptors by address and selects an eviction victim by strict
//! FIFO over `last_load_time`, ties broken by lowest slot index — the same
//! "oldest wins, index breaks ties" shape as the teacher's
//! `memory::frame_alloc::FrameAllocator` bump search, but over a mutable
//! array of descriptors instead of a monotonic counter.

use crate::constants::{ALL_ONES, MAX_HEAP};
use crate::process::HeapDescriptor;

/// Find the descriptor slot tracking `addr`, if any.
pub fn find_by_addr(tracker: &[HeapDescriptor; MAX_HEAP], addr: u64) -> Option<usize> {
    tracker.iter().position(|d| !d.is_empty() && d.addr == addr)
}

/// Find the first empty slot, if any — used when a new heap page is
/// demanded for the first time.
pub fn find_free_slot(tracker: &[HeapDescriptor; MAX_HEAP]) -> Option<usize> {
    tracker.iter().position(|d| d.is_empty())
}

/// Select the resident page with the smallest `last_load_time` to evict.
/// Strict FIFO: the page loaded longest ago goes first; a tie (which only
/// happens if a caller stamped two pages with the same load time) is broken
/// by preferring the lower slot index, so the result is always deterministic.
///
/// Returns `None` if no resident page exists, which callers must not treat
/// as "nothing to evict" when the tracker is actually full — `heap_tracker`
/// never forces this check, `fault::evict_one` does.
pub fn select_victim(tracker: &[HeapDescriptor; MAX_HEAP]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, d) in tracker.iter().enumerate() {
        if !d.is_resident() {
            continue;
        }
        best = match best {
            None => Some(i),
            Some(b) if d.last_load_time < tracker[b].last_load_time => Some(i),
            Some(b) => Some(b),
        };
    }
    best
}

/// Mark slot `i` resident: record the load time and clear any stale swap
/// slot reference, since a resident page's `swap_slot` field is meaningless
/// (per `spec.md` §3, valid only while non-resident).
pub fn mark_resident(tracker: &mut [HeapDescriptor; MAX_HEAP], i: usize, addr: u64, now: u64) {
    tracker[i] = HeapDescriptor { addr, loaded: true, swap_slot: 0, last_load_time: now };
}

/// Mark slot `i` evicted to `slot`: the page is no longer resident, so
/// `last_load_time` reverts to the sentinel per `HeapDescriptor::is_resident`.
pub fn mark_evicted(tracker: &mut [HeapDescriptor; MAX_HEAP], i: usize, slot: usize) {
    let addr = tracker[i].addr;
    tracker[i] = HeapDescriptor { addr, loaded: true, swap_slot: slot, last_load_time: ALL_ONES };
}

/// Clear slot `i` entirely, returning the descriptor to `HeapDescriptor::EMPTY`.
pub fn clear_slot(tracker: &mut [HeapDescriptor; MAX_HEAP], i: usize) {
    tracker[i] = HeapDescriptor::EMPTY;
}
