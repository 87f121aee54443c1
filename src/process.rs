//! Process-descriptor fields consumed by the virtual-memory core.
//!
//! Only the fields named in `spec.md` §3 are modeled here. Everything else
//! about a process (scheduling state, open files, credentials, ...) belongs
//! to the process table, which is an external collaborator — the core reads
//! and writes exactly these fields and nothing else, the same way
//! `sched::task::Task` in the teacher crate exposes only the fields its
//! scheduler touches and leaves the rest to other subsystems.

use crate::constants::{ALL_ONES, MAX_HEAP, NO_GROUP};

/// One tracked heap page. `addr == 0` together with the slot being otherwise
/// zeroed is not itself the empty sentinel — emptiness is `addr == ALL_ONES`,
/// matching the spec's literal encoding so the invariant checks in
/// `heap_tracker` can be written directly against the raw fields.
#[derive(Debug, Clone, Copy)]
pub struct HeapDescriptor {
    pub addr: u64,
    pub loaded: bool,
    pub swap_slot: usize,
    pub last_load_time: u64,
}

impl HeapDescriptor {
    pub const EMPTY: HeapDescriptor =
        HeapDescriptor { addr: ALL_ONES, loaded: false, swap_slot: 0, last_load_time: ALL_ONES };

    pub fn is_empty(&self) -> bool {
        self.addr == ALL_ONES
    }

    /// True once the page has been materialised in RAM at least once and is
    /// not currently resident (§3: `swap_slot` valid iff non-resident).
    pub fn is_resident(&self) -> bool {
        self.loaded && self.last_load_time != ALL_ONES
    }
}

/// A process, as seen by the core. Generic over the page-table handle type
/// `PT` so the core never assumes a concrete page-table representation —
/// that representation belongs to the external page-table collaborator.
pub struct Process<PT> {
    pub name: &'static str,
    pub pagetable: PT,
    pub heap_tracker: [HeapDescriptor; MAX_HEAP],
    pub resident_heap_pages: usize,
    pub cow_enabled: bool,
    /// `NO_GROUP` (-1) when the process does not belong to a CoW group.
    pub cow_group: i32,
}

impl<PT> Process<PT> {
    pub fn new(name: &'static str, pagetable: PT) -> Self {
        Process {
            name,
            pagetable,
            heap_tracker: [HeapDescriptor::EMPTY; MAX_HEAP],
            resident_heap_pages: 0,
            cow_enabled: false,
            cow_group: NO_GROUP,
        }
    }

    /// Number of occupied heap descriptor slots (resident or swapped out),
    /// as distinct from `resident_heap_pages` which only counts resident ones.
    pub fn occupied_heap_slots(&self) -> usize {
        self.heap_tracker.iter().filter(|d| !d.is_empty()).count()
    }
}
