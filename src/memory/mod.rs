//! Demand-paged virtual-memory core.
//!
//! Each submodule corresponds to one component from the system overview:
//! `psa` (C1), `heap_tracker` (C2), `cow` (C3 + C4), `fault` (C5), `loader`
//! (C6). `external` holds the collaborator traits these components consume
//! but do not implement; `testing` holds in-memory fakes for those traits,
//! compiled for tests only.

pub mod external;
pub mod psa;
pub mod heap_tracker;
pub mod cow;
pub mod fault;
pub mod loader;

#[cfg(test)]
pub mod testing;

use cow::CowTable;
use psa::Psa;

lazy_static::lazy_static! {
    /// The process-wide swap area, same singleton shape as the teacher's
    /// `memory::frame_alloc::GLOBAL_ALLOCATOR`. A concrete kernel build
    /// reaches for this instead of constructing its own `Psa`.
    pub static ref PSA: Psa = Psa::new();

    /// The process-wide CoW group table.
    pub static ref COW_TABLE: CowTable = CowTable::new();
}
