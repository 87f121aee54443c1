//! Host-provided constants the core is built against.
//!
//! These mirror the values a concrete kernel build would supply; a real
//! integration overrides them via its own build configuration. Kept as
//! plain `pub const`s in the style of `memory::heap::{HEAP_START, HEAP_SIZE}`
//! rather than a config file — this is a kernel core, not a userspace service.

/// Size of one physical/virtual page.
pub const PAGE_SIZE: usize = 4096;

/// Size of one block on the backing block device.
pub const BLOCK_SIZE: usize = 512;

/// Number of 512-byte blocks that make up one PSA slot (one page's worth
/// of swap storage).
pub const BLOCKS_PER_SLOT: usize = PAGE_SIZE / BLOCK_SIZE;

/// Maximum number of heap page descriptors tracked per process.
pub const MAX_HEAP: usize = 64;

/// Maximum number of heap pages a single process may hold resident at once.
pub const MAX_RESIDENT_HEAP: usize = 16;

/// First block number of the reserved Process Swap Area on the backing device.
pub const PSA_START: usize = 2048;

/// Size of the Process Swap Area, in blocks.
pub const PSA_SIZE: usize = 4096;

/// Maximum number of PFAs tracked per CoW group's shared-frame set.
pub const SHMEM_MAX: usize = 100;

/// Number of CoW group table slots (mirrors the process table size).
pub const N_PROC: usize = 64;

/// Sentinel meaning "slot empty" / "non-resident" / "no group", matching
/// the spec's literal use of all-ones rather than a typed `Option`.
pub const ALL_ONES: u64 = u64::MAX;

/// Sentinel `group_id` meaning "no group".
pub const NO_GROUP: i32 = -1;

const _: () = assert!(BLOCKS_PER_SLOT * BLOCK_SIZE >= PAGE_SIZE);
const _: () = assert!(MAX_RESIDENT_HEAP <= MAX_HEAP);
