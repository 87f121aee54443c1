//! C3 (group table) + C4 (fork-time remap) + C4.5 (write-fault resolution).
//!
//! Group bookkeeping is a single lock over a fixed table, the same shape as
//! the teacher's `capabilities::registry` (`static TOKENS: RwLock<BTreeMap<...>>`)
//! collapsed to a fixed array since `N_PROC` is a compile-time bound here —
//! no kernel allocation is needed to grow the table. Per-group shared-frame
//! membership is tracked in a `nathan237-TrustOS`-style refcount set
//! (`kernel/src/memory/cow.rs`'s `REFCOUNTS: Mutex<BTreeMap<u64,u32>>`), here
//! an `ArrayVec` bounded by `SHMEM_MAX` since the group table itself is fixed.

use arrayvec::ArrayVec;
use spin::Mutex;

use crate::constants::{N_PROC, NO_GROUP, PAGE_SIZE, SHMEM_MAX};
use crate::error::{CoreError, CoreResult};
use crate::memory::external::{FrameAllocator, PageTableOps, PteFlags, ScratchPage};
use crate::trace::Trace;

#[derive(Clone)]
struct CowGroup {
    active: bool,
    member_count: u32,
    shared_frames: ArrayVec<u64, SHMEM_MAX>,
}

impl CowGroup {
    const fn empty() -> Self {
        CowGroup { active: false, member_count: 0, shared_frames: ArrayVec::new_const() }
    }
}

struct CowTableState {
    groups: [CowGroup; N_PROC],
    initialized: bool,
}

/// One global group table guarded by a single lock, per `spec.md` §5's
/// `cow_lock` guidance — every operation in this module takes the same lock,
/// so a caller never needs to reason about partial updates across calls.
pub struct CowTable {
    state: Mutex<CowTableState>,
}

impl CowTable {
    pub fn new() -> Self {
        CowTable {
            state: Mutex::new(CowTableState {
                groups: core::array::from_fn(|_| CowGroup::empty()),
                initialized: false,
            }),
        }
    }

    /// Boot-time initialization, called exactly once — resolves open
    /// question 4: a second call is a caller bug, caught in debug builds
    /// rather than silently re-zeroing an in-use table.
    pub fn cow_init(&self) {
        let mut s = self.state.lock();
        debug_assert!(!s.initialized, "cow_init called more than once");
        s.groups = core::array::from_fn(|_| CowGroup::empty());
        s.initialized = true;
    }

    /// Allocate a fresh group with no members yet. Caller adds members with
    /// `incr`.
    pub fn create_group(&self) -> CoreResult<i32> {
        let mut s = self.state.lock();
        for (i, g) in s.groups.iter_mut().enumerate() {
            if !g.active {
                *g = CowGroup { active: true, member_count: 0, shared_frames: ArrayVec::new() };
                return Ok(i as i32);
            }
        }
        Err(CoreError::NoGroupSlot)
    }

    /// Increment a group's member count (a process just joined it).
    pub fn incr(&self, group_id: i32) {
        let mut s = self.state.lock();
        let g = &mut s.groups[group_id as usize];
        debug_assert!(g.active);
        g.member_count += 1;
    }

    /// Decrement a group's member count (a process left it, e.g. on exit or
    /// sole-owner promotion). When the count reaches zero the group slot is
    /// freed for reuse.
    pub fn decr(&self, group_id: i32) -> u32 {
        let mut s = self.state.lock();
        let g = &mut s.groups[group_id as usize];
        debug_assert!(g.active && g.member_count > 0);
        g.member_count -= 1;
        let remaining = g.member_count;
        if remaining == 0 {
            *g = CowGroup::empty();
        }
        remaining
    }

    /// Register `pfa` as shared within `group_id`. Idempotent: re-adding an
    /// already-tracked frame is a no-op, not an error.
    pub fn add_shared(&self, group_id: i32, pfa: u64) -> CoreResult<()> {
        let mut s = self.state.lock();
        let g = &mut s.groups[group_id as usize];
        if g.shared_frames.contains(&pfa) {
            return Ok(());
        }
        g.shared_frames.try_push(pfa).map_err(|_| CoreError::SharedSetFull)
    }

    /// True if `pfa` is tracked as shared within `group_id`.
    pub fn is_shared(&self, group_id: i32, pfa: u64) -> bool {
        let s = self.state.lock();
        s.groups[group_id as usize].shared_frames.contains(&pfa)
    }

    /// Remove `pfa` from `group_id`'s shared set. Used when a write fault
    /// discovers this process is the sole remaining owner of the frame
    /// (open question 1, resolved): once a copy is no longer needed because
    /// the last other reference was dropped, pruning it here keeps
    /// `shared_frames` from growing unboundedly across a long-lived group.
    pub fn remove_shared(&self, group_id: i32, pfa: u64) {
        let mut s = self.state.lock();
        let g = &mut s.groups[group_id as usize];
        if let Some(pos) = g.shared_frames.iter().position(|&f| f == pfa) {
            g.shared_frames.swap_remove(pos);
        }
    }

    pub fn member_count(&self, group_id: i32) -> u32 {
        self.state.lock().groups[group_id as usize].member_count
    }
}

impl Default for CowTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Remap `[0, size)` of `old_pt` read-only and share the same frames into
/// `new_pt`, also read-only, registering every shared frame in `group_id`.
/// Every page in the range must already be mapped in `old_pt` — a missing
/// PTE here means the caller handed this function the wrong range, not a
/// sparsely populated address space to skip over, so it aborts with
/// `PteMissing` rather than silently leaving a hole in the child.
///
/// Member-count bookkeeping mirrors `uvmcopy_cow`: if the group had no live
/// members yet (a fresh group just created for this fork) it's bumped to 1
/// before the remap starts, then bumped again at the end for the child that
/// now also belongs to it — two members, parent and child, once this returns.
pub fn cow_fork<PT: PageTableOps>(
    old_pt: &mut PT,
    new_pt: &mut PT,
    group: &CowTable,
    group_id: i32,
    size: u64,
) -> CoreResult<()> {
    if group.member_count(group_id) == 0 {
        group.incr(group_id);
    }

    let mut va = 0u64;
    while va < size {
        let pte = old_pt.walk(va, false).ok_or(CoreError::PteMissing)?;
        let ro_flags = pte.flags & !PteFlags::W;

        old_pt.unmap_range(va, 1, false);
        old_pt.map_range(va, PAGE_SIZE, pte.pfa, ro_flags).map_err(|_| CoreError::MapFailed)?;

        new_pt.map_range(va, PAGE_SIZE, pte.pfa, ro_flags).map_err(|_| CoreError::MapFailed)?;

        group.add_shared(group_id, pte.pfa)?;
        va += PAGE_SIZE as u64;
    }

    group.incr(group_id);

    old_pt.flush_tlb();
    new_pt.flush_tlb();
    Ok(())
}

/// Resolve a write fault on a CoW-mapped page (C4.5).
///
/// Always allocates a fresh frame and copies the faulting page's contents
/// into it before remapping — matching `copy_on_write`'s unconditional
/// `kalloc`+`memmove`, regardless of how many processes still share the old
/// frame. Ownership only changes whether the *old* frame is freed: if this
/// process is the sole remaining owner of it (the group has exactly one
/// live reference — `member_count <= 1`), the old frame is pruned from the
/// shared set and released via `unmap_range`'s `do_free`; otherwise it's
/// left mapped and shared (and therefore still read-only) for the rest of
/// the group.
pub fn resolve_write_fault<PT: PageTableOps, FA: FrameAllocator, T: Trace>(
    pt: &mut PT,
    frames: &mut FA,
    group: &CowTable,
    group_id: i32,
    va: u64,
    proc_name: &str,
    trace: &T,
) -> CoreResult<()> {
    trace.copy_on_write(proc_name, va);

    let pte = pt.walk(va, false).ok_or(CoreError::PteMissing)?;
    let sole_owner = group.member_count(group_id) <= 1;

    let new_frame = frames.alloc_frame().ok_or(CoreError::MapFailed)?;
    let mut scratch = ScratchPage::zeroed();
    frames.read_frame(pte.pfa, scratch.as_mut_slice());
    frames.write_frame(new_frame, scratch.as_slice());

    if sole_owner {
        group.remove_shared(group_id, pte.pfa);
    }

    pt.unmap_range(va, 1, sole_owner);
    pt.map_range(va, PAGE_SIZE, new_frame, pte.flags | PteFlags::W).map_err(|_| CoreError::MapFailed)?;
    pt.flush_tlb();
    Ok(())
}
