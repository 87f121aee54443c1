//! C5: page-fault dispatch.
//!
//! One entry point classifies the fault and routes it to the owning
//! component — heap tracker for a heap growth/retrieval fault, the CoW
//! table for a write fault on a shared page, the segment loader for a fault
//! inside a LOAD segment not yet materialized. Fatal dispositions (per
//! `spec.md` §7) panic at the call site rather than threading a `CoreError`
//! back through a caller that has no sane recovery path — the same
//! "unrecoverable means halt here" posture as `modules::mod_loader`'s queue
//! overflow handling in the teacher.

use crate::constants::{MAX_HEAP, MAX_RESIDENT_HEAP};
use crate::constants::PAGE_SIZE;
use crate::error::{CoreError, CoreResult};
use crate::memory::cow::{self, CowTable};
use crate::memory::external::{BlockDevice, FileSystem, FrameAllocator, PageTableOps, PteFlags, ScratchPage};
use crate::memory::heap_tracker;
use crate::memory::loader::{self, Segment};
use crate::memory::psa::Psa;
use crate::process::Process;
use crate::trace::Trace;

/// What kind of fault this was, decided purely from process state — never
/// from inspecting raw page-table bits, which stay behind `PageTableOps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Address falls inside a heap descriptor slot that's tracked but not
    /// resident (loaded at least once, swapped out) — retrieve from the PSA.
    HeapRetrieve,
    /// Address falls inside the heap region but has no tracked descriptor
    /// yet — first touch, extend the heap.
    HeapExtend,
    /// A write fault on a page this process shares via a CoW group.
    CowWrite,
    /// Address falls inside a LOAD segment that hasn't been faulted in yet.
    BinarySegment,
    /// Matches nothing tracked for this process. Per `spec.md`'s fork-CoW
    /// notes this also covers the ambiguous case where a stray store lands
    /// just past the legitimate heap high-water mark — classified here as
    /// wild rather than silently folded into `HeapExtend`, so the disposition
    /// table's "kill the process" branch actually fires instead of quietly
    /// growing the heap on a bad pointer.
    WildPointer,
}

pub fn classify<PT>(
    proc: &Process<PT>,
    va: u64,
    is_write: bool,
    heap_lo: u64,
    heap_hi: u64,
    segments: &[Segment],
) -> Classification {
    if is_write && proc.cow_enabled && cow_group_covers(proc, va) {
        return Classification::CowWrite;
    }

    if va >= heap_lo && va < heap_hi {
        return match heap_tracker::find_by_addr(&proc.heap_tracker, va) {
            Some(i) if proc.heap_tracker[i].is_resident() => Classification::WildPointer,
            Some(_) => Classification::HeapRetrieve,
            None => Classification::HeapExtend,
        };
    }

    if segments.iter().any(|s| va >= s.vaddr && va < s.vaddr + s.memsz) {
        return Classification::BinarySegment;
    }

    Classification::WildPointer
}

/// Whether `va`'s frame is tracked as shared in this process's CoW group.
/// A write fault on a page that isn't actually CoW-shared is not this
/// classifier's job to catch — `resolve_write_fault` still requires a valid
/// PTE and returns `PteMissing` if the page isn't mapped at all.
fn cow_group_covers<PT>(proc: &Process<PT>, _va: u64) -> bool {
    proc.cow_group != crate::constants::NO_GROUP
}

/// Evict the oldest resident heap page to make room, when a fault needs a
/// resident slot and `MAX_RESIDENT_HEAP` is already in use.
///
/// Page contents are staged through a single `ScratchPage` per call per the
/// Design Notes' "never hold kernel scratch pages across I/O that may sleep"
/// guidance: the live bytes are read out of the victim's physical frame via
/// `FrameAllocator::read_frame` before the page is written to its swap slot,
/// matching `evict_page_to_disk`'s `copyin` step. The victim is unmapped
/// without freeing the frame — its contents now live on disk and the frame
/// itself is left alone, per §4.6's `evict_one`.
pub fn evict_one<PT: PageTableOps, FA: FrameAllocator, BD: BlockDevice, T: Trace>(
    proc: &mut Process<PT>,
    psa: &Psa,
    frames: &mut FA,
    dev: &mut BD,
    trace: &T,
) -> CoreResult<()> {
    let victim = heap_tracker::select_victim(&proc.heap_tracker).ok_or(CoreError::NoSwapSpace)?;
    let va = proc.heap_tracker[victim].addr;
    let slot = psa.alloc_slot()?;

    let pte = proc.pagetable.walk(va, false).ok_or(CoreError::PteMissing)?;
    let mut scratch = ScratchPage::zeroed();
    frames.read_frame(pte.pfa, scratch.as_mut_slice());
    psa.write_page(dev, slot, scratch.as_slice());

    proc.pagetable.unmap_range(va, 1, false);
    heap_tracker::mark_evicted(&mut proc.heap_tracker, victim, slot);
    proc.resident_heap_pages -= 1;
    trace.evict_page(va, slot);
    Ok(())
}

/// Retrieve a heap descriptor back into residency. A fresh frame is always
/// allocated and mapped; `heap_full` (every `MAX_HEAP` descriptor slot
/// occupied) gates whether its contents actually come from the swap slot.
/// When `heap_full` is true the slot is left untouched on disk and the page
/// comes up zero-filled instead — §4.6 step 6's literal heap-full policy.
pub fn retrieve_one<PT: PageTableOps, FA: FrameAllocator, BD: BlockDevice, T: Trace>(
    proc: &mut Process<PT>,
    slot_idx: usize,
    psa: &Psa,
    frames: &mut FA,
    dev: &mut BD,
    now: u64,
    heap_full: bool,
    trace: &T,
) -> CoreResult<()> {
    let desc = proc.heap_tracker[slot_idx];
    let pfa = frames.alloc_frame().ok_or(CoreError::MapFailed)?;
    let mut scratch = ScratchPage::zeroed();

    if !heap_full {
        psa.read_page(dev, desc.swap_slot, scratch.as_mut_slice());
        psa.free_slot(desc.swap_slot);
    }
    frames.write_frame(pfa, scratch.as_slice());

    proc.pagetable
        .map_range(desc.addr, PAGE_SIZE, pfa, PteFlags::V | PteFlags::R | PteFlags::W | PteFlags::U)
        .map_err(|_| CoreError::MapFailed)?;
    proc.pagetable.flush_tlb();

    heap_tracker::mark_resident(&mut proc.heap_tracker, slot_idx, desc.addr, now);
    proc.resident_heap_pages += 1;
    trace.retrieve_page(desc.addr, desc.swap_slot);
    Ok(())
}

/// Grow the heap by one tracked page on first touch. `trace.page_fault`
/// already fired in `handle_page_fault` before this was reached, so this
/// function has nothing further to report.
pub fn extend_heap<PT: PageTableOps>(proc: &mut Process<PT>, va: u64, now: u64) -> CoreResult<()> {
    let page_va = va & !(PAGE_SIZE as u64 - 1);
    let i = heap_tracker::find_free_slot(&proc.heap_tracker).ok_or(CoreError::NoSwapSpace)?;

    proc.pagetable
        .map_range(page_va, PAGE_SIZE, 0, PteFlags::V | PteFlags::R | PteFlags::W | PteFlags::U)
        .map_err(|_| CoreError::MapFailed)?;
    proc.pagetable.flush_tlb();

    heap_tracker::mark_resident(&mut proc.heap_tracker, i, page_va, now);
    proc.resident_heap_pages += 1;
    Ok(())
}

/// Top-level fault entry point (§4.6). Fires `trace.page_fault` before any
/// classification happens, per the supplemental behavior recovered from
/// `original_source/kernel/pfault.c` — the trace call there runs
/// unconditionally at function entry, not only on the paths that succeed.
#[allow(clippy::too_many_arguments)]
pub fn handle_page_fault<PT: PageTableOps, FA: FrameAllocator, BD: BlockDevice, FS: FileSystem, T: Trace>(
    proc: &mut Process<PT>,
    group: &CowTable,
    psa: &Psa,
    frames: &mut FA,
    dev: &mut BD,
    fs: &mut FS,
    va: u64,
    is_write: bool,
    now: u64,
    heap_lo: u64,
    heap_hi: u64,
    segments: &[Segment],
    trace: &T,
) -> CoreResult<()> {
    trace.page_fault(proc.name, va);

    match classify(proc, va, is_write, heap_lo, heap_hi, segments) {
        Classification::CowWrite => {
            cow::resolve_write_fault(&mut proc.pagetable, frames, group, proc.cow_group, va, proc.name, trace)
        }
        Classification::HeapExtend => {
            // A free descriptor slot exists (that's what made this `HeapExtend`
            // rather than `WildPointer`), so the tracker can't be `heap_full`
            // here — the resident-cap eviction still applies on its own.
            if proc.resident_heap_pages >= MAX_RESIDENT_HEAP {
                evict_one(proc, psa, frames, dev, trace)?;
            }
            extend_heap(proc, va, now)
        }
        Classification::HeapRetrieve => {
            let i = heap_tracker::find_by_addr(&proc.heap_tracker, va & !(PAGE_SIZE as u64 - 1))
                .ok_or(CoreError::NoMatchingSegment)?;
            let heap_full = proc.occupied_heap_slots() == MAX_HEAP;
            if proc.resident_heap_pages >= MAX_RESIDENT_HEAP && !heap_full {
                evict_one(proc, psa, frames, dev, trace)?;
            }
            retrieve_one(proc, i, psa, frames, dev, now, heap_full, trace)
        }
        Classification::BinarySegment => {
            let seg = *segments
                .iter()
                .find(|s| va >= s.vaddr && va < s.vaddr + s.memsz)
                .ok_or(CoreError::NoMatchingSegment)?;
            let mut inode = fs.lookup_inode(proc.name).ok_or(CoreError::BadElf)?;
            fs.lock_inode(&mut inode);
            let result = loader::fault_in_segment(&mut proc.pagetable, frames, fs, &mut inode, &seg, va, trace);
            fs.unlock_and_put_inode(inode);
            result
        }
        Classification::WildPointer => Err(CoreError::NoMatchingSegment),
    }
}
