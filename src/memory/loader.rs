//! C6: binary segment loader.
//!
//! Parses ELF64 program headers with `xmas-elf` — the crate already present
//! in the teacher's `Cargo.toml` behind the `nonos-capsule-elf` feature, used
//! there to validate capsule binaries before execution. Here it drives
//! demand paging of a process's LOAD segments instead: header parsing
//! happens once up front (`parse_segments`), and each segment is only
//! materialized in physical memory when a fault actually lands inside it
//! (`fault_in_segment`), matching `spec.md`'s "map on first touch, not on
//! exec" design for this component.

use xmas_elf::program::{ProgramHeader, Type as PhType};
use xmas_elf::ElfFile;

use crate::constants::PAGE_SIZE;
use crate::error::{CoreError, CoreResult};
use crate::memory::external::{FileSystem, FrameAllocator, PageTableOps, PteFlags, ScratchPage};
use crate::trace::Trace;

/// One validated LOAD program header, reduced to the fields the fault path
/// actually needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub vaddr: u64,
    pub memsz: u64,
    pub filesz: u64,
    pub file_offset: u64,
    /// PTE permission bits derived from the program header's own R/W/X
    /// flags, plus the always-on `V`/`U` bits every user mapping needs.
    pub flags: PteFlags,
}

/// Parse every `PT_LOAD` program header out of an ELF image already read
/// into `bytes`. `spec.md`'s loader never maps anything here — this only
/// validates the header table and records where each segment lives, so a
/// malformed binary is rejected (`BadElf`) before any page fault depends on
/// its layout.
pub fn parse_segments(bytes: &[u8]) -> CoreResult<arrayvec::ArrayVec<Segment, 16>> {
    let elf = ElfFile::new(bytes).map_err(|_| CoreError::BadElf)?;
    let mut segments = arrayvec::ArrayVec::new();

    for ph in elf.program_iter() {
        if ph.get_type().map_err(|_| CoreError::BadElf)? != PhType::Load {
            continue;
        }
        let seg = segment_from_header(&ph)?;
        segments.try_push(seg).map_err(|_| CoreError::BadElf)?;
    }

    if segments.is_empty() {
        return Err(CoreError::BadElf);
    }
    Ok(segments)
}

fn segment_from_header(ph: &ProgramHeader<'_>) -> CoreResult<Segment> {
    let memsz = ph.mem_size();
    let filesz = ph.file_size();
    if filesz > memsz {
        return Err(CoreError::BadElf);
    }
    let ph_flags = ph.flags();
    let mut flags = PteFlags::V | PteFlags::U;
    if ph_flags.is_read() {
        flags |= PteFlags::R;
    }
    if ph_flags.is_write() {
        flags |= PteFlags::W;
    }
    if ph_flags.is_execute() {
        flags |= PteFlags::X;
    }
    Ok(Segment { vaddr: ph.virtual_addr(), memsz, filesz, file_offset: ph.offset(), flags })
}

/// Materialize the page at `va` inside `seg`: allocate a frame, copy in its
/// file-backed bytes via `read_segment_page` (zero-filling the BSS tail and
/// the tail of the final partial page, per `spec.md`'s literal `memsz`/
/// `filesz` split), and map it with the segment's own permission flags
/// rather than a blanket R|W|U — a read-only or executable-only segment
/// stays that way.
pub fn fault_in_segment<PT: PageTableOps, FA: FrameAllocator, FS: FileSystem, T: Trace>(
    pt: &mut PT,
    frames: &mut FA,
    fs: &mut FS,
    inode: &mut FS::Inode,
    seg: &Segment,
    va: u64,
    trace: &T,
) -> CoreResult<()> {
    let page_va = va & !(PAGE_SIZE as u64 - 1);
    let pfa = frames.alloc_frame().ok_or(CoreError::MapFailed)?;

    let mut scratch = ScratchPage::zeroed();
    read_segment_page(fs, inode, seg, page_va, scratch.as_mut_slice());
    frames.write_frame(pfa, scratch.as_slice());

    let seg_offset = page_va - seg.vaddr;
    let file_bytes_in_page = seg.filesz.saturating_sub(seg_offset).min(PAGE_SIZE as u64);
    let file_offset = seg.file_offset + seg_offset;
    if file_bytes_in_page > 0 {
        trace.load_seg(page_va, file_offset, file_bytes_in_page);
    }

    pt.map_range(page_va, PAGE_SIZE, pfa, seg.flags).map_err(|_| CoreError::MapFailed)?;
    pt.flush_tlb();
    Ok(())
}

/// Read `seg`'s file-backed bytes for one page out of the filesystem
/// collaborator into `dst`, zero-filling anything past `filesz`. Split out
/// from `fault_in_segment` because the actual byte copy needs the inode
/// lock/unlock bracket around it, which a kernel build drives through its
/// own scheduling point — this function assumes the inode is already locked.
pub fn read_segment_page<FS: FileSystem>(fs: &mut FS, inode: &mut FS::Inode, seg: &Segment, page_va: u64, dst: &mut [u8]) {
    dst.fill(0);
    let seg_offset = page_va - seg.vaddr;
    if seg_offset >= seg.filesz {
        return;
    }
    let file_bytes_in_page = (seg.filesz - seg_offset).min(dst.len() as u64) as usize;
    let file_offset = seg.file_offset + seg_offset;
    fs.read_inode(inode, &mut dst[..file_bytes_in_page], file_offset);
}
