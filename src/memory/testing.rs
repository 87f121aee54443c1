//! In-memory fakes for the external collaborator traits, compiled only under
//! `#[cfg(test)]`. Grounded in the hosted test harness shape of
//! `betrusted-io-xous-core`'s `kernel/src/test/mod.rs` (`start_kernel`,
//! `as_process`) — a small std-backed stand-in for hardware so the core's
//! logic can be exercised without a real page table, block device, or
//! filesystem.

extern crate std;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use std::sync::Mutex;

use crate::constants::PAGE_SIZE;
use crate::memory::external::{BlockBuf, BlockDevice, FileSystem, FrameAllocator, PageTableOps, Pte, PteFlags};
use crate::trace::Trace;

/// Page table backed by a `BTreeMap<u64, Pte>`, keyed by page-aligned
/// virtual address. `alloc_range` hands out frames from a private bump
/// counter starting well above any frame a test maps explicitly.
pub struct FakePageTable {
    entries: BTreeMap<u64, Pte>,
    next_bump_frame: u64,
}

impl FakePageTable {
    pub fn new() -> Self {
        FakePageTable { entries: BTreeMap::new(), next_bump_frame: 0x1_0000_0000 }
    }

    fn page(va: u64) -> u64 {
        va & !(PAGE_SIZE as u64 - 1)
    }
}

impl Default for FakePageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTableOps for FakePageTable {
    fn walk(&mut self, va: u64, _alloc: bool) -> Option<Pte> {
        self.entries.get(&Self::page(va)).copied()
    }

    fn map_range(&mut self, va: u64, len: usize, pfa: u64, flags: PteFlags) -> Result<(), ()> {
        let npages = len.div_ceil(PAGE_SIZE).max(1);
        let base = Self::page(va);
        for i in 0..npages {
            let page_va = base + (i * PAGE_SIZE) as u64;
            let page_pfa = pfa + (i * PAGE_SIZE) as u64;
            self.entries.insert(page_va, Pte { pfa: page_pfa, flags });
        }
        Ok(())
    }

    fn unmap_range(&mut self, va: u64, npages: usize, _do_free: bool) {
        let base = Self::page(va);
        for i in 0..npages {
            self.entries.remove(&(base + (i * PAGE_SIZE) as u64));
        }
    }

    fn alloc_range(&mut self, lo: u64, hi: u64, flags: PteFlags) -> u64 {
        let mut va = Self::page(lo);
        let end = hi;
        while va < end {
            let pfa = self.next_bump_frame;
            self.next_bump_frame += PAGE_SIZE as u64;
            self.entries.insert(va, Pte { pfa, flags });
            va += PAGE_SIZE as u64;
        }
        end
    }

    fn flush_tlb(&mut self) {}
}

/// Bump-pointer frame allocator over a bounded arena; `free_frame` is
/// tracked but frames are never reused, which is fine for test-sized runs.
/// `memory` stands in for the kernel's direct physical map so `read_frame`/
/// `write_frame` have somewhere real to land bytes.
pub struct FakeFrameAllocator {
    next: u64,
    freed: Vec<u64>,
    memory: BTreeMap<u64, [u8; PAGE_SIZE]>,
}

impl FakeFrameAllocator {
    pub fn new() -> Self {
        FakeFrameAllocator { next: 0x2000, freed: Vec::new(), memory: BTreeMap::new() }
    }
}

impl Default for FakeFrameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAllocator for FakeFrameAllocator {
    fn alloc_frame(&mut self) -> Option<u64> {
        let f = self.next;
        self.next += PAGE_SIZE as u64;
        Some(f)
    }

    fn free_frame(&mut self, pfa: u64) {
        self.freed.push(pfa);
        self.memory.remove(&pfa);
    }

    fn read_frame(&self, pfa: u64, dst: &mut [u8]) {
        let page = self.memory.get(&pfa).copied().unwrap_or([0u8; PAGE_SIZE]);
        dst.copy_from_slice(&page[..dst.len()]);
    }

    fn write_frame(&mut self, pfa: u64, src: &[u8]) {
        let mut page = self.memory.get(&pfa).copied().unwrap_or([0u8; PAGE_SIZE]);
        page[..src.len()].copy_from_slice(src);
        self.memory.insert(pfa, page);
    }
}

/// One fake block, `BLOCK_SIZE` bytes, zero-initialized until written. Keeps
/// its own block number so `write_block` knows where to commit on the
/// device, the same round trip a real buffer cache does with a dirty flag.
pub struct FakeBlock {
    blkno: usize,
    data: [u8; 512],
}

impl BlockBuf for FakeBlock {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Block device backed by a `BTreeMap<usize, [u8; 512]>`; unwritten blocks
/// read back as zero, matching a freshly formatted device.
pub struct FakeBlockDevice {
    blocks: BTreeMap<usize, [u8; 512]>,
}

impl FakeBlockDevice {
    pub fn new() -> Self {
        FakeBlockDevice { blocks: BTreeMap::new() }
    }
}

impl Default for FakeBlockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for FakeBlockDevice {
    type Buf = FakeBlock;

    fn get_block(&mut self, blkno: usize) -> Self::Buf {
        FakeBlock { blkno, data: self.blocks.get(&blkno).copied().unwrap_or([0u8; 512]) }
    }

    fn write_block(&mut self, buf: &mut Self::Buf) {
        self.blocks.insert(buf.blkno, buf.data);
    }

    fn release_block(&mut self, _buf: Self::Buf) {}
}

/// Filesystem fake: named byte blobs, looked up by name, no real locking.
pub struct FakeFileSystem {
    files: BTreeMap<String, Vec<u8>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        FakeFileSystem { files: BTreeMap::new() }
    }

    pub fn add_file(&mut self, name: &str, contents: Vec<u8>) {
        self.files.insert(String::from(name), contents);
    }
}

impl Default for FakeFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for FakeFileSystem {
    type Inode = String;

    fn lookup_inode(&mut self, name: &str) -> Option<Self::Inode> {
        self.files.contains_key(name).then(|| String::from(name))
    }

    fn lock_inode(&mut self, _inode: &mut Self::Inode) {}

    fn unlock_and_put_inode(&mut self, _inode: Self::Inode) {}

    fn read_inode(&mut self, inode: &mut Self::Inode, buf: &mut [u8], offset: u64) -> usize {
        let Some(contents) = self.files.get(inode) else { return 0 };
        let offset = offset as usize;
        if offset >= contents.len() {
            return 0;
        }
        let n = buf.len().min(contents.len() - offset);
        buf[..n].copy_from_slice(&contents[offset..offset + n]);
        n
    }
}

/// Trace sink that records every event fired, for assertions in tests that
/// care which observability calls happened and in what order.
#[derive(Default)]
pub struct RecordingTrace {
    pub events: Mutex<Vec<String>>,
}

impl RecordingTrace {
    pub fn new() -> Self {
        RecordingTrace { events: Mutex::new(Vec::new()) }
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Trace for RecordingTrace {
    fn page_fault(&self, name: &str, va: u64) {
        self.record(alloc::format!("page_fault {name} {va:#x}"));
    }

    fn load_seg(&self, va: u64, off: u64, filesz: u64) {
        self.record(alloc::format!("load_seg {va:#x} {off:#x} {filesz:#x}"));
    }

    fn evict_page(&self, va: u64, slot: usize) {
        self.record(alloc::format!("evict_page {va:#x} {slot}"));
    }

    fn retrieve_page(&self, va: u64, slot: usize) {
        self.record(alloc::format!("retrieve_page {va:#x} {slot}"));
    }

    fn copy_on_write(&self, proc_name: &str, va: u64) {
        self.record(alloc::format!("copy_on_write {proc_name} {va:#x}"));
    }
}
