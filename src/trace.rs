//! Observability sinks consumed by the core (`spec.md` §6).
//!
//! Production builds route these through the `log` crate facade, the same
//! facade the teacher's `ipc` and `capabilities` modules already pull in
//! (`log::info!`, `log::warn!`). Tests use `testing::RecordingTrace` instead
//! so assertions can inspect exactly which events fired.

pub trait Trace {
    fn page_fault(&self, name: &str, va: u64);
    fn load_seg(&self, va: u64, off: u64, filesz: u64);
    fn evict_page(&self, va: u64, slot: usize);
    fn retrieve_page(&self, va: u64, slot: usize);
    fn copy_on_write(&self, proc_name: &str, va: u64);
}

/// Default production sink: structured `log` records, one target per event
/// kind so a downstream logger can filter per-subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

#[cfg(feature = "trace-log")]
impl Trace for LogTrace {
    fn page_fault(&self, name: &str, va: u64) {
        log::debug!(target: "vmcore::fault", "page_fault name={name} va={va:#x}");
    }

    fn load_seg(&self, va: u64, off: u64, filesz: u64) {
        log::info!(target: "vmcore::loader", "load_seg va={va:#x} off={off:#x} filesz={filesz:#x}");
    }

    fn evict_page(&self, va: u64, slot: usize) {
        log::info!(target: "vmcore::psa", "evict_page va={va:#x} slot={slot}");
    }

    fn retrieve_page(&self, va: u64, slot: usize) {
        log::info!(target: "vmcore::psa", "retrieve_page va={va:#x} slot={slot}");
    }

    fn copy_on_write(&self, proc_name: &str, va: u64) {
        log::info!(target: "vmcore::cow", "copy_on_write proc={proc_name} va={va:#x}");
    }
}

#[cfg(not(feature = "trace-log"))]
impl Trace for LogTrace {
    fn page_fault(&self, _name: &str, _va: u64) {}
    fn load_seg(&self, _va: u64, _off: u64, _filesz: u64) {}
    fn evict_page(&self, _va: u64, _slot: usize) {}
    fn retrieve_page(&self, _va: u64, _slot: usize) {}
    fn copy_on_write(&self, _proc_name: &str, _va: u64) {}
}
