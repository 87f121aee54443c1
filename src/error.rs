//! Error kinds surfaced by the virtual-memory core.
//!
//! Recoverable kinds are returned as `Err(CoreError::_)` and propagated with
//! `?`, generalizing the `Result<_, &'static str>` style used throughout the
//! teacher's `modules::mod_loader` and `ipc` modules into a proper enum, since
//! the fault handler's disposition table dispatches on error *kind*, not on
//! message text. Kinds marked fatal in `spec.md` §7 are never constructed as
//! a return value in this crate — the call site panics directly.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// `map_range` reported failure while installing a PTE.
    MapFailed,
    /// The PSA bitmap has no free 4-block run.
    NoSwapSpace,
    /// The CoW group table has no free slot.
    NoGroupSlot,
    /// A CoW group's shared-frame set is already at `SHMEM_MAX`.
    SharedSetFull,
    /// ELF header or program-header validation failed.
    BadElf,
    /// No program header covers the faulting address.
    NoMatchingSegment,
    /// `walk` returned no PTE where the caller's invariants required one.
    PteMissing,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CoreError::MapFailed => "map_range failed",
            CoreError::NoSwapSpace => "PSA bitmap exhausted",
            CoreError::NoGroupSlot => "CoW group table full",
            CoreError::SharedSetFull => "CoW group shared-frame set full",
            CoreError::BadElf => "ELF header or program header invalid",
            CoreError::NoMatchingSegment => "no LOAD segment covers the faulting address",
            CoreError::PteMissing => "expected a present PTE but found none",
        };
        f.write_str(msg)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
