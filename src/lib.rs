//! Demand-paged virtual-memory core.
//!
//! `no_std` library consumed by a kernel build; nothing here defines an
//! entry point or a panic handler — those belong to the binary that links
//! this crate in, the same division the teacher draws between its
//! `kernel_lib` (`[lib]`, `crate-type = ["staticlib", "rlib"]`) and its
//! `_start`/panic-handler-carrying binary target.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod memory;
pub mod process;
pub mod trace;

pub use error::{CoreError, CoreResult};
pub use process::{HeapDescriptor, Process};
pub use trace::{LogTrace, Trace};
