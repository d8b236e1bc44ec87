//! Syscall bridge.
//!
//! This module wires the guest-facing syscall groups into a machine's handler
//! table. It provides:
//! 1. **Threading group:** clone, exit, sched_yield, yield_to, block, and the
//!    two unblock variants, backed by a shared [`Scheduler`].
//! 2. **Heap group:** malloc, calloc, meminfo, free over a shared [`Arena`],
//!    plus the bulk memory operations (memcpy, memset, memmove) and a
//!    print-backtrace diagnostic.
//!
//! Each setup function installs its handlers at the configured numeric base
//! and returns the shared state so embedders can inspect it. Handlers read
//! arguments positionally from a0..a3 and report guest mistakes as -1 in a0;
//! host-level failures propagate as [`VmError`](crate::common::VmError).
//!
//! [`Scheduler`]: crate::threads::Scheduler
//! [`Arena`]: crate::heap::Arena

/// malloc/calloc/meminfo/free and the bulk memory operations.
pub mod heap;
/// clone/exit/yield/block/unblock handlers.
pub mod threading;

pub use heap::{setup_heap_syscalls, setup_memory_syscalls};
pub use threading::setup_threading_syscalls;
