//! Sandboxed RISC-V virtual machine library.
//!
//! This crate implements the OS-emulation layer of a sandboxed RISC-V guest
//! with the following:
//! 1. **Machine:** CPU state, guest RAM, a fixed syscall handler table, and
//!    machine lifecycle (stop flag, exit code, teardown callbacks).
//! 2. **Threads:** A cooperative guest-thread scheduler multiplexing one
//!    host execution context over clone-style guest threads.
//! 3. **Syscalls:** Threading, heap allocator, and bulk-memory handler
//!    groups installed at configurable numeric bases.
//! 4. **OS:** ELF segment loading and Linux-compatible process bootstrap
//!    (argv/envp/auxv stack image construction).
//! 5. **Widths:** All guest-facing types are generic over RV32 and RV64.

/// Common types (ABI register indices, errors, guest width selection).
pub mod common;
/// Machine configuration (defaults and hierarchical config structures).
pub mod config;
/// Heap arena behind the allocator syscalls.
pub mod heap;
/// The machine: CPU state, registers, syscall dispatch, lifecycle.
pub mod machine;
/// Bounds-checked guest RAM.
pub mod memory;
/// ELF loading, auxiliary vector, and process bootstrap.
pub mod os;
/// Syscall handler groups (threading, heap, bulk memory).
pub mod syscalls;
/// Cooperative guest-thread scheduler.
pub mod threads;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Guest width selectors and the width trait.
pub use crate::common::{Rv32, Rv64, VmError, Width};
/// The sandboxed machine; construct with `Machine::new`.
pub use crate::machine::Machine;
/// Linux-compatible process bootstrap; run once before simulating.
pub use crate::os::bootstrap::prepare_linux;
/// The guest-thread scheduler, shared with the threading syscall group.
pub use crate::threads::Scheduler;
