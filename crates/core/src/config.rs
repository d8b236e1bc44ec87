//! Configuration for the sandboxed machine.
//!
//! This module defines the configuration structures used to parameterize a
//! machine. It provides:
//! 1. **Defaults:** Baseline constants (RAM size, arena placement, syscall bases).
//! 2. **Structures:** Hierarchical config for memory, heap, and syscall layers.
//! 3. **Ingestion:** Deserialization from JSON for embedding hosts, or
//!    `Config::default()` for direct library use.

use serde::Deserialize;

use crate::common::VmError;

/// Default configuration constants for the sandbox.
///
/// These values define the baseline machine when not explicitly overridden.
pub mod defaults {
    /// Total guest RAM size (16 MiB).
    ///
    /// The guest address space is flat: `[0, MEMORY_SIZE)`. Accesses beyond
    /// the limit fail with an out-of-bounds error, never host UB.
    pub const MEMORY_SIZE: u64 = 16 * 1024 * 1024;

    /// Base guest address of the heap arena.
    ///
    /// Placed high so statically-linked images and their stacks never collide
    /// with allocator-served ranges.
    pub const ARENA_BASE: u64 = 0x40_0000;

    /// Size of the heap arena served by the malloc/calloc/free syscalls (8 MiB).
    pub const ARENA_SIZE: u64 = 8 * 1024 * 1024;

    /// First syscall number of the heap and bulk-memory operation group.
    pub const HEAP_SYSCALL_BASE: u64 = 1;

    /// First syscall number of the threading operation group.
    pub const THREADS_SYSCALL_BASE: u64 = 500;

    /// Guest page size published through `AT_PAGESZ`.
    pub const PAGE_SIZE: u64 = 4096;

    /// Clock ticks per second published through `AT_CLKTCK`.
    pub const CLOCK_TICK: u64 = 100;

    /// Number of entries in the fixed syscall handler table.
    pub const SYSCALL_TABLE_SIZE: usize = 512;
}

/// Guest RAM parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Total guest RAM in bytes; the initial stack pointer starts at the top.
    pub size: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: defaults::MEMORY_SIZE,
        }
    }
}

/// Heap arena placement for the malloc/calloc/free syscall group.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// First guest address served by the arena.
    pub arena_base: u64,
    /// Number of bytes the arena may hand out.
    pub arena_size: u64,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            arena_base: defaults::ARENA_BASE,
            arena_size: defaults::ARENA_SIZE,
        }
    }
}

/// Syscall numbering and bulk-memory trust level.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyscallConfig {
    /// First number of the heap / bulk-memory group (malloc..print-backtrace).
    pub heap_base: u64,
    /// First number of the threading group (clone..unblock_by_tid).
    pub threads_base: u64,
    /// Selects the bulk zero-copy implementation of memcpy/memset instead of
    /// the bounds-checked per-byte loops. Both modes stay inside guest RAM;
    /// untrusted mode additionally validates every intermediate address.
    pub trusted_memory: bool,
}

impl Default for SyscallConfig {
    fn default() -> Self {
        Self {
            heap_base: defaults::HEAP_SYSCALL_BASE,
            threads_base: defaults::THREADS_SYSCALL_BASE,
            trusted_memory: false,
        }
    }
}

/// Root configuration for one machine instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Guest RAM parameters.
    pub memory: MemoryConfig,
    /// Heap arena placement.
    pub heap: HeapConfig,
    /// Syscall numbering and memory trust level.
    pub syscall: SyscallConfig,
}

impl Config {
    /// Deserializes a configuration from a JSON document.
    ///
    /// Missing fields fall back to their defaults, so `"{}"` is a valid
    /// document equivalent to `Config::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Config`] when the document is not valid JSON or a
    /// field has the wrong type.
    pub fn from_json(text: &str) -> Result<Self, VmError> {
        serde_json::from_str(text).map_err(|e| VmError::Config(e.to_string()))
    }
}
