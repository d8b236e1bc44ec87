//! Guest heap arena.
//!
//! The address-range allocator behind the malloc/calloc/free/meminfo
//! syscalls. The arena hands out guest addresses only; the bytes live in
//! ordinary guest RAM.

/// First-fit free-list arena.
pub mod arena;

pub use arena::Arena;
