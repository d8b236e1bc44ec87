//! Library error type.
//!
//! Errors fall into two classes. Guest-visible soft failures (an unknown tid,
//! an allocator miss) never surface here: they are reported as a negative
//! value in the syscall result register. `VmError` carries the host-visible
//! failures a simulation driver must handle: out-of-bounds guest accesses,
//! malformed images, and dispatch to an uninstalled syscall number.
//!
//! Scheduler-invariant violations (blocking with no runnable thread, registry
//! overflow, erasing an unregistered tid) are contract breaks, not inputs, and
//! abort via panic rather than appearing in this enum.

use thiserror::Error;

/// Errors reported to the host while servicing the guest.
#[derive(Debug, Error)]
pub enum VmError {
    /// A guest address range fell outside the machine's RAM.
    #[error("guest access of {len} bytes out of bounds at {addr:#x}")]
    OutOfBounds {
        /// First address of the failed access.
        addr: u64,
        /// Length of the failed access in bytes.
        len: u64,
    },

    /// The loaded ELF image could not be parsed.
    #[error("malformed ELF image: {0}")]
    Image(#[from] object::read::Error),

    /// A trapped syscall number has no installed handler.
    #[error("no syscall handler installed for number {0}")]
    UnhandledSyscall(u64),

    /// A configuration document could not be deserialized.
    #[error("invalid configuration: {0}")]
    Config(String),
}
