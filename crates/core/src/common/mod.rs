//! Common types shared across the virtual machine.
//!
//! This module collects the foundational pieces every other subsystem builds on:
//! 1. **Width:** The single address-width parameter (RV32/RV64) and its helpers.
//! 2. **ABI:** RISC-V register index constants for the syscall calling convention.
//! 3. **Errors:** The library error type for guest-visible and host-visible failures.

/// RISC-V ABI register index constants.
pub mod abi;
/// Library error type.
pub mod error;
/// Address-width parameter (`Rv32` / `Rv64`).
pub mod width;

pub use error::VmError;
pub use width::{Rv32, Rv64, Width};
