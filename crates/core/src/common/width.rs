//! Guest address-width parameter.
//!
//! The whole machine is generic over a single zero-sized width parameter
//! rather than duplicating a 32-bit and a 64-bit implementation. It provides:
//! 1. **Widths:** `Rv32` and `Rv64` instantiations of the sealed `Width` trait.
//! 2. **Truncation:** Register values are stored as `u64` and masked to the
//!    guest width on every write.
//! 3. **ELF association:** The matching `object` file-header type, so the
//!    loader and bootstrap parse the right header layout for the width.

use object::elf::{FileHeader32, FileHeader64};
use object::read::elf::FileHeader;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Rv32 {}
    impl Sealed for super::Rv64 {}
}

/// The guest address width: the one type parameter the machine is generic over.
///
/// Implemented only by [`Rv32`] and [`Rv64`]. All register values are stored
/// as `u64` on the host side; `truncate` masks them to the guest width.
pub trait Width: sealed::Sealed + Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Register width in bits (32 or 64).
    const XLEN: u32;
    /// Size of one guest word in bytes (4 or 8).
    const WORD_BYTES: u64;
    /// Platform identifier string published through `AT_PLATFORM`.
    const PLATFORM: &'static str;
    /// ELF file-header layout matching this width.
    type Elf: FileHeader;

    /// Masks a host value to the guest address width.
    fn truncate(value: u64) -> u64;
}

/// 32-bit RISC-V guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rv32 {}

/// 64-bit RISC-V guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rv64 {}

impl Width for Rv32 {
    const XLEN: u32 = 32;
    const WORD_BYTES: u64 = 4;
    const PLATFORM: &'static str = "RISC-V RV32I";
    type Elf = FileHeader32<object::Endianness>;

    #[inline(always)]
    fn truncate(value: u64) -> u64 {
        value & 0xFFFF_FFFF
    }
}

impl Width for Rv64 {
    const XLEN: u32 = 64;
    const WORD_BYTES: u64 = 8;
    const PLATFORM: &'static str = "RISC-V RV64I";
    type Elf = FileHeader64<object::Endianness>;

    #[inline(always)]
    fn truncate(value: u64) -> u64 {
        value
    }
}
