//! Synthetic ELF images and machine constructors.
//!
//! Real guest binaries are overkill for unit tests: the machine only reads
//! the ELF header, the program-header table, and the `PT_LOAD` segment
//! ranges. The builders here emit exactly that, byte by byte, for both guest
//! widths.

use rvbox_core::config::Config;
use rvbox_core::{Machine, Rv32, Rv64};

/// Default entry point of the synthetic images.
pub const ENTRY: u64 = 0x1_0000;

/// Code bytes placed at [`ENTRY`] in the default images.
pub const CODE: &[u8] = &[0x13, 0x00, 0x00, 0x00, 0x73, 0x00, 0x10, 0x00];

/// Installs a per-test tracing subscriber; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Builds a little-endian 32-bit RISC-V executable with the given `PT_LOAD`
/// segments (guest address, bytes).
pub fn elf32(entry: u32, segments: &[(u32, &[u8])]) -> Vec<u8> {
    const EHSIZE: u32 = 52;
    const PHENTSIZE: u32 = 32;
    let phnum = segments.len() as u32;
    let mut image = Vec::new();

    image.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
    image.extend_from_slice(&[0u8; 8]);
    image.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    image.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    image.extend_from_slice(&1u32.to_le_bytes());
    image.extend_from_slice(&entry.to_le_bytes());
    image.extend_from_slice(&EHSIZE.to_le_bytes()); // e_phoff
    image.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    image.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    image.extend_from_slice(&(EHSIZE as u16).to_le_bytes());
    image.extend_from_slice(&(PHENTSIZE as u16).to_le_bytes());
    image.extend_from_slice(&(phnum as u16).to_le_bytes());
    image.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
    image.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    image.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
    assert_eq!(image.len(), EHSIZE as usize);

    let mut offset = EHSIZE + PHENTSIZE * phnum;
    for (vaddr, data) in segments {
        let filesz = data.len() as u32;
        image.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        image.extend_from_slice(&offset.to_le_bytes());
        image.extend_from_slice(&vaddr.to_le_bytes());
        image.extend_from_slice(&vaddr.to_le_bytes()); // p_paddr
        image.extend_from_slice(&filesz.to_le_bytes());
        image.extend_from_slice(&filesz.to_le_bytes()); // p_memsz
        image.extend_from_slice(&5u32.to_le_bytes()); // R+X
        image.extend_from_slice(&4u32.to_le_bytes());
        offset += filesz;
    }
    for (_, data) in segments {
        image.extend_from_slice(data);
    }
    image
}

/// Builds a little-endian 64-bit RISC-V executable with the given `PT_LOAD`
/// segments (guest address, bytes).
pub fn elf64(entry: u64, segments: &[(u64, &[u8])]) -> Vec<u8> {
    const EHSIZE: u64 = 64;
    const PHENTSIZE: u64 = 56;
    let phnum = segments.len() as u64;
    let mut image = Vec::new();

    image.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
    image.extend_from_slice(&[0u8; 8]);
    image.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    image.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    image.extend_from_slice(&1u32.to_le_bytes());
    image.extend_from_slice(&entry.to_le_bytes());
    image.extend_from_slice(&EHSIZE.to_le_bytes()); // e_phoff
    image.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
    image.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    image.extend_from_slice(&(EHSIZE as u16).to_le_bytes());
    image.extend_from_slice(&(PHENTSIZE as u16).to_le_bytes());
    image.extend_from_slice(&(phnum as u16).to_le_bytes());
    image.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
    image.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    image.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
    assert_eq!(image.len(), EHSIZE as usize);

    let mut offset = EHSIZE + PHENTSIZE * phnum;
    for (vaddr, data) in segments {
        let filesz = data.len() as u64;
        image.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        image.extend_from_slice(&5u32.to_le_bytes()); // R+X
        image.extend_from_slice(&offset.to_le_bytes());
        image.extend_from_slice(&vaddr.to_le_bytes());
        image.extend_from_slice(&vaddr.to_le_bytes()); // p_paddr
        image.extend_from_slice(&filesz.to_le_bytes());
        image.extend_from_slice(&filesz.to_le_bytes()); // p_memsz
        image.extend_from_slice(&8u64.to_le_bytes());
        offset += filesz;
    }
    for (_, data) in segments {
        image.extend_from_slice(data);
    }
    image
}

/// A 32-bit machine loaded with the default one-segment image.
pub fn machine32() -> Machine<Rv32> {
    machine32_with(&Config::default())
}

/// A 32-bit machine with an explicit configuration.
pub fn machine32_with(config: &Config) -> Machine<Rv32> {
    init_tracing();
    let image = elf32(ENTRY as u32, &[(ENTRY as u32, CODE)]);
    Machine::new(image, config).expect("default 32-bit image must load")
}

/// A 64-bit machine loaded with the default one-segment image.
pub fn machine64() -> Machine<Rv64> {
    machine64_with(&Config::default())
}

/// A 64-bit machine with an explicit configuration.
pub fn machine64_with(config: &Config) -> Machine<Rv64> {
    init_tracing();
    let image = elf64(ENTRY, &[(ENTRY, CODE)]);
    Machine::new(image, config).expect("default 64-bit image must load")
}
