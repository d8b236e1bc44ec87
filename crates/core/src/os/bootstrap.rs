//! Initial stack image construction.
//!
//! Runs exactly once, after the image is loaded and before any guest
//! instruction executes. Builds one contiguous region immediately below the
//! initial stack pointer, written in descending-address order:
//! 1. A 16-byte random canary (published through `AT_RANDOM`).
//! 2. The platform identifier string (`AT_PLATFORM`).
//! 3. A verbatim copy of the ELF program-header table (`AT_PHDR`).
//! 4. NUL-terminated copies of every argv string, then every envp string.
//! 5. The combined index block: argc, argv pointers, a null word, envp
//!    pointers, a null word, then the auxiliary vector terminated by
//!    `(AT_NULL, 0)`.
//!
//! Intermediate pushes keep 4-byte alignment; the final block lands on a
//! 16-byte boundary (ABI call-readiness) and the stack pointer is set to it,
//! pointing at argc.

use object::read::elf::FileHeader;
use rand::Rng;
use tracing::debug;

use crate::common::abi;
use crate::common::error::VmError;
use crate::common::width::Width;
use crate::config::defaults;
use crate::machine::Machine;
use crate::memory::GuestMemory;
use crate::os::auxv::AuxKey;

/// Descending-address stack writer. Every push moves the cursor down and
/// re-aligns it to 4 bytes before writing.
struct StackWriter<'m, W: Width> {
    mem: &'m mut GuestMemory<W>,
    cursor: u64,
}

impl<W: Width> StackWriter<'_, W> {
    fn push(&mut self, data: &[u8]) -> Result<u64, VmError> {
        self.cursor = self.descend(data.len() as u64)? & !0x3;
        self.mem.write_bytes(self.cursor, data)?;
        Ok(self.cursor)
    }

    /// Final move: the combined index block must be 16-byte aligned.
    fn push_aligned16(&mut self, data: &[u8]) -> Result<u64, VmError> {
        self.cursor = self.descend(data.len() as u64)? & !0xF;
        self.mem.write_bytes(self.cursor, data)?;
        Ok(self.cursor)
    }

    fn descend(&self, len: u64) -> Result<u64, VmError> {
        self.cursor.checked_sub(len).ok_or(VmError::OutOfBounds {
            addr: self.cursor,
            len,
        })
    }
}

/// Program-header table facts recorded for the auxiliary vector.
struct PhdrInfo {
    offset: u64,
    size: u64,
    entry_size: u64,
    count: u64,
}

fn phdr_info<W: Width>(image: &[u8]) -> Result<(u64, PhdrInfo), VmError> {
    let elf = W::Elf::parse(image)?;
    let endian = elf.endian()?;
    let entry_size = u64::from(elf.e_phentsize(endian));
    let count = u64::from(elf.e_phnum(endian));
    Ok((
        elf.e_entry(endian).into(),
        PhdrInfo {
            offset: elf.e_phoff(endian).into(),
            size: entry_size * count,
            entry_size,
            count,
        },
    ))
}

/// Builds the Linux-compatible initial stack image and sets the stack
/// pointer to it.
///
/// # Errors
///
/// Returns [`VmError::Image`] on a malformed ELF header and
/// [`VmError::OutOfBounds`] when the image does not leave enough stack room.
pub fn prepare_linux<W: Width>(
    machine: &mut Machine<W>,
    args: &[String],
    env: &[String],
) -> Result<(), VmError> {
    let (entry, phdr) = phdr_info::<W>(machine.memory.image())?;
    let phdr_table = machine
        .memory
        .image()
        .get(phdr.offset as usize..(phdr.offset + phdr.size) as usize)
        .ok_or(VmError::OutOfBounds {
            addr: phdr.offset,
            len: phdr.size,
        })?
        .to_vec();

    let mut writer = StackWriter {
        cursor: machine.cpu.regs.read(abi::REG_SP),
        mem: &mut machine.memory,
    };

    let mut canary = [0u8; 16];
    rand::thread_rng().fill(&mut canary[..]);
    let canary_addr = writer.push(&canary)?;

    let mut platform = W::PLATFORM.as_bytes().to_vec();
    platform.push(0);
    let platform_addr = writer.push(&platform)?;

    let phdr_addr = writer.push(&phdr_table)?;

    // Strings first, so their guest addresses are known when the index block
    // is assembled.
    let mut words: Vec<u64> = Vec::new();
    words.push(args.len() as u64);
    for arg in args {
        words.push(push_string(&mut writer, arg)?);
    }
    words.push(0);
    for var in env {
        words.push(push_string(&mut writer, var)?);
    }
    words.push(0);

    let mut aux = |key: AuxKey, value: u64| {
        words.push(key.val());
        words.push(value);
    };
    aux(AuxKey::Pagesz, defaults::PAGE_SIZE);
    aux(AuxKey::Clktck, defaults::CLOCK_TICK);
    aux(AuxKey::Phent, phdr.entry_size);
    aux(AuxKey::Phdr, phdr_addr);
    aux(AuxKey::Phnum, phdr.count);
    aux(AuxKey::Base, 0);
    aux(AuxKey::Flags, 0);
    aux(AuxKey::Entry, W::truncate(entry));
    aux(AuxKey::Hwcap, 0);
    aux(AuxKey::Uid, 0);
    aux(AuxKey::Euid, 0);
    aux(AuxKey::Gid, 0);
    aux(AuxKey::Egid, 0);
    aux(AuxKey::Secure, 1);
    aux(AuxKey::Platform, platform_addr);
    aux(AuxKey::Random, canary_addr);
    aux(AuxKey::Null, 0);

    let mut block = Vec::with_capacity(words.len() * W::WORD_BYTES as usize);
    for word in &words {
        if W::WORD_BYTES == 4 {
            block.extend_from_slice(&(*word as u32).to_le_bytes());
        } else {
            block.extend_from_slice(&word.to_le_bytes());
        }
    }
    let sp = writer.push_aligned16(&block)?;
    machine.cpu.regs.write(abi::REG_SP, sp);
    debug!(sp, block_bytes = block.len(), "process stack image built");
    Ok(())
}

fn push_string<W: Width>(writer: &mut StackWriter<'_, W>, s: &str) -> Result<u64, VmError> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    writer.push(&bytes)
}
