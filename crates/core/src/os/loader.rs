//! ELF segment loader.
//!
//! Copies a statically-linked image's `PT_LOAD` segments into guest RAM and
//! points the pc at the entry. No relocation is performed (the bootstrap
//! publishes `AT_BASE` = 0 accordingly); `p_memsz` beyond `p_filesz` is
//! already zero because guest RAM starts zeroed.

use object::elf::PT_LOAD;
use object::read::elf::{FileHeader, ProgramHeader};

use crate::common::error::VmError;
use crate::common::width::Width;
use crate::machine::Machine;

/// One loadable segment: guest address, file offset, length in bytes.
type Segment = (u64, u64, u64);

/// Loads the machine's retained ELF image into guest RAM.
///
/// # Errors
///
/// Returns [`VmError::Image`] on a malformed header and
/// [`VmError::OutOfBounds`] when a segment does not fit in RAM.
pub fn load_image<W: Width>(machine: &mut Machine<W>) -> Result<(), VmError> {
    let (entry, segments) = parse_image::<W>(machine.memory.image())?;
    for (vaddr, offset, filesz) in segments {
        machine.memory.load_from_image(vaddr, offset, filesz)?;
    }
    machine.cpu.regs.pc = W::truncate(entry);
    Ok(())
}

fn parse_image<W: Width>(data: &[u8]) -> Result<(u64, Vec<Segment>), VmError> {
    let elf = W::Elf::parse(data)?;
    let endian = elf.endian()?;
    let entry: u64 = elf.e_entry(endian).into();
    let segments = elf
        .program_headers(endian, data)?
        .iter()
        .filter(|ph| ph.p_type(endian) == PT_LOAD)
        .map(|ph| {
            (
                ph.p_vaddr(endian).into(),
                ph.p_offset(endian).into(),
                ph.p_filesz(endian).into(),
            )
        })
        .collect();
    Ok((entry, segments))
}
