//! Heap and bulk-memory syscall group.
//!
//! Eight handlers at the configured heap base:
//!
//! | offset | operation       | a0..a2            |
//! |--------|-----------------|-------------------|
//! | +0     | malloc          | size              |
//! | +1     | calloc          | count, size       |
//! | +2     | meminfo         | dst               |
//! | +3     | free            | addr              |
//! | +4     | memcpy          | dst, src, len     |
//! | +5     | memset          | dst, value, len   |
//! | +6     | memmove         | dst, src, len     |
//! | +7     | print-backtrace |                   |
//!
//! The bulk operations come in two flavors selected by
//! `config.syscall.trusted_memory`: trusted mode moves bytes through the
//! guest RAM's block primitives, untrusted mode walks bounds-checked loops
//! that validate every intermediate address. Both stay inside guest RAM.
//! memcpy/memmove bill the cost counter 2x the byte count, memset 1x.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::common::abi;
use crate::common::error::VmError;
use crate::common::width::Width;
use crate::heap::Arena;
use crate::machine::Machine;

/// Installs the allocator syscalls (heap base +0..3) and returns the shared
/// arena, placed per the machine's heap configuration.
pub fn setup_heap_syscalls<W: Width>(machine: &mut Machine<W>) -> Rc<RefCell<Arena>> {
    let base = machine.config().syscall.heap_base;
    let heap = &machine.config().heap;
    let arena = Rc::new(RefCell::new(Arena::new(
        heap.arena_base,
        heap.arena_base + heap.arena_size,
    )));

    // malloc(size): guest address of the block, 0 on exhaustion.
    let shared = arena.clone();
    machine.install_syscall_handler(base, move |m| {
        Ok(shared.borrow_mut().malloc(m.sysarg(0)))
    });

    // calloc(count, size): like malloc(count * size) with the block zeroed;
    // 0 on overflow or exhaustion.
    let shared = arena.clone();
    machine.install_syscall_handler(base + 1, move |m| {
        let Some(total) = m.sysarg(0).checked_mul(m.sysarg(1)) else {
            return Ok(0);
        };
        let addr = shared.borrow_mut().malloc(total);
        if addr != 0 {
            m.memory.fill(addr, total, 0)?;
        }
        Ok(addr)
    });

    // meminfo(dst): stores {bytes_free, bytes_used, chunks_used} as three
    // consecutive u32 at dst; -1 when dst is null.
    let shared = arena.clone();
    machine.install_syscall_handler(base + 2, move |m| {
        let dst = m.sysarg(0);
        if dst == 0 {
            return Ok((-1i64) as u64);
        }
        let arena = shared.borrow();
        m.memory.write_u32(dst, arena.bytes_free() as u32)?;
        m.memory.write_u32(dst + 4, arena.bytes_used() as u32)?;
        m.memory.write_u32(dst + 8, arena.chunks_used() as u32)?;
        Ok(0)
    });

    // free(addr): 0 on success, -1 when addr is not a live allocation.
    let shared = arena.clone();
    machine.install_syscall_handler(base + 3, move |m| {
        Ok(shared.borrow_mut().free(m.sysarg(0)) as i64 as u64)
    });

    let held = arena.clone();
    machine.add_teardown_callback(move || drop(held));
    arena
}

/// Installs the bulk memory operations (heap base +4..7).
pub fn setup_memory_syscalls<W: Width>(machine: &mut Machine<W>) {
    let base = machine.config().syscall.heap_base;
    let trusted = machine.config().syscall.trusted_memory;

    machine.install_syscall_handler(base + 4, move |m| {
        let (dst, src, len) = (m.sysarg(0), m.sysarg(1), m.sysarg(2));
        m.cpu.charge(2 * len);
        if trusted {
            m.memory.copy_within(dst, src, len)?;
        } else {
            copy_checked(m, dst, src, len)?;
        }
        Ok(dst)
    });

    machine.install_syscall_handler(base + 5, move |m| {
        let (dst, value, len) = (m.sysarg(0), m.sysarg(1) as u8, m.sysarg(2));
        m.cpu.charge(len);
        if trusted {
            m.memory.fill(dst, len, value)?;
        } else {
            for i in 0..len {
                m.memory.write_u8(dst + i, value)?;
            }
        }
        Ok(dst)
    });

    machine.install_syscall_handler(base + 6, move |m| {
        let (dst, src, len) = (m.sysarg(0), m.sysarg(1), m.sysarg(2));
        m.cpu.charge(2 * len);
        if trusted {
            m.memory.copy_within(dst, src, len)?;
        } else {
            move_checked(m, dst, src, len)?;
        }
        Ok(dst)
    });

    // print-backtrace: reports where the guest currently is, with a full
    // register dump on stderr. Purely diagnostic; always succeeds.
    machine.install_syscall_handler(base + 7, move |m| {
        let ra = m.cpu.regs.read(abi::REG_RA);
        let pc = m.cpu.regs.pc;
        debug!(ra = format_args!("{ra:#x}"), pc = format_args!("{pc:#x}"), "guest backtrace");
        m.cpu.regs.dump();
        Ok(0)
    });
}

/// Bounds-checked memcpy: byte prologue up to source word alignment, a
/// 16-byte unrolled stretch, a word loop, then a byte epilogue.
fn copy_checked<W: Width>(
    m: &mut Machine<W>,
    mut dst: u64,
    mut src: u64,
    mut len: u64,
) -> Result<(), VmError> {
    while src & 3 != 0 && len > 0 {
        let b = m.memory.read_u8(src)?;
        m.memory.write_u8(dst, b)?;
        src += 1;
        dst += 1;
        len -= 1;
    }
    while len >= 16 {
        for i in (0..16).step_by(4) {
            let w = m.memory.read_u32(src + i)?;
            m.memory.write_u32(dst + i, w)?;
        }
        src += 16;
        dst += 16;
        len -= 16;
    }
    while len >= 4 {
        let w = m.memory.read_u32(src)?;
        m.memory.write_u32(dst, w)?;
        src += 4;
        dst += 4;
        len -= 4;
    }
    while len > 0 {
        let b = m.memory.read_u8(src)?;
        m.memory.write_u8(dst, b)?;
        src += 1;
        dst += 1;
        len -= 1;
    }
    Ok(())
}

/// Bounds-checked memmove: copies forward when the source lies above the
/// destination, backward otherwise, so overlapping ranges never read bytes
/// already overwritten.
fn move_checked<W: Width>(
    m: &mut Machine<W>,
    dst: u64,
    src: u64,
    len: u64,
) -> Result<(), VmError> {
    if src > dst {
        for i in 0..len {
            let b = m.memory.read_u8(src + i)?;
            m.memory.write_u8(dst + i, b)?;
        }
    } else {
        for i in (0..len).rev() {
            let b = m.memory.read_u8(src + i)?;
            m.memory.write_u8(dst + i, b)?;
        }
    }
    Ok(())
}
