//! Guest register file.
//!
//! This module implements the general-purpose register file for the sandboxed
//! CPU. It performs the following:
//! 1. **Storage:** Maintains 32 integer registers (`x0`-`x31`) plus the pc.
//! 2. **Invariant Enforcement:** Register `x0` is hardwired to zero and every
//!    write is truncated to the configured guest width.
//! 3. **Snapshotting:** The whole file is a plain `Copy` value, so a suspended
//!    guest thread's continuation is just a stored `Registers<W>`.

use std::marker::PhantomData;

use crate::common::width::Width;

/// Guest register file: 32 general-purpose registers and the program counter.
///
/// Values are stored as `u64` regardless of the guest width; writes are masked
/// through [`Width::truncate`]. The type is `Copy`, which is what makes the
/// scheduler's register-snapshot-as-continuation design work: saving a thread
/// is one struct copy, resuming it is one copy back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registers<W: Width> {
    regs: [u64; 32],
    /// Program counter.
    pub pc: u64,
    _width: PhantomData<W>,
}

impl<W: Width> Registers<W> {
    /// Creates a register file with all registers and the pc set to zero.
    pub fn new() -> Self {
        Self {
            regs: [0; 32],
            pc: 0,
            _width: PhantomData,
        }
    }

    /// Reads a general-purpose register. Register `x0` always returns 0.
    pub fn read(&self, idx: usize) -> u64 {
        if idx == 0 { 0 } else { self.regs[idx] }
    }

    /// Writes a general-purpose register, truncated to the guest width.
    /// Writes to `x0` are ignored.
    pub fn write(&mut self, idx: usize, val: u64) {
        if idx != 0 {
            self.regs[idx] = W::truncate(val);
        }
    }

    /// Dumps the register contents for diagnostics.
    pub fn dump(&self) {
        eprintln!("pc ={:#018x}", self.pc);
        for i in (0..32).step_by(2) {
            eprintln!(
                "x{:<2}={:#018x} x{:<2}={:#018x}",
                i,
                self.regs[i],
                i + 1,
                self.regs[i + 1]
            );
        }
    }
}

impl<W: Width> Default for Registers<W> {
    fn default() -> Self {
        Self::new()
    }
}
