//! CPU state for one host execution context.
//!
//! This module defines the architectural state the scheduler multiplexes
//! guest threads over. It coordinates the following:
//! 1. **Registers:** The live register file, swapped wholesale on every switch.
//! 2. **Call Injection:** `setup_call` points the live context at a guest
//!    function without executing any instructions.
//! 3. **Cost Accounting:** A chargeable counter the bulk-memory syscalls bill
//!    in proportion to bytes moved.

use crate::common::abi;
use crate::common::width::Width;
use crate::machine::regs::Registers;

/// Architectural CPU state: the one live register file plus cost accounting.
///
/// Exactly one guest thread owns this state at any time; all the others hold
/// saved [`Registers`] snapshots inside the scheduler.
#[derive(Debug)]
pub struct CpuState<W: Width> {
    /// Live register file. Mutated directly by the scheduler on every switch.
    pub regs: Registers<W>,
    counter: u64,
    exit_address: u64,
}

impl<W: Width> CpuState<W> {
    /// Creates CPU state with zeroed registers and counter.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            counter: 0,
            exit_address: 0,
        }
    }

    /// Takes an opaque snapshot of the live register file.
    pub fn snapshot(&self) -> Registers<W> {
        self.regs
    }

    /// Replaces the live register file with a previously taken snapshot.
    pub fn restore(&mut self, snapshot: Registers<W>) {
        self.regs = snapshot;
    }

    /// Points the live context at `addr` with a single argument in a0.
    ///
    /// Executes no instructions: the pc, a0, and ra are set so the next
    /// simulation step enters the function as if it had just been called.
    /// The return address is the machine's exit stub.
    pub fn setup_call(&mut self, addr: u64, arg: u64) {
        self.regs.pc = W::truncate(addr);
        self.regs.write(abi::REG_A0, arg);
        self.regs.write(abi::REG_RA, self.exit_address);
    }

    /// Sets the address injected calls return to.
    pub fn set_exit_address(&mut self, addr: u64) {
        self.exit_address = W::truncate(addr);
    }

    /// Bills `cost` units against the machine's operation counter.
    pub fn charge(&mut self, cost: u64) {
        self.counter = self.counter.wrapping_add(cost);
    }

    /// Current value of the operation cost counter.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl<W: Width> Default for CpuState<W> {
    fn default() -> Self {
        Self::new()
    }
}
