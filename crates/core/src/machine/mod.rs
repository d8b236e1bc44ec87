//! The sandboxed machine.
//!
//! This module defines the central `Machine` structure tying the subsystems
//! together. It coordinates the following:
//! 1. **State Ownership:** CPU state and guest RAM live here; the scheduler
//!    and heap arena attach through syscall handlers.
//! 2. **Syscall Dispatch:** A fixed-size handler table indexed by syscall
//!    number; handlers receive the whole machine mutably.
//! 3. **Lifecycle:** Stop flag, exit code, and teardown callbacks run once
//!    when the machine is dropped.

/// Architectural CPU state (live registers, call injection, cost counter).
pub mod cpu;
/// Guest register file and snapshots.
pub mod regs;

use std::fmt;
use std::rc::Rc;

use crate::common::abi;
use crate::common::error::VmError;
use crate::common::width::Width;
use crate::config::{Config, defaults};
use crate::memory::GuestMemory;
use crate::os::loader;

pub use cpu::CpuState;
pub use regs::Registers;

/// A syscall handler: reads arguments from the live register file and returns
/// the value to place in the result register.
///
/// Handlers that switch guest threads return the (already pending) a0 of the
/// new live register file, so the write-back preserves that thread's value.
pub type SyscallHandler<W> = Rc<dyn Fn(&mut Machine<W>) -> Result<u64, VmError>>;

/// A sandboxed RISC-V machine of guest width `W`.
///
/// Owns the CPU state, the guest RAM (including the retained ELF image), the
/// syscall handler table, and the teardown callbacks. Construction loads the
/// image's `PT_LOAD` segments and points the pc at the entry; run the process
/// bootstrap ([`crate::os::bootstrap::prepare_linux`]) before simulating.
pub struct Machine<W: Width> {
    /// Architectural CPU state.
    pub cpu: CpuState<W>,
    /// Guest RAM and the retained ELF image.
    pub memory: GuestMemory<W>,
    config: Config,
    handlers: Vec<Option<SyscallHandler<W>>>,
    teardown: Vec<Box<dyn FnOnce()>>,
    stopped: bool,
    exit_code: Option<i64>,
}

impl<W: Width> Machine<W> {
    /// Creates a machine from an ELF image and a configuration.
    ///
    /// Allocates guest RAM, copies the image's `PT_LOAD` segments into it,
    /// sets the pc to the ELF entry point, and places the initial stack
    /// pointer at the top of RAM (16-byte aligned).
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Image`] when the image is not a loadable ELF, or
    /// [`VmError::OutOfBounds`] when a segment falls outside guest RAM.
    pub fn new(image: Vec<u8>, config: &Config) -> Result<Self, VmError> {
        let mut machine = Self {
            cpu: CpuState::new(),
            memory: GuestMemory::new(config.memory.size, image),
            config: config.clone(),
            handlers: vec![None; defaults::SYSCALL_TABLE_SIZE],
            teardown: Vec::new(),
            stopped: false,
            exit_code: None,
        };
        let stack_top = W::truncate(config.memory.size) & !0xF;
        machine.cpu.regs.write(abi::REG_SP, stack_top);
        loader::load_image(&mut machine)?;
        Ok(machine)
    }

    /// This machine's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installs a handler for the given syscall number, replacing any
    /// previous handler.
    ///
    /// # Panics
    ///
    /// Panics if `number` is outside the fixed handler table.
    pub fn install_syscall_handler<F>(&mut self, number: u64, handler: F)
    where
        F: Fn(&mut Machine<W>) -> Result<u64, VmError> + 'static,
    {
        let slot = number as usize;
        assert!(slot < self.handlers.len(), "syscall number {number} out of table range");
        self.handlers[slot] = Some(Rc::new(handler));
    }

    /// Removes the handler for the given syscall number, if any.
    pub fn uninstall_syscall_handler(&mut self, number: u64) {
        if let Some(slot) = self.handlers.get_mut(number as usize) {
            *slot = None;
        }
    }

    /// Dispatches a trapped syscall.
    ///
    /// Runs the installed handler and writes its result into a0. When the
    /// handler switched guest threads, the value it returned is the new live
    /// thread's own pending a0, so the write-back changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::UnhandledSyscall`] for numbers without a handler;
    /// otherwise propagates the handler's error.
    pub fn system_call(&mut self, number: u64) -> Result<(), VmError> {
        let handler = self
            .handlers
            .get(number as usize)
            .and_then(Clone::clone)
            .ok_or(VmError::UnhandledSyscall(number))?;
        let value = handler(self)?;
        self.cpu.regs.write(abi::REG_A0, value);
        Ok(())
    }

    /// Reads syscall argument `index` (a0, a1, ...) from the live registers.
    pub fn sysarg(&self, index: usize) -> u64 {
        self.cpu.regs.read(abi::REG_A0 + index)
    }

    /// Registers a callback run exactly once when the machine is dropped.
    ///
    /// Subsystems attached through syscall handlers (scheduler, heap arena)
    /// use this to tie their lifetime to the machine's.
    pub fn add_teardown_callback<F: FnOnce() + 'static>(&mut self, callback: F) {
        self.teardown.push(Box::new(callback));
    }

    /// Stops the machine; the simulation driver must not execute further
    /// guest instructions.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether the machine has been stopped.
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Records the guest's final result (main-thread exit status).
    pub fn set_exit_code(&mut self, code: i64) {
        self.exit_code = Some(code);
    }

    /// The guest's final result, if the main thread has exited.
    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }
}

impl<W: Width> fmt::Debug for Machine<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Handler and teardown closures are opaque; report their counts.
        f.debug_struct("Machine")
            .field("cpu", &self.cpu)
            .field("memory", &self.memory)
            .field("config", &self.config)
            .field("handlers", &self.handlers.iter().flatten().count())
            .field("teardown", &self.teardown.len())
            .field("stopped", &self.stopped)
            .field("exit_code", &self.exit_code)
            .finish()
    }
}

impl<W: Width> Drop for Machine<W> {
    fn drop(&mut self) {
        for callback in self.teardown.drain(..) {
            callback();
        }
    }
}
