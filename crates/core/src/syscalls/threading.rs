//! Threading syscall group.
//!
//! Seven handlers at the configured threads base:
//!
//! | offset | operation         | a0..a3                      |
//! |--------|-------------------|-----------------------------|
//! | +0     | clone             | stack, entry, tls, flags    |
//! | +1     | exit              | status                      |
//! | +2     | sched_yield       |                             |
//! | +3     | yield_to          | tid                         |
//! | +4     | block             | reason                      |
//! | +5     | unblock_by_reason | reason                      |
//! | +6     | unblock_by_tid    | tid                         |
//!
//! Handlers that switch guest threads return the new live register file's
//! (already pending) a0, so the machine's result write-back preserves the
//! incoming thread's value.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::common::abi;
use crate::common::width::Width;
use crate::machine::Machine;
use crate::threads::{CLONE_PARENT_SETTID, MAIN_TID, Scheduler, Tid};

/// Installs the threading syscall group on `machine` at its configured
/// threads base and returns the shared scheduler.
///
/// The scheduler adopts the machine's current register file as the main
/// thread (tid 0), so the process bootstrap must have run first if the main
/// thread's stack pointer is to be meaningful.
pub fn setup_threading_syscalls<W: Width>(machine: &mut Machine<W>) -> Rc<RefCell<Scheduler<W>>> {
    let base = machine.config().syscall.threads_base;
    let scheduler = Rc::new(RefCell::new(Scheduler::new(&machine.cpu)));

    // clone(stack, entry, tls, flags): the child runs first. The parent
    // suspends with the child's tid pending; the child gets an injected call
    // entry(tls) on its own stack. The child's tid word lives at its tls
    // base, which doubles as the ctid address. This four-argument ABI
    // carries no ptid, so the parent-settid flag is masked off; the child
    // stack is aligned down to the 16-byte ABI boundary.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base, move |m| {
        let stack = m.sysarg(0) & !0xF;
        let entry = m.sysarg(1);
        let tls = m.sysarg(2);
        let flags = m.sysarg(3) as u32 & !CLONE_PARENT_SETTID;
        let mut sched = sched.borrow_mut();
        let child = sched.create(&mut m.memory, flags, tls, 0, stack, tls)?;
        trace!(child, entry, "clone: switching to new guest thread");
        sched.suspend_with(&m.cpu, child as u64);
        sched.activate(&mut m.cpu, child);
        m.cpu.setup_call(entry, tls);
        Ok(m.cpu.regs.read(abi::REG_A0))
    });

    // exit(status): main thread stops the machine; any other thread is
    // destroyed and a successor resumes.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base + 1, move |m| {
        let status = m.sysarg(0) as i64;
        let mut sched = sched.borrow_mut();
        let tid = sched.current_tid();
        if tid == MAIN_TID {
            trace!(status, "main guest thread exited; stopping machine");
            m.set_exit_code(status);
            m.stop();
            return Ok(status as u64);
        }
        sched.exit(&mut m.cpu, &mut m.memory, tid)?;
        Ok(m.cpu.regs.read(abi::REG_A0))
    });

    // sched_yield(): round-robin to the FIFO head, or a 0-result no-op when
    // the current thread is alone.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base + 2, move |m| {
        sched.borrow_mut().suspend_and_yield(&mut m.cpu);
        Ok(m.cpu.regs.read(abi::REG_A0))
    });

    // yield_to(tid): forced switch; unknown tids are a soft -1.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base + 3, move |m| {
        let tid = m.sysarg(0) as i64 as Tid;
        sched.borrow_mut().yield_to(&mut m.cpu, tid);
        Ok(m.cpu.regs.read(abi::REG_A0))
    });

    // block(reason): the blocked thread's pending return value is the reason
    // itself, observed again when it is later woken.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base + 4, move |m| {
        let reason = m.sysarg(0) as i64 as i32;
        sched.borrow_mut().block(&mut m.cpu, reason);
        Ok(m.cpu.regs.read(abi::REG_A0))
    });

    // unblock_by_reason(reason): wakes the earliest match, -1 when nothing
    // is blocked under that reason.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base + 5, move |m| {
        let reason = m.sysarg(0) as i64 as i32;
        if sched.borrow_mut().wakeup_blocked(&mut m.cpu, reason) {
            Ok(m.cpu.regs.read(abi::REG_A0))
        } else {
            Ok((-1i64) as u64)
        }
    });

    // unblock_by_tid(tid): -1 when that tid is not blocked.
    let sched = scheduler.clone();
    machine.install_syscall_handler(base + 6, move |m| {
        let tid = m.sysarg(0) as i64 as Tid;
        sched.borrow_mut().unblock(&mut m.cpu, tid);
        Ok(m.cpu.regs.read(abi::REG_A0))
    });

    let held = scheduler.clone();
    machine.add_teardown_callback(move || drop(held));
    scheduler
}
