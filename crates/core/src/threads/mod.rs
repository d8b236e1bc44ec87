//! Cooperative guest-thread scheduler.
//!
//! Guest threads are a bookkeeping illusion: there is exactly one host
//! execution context, and "switching threads" means copying the live register
//! file into the outgoing thread's saved snapshot and copying the incoming
//! thread's snapshot back. Every switch happens synchronously inside a
//! syscall-trap handler, so no locking is ever needed. This module provides:
//! 1. **Registry:** A bounded tid-keyed table of thread contexts; tid 0 is
//!    the main thread and exists for the machine's whole life.
//! 2. **Queues:** A FIFO of suspended (ready) tids and an unordered list of
//!    blocked tids tagged by an opaque reason code.
//! 3. **Operations:** clone-style creation, voluntary yield, blocking with
//!    wake-by-tid or wake-by-reason, and thread exit with child-clear-tid.
//!
//! Scheduler-invariant violations (resuming with nothing runnable, registry
//! overflow, erasing an unknown tid) are contract breaks and panic; guest
//! mistakes (yielding to an unknown tid) report -1 in the result register.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::common::abi;
use crate::common::error::VmError;
use crate::common::width::Width;
use crate::machine::cpu::CpuState;
use crate::machine::regs::Registers;
use crate::memory::GuestMemory;

/// Identifier of one guest thread. Small, monotonically assigned, never
/// reused; 0 is reserved for the main thread.
pub type Tid = i32;

/// The main thread's tid.
pub const MAIN_TID: Tid = 0;

/// Maximum number of concurrently live guest threads, main thread included.
pub const MAX_THREADS: usize = 32;

/// clone(2) flag: store the child tid at the parent-supplied address, in the
/// parent.
pub const CLONE_PARENT_SETTID: u32 = 0x0010_0000;
/// clone(2) flag: zero the child tid word when the child exits.
pub const CLONE_CHILD_CLEARTID: u32 = 0x0020_0000;
/// clone(2) flag: store the child tid at the parent-supplied address, in the
/// child. Always forced on: the child must be able to read its own tid before
/// it first runs.
pub const CLONE_CHILD_SETTID: u32 = 0x0100_0000;

/// One guest thread context.
#[derive(Debug)]
pub struct Thread<W: Width> {
    /// Scheduler-assigned identifier.
    pub tid: Tid,
    /// Thread-local storage pointer installed on activation.
    pub tls: u64,
    /// Stack pointer installed on activation.
    pub stack: u64,
    /// Guest address zeroed (as a 32-bit word) when this thread exits;
    /// 0 means none.
    pub clear_tid: u64,
    /// The current or last reason this thread blocked for. Undefined until
    /// the thread first blocks.
    pub block_reason: i32,
    // Saved register snapshot; meaningful once the thread has run at least
    // once. The current thread's snapshot is implicitly the live file.
    regs: Registers<W>,
}

impl<W: Width> Thread<W> {
    fn new(tid: Tid, tls: u64, stack: u64) -> Self {
        Self {
            tid,
            tls,
            stack,
            clear_tid: 0,
            block_reason: 0,
            regs: Registers::new(),
        }
    }

    /// The saved register snapshot. Valid once the thread has suspended or
    /// blocked at least once.
    pub fn saved_regs(&self) -> &Registers<W> {
        &self.regs
    }
}

/// The guest-thread scheduler: registry, queues, and the current tid.
///
/// Exactly one thread is current at all times; its tid appears in neither
/// the suspended FIFO nor the blocked list.
#[derive(Debug)]
pub struct Scheduler<W: Width> {
    threads: BTreeMap<Tid, Thread<W>>,
    suspended: VecDeque<Tid>,
    blocked: Vec<Tid>,
    current: Tid,
    next_tid: Tid,
}

impl<W: Width> Scheduler<W> {
    /// Creates a scheduler whose main thread (tid 0) adopts the live register
    /// file; its stack pointer is read from `cpu`.
    pub fn new(cpu: &CpuState<W>) -> Self {
        let mut main = Thread::new(MAIN_TID, 0, 0);
        main.stack = cpu.regs.read(abi::REG_SP);
        let mut threads = BTreeMap::new();
        threads.insert(MAIN_TID, main);
        Self {
            threads,
            suspended: VecDeque::new(),
            blocked: Vec::new(),
            current: MAIN_TID,
            next_tid: 1,
        }
    }

    /// Tid of the current thread.
    pub fn current_tid(&self) -> Tid {
        self.current
    }

    /// The current thread's context.
    ///
    /// # Panics
    ///
    /// Panics if the registry lost the current thread, which would mean a
    /// broken scheduler invariant.
    pub fn current(&self) -> &Thread<W> {
        self.threads
            .get(&self.current)
            .unwrap_or_else(|| panic!("current tid {} missing from registry", self.current))
    }

    /// Looks up a thread by tid.
    pub fn get(&self, tid: Tid) -> Option<&Thread<W>> {
        self.threads.get(&tid)
    }

    /// Number of live threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Always false: the main thread is never erased while the machine runs.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Tids currently parked in the suspended FIFO, in resume order.
    pub fn suspended_order(&self) -> impl Iterator<Item = Tid> + '_ {
        self.suspended.iter().copied()
    }

    /// Tids currently blocked, in blocking order.
    pub fn blocked_order(&self) -> impl Iterator<Item = Tid> + '_ {
        self.blocked.iter().copied()
    }

    /// Creates a new thread context (clone emulation).
    ///
    /// `CLONE_CHILD_SETTID` is forced on regardless of `flags`, so the new
    /// tid is guest-visible at `ctid` before the child first runs.
    /// `CLONE_PARENT_SETTID` additionally stores the tid at `ptid`, and
    /// `CLONE_CHILD_CLEARTID` schedules `ctid` to be zeroed on exit.
    ///
    /// The new thread is registered but neither current, suspended, nor
    /// blocked; the caller decides who runs next (see the clone handler).
    ///
    /// # Errors
    ///
    /// Propagates guest-memory errors from the tid stores.
    ///
    /// # Panics
    ///
    /// Panics when the registry is at capacity; threads are never evicted.
    pub fn create(
        &mut self,
        mem: &mut GuestMemory<W>,
        flags: u32,
        ctid: u64,
        ptid: u64,
        stack: u64,
        tls: u64,
    ) -> Result<Tid, VmError> {
        assert!(
            self.threads.len() < MAX_THREADS,
            "guest thread registry is full ({MAX_THREADS} live threads)"
        );
        let flags = flags | CLONE_CHILD_SETTID;
        let tid = self.next_tid;
        self.next_tid += 1;

        let mut thread = Thread::new(tid, tls, stack);
        if flags & CLONE_CHILD_SETTID != 0 {
            mem.write_u32(ctid, tid as u32)?;
        }
        if flags & CLONE_PARENT_SETTID != 0 {
            mem.write_u32(ptid, tid as u32)?;
        }
        if flags & CLONE_CHILD_CLEARTID != 0 {
            thread.clear_tid = ctid;
        }
        trace!(tid, stack, tls, "created guest thread");
        self.threads.insert(tid, thread);
        Ok(tid)
    }

    /// Snapshots the live register file into the current thread and appends
    /// it to the tail of the suspended FIFO (first suspended, first resumed).
    pub fn suspend(&mut self, cpu: &CpuState<W>) {
        let tid = self.current;
        let snapshot = cpu.snapshot();
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.regs = snapshot;
        }
        self.suspended.push_back(tid);
    }

    /// Like [`suspend`](Self::suspend), but also pre-sets the snapshot's a0,
    /// so the thread observes `retval` when later resumed.
    pub fn suspend_with(&mut self, cpu: &CpuState<W>, retval: u64) {
        self.suspend(cpu);
        if let Some(thread) = self.threads.get_mut(&self.current) {
            thread.regs.write(abi::REG_A0, retval);
        }
    }

    /// Snapshots the current thread into the blocked list, tagged `reason`.
    pub fn park_blocked(&mut self, cpu: &CpuState<W>, reason: i32) {
        let tid = self.current;
        let snapshot = cpu.snapshot();
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.regs = snapshot;
            thread.block_reason = reason;
        }
        self.blocked.push(tid);
    }

    /// Like [`park_blocked`](Self::park_blocked), additionally pre-setting
    /// the snapshot's a0 to `retval`.
    pub fn park_blocked_with(&mut self, cpu: &CpuState<W>, reason: i32, retval: u64) {
        self.park_blocked(cpu, reason);
        if let Some(thread) = self.threads.get_mut(&self.current) {
            thread.regs.write(abi::REG_A0, retval);
        }
    }

    /// Installs `tid`'s saved snapshot as the live register file and marks it
    /// current.
    ///
    /// # Panics
    ///
    /// Panics on an unknown tid; callers resolve guest-supplied tids first.
    pub fn resume(&mut self, cpu: &mut CpuState<W>, tid: Tid) {
        let thread = self
            .threads
            .get(&tid)
            .unwrap_or_else(|| panic!("resume of unregistered tid {tid}"));
        trace!(tid, tls = thread.tls, stack = thread.stack, "resuming guest thread");
        cpu.restore(thread.regs);
        self.current = tid;
    }

    /// Makes a brand-new thread current by writing its stack and TLS pointers
    /// directly into the live register file.
    ///
    /// Only valid for a thread that has never run: there is no snapshot to
    /// restore yet, and the caller follows up with an injected call.
    pub fn activate(&mut self, cpu: &mut CpuState<W>, tid: Tid) {
        let thread = self
            .threads
            .get(&tid)
            .unwrap_or_else(|| panic!("activate of unregistered tid {tid}"));
        cpu.regs.write(abi::REG_SP, thread.stack);
        cpu.regs.write(abi::REG_TP, thread.tls);
        self.current = tid;
    }

    /// Pops the head of the suspended FIFO and resumes it.
    ///
    /// # Panics
    ///
    /// Panics when the FIFO is empty: every path that parks the current
    /// thread must only do so when another thread is known ready.
    pub fn wakeup_next(&mut self, cpu: &mut CpuState<W>) {
        let Some(next) = self.suspended.pop_front() else {
            panic!("scheduler has no runnable guest thread to resume");
        };
        self.resume(cpu, next);
    }

    /// sched_yield semantics: parks the current thread (future return value
    /// 0) and resumes the FIFO head.
    ///
    /// When no other thread is ready this is a no-op that just sets a0 to 0,
    /// skipping the snapshot/restore round trip. Returns whether a switch
    /// occurred.
    pub fn suspend_and_yield(&mut self, cpu: &mut CpuState<W>) -> bool {
        if self.suspended.is_empty() {
            cpu.regs.write(abi::REG_A0, 0);
            return false;
        }
        self.suspend_with(cpu, 0);
        self.wakeup_next(cpu);
        true
    }

    /// Forces a switch to `tid`.
    ///
    /// Unknown tids are a guest-visible soft failure (a0 = -1, no switch);
    /// yielding to oneself sets a0 = 0 and does nothing. Otherwise the
    /// current thread suspends (future return value 0) and the target is
    /// resumed, whether or not it was actually parked; switching to a blocked
    /// thread is the guest's responsibility. Returns whether a switch
    /// occurred.
    pub fn yield_to(&mut self, cpu: &mut CpuState<W>, tid: Tid) -> bool {
        if !self.threads.contains_key(&tid) {
            cpu.regs.write(abi::REG_A0, (-1i64) as u64);
            return false;
        }
        if tid == self.current {
            cpu.regs.write(abi::REG_A0, 0);
            return false;
        }
        self.suspend_with(cpu, 0);
        self.suspended.retain(|t| *t != tid);
        self.blocked.retain(|t| *t != tid);
        self.resume(cpu, tid);
        true
    }

    /// Blocks the current thread under `reason` and resumes the FIFO head.
    ///
    /// The blocked thread's future return value is `reason` itself; a thread
    /// later woken out of this state observes `reason`, not 0. That
    /// asymmetry with [`unblock`](Self::unblock) mirrors the emulated ABI.
    ///
    /// # Panics
    ///
    /// Panics when no other thread is ready: a blocked thread has nothing to
    /// yield to.
    pub fn block(&mut self, cpu: &mut CpuState<W>, reason: i32) -> bool {
        assert!(
            !self.suspended.is_empty(),
            "a blocked guest thread has nothing to yield to"
        );
        self.park_blocked_with(cpu, reason, reason as i64 as u64);
        self.wakeup_next(cpu);
        true
    }

    /// Wakes the blocked thread with exactly this `tid`.
    ///
    /// On a match the current thread suspends (future return value 0) and
    /// the target resumes; on no match a0 is set to -1 and nothing changes.
    pub fn unblock(&mut self, cpu: &mut CpuState<W>, tid: Tid) {
        if let Some(pos) = self.blocked.iter().position(|t| *t == tid) {
            self.suspend_with(cpu, 0);
            let woken = self.blocked.remove(pos);
            self.resume(cpu, woken);
        } else {
            cpu.regs.write(abi::REG_A0, (-1i64) as u64);
        }
    }

    /// Wakes the earliest-blocked thread whose reason matches.
    ///
    /// At most one thread wakes per call. Returns whether any thread was
    /// woken; on no match nothing changes.
    pub fn wakeup_blocked(&mut self, cpu: &mut CpuState<W>, reason: i32) -> bool {
        let matched = self.blocked.iter().position(|t| {
            self.threads
                .get(t)
                .is_some_and(|thread| thread.block_reason == reason)
        });
        let Some(pos) = matched else {
            return false;
        };
        self.suspend_with(cpu, 0);
        let woken = self.blocked.remove(pos);
        self.resume(cpu, woken);
        true
    }

    /// Destroys a thread.
    ///
    /// Zeroes the thread's `clear_tid` word if set and erases the registry
    /// entry. When the exiting thread was current, a successor is resumed via
    /// [`wakeup_next`](Self::wakeup_next) (fatal if nothing is ready: the CPU
    /// must always have an active context). Exiting a non-current thread
    /// performs no switch.
    ///
    /// # Errors
    ///
    /// Propagates guest-memory errors from the `clear_tid` store.
    ///
    /// # Panics
    ///
    /// Panics on an unregistered tid, on tid 0 (the main thread lives for
    /// the machine's whole life; its exit stops the machine instead, see the
    /// exit syscall handler), or when the current thread exits with no
    /// runnable successor.
    pub fn exit(
        &mut self,
        cpu: &mut CpuState<W>,
        mem: &mut GuestMemory<W>,
        tid: Tid,
    ) -> Result<(), VmError> {
        assert_ne!(tid, MAIN_TID, "the main guest thread is never erased");
        let Some(thread) = self.threads.remove(&tid) else {
            panic!("exit of unregistered tid {tid}");
        };
        if thread.clear_tid != 0 {
            trace!(tid, clear_tid = thread.clear_tid, "zeroing thread tid word");
            mem.write_u32(thread.clear_tid, 0)?;
        }
        self.suspended.retain(|t| *t != tid);
        self.blocked.retain(|t| *t != tid);
        trace!(tid, "guest thread exited");
        if tid == self.current {
            self.wakeup_next(cpu);
        }
        Ok(())
    }
}
