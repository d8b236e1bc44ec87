//! Machine shell unit tests.
//!
//! Verifies construction, syscall dispatch through the handler table, the
//! register file contract, and lifecycle (stop flag, exit code, teardown).

use std::cell::Cell;
use std::rc::Rc;

use rvbox_core::common::VmError;
use rvbox_core::common::abi;
use rvbox_core::common::width::{Rv32, Rv64, Width};
use rvbox_core::config::Config;
use rvbox_core::machine::Registers;

use crate::common::harness;

// ══════════════════════════════════════════════════════════
// 1. Construction
// ══════════════════════════════════════════════════════════

#[test]
fn new_machine_points_pc_at_entry() {
    let m = harness::machine64();
    assert_eq!(m.cpu.regs.pc, harness::ENTRY);
}

#[test]
fn new_machine_places_sp_at_ram_top() {
    let m = harness::machine64();
    let size = Config::default().memory.size;
    assert_eq!(m.cpu.regs.read(abi::REG_SP), size & !0xF);
}

#[test]
fn rv32_machine_loads_the_same_layout() {
    let m = harness::machine32();
    assert_eq!(m.cpu.regs.pc, harness::ENTRY);
    let loaded = m.memory.read_bytes(harness::ENTRY, harness::CODE.len() as u64).unwrap();
    assert_eq!(loaded, harness::CODE);
}

#[test]
fn non_elf_image_is_rejected() {
    let err = rvbox_core::Machine::<Rv64>::new(vec![0u8; 64], &Config::default()).unwrap_err();
    assert!(matches!(err, VmError::Image(_)));
}

#[test]
fn machine_debug_output_names_the_parts() {
    // `unwrap_err` on `Result<Machine<_>, _>` needs this to hold.
    let m = harness::machine64();
    let text = format!("{m:?}");
    assert!(text.contains("Machine"));
    assert!(text.contains("cpu"));
    assert!(text.contains("memory"));
    assert!(text.contains("stopped"));
}

// ══════════════════════════════════════════════════════════
// 2. Syscall dispatch
// ══════════════════════════════════════════════════════════

#[test]
fn dispatch_runs_the_installed_handler_and_writes_a0() {
    let mut m = harness::machine64();
    m.install_syscall_handler(100, |_| Ok(42));
    m.system_call(100).unwrap();
    assert_eq!(m.cpu.regs.read(abi::REG_A0), 42);
}

#[test]
fn dispatch_without_handler_fails() {
    let mut m = harness::machine64();
    let err = m.system_call(100).unwrap_err();
    assert!(matches!(err, VmError::UnhandledSyscall(100)));
}

#[test]
fn uninstall_removes_the_handler() {
    let mut m = harness::machine64();
    m.install_syscall_handler(100, |_| Ok(1));
    m.uninstall_syscall_handler(100);
    assert!(m.system_call(100).is_err());
}

#[test]
fn sysargs_read_the_argument_registers() {
    let mut m = harness::machine64();
    m.cpu.regs.write(abi::REG_A0, 10);
    m.cpu.regs.write(abi::REG_A1, 11);
    m.cpu.regs.write(abi::REG_A2, 12);
    m.cpu.regs.write(abi::REG_A3, 13);
    assert_eq!(m.sysarg(0), 10);
    assert_eq!(m.sysarg(1), 11);
    assert_eq!(m.sysarg(2), 12);
    assert_eq!(m.sysarg(3), 13);
}

#[test]
#[should_panic(expected = "out of table range")]
fn install_beyond_the_table_panics() {
    let mut m = harness::machine64();
    m.install_syscall_handler(100_000, |_| Ok(0));
}

// ══════════════════════════════════════════════════════════
// 3. Lifecycle
// ══════════════════════════════════════════════════════════

#[test]
fn stop_flag_and_exit_code() {
    let mut m = harness::machine64();
    assert!(!m.stopped());
    assert_eq!(m.exit_code(), None);
    m.set_exit_code(7);
    m.stop();
    assert!(m.stopped());
    assert_eq!(m.exit_code(), Some(7));
}

#[test]
fn teardown_callbacks_run_once_on_drop() {
    let fired = Rc::new(Cell::new(0));
    {
        let mut m = harness::machine64();
        let flag = fired.clone();
        m.add_teardown_callback(move || flag.set(flag.get() + 1));
        assert_eq!(fired.get(), 0);
    }
    assert_eq!(fired.get(), 1);
}

// ══════════════════════════════════════════════════════════
// 4. Register file contract
// ══════════════════════════════════════════════════════════

#[test]
fn x0_is_hardwired_to_zero() {
    let mut regs = Registers::<Rv64>::new();
    regs.write(abi::REG_ZERO, 0xFFFF);
    assert_eq!(regs.read(abi::REG_ZERO), 0);
}

#[test]
fn rv32_register_writes_truncate() {
    let mut regs = Registers::<Rv32>::new();
    regs.write(abi::REG_A0, 0x1_2345_6789);
    assert_eq!(regs.read(abi::REG_A0), 0x2345_6789);
}

#[test]
fn rv64_register_writes_do_not_truncate() {
    let mut regs = Registers::<Rv64>::new();
    regs.write(abi::REG_A0, u64::MAX);
    assert_eq!(regs.read(abi::REG_A0), u64::MAX);
}

#[test]
fn setup_call_points_the_live_context() {
    let mut m = harness::machine64();
    m.cpu.set_exit_address(0x9000);
    m.cpu.setup_call(0x2000, 77);
    assert_eq!(m.cpu.regs.pc, 0x2000);
    assert_eq!(m.cpu.regs.read(abi::REG_A0), 77);
    assert_eq!(m.cpu.regs.read(abi::REG_RA), 0x9000);
}

#[test]
fn cost_counter_accumulates() {
    let mut m = harness::machine64();
    assert_eq!(m.cpu.counter(), 0);
    m.cpu.charge(10);
    m.cpu.charge(5);
    assert_eq!(m.cpu.counter(), 15);
}

#[test]
fn word_bytes_match_width() {
    assert_eq!(Rv32::WORD_BYTES, 4);
    assert_eq!(Rv64::WORD_BYTES, 8);
}
