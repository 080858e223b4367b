//! Short programs run end to end on a freshly reset CPU.
#![allow(clippy::unwrap_used)]

use cpu6507::{BugKind, Cpu, CpuConfig, FlatMemory, MemoryBus, ResetMode};
use pretty_assertions::assert_eq;

fn run(program: &[u8], steps: usize) -> (Cpu, FlatMemory) {
    let mut memory = FlatMemory::new();
    memory.load(0x0000, program);
    let mut cpu = Cpu::new();
    for _ in 0..steps {
        let trace = cpu.step(&mut memory).unwrap();
        assert_eq!(trace.is_valid(), Ok(()), "{trace:?}");
    }
    (cpu, memory)
}

#[test]
fn flag_instructions() {
    let (cpu, _) = run(&[0x38, 0x18, 0x78, 0xF8, 0xD8, 0xB8], 6);
    assert_eq!(cpu.registers().status.to_string(), "sv-BdIzc");
}

#[test]
fn compare_sets_sign_and_carry() {
    let (cpu, _) = run(&[0xA9, 0xF6, 0xC9, 0x18], 2);
    assert_eq!(cpu.registers().status.to_string(), "Sv-BdizC");
}

#[test]
fn indirect_jump_wraps_within_page() {
    let mut memory = FlatMemory::new();
    memory.load(0x0000, &[0x6C, 0xFF, 0x01]);
    memory.load(0x01FF, &[0x03]);
    memory.load(0x0100, &[0x00]);
    memory.load(0x0200, &[0xEE]);

    let mut cpu = Cpu::new();
    let trace = cpu.step(&mut memory).unwrap();
    assert_eq!(cpu.registers().pc, 0x0003);
    assert_eq!(trace.bug, Some(BugKind::IndirectJmpPageWrap));
    assert_eq!(trace.actual_cycles, 5);
}

#[test]
fn subroutine_call_and_return() {
    let mut memory = FlatMemory::new();
    memory.load(0x0000, &[0x20, 0x00, 0x01]);
    memory.load(0x0100, &[0x60]);
    let mut cpu = Cpu::new();
    let sp = cpu.registers().sp;

    let trace = cpu.step(&mut memory).unwrap();
    assert_eq!(trace.actual_cycles, 6);
    assert_eq!(cpu.registers().pc, 0x0100);
    assert_eq!(cpu.registers().sp, sp.wrapping_sub(2));
    // return address minus one: high byte pushed first
    assert_eq!(memory.peek(0x01FE), Ok(0x02));
    assert_eq!(memory.peek(0x01FF), Ok(0x00));

    let trace = cpu.step(&mut memory).unwrap();
    assert_eq!(trace.actual_cycles, 6);
    assert_eq!(cpu.registers().pc, 0x0003);
    assert_eq!(cpu.registers().sp, sp);
}

#[test]
fn reset_is_idempotent() {
    for reset in [ResetMode::Fixed(0xFD), ResetMode::Randomized { seed: 42 }] {
        let mut cpu = Cpu::with_config(CpuConfig {
            reset,
            ..CpuConfig::default()
        });
        cpu.reset();
        let first = *cpu.registers();
        cpu.reset();
        assert_eq!(*cpu.registers(), first);
    }
}

#[test]
fn countdown_loop() {
    // LDX #$05; loop: DEX; BNE loop; BRK
    let mut memory = FlatMemory::new();
    memory.load(0x0000, &[0xA2, 0x05, 0xCA, 0xD0, 0xFD, 0x00]);
    memory.load(0xFFFE, &[0x00, 0x10]);
    let mut cpu = Cpu::new();

    let mut cycles = 0;
    while cpu.registers().pc != 0x1000 {
        cycles += cpu.step(&mut memory).unwrap().actual_cycles;
    }
    assert_eq!(cpu.registers().x, 0);
    // LDX 2, DEX 5 * 2, BNE 4 * 3 + 2, BRK 7
    assert_eq!(cycles, 2 + 10 + 14 + 7);
}

#[test]
fn mirrored_address_space() {
    // the 6507 sees 0x1000 and 0xF000 as the same cartridge byte
    let mut memory = FlatMemory::mos6507();
    memory.load(0xF000, &[0xA9, 0x99, 0x85, 0x80, 0x4C, 0x00, 0xF0]);
    memory.load(0xFFFC, &[0x00, 0xF0]);

    let mut cpu = Cpu::new();
    cpu.load_reset_vector(&mut memory).unwrap();
    assert_eq!(cpu.registers().pc, 0xF000);
    assert_eq!(memory.peek(0x1000), Ok(0xA9));

    for _ in 0..3 {
        cpu.step(&mut memory).unwrap();
    }
    assert_eq!(cpu.registers().pc, 0xF000);
    assert_eq!(memory.peek(0x0080), Ok(0x99));
}
