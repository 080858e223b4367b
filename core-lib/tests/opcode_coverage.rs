//! Every catalogued opcode executes with the cycle count its definition promises.
#![allow(clippy::unwrap_used)]

use cpu6507::catalogue::catalogue;
use cpu6507::{AddressingMode, Cpu, CpuError, FlatMemory, StatusFlags};
use proptest::prelude::*;
use std::convert::Infallible;

const ORIGIN: u16 = 0x0200;

fn memory_with(opcode: u8, lo: u8, hi: u8) -> FlatMemory {
    let mut memory = FlatMemory::new();
    memory.load(ORIGIN, &[opcode, lo, hi]);
    memory.load(0xFFFE, &[0x00, 0x30]);
    memory
}

#[test]
fn every_defined_opcode_is_consistent() {
    for definition in catalogue().iter() {
        let mut memory = memory_with(definition.opcode, 0x10, 0x02);
        let mut cpu = Cpu::new();
        cpu.load_pc(ORIGIN);

        let trace = cpu
            .step(&mut memory)
            .unwrap_or_else(|err| panic!("{:#04X} {}: {err}", definition.opcode, definition.mnemonic));
        assert_eq!(trace.opcode, Some(definition.opcode));
        assert_eq!(
            trace.is_valid(),
            Ok(()),
            "{:#04X} {}",
            definition.opcode,
            definition.mnemonic
        );
    }
}

#[test]
fn undefined_opcodes_are_rejected() {
    let undefined = catalogue().undefined_opcodes();
    assert_eq!(undefined.len(), 8);
    for opcode in undefined {
        let mut memory = memory_with(opcode, 0x00, 0x00);
        let mut cpu = Cpu::new();
        cpu.load_pc(ORIGIN);
        match cpu.step(&mut memory) {
            Err(CpuError::UnimplementedOpcode(found)) => assert_eq!(found, opcode),
            other => panic!("{opcode:#04X}: expected an unimplemented opcode, got {other:?}"),
        }
    }
}

fn defined_opcode() -> impl Strategy<Value = u8> {
    let opcodes: Vec<u8> = catalogue().iter().map(|definition| definition.opcode).collect();
    proptest::sample::select(opcodes)
}

proptest! {
    #[test]
    fn cycle_counts_follow_definitions(
        opcode in defined_opcode(),
        lo: u8,
        hi: u8,
        a: u8,
        x: u8,
        y: u8,
        sp: u8,
        status: u8,
    ) {
        let mut memory = memory_with(opcode, lo, hi);
        let mut cpu = Cpu::new();
        cpu.load_pc(ORIGIN);
        {
            let regs = cpu.registers_mut();
            regs.a = a;
            regs.x = x;
            regs.y = y;
            regs.sp = sp;
            regs.status = StatusFlags::from_u8(status);
        }

        let mut ticks = 0;
        let trace = cpu
            .execute_instruction(&mut memory, || {
                ticks += 1;
                Ok::<(), Infallible>(())
            })
            .unwrap();
        let Some(definition) = trace.definition else {
            panic!("{opcode:#04X} retired without a definition");
        };
        let base = definition.base_cycles;

        prop_assert_eq!(ticks, trace.actual_cycles);
        prop_assert_eq!(trace.is_valid(), Ok(()));

        if definition.addressing_mode == AddressingMode::Relative {
            prop_assert!((base..=base + 2).contains(&trace.actual_cycles));
            if trace.actual_cycles > base {
                prop_assert!(trace.branch_taken);
            }
            if trace.actual_cycles == base + 2 {
                prop_assert!(trace.page_fault);
            }
        } else if definition.page_sensitive {
            prop_assert!((base..=base + 1).contains(&trace.actual_cycles));
            prop_assert_eq!(trace.actual_cycles == base + 1, trace.page_fault);
        } else {
            prop_assert_eq!(trace.actual_cycles, base);
            prop_assert!(!trace.page_fault);
        }
    }
}
