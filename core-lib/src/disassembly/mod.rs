//! Disassembly of executed and statically decoded instructions.
//!
//! [`DisasmEntry::from_trace`] renders a retired [`StepTrace`], including the
//! cycles it actually took and anything noteworthy that happened along the way.
//! [`decode_at`] and [`disassemble`] decode straight from memory through the
//! bus `peek` path, so side-effecting hardware registers are never touched.
mod symbols;

pub use symbols::{SymbolError, SymbolTable};

use crate::bus::{BusError, MemoryBus};
use crate::catalogue::{lookup, AddressingMode, Effect, InstructionDefinition};
use crate::result::{BugKind, OperandValue, StepTrace};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DisasmError {
    #[error("instruction at {address:#06X} has not retired")]
    NotFinal { address: u16 },
    #[error("opcode {opcode:#04X} at {address:#06X} is not catalogued")]
    UnknownOpcode { address: u16, opcode: u8 },
    #[error("{mnemonic} at {address:#06X}: operand does not fit its addressing mode")]
    OperandMismatch { address: u16, mnemonic: &'static str },
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// One line of disassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmEntry {
    pub address: u16,
    pub bytecode: Vec<u8>,
    pub mnemonic: &'static str,
    /// Rendered operand, empty for implied instructions.
    pub operand: String,
    /// Cycles actually consumed; `None` for statically decoded entries.
    pub cycles: Option<u32>,
    pub annotations: Vec<String>,
}

impl DisasmEntry {
    /// Render a retired instruction.
    pub fn from_trace(trace: &StepTrace, symbols: Option<&SymbolTable>) -> Result<Self, DisasmError> {
        if !trace.is_final {
            return Err(DisasmError::NotFinal {
                address: trace.address,
            });
        }
        let definition = trace.definition.ok_or(DisasmError::UnknownOpcode {
            address: trace.address,
            opcode: trace.opcode.unwrap_or_default(),
        })?;

        let mut annotations = Vec::new();
        if trace.branch_taken {
            annotations.push("branch taken".to_owned());
        }
        if trace.page_fault {
            annotations.push("page crossed".to_owned());
        }
        if let Some(bug) = trace.bug {
            annotations.push(bug.to_string());
        }

        Ok(Self {
            address: trace.address,
            bytecode: trace.bytecode(),
            mnemonic: definition.mnemonic,
            operand: render_operand(definition, trace.address, trace.operand, symbols)?,
            cycles: Some(trace.actual_cycles),
            annotations,
        })
    }

    /// Raw data byte, for opcodes the catalogue does not define.
    pub fn data(address: u16, byte: u8) -> Self {
        Self {
            address,
            bytecode: vec![byte],
            mnemonic: ".byte",
            operand: format!("${byte:02X}"),
            cycles: None,
            annotations: Vec::new(),
        }
    }

    pub fn next_address(&self) -> u16 {
        self.address.wrapping_add(self.bytecode.len() as u16)
    }
}

impl fmt::Display for DisasmEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self
            .bytecode
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let text = if self.operand.is_empty() {
            self.mnemonic.to_owned()
        } else {
            format!("{} {}", self.mnemonic, self.operand)
        };

        let mut notes: Vec<String> = self.cycles.map(|cycles| format!("{cycles} cycles")).into_iter().collect();
        notes.extend(self.annotations.iter().cloned());

        if notes.is_empty() {
            write!(f, "{:04X}  {bytes:<8}  {text}", self.address)
        } else {
            write!(f, "{:04X}  {bytes:<8}  {text:<14}; {}", self.address, notes.join(", "))
        }
    }
}

/// Decode the instruction at `addr` without executing it.
pub fn decode_at<B: MemoryBus + ?Sized>(
    bus: &B,
    addr: u16,
    symbols: Option<&SymbolTable>,
) -> Result<DisasmEntry, DisasmError> {
    let opcode = bus.peek(addr)?;
    let definition = lookup(opcode).ok_or(DisasmError::UnknownOpcode {
        address: addr,
        opcode,
    })?;

    let operand_addr = addr.wrapping_add(1);
    let operand = match definition.byte_length {
        2 => Some(OperandValue::U8(bus.peek(operand_addr)?)),
        3 => {
            let lo = bus.peek(operand_addr)?;
            let hi = bus.peek(operand_addr.wrapping_add(1))?;
            Some(OperandValue::U16(u16::from_le_bytes([lo, hi])))
        }
        _ => None,
    };

    let mut bytecode = vec![opcode];
    if let Some(operand) = operand {
        bytecode.extend(operand.bytes());
    }

    let mut annotations = Vec::new();
    if let (AddressingMode::Indirect, Some(OperandValue::U16(pointer))) = (definition.addressing_mode, operand) {
        if pointer & 0x00FF == 0x00FF {
            annotations.push(BugKind::IndirectJmpPageWrap.to_string());
        }
    }

    Ok(DisasmEntry {
        address: addr,
        bytecode,
        mnemonic: definition.mnemonic,
        operand: render_operand(definition, addr, operand, symbols)?,
        cycles: None,
        annotations,
    })
}

/// Statically decode `count` consecutive instructions starting at `start`.
///
/// Opcodes missing from the catalogue become `.byte` entries. Bus faults abort.
pub fn disassemble<B: MemoryBus + ?Sized>(
    bus: &B,
    start: u16,
    count: usize,
    symbols: Option<&SymbolTable>,
) -> Result<Vec<DisasmEntry>, DisasmError> {
    let mut entries = Vec::with_capacity(count);
    let mut addr = start;
    for _ in 0..count {
        let entry = match decode_at(bus, addr, symbols) {
            Ok(entry) => entry,
            Err(DisasmError::UnknownOpcode { address, opcode }) => DisasmEntry::data(address, opcode),
            Err(err) => return Err(err),
        };
        addr = entry.next_address();
        entries.push(entry);
    }
    Ok(entries)
}

fn render_operand(
    definition: &InstructionDefinition,
    address: u16,
    operand: Option<OperandValue>,
    symbols: Option<&SymbolTable>,
) -> Result<String, DisasmError> {
    let name = |effect: Effect, addr: u16, fallback: String| {
        symbols
            .and_then(|table| table.lookup(effect, addr))
            .map_or(fallback, str::to_owned)
    };
    let effect = definition.effect;

    let rendered = match (definition.addressing_mode, operand) {
        (AddressingMode::Implied, None) if definition.effect == Effect::ReadModifyWrite => "A".to_owned(),
        (AddressingMode::Implied, None) => String::new(),
        (AddressingMode::Immediate, Some(OperandValue::U8(value))) => format!("#${value:02X}"),
        (AddressingMode::Relative, Some(OperandValue::U8(offset))) => {
            let target = address.wrapping_add(2).wrapping_add(offset as i8 as u16);
            name(Effect::Flow, target, format!("${target:04X}"))
        }
        (AddressingMode::ZeroPage, Some(OperandValue::U8(zp))) => name(effect, u16::from(zp), format!("${zp:02X}")),
        (AddressingMode::IndexedZeroPageX, Some(OperandValue::U8(zp))) => {
            format!("{},X", name(effect, u16::from(zp), format!("${zp:02X}")))
        }
        (AddressingMode::IndexedZeroPageY, Some(OperandValue::U8(zp))) => {
            format!("{},Y", name(effect, u16::from(zp), format!("${zp:02X}")))
        }
        (AddressingMode::Absolute, Some(OperandValue::U16(addr))) => name(effect, addr, format!("${addr:04X}")),
        (AddressingMode::AbsoluteIndexedX, Some(OperandValue::U16(addr))) => {
            format!("{},X", name(effect, addr, format!("${addr:04X}")))
        }
        (AddressingMode::AbsoluteIndexedY, Some(OperandValue::U16(addr))) => {
            format!("{},Y", name(effect, addr, format!("${addr:04X}")))
        }
        // pointers are read whatever the instruction does with the target
        (AddressingMode::Indirect, Some(OperandValue::U16(pointer))) => {
            format!("({})", name(Effect::Read, pointer, format!("${pointer:04X}")))
        }
        (AddressingMode::PreIndexedIndirect, Some(OperandValue::U8(zp))) => {
            format!("({},X)", name(Effect::Read, u16::from(zp), format!("${zp:02X}")))
        }
        (AddressingMode::PostIndexedIndirect, Some(OperandValue::U8(zp))) => {
            format!("({}),Y", name(Effect::Read, u16::from(zp), format!("${zp:02X}")))
        }
        _ => {
            return Err(DisasmError::OperandMismatch {
                address,
                mnemonic: definition.mnemonic,
            })
        }
    };
    Ok(rendered)
}
