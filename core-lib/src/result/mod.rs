//! Record of the most recently executed instruction.
//!
//! A [`StepTrace`] is created fresh for every instruction, filled in as the
//! engine consumes cycles and handed to the caller once it is final. A trace
//! that comes out of a failed instruction is left partially filled so the
//! address and opcode that failed can still be reported.
use crate::catalogue::{AddressingMode, InstructionDefinition};
use std::fmt;
use thiserror::Error;

/// Decoded operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandValue {
    /// Immediate value, zero-page address or branch offset.
    U8(u8),
    /// Absolute address or indirect pointer.
    U16(u16),
}

#[allow(clippy::len_without_is_empty)]
impl OperandValue {
    /// Number of bytes the operand occupies in the instruction stream.
    pub const fn len(self) -> u8 {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
        }
    }

    /// Little-endian operand bytes as they appear in memory.
    pub fn bytes(self) -> Vec<u8> {
        match self {
            Self::U8(value) => vec![value],
            Self::U16(value) => value.to_le_bytes().to_vec(),
        }
    }
}

impl fmt::Display for OperandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(value) => write!(f, "${value:02X}"),
            Self::U16(value) => write!(f, "${value:04X}"),
        }
    }
}

/// Documented silicon quirks the engine reproduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BugKind {
    /// `JMP ($xxFF)` fetches the high byte of the target from `$xx00`.
    IndirectJmpPageWrap,
    /// A zero-page pointer fetch wrapped around within the zero page.
    IndirectAddressingWrap,
}

impl fmt::Display for BugKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IndirectJmpPageWrap => "indirect jump page wrap",
            Self::IndirectAddressingWrap => "zero page pointer wrap",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTrace {
    /// Program counter at the start of the instruction.
    pub address: u16,
    /// Opcode byte, once fetched.
    pub opcode: Option<u8>,
    /// `None` while undecoded, or when the opcode has no definition.
    pub definition: Option<&'static InstructionDefinition>,
    /// Set once the instruction has fully retired.
    pub is_final: bool,
    pub operand: Option<OperandValue>,
    /// Cycles consumed so far. Authoritative only once final.
    pub actual_cycles: u32,
    /// An addressing-mode page crossing added a cycle.
    pub page_fault: bool,
    /// A branch instruction took its branch.
    pub branch_taken: bool,
    pub bug: Option<BugKind>,
}

impl StepTrace {
    pub const fn new(address: u16) -> Self {
        Self {
            address,
            opcode: None,
            definition: None,
            is_final: false,
            operand: None,
            actual_cycles: 0,
            page_fault: false,
            branch_taken: false,
            bug: None,
        }
    }

    /// Mnemonic of the decoded instruction, `???` if undecoded.
    pub fn mnemonic(&self) -> &'static str {
        self.definition.map_or("???", |definition| definition.mnemonic)
    }

    /// Instruction bytes: opcode followed by any fetched operand bytes.
    pub fn bytecode(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.opcode.into_iter().collect();
        if let Some(operand) = self.operand {
            bytes.extend(operand.bytes());
        }
        bytes
    }

    /// Address of the instruction that follows this one.
    pub fn next_address(&self) -> u16 {
        let length = self
            .definition
            .map_or(1, |definition| u16::from(definition.byte_length));
        self.address.wrapping_add(length)
    }

    /// Branch destination for relative instructions.
    pub fn branch_target(&self) -> Option<u16> {
        match (self.definition, self.operand) {
            (Some(definition), Some(OperandValue::U8(offset))) if definition.is_branch() => {
                Some(self.next_address().wrapping_add(offset as i8 as u16))
            }
            _ => None,
        }
    }

    /// Cross-check the cycle count and operand against the definition.
    ///
    /// This is a regression tool: a failure points at an inconsistency inside
    /// the emulator rather than at the program being run.
    pub fn is_valid(&self) -> Result<(), ValidityError> {
        if !self.is_final {
            return Err(ValidityError::NotFinal {
                address: self.address,
            });
        }
        let Some(definition) = self.definition else {
            return Err(ValidityError::Undecoded {
                address: self.address,
            });
        };
        let mnemonic = definition.mnemonic;

        let expected_len = definition.byte_length - 1;
        let found_len = self.operand.map_or(0, OperandValue::len);
        if expected_len != found_len {
            return Err(ValidityError::OperandMismatch {
                mnemonic,
                expected: expected_len,
                found: found_len,
            });
        }

        let base = definition.base_cycles;
        let expected = if definition.addressing_mode == AddressingMode::Relative {
            if self.page_fault && !self.branch_taken {
                return Err(ValidityError::UnexpectedPageFault { mnemonic });
            }
            base + u32::from(self.branch_taken) + u32::from(self.page_fault)
        } else {
            if self.branch_taken {
                return Err(ValidityError::UnexpectedBranch { mnemonic });
            }
            if self.page_fault && !definition.page_sensitive {
                return Err(ValidityError::UnexpectedPageFault { mnemonic });
            }
            base + u32::from(self.page_fault)
        };

        if self.actual_cycles != expected {
            return Err(ValidityError::CycleMismatch {
                mnemonic,
                expected,
                actual: self.actual_cycles,
            });
        }
        Ok(())
    }
}

/// Internal consistency failures found by [`StepTrace::is_valid`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidityError {
    #[error("instruction at {address:#06X} has not retired")]
    NotFinal { address: u16 },
    #[error("instruction at {address:#06X} was never decoded")]
    Undecoded { address: u16 },
    #[error("{mnemonic}: expected {expected} operand bytes, found {found}")]
    OperandMismatch {
        mnemonic: &'static str,
        expected: u8,
        found: u8,
    },
    #[error("{mnemonic}: took {actual} cycles, expected {expected}")]
    CycleMismatch {
        mnemonic: &'static str,
        expected: u32,
        actual: u32,
    },
    #[error("{mnemonic}: page fault where none can occur")]
    UnexpectedPageFault { mnemonic: &'static str },
    #[error("{mnemonic}: branch taken by a non-branch instruction")]
    UnexpectedBranch { mnemonic: &'static str },
}
