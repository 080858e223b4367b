//! Cycle-by-cycle execution of a single instruction.
//!
//! Every bus access costs one cycle, and so does every internal cycle. The final
//! memory access of an instruction is placed on its last cycle: the engine pads
//! with internal cycles up to that point, so writes land where the hardware puts
//! them.
use super::alu;
use super::registers::StatusFlags;
use super::{Cpu, CpuError, Phase, BRK_VECTOR};
use crate::bus::{BusError, MemoryBus};
use crate::catalogue::{lookup, AddressingMode, InstructionDefinition, Operation};
use crate::result::{BugKind, OperandValue};
use tracing::{trace, warn};

/// Where an instruction's operand lives once addressing is resolved.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Implied instructions; shifts and rotates act on the accumulator.
    Accumulator,
    Immediate(u8),
    ZeroPage(u8),
    Address(u16),
}

impl Target {
    fn address(self) -> Option<u16> {
        match self {
            Self::ZeroPage(zp) => Some(u16::from(zp)),
            Self::Address(addr) => Some(addr),
            Self::Accumulator | Self::Immediate(_) => None,
        }
    }
}

pub(super) struct Step<'a, B: ?Sized, F> {
    cpu: &'a mut Cpu,
    bus: &'a mut B,
    cycle: &'a mut F,
    /// Cycles owed on top of the definition's base count.
    extra: u32,
}

impl<'a, B, F, E> Step<'a, B, F>
where
    B: MemoryBus + ?Sized,
    F: FnMut() -> Result<(), E>,
    E: Into<anyhow::Error>,
{
    pub(super) fn new(cpu: &'a mut Cpu, bus: &'a mut B, cycle: &'a mut F) -> Self {
        Self {
            cpu,
            bus,
            cycle,
            extra: 0,
        }
    }

    pub(super) fn run(mut self) -> Result<(), CpuError> {
        let opcode = self.fetch()?;
        self.cpu.last_result.opcode = Some(opcode);
        let definition = lookup(opcode).ok_or(CpuError::UnimplementedOpcode(opcode))?;
        self.cpu.last_result.definition = Some(definition);

        self.cpu.phase = Phase::ResolveAddress;
        let target = self.resolve(definition)?;

        self.cpu.phase = Phase::ExecuteEffect;
        self.execute(definition, target)?;

        self.cpu.phase = Phase::Finalize;
        self.pad_to(self.expected(definition))?;
        self.cpu.last_result.is_final = true;
        Ok(())
    }

    // --- cycles and bus access ---

    fn tick(&mut self) -> Result<(), CpuError> {
        self.cpu.last_result.actual_cycles += 1;
        (self.cycle)().map_err(|err| CpuError::Cycle(err.into()))
    }

    /// Burn internal cycles until `cycles` have been consumed.
    fn pad_to(&mut self, cycles: u32) -> Result<(), CpuError> {
        while self.cpu.last_result.actual_cycles < cycles {
            self.tick()?;
        }
        Ok(())
    }

    fn expected(&self, definition: &InstructionDefinition) -> u32 {
        definition.base_cycles + self.extra
    }

    /// Pad so that the next `remaining` cycles end the instruction.
    fn pad_before(&mut self, definition: &InstructionDefinition, remaining: u32) -> Result<(), CpuError> {
        self.pad_to(self.expected(definition).saturating_sub(remaining))
    }

    fn settle_read(&mut self, result: Result<u8, BusError>) -> Result<u8, CpuError> {
        match result {
            Ok(value) => {
                self.cpu.data_bus = value;
                Ok(value)
            }
            Err(err) if !self.cpu.config.strict_addressing => {
                trace!(%err, "tolerating bus fault");
                Ok(self.cpu.data_bus)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn read(&mut self, addr: u16) -> Result<u8, CpuError> {
        let result = self.bus.read(addr);
        let value = self.settle_read(result)?;
        self.tick()?;
        Ok(value)
    }

    fn read_zero_page(&mut self, addr: u8) -> Result<u8, CpuError> {
        let result = self.bus.read_zero_page(addr);
        let value = self.settle_read(result)?;
        self.tick()?;
        Ok(value)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), CpuError> {
        self.cpu.data_bus = value;
        match self.bus.write(addr, value) {
            Ok(()) => {}
            Err(err) if !self.cpu.config.strict_addressing => {
                trace!(%err, "tolerating bus fault");
            }
            Err(err) => return Err(err.into()),
        }
        self.tick()
    }

    fn read_target(&mut self, target: Target) -> Result<u8, CpuError> {
        match target {
            Target::Accumulator => Ok(self.cpu.regs.a),
            Target::Immediate(value) => Ok(value),
            Target::ZeroPage(zp) => self.read_zero_page(zp),
            Target::Address(addr) => self.read(addr),
        }
    }

    fn fetch(&mut self) -> Result<u8, CpuError> {
        let value = self.read(self.cpu.regs.pc)?;
        self.cpu.regs.pc = self.cpu.regs.pc.wrapping_add(1);
        Ok(value)
    }

    fn fetch_byte_operand(&mut self) -> Result<u8, CpuError> {
        let value = self.fetch()?;
        self.cpu.last_result.operand = Some(OperandValue::U8(value));
        Ok(value)
    }

    /// Low byte first, as the hardware fetches it.
    fn fetch_word_operand(&mut self) -> Result<u16, CpuError> {
        let lo = self.fetch()?;
        let hi = self.fetch()?;
        let value = u16::from_le_bytes([lo, hi]);
        self.cpu.last_result.operand = Some(OperandValue::U16(value));
        Ok(value)
    }

    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let addr = self.cpu.regs.stack_address();
        self.cpu.regs.sp = self.cpu.regs.sp.wrapping_sub(1);
        self.write(addr, value)
    }

    fn pull(&mut self) -> Result<u8, CpuError> {
        self.cpu.regs.sp = self.cpu.regs.sp.wrapping_add(1);
        let addr = self.cpu.regs.stack_address();
        self.read(addr)
    }

    // --- addressing ---

    fn resolve(&mut self, definition: &InstructionDefinition) -> Result<Target, CpuError> {
        let x = self.cpu.regs.x;
        let y = self.cpu.regs.y;

        Ok(match definition.addressing_mode {
            AddressingMode::Implied => Target::Accumulator,
            AddressingMode::Immediate => Target::Immediate(self.fetch_byte_operand()?),
            AddressingMode::Relative => {
                let offset = self.fetch_byte_operand()?;
                Target::Address(self.cpu.regs.pc.wrapping_add(offset as i8 as u16))
            }
            AddressingMode::ZeroPage => Target::ZeroPage(self.fetch_byte_operand()?),
            AddressingMode::IndexedZeroPageX => {
                let zp = self.fetch_byte_operand()?;
                self.tick()?;
                Target::ZeroPage(zp.wrapping_add(x))
            }
            AddressingMode::IndexedZeroPageY => {
                let zp = self.fetch_byte_operand()?;
                self.tick()?;
                Target::ZeroPage(zp.wrapping_add(y))
            }
            AddressingMode::Absolute => Target::Address(self.fetch_word_operand()?),
            AddressingMode::AbsoluteIndexedX => {
                let base = self.fetch_word_operand()?;
                Target::Address(self.indexed(definition, base, x)?)
            }
            AddressingMode::AbsoluteIndexedY => {
                let base = self.fetch_word_operand()?;
                Target::Address(self.indexed(definition, base, y)?)
            }
            AddressingMode::Indirect => {
                let pointer = self.fetch_word_operand()?;
                let lo = self.read(pointer)?;
                // the high byte never carries into the next page
                let hi_addr = if pointer & 0x00FF == 0x00FF {
                    self.cpu.last_result.bug = Some(BugKind::IndirectJmpPageWrap);
                    pointer & 0xFF00
                } else {
                    pointer.wrapping_add(1)
                };
                let hi = self.read(hi_addr)?;
                Target::Address(u16::from_le_bytes([lo, hi]))
            }
            AddressingMode::PreIndexedIndirect => {
                let zp = self.fetch_byte_operand()?;
                self.tick()?;
                let (pointer, wrapped) = zp.overflowing_add(x);
                if wrapped || pointer == 0xFF {
                    self.cpu.last_result.bug = Some(BugKind::IndirectAddressingWrap);
                }
                let lo = self.read_zero_page(pointer)?;
                let hi = self.read_zero_page(pointer.wrapping_add(1))?;
                Target::Address(u16::from_le_bytes([lo, hi]))
            }
            AddressingMode::PostIndexedIndirect => {
                let pointer = self.fetch_byte_operand()?;
                if pointer == 0xFF {
                    self.cpu.last_result.bug = Some(BugKind::IndirectAddressingWrap);
                }
                let lo = self.read_zero_page(pointer)?;
                let hi = self.read_zero_page(pointer.wrapping_add(1))?;
                Target::Address(self.indexed(definition, u16::from_le_bytes([lo, hi]), y)?)
            }
        })
    }

    /// Add an index register, charging the fix-up cycle when the high byte
    /// changes on a page-sensitive instruction.
    fn indexed(&mut self, definition: &InstructionDefinition, base: u16, index: u8) -> Result<u16, CpuError> {
        let addr = base.wrapping_add(u16::from(index));
        if definition.page_sensitive && addr & 0xFF00 != base & 0xFF00 {
            self.extra += 1;
            self.cpu.last_result.page_fault = true;
            self.tick()?;
        }
        Ok(addr)
    }

    // --- effects ---

    /// Fetch the operand value; memory operands are read on the final cycle.
    fn operand(&mut self, definition: &InstructionDefinition, target: Target) -> Result<u8, CpuError> {
        if target.address().is_some() {
            self.pad_before(definition, 1)?;
        }
        self.read_target(target)
    }

    fn store(&mut self, definition: &InstructionDefinition, target: Target, value: u8) -> Result<(), CpuError> {
        match target.address() {
            Some(addr) => {
                self.pad_before(definition, 1)?;
                self.write(addr, value)
            }
            None => {
                warn!(mnemonic = definition.mnemonic, "store without an address");
                Ok(())
            }
        }
    }

    /// Read, write back unmodified, then write the result: the NMOS
    /// read-modify-write sequence. Implied forms act on the accumulator.
    fn modify(
        &mut self,
        definition: &InstructionDefinition,
        target: Target,
        op: impl FnOnce(&mut StatusFlags, u8) -> u8,
    ) -> Result<u8, CpuError> {
        let Some(addr) = target.address() else {
            let a = self.cpu.regs.a;
            let result = op(&mut self.cpu.regs.status, a);
            self.cpu.regs.a = result;
            return Ok(result);
        };

        self.pad_before(definition, 3)?;
        let value = self.read_target(target)?;
        self.write(addr, value)?;
        let result = op(&mut self.cpu.regs.status, value);
        self.write(addr, result)?;
        Ok(result)
    }

    fn branch(&mut self, condition: bool, target: Target) -> Result<(), CpuError> {
        if !condition {
            return Ok(());
        }
        let destination = target.address().unwrap_or(self.cpu.regs.pc);

        self.extra += 1;
        self.cpu.last_result.branch_taken = true;
        self.tick()?;

        if destination & 0xFF00 != self.cpu.regs.pc & 0xFF00 {
            self.extra += 1;
            self.cpu.last_result.page_fault = true;
            self.tick()?;
        }
        self.cpu.regs.pc = destination;
        Ok(())
    }

    fn set_a(&mut self, value: u8) {
        self.cpu.regs.a = value;
        self.cpu.regs.status.set_sign_zero(value);
    }

    fn set_x(&mut self, value: u8) {
        self.cpu.regs.x = value;
        self.cpu.regs.status.set_sign_zero(value);
    }

    fn set_y(&mut self, value: u8) {
        self.cpu.regs.y = value;
        self.cpu.regs.status.set_sign_zero(value);
    }

    /// Status byte as pushed by PHP and BRK.
    fn pushed_status(&self) -> u8 {
        StatusFlags {
            break_: true,
            ..self.cpu.regs.status
        }
        .to_u8()
    }

    /// Status pulled by PLP and RTI. The break flag always reads back set.
    fn pull_status(&mut self) -> Result<(), CpuError> {
        let value = self.pull()?;
        self.cpu.regs.status = StatusFlags {
            break_: true,
            ..StatusFlags::from_u8(value)
        };
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, definition: &InstructionDefinition, target: Target) -> Result<(), CpuError> {
        let regs = self.cpu.regs;

        match definition.operation {
            // loads and stores
            Operation::Lda => {
                let value = self.operand(definition, target)?;
                self.set_a(value);
            }
            Operation::Ldx => {
                let value = self.operand(definition, target)?;
                self.set_x(value);
            }
            Operation::Ldy => {
                let value = self.operand(definition, target)?;
                self.set_y(value);
            }
            Operation::Lax => {
                let value = self.operand(definition, target)?;
                self.cpu.regs.x = value;
                self.set_a(value);
            }
            Operation::Sta => self.store(definition, target, regs.a)?,
            Operation::Stx => self.store(definition, target, regs.x)?,
            Operation::Sty => self.store(definition, target, regs.y)?,
            Operation::Sax => self.store(definition, target, regs.a & regs.x)?,

            // arithmetic and logic
            Operation::Adc => {
                let value = self.operand(definition, target)?;
                let result = alu::add_with_carry(&mut self.cpu.regs.status, regs.a, value);
                self.cpu.regs.a = result;
            }
            Operation::Sbc => {
                let value = self.operand(definition, target)?;
                let result = alu::subtract_with_carry(&mut self.cpu.regs.status, regs.a, value);
                self.cpu.regs.a = result;
            }
            Operation::And => {
                let value = self.operand(definition, target)?;
                self.set_a(regs.a & value);
            }
            Operation::Ora => {
                let value = self.operand(definition, target)?;
                self.set_a(regs.a | value);
            }
            Operation::Eor => {
                let value = self.operand(definition, target)?;
                self.set_a(regs.a ^ value);
            }
            Operation::Cmp => {
                let value = self.operand(definition, target)?;
                alu::compare(&mut self.cpu.regs.status, regs.a, value);
            }
            Operation::Cpx => {
                let value = self.operand(definition, target)?;
                alu::compare(&mut self.cpu.regs.status, regs.x, value);
            }
            Operation::Cpy => {
                let value = self.operand(definition, target)?;
                alu::compare(&mut self.cpu.regs.status, regs.y, value);
            }
            Operation::Bit => {
                let value = self.operand(definition, target)?;
                alu::bit_test(&mut self.cpu.regs.status, regs.a, value);
            }
            Operation::Anc => {
                let value = self.operand(definition, target)?;
                self.set_a(regs.a & value);
                self.cpu.regs.status.carry = self.cpu.regs.status.sign;
            }
            Operation::Alr => {
                let value = self.operand(definition, target)?;
                let result = alu::shift_right(&mut self.cpu.regs.status, regs.a & value);
                self.cpu.regs.a = result;
            }
            Operation::Arr => {
                let value = self.operand(definition, target)?;
                let result = alu::and_rotate_right(&mut self.cpu.regs.status, regs.a, value);
                self.cpu.regs.a = result;
            }
            Operation::Sbx => {
                let value = self.operand(definition, target)?;
                let masked = regs.a & regs.x;
                self.cpu.regs.status.carry = masked >= value;
                self.set_x(masked.wrapping_sub(value));
            }
            Operation::Nop => {
                self.operand(definition, target)?;
            }

            // read-modify-write
            Operation::Asl => {
                self.modify(definition, target, alu::shift_left)?;
            }
            Operation::Lsr => {
                self.modify(definition, target, alu::shift_right)?;
            }
            Operation::Rol => {
                self.modify(definition, target, alu::rotate_left)?;
            }
            Operation::Ror => {
                self.modify(definition, target, alu::rotate_right)?;
            }
            Operation::Inc => {
                self.modify(definition, target, |flags, value| {
                    let result = value.wrapping_add(1);
                    flags.set_sign_zero(result);
                    result
                })?;
            }
            Operation::Dec => {
                self.modify(definition, target, |flags, value| {
                    let result = value.wrapping_sub(1);
                    flags.set_sign_zero(result);
                    result
                })?;
            }
            Operation::Slo => {
                let shifted = self.modify(definition, target, alu::shift_left)?;
                self.set_a(self.cpu.regs.a | shifted);
            }
            Operation::Rla => {
                let rotated = self.modify(definition, target, alu::rotate_left)?;
                self.set_a(self.cpu.regs.a & rotated);
            }
            Operation::Sre => {
                let shifted = self.modify(definition, target, alu::shift_right)?;
                self.set_a(self.cpu.regs.a ^ shifted);
            }
            Operation::Rra => {
                let rotated = self.modify(definition, target, alu::rotate_right)?;
                let a = self.cpu.regs.a;
                self.cpu.regs.a = alu::add_with_carry(&mut self.cpu.regs.status, a, rotated);
            }
            Operation::Dcp => {
                let decremented = self.modify(definition, target, |_, value| value.wrapping_sub(1))?;
                alu::compare(&mut self.cpu.regs.status, regs.a, decremented);
            }
            Operation::Isc => {
                let incremented = self.modify(definition, target, |_, value| value.wrapping_add(1))?;
                let a = self.cpu.regs.a;
                self.cpu.regs.a = alu::subtract_with_carry(&mut self.cpu.regs.status, a, incremented);
            }

            // registers
            Operation::Inx => self.set_x(regs.x.wrapping_add(1)),
            Operation::Iny => self.set_y(regs.y.wrapping_add(1)),
            Operation::Dex => self.set_x(regs.x.wrapping_sub(1)),
            Operation::Dey => self.set_y(regs.y.wrapping_sub(1)),
            Operation::Tax => self.set_x(regs.a),
            Operation::Tay => self.set_y(regs.a),
            Operation::Txa => self.set_a(regs.x),
            Operation::Tya => self.set_a(regs.y),
            Operation::Tsx => self.set_x(regs.sp),
            Operation::Txs => self.cpu.regs.sp = regs.x,

            // flags
            Operation::Clc => self.cpu.regs.status.carry = false,
            Operation::Sec => self.cpu.regs.status.carry = true,
            Operation::Cli => self.cpu.regs.status.interrupt_disable = false,
            Operation::Sei => self.cpu.regs.status.interrupt_disable = true,
            Operation::Cld => self.cpu.regs.status.decimal = false,
            Operation::Sed => self.cpu.regs.status.decimal = true,
            Operation::Clv => self.cpu.regs.status.overflow = false,

            // stack
            Operation::Pha => {
                self.pad_before(definition, 1)?;
                self.push(regs.a)?;
            }
            Operation::Php => {
                self.pad_before(definition, 1)?;
                self.push(self.pushed_status())?;
            }
            Operation::Pla => {
                self.pad_before(definition, 1)?;
                let value = self.pull()?;
                self.set_a(value);
            }
            Operation::Plp => {
                self.pad_before(definition, 1)?;
                self.pull_status()?;
            }

            // flow control
            Operation::Jmp => {
                if let Some(addr) = target.address() {
                    self.cpu.regs.pc = addr;
                }
            }
            Operation::Jsr => {
                self.pad_before(definition, 2)?;
                let [lo, hi] = regs.pc.wrapping_sub(1).to_le_bytes();
                self.push(hi)?;
                self.push(lo)?;
                if let Some(addr) = target.address() {
                    self.cpu.regs.pc = addr;
                }
            }
            Operation::Rts => {
                self.pad_before(definition, 3)?;
                let lo = self.pull()?;
                let hi = self.pull()?;
                self.cpu.regs.pc = u16::from_le_bytes([lo, hi]).wrapping_add(1);
            }
            Operation::Rti => {
                self.pad_before(definition, 3)?;
                self.pull_status()?;
                let lo = self.pull()?;
                let hi = self.pull()?;
                self.cpu.regs.pc = u16::from_le_bytes([lo, hi]);
            }
            Operation::Brk => {
                // BRK skips the byte that follows it
                self.read(regs.pc)?;
                let [lo, hi] = regs.pc.wrapping_add(1).to_le_bytes();
                self.push(hi)?;
                self.push(lo)?;
                self.push(self.pushed_status())?;
                self.cpu.regs.status.break_ = true;
                self.cpu.regs.status.interrupt_disable = true;
                let lo = self.read(BRK_VECTOR)?;
                let hi = self.read(BRK_VECTOR.wrapping_add(1))?;
                self.cpu.regs.pc = u16::from_le_bytes([lo, hi]);
            }
            Operation::Bpl => self.branch(!regs.status.sign, target)?,
            Operation::Bmi => self.branch(regs.status.sign, target)?,
            Operation::Bvc => self.branch(!regs.status.overflow, target)?,
            Operation::Bvs => self.branch(regs.status.overflow, target)?,
            Operation::Bcc => self.branch(!regs.status.carry, target)?,
            Operation::Bcs => self.branch(regs.status.carry, target)?,
            Operation::Bne => self.branch(!regs.status.zero, target)?,
            Operation::Beq => self.branch(regs.status.zero, target)?,
            Operation::Kil => {
                if !self.cpu.jammed {
                    warn!(address = self.cpu.last_result.address, "CPU jammed");
                }
                self.cpu.jammed = true;
                self.cpu.regs.pc = self.cpu.last_result.address;
            }
        }
        Ok(())
    }
}
