//! 6507 execution engine.
//!
//! [`Cpu::execute_instruction`] runs exactly one instruction through the
//! `FetchOpcode → ResolveAddress → ExecuteEffect → Finalize` phases, calling the
//! supplied callback once for every clock cycle the instruction consumes. Dead
//! cycles inside an instruction call it too, so hardware clocked alongside the
//! CPU can be stepped in lockstep.
mod alu;
mod execute;
pub mod registers;

pub use registers::{RegisterFile, StatusBits, StatusFlags, STACK_PAGE};

use crate::bus::{BusError, MemoryBus};
use crate::result::StepTrace;
use execute::Step;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Where the program counter is loaded from on power-up.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// Where BRK loads the program counter from.
pub const BRK_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Error)]
pub enum CpuError {
    #[error("unimplemented opcode: {0:#04X}")]
    UnimplementedOpcode(u8),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("cycle callback failed: {0}")]
    Cycle(#[source] anyhow::Error),
}

/// Initial stack pointer selection for [`Cpu::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Fixed(u8),
    /// Draw the stack pointer from a seeded generator. The same seed always
    /// produces the same stack pointer.
    Randomized { seed: u64 },
}

impl Default for ResetMode {
    fn default() -> Self {
        Self::Fixed(0xFF)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuConfig {
    /// Surface bus faults as errors instead of tolerating them.
    pub strict_addressing: bool,
    pub reset: ResetMode,
}

/// Engine state machine phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    FetchOpcode,
    ResolveAddress,
    ExecuteEffect,
    Finalize,
}

pub struct Cpu {
    regs: RegisterFile,
    config: CpuConfig,
    phase: Phase,
    last_result: StepTrace,
    /// Last value driven onto the data bus.
    data_bus: u8,
    jammed: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        let mut cpu = Self {
            regs: RegisterFile::default(),
            config,
            phase: Phase::Idle,
            last_result: StepTrace::new(0),
            data_bus: 0,
            jammed: false,
        };
        cpu.reset();
        cpu
    }

    /// Zero A, X and Y, clear the status flags and seed the stack pointer.
    ///
    /// The break flag reads back as set: the NMOS part has no storage for it.
    pub fn reset(&mut self) {
        let sp = match self.config.reset {
            ResetMode::Fixed(sp) => sp,
            ResetMode::Randomized { seed } => StdRng::seed_from_u64(seed).gen(),
        };
        self.regs = RegisterFile {
            sp,
            status: StatusFlags {
                break_: true,
                ..StatusFlags::default()
            },
            ..RegisterFile::default()
        };
        self.phase = Phase::Idle;
        self.last_result = StepTrace::new(0);
        self.data_bus = 0;
        self.jammed = false;
        debug!(sp, "CPU reset");
    }

    /// Load the program counter from the reset vector.
    pub fn load_reset_vector<B: MemoryBus + ?Sized>(&mut self, bus: &mut B) -> Result<(), CpuError> {
        let lo = bus.read(RESET_VECTOR)?;
        let hi = bus.read(RESET_VECTOR.wrapping_add(1))?;
        self.regs.pc = u16::from_le_bytes([lo, hi]);
        debug!(pc = self.regs.pc, "loaded reset vector");
        Ok(())
    }

    /// Seed execution at an arbitrary address.
    pub fn load_pc(&mut self, addr: u16) {
        self.regs.pc = addr;
    }

    pub fn set_strict_addressing(&mut self, strict: bool) {
        self.config.strict_addressing = strict;
    }

    pub const fn strict_addressing(&self) -> bool {
        self.config.strict_addressing
    }

    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// The most recent instruction record. Partially filled if that
    /// instruction failed.
    pub const fn last_result(&self) -> &StepTrace {
        &self.last_result
    }

    /// Phase the engine is in; after a failure, the phase that failed.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Set once a KIL opcode has executed. Cleared by [`Cpu::reset`].
    pub const fn is_jammed(&self) -> bool {
        self.jammed
    }

    /// Execute one instruction, calling `cycle` once per consumed clock cycle.
    ///
    /// The callback must not re-enter the engine. If it fails, the instruction
    /// is abandoned and the error returned as [`CpuError::Cycle`].
    #[instrument(level = "trace", skip_all, fields(pc = self.regs.pc))]
    pub fn execute_instruction<B, F, E>(&mut self, bus: &mut B, mut cycle: F) -> Result<StepTrace, CpuError>
    where
        B: MemoryBus + ?Sized,
        F: FnMut() -> Result<(), E>,
        E: Into<anyhow::Error>,
    {
        self.last_result = StepTrace::new(self.regs.pc);
        self.phase = Phase::FetchOpcode;

        Step::new(self, bus, &mut cycle).run()?;

        self.phase = Phase::Idle;
        let result = self.last_result;
        trace!(
            address = result.address,
            mnemonic = result.mnemonic(),
            cycles = result.actual_cycles,
            "instruction retired"
        );
        #[cfg(feature = "debug")]
        trace!(registers = %self.regs, "register state");
        Ok(result)
    }

    /// Execute one instruction without observing individual cycles.
    pub fn step<B: MemoryBus + ?Sized>(&mut self, bus: &mut B) -> Result<StepTrace, CpuError> {
        self.execute_instruction(bus, || Ok::<(), Infallible>(()))
    }
}
