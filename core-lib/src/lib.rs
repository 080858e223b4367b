pub mod bus;
pub mod catalogue;
pub mod cpu;
pub mod disassembly;
pub mod memory;
pub mod result;

// Re-export common types
pub use bus::{BusError, MemoryBus};
pub use catalogue::{lookup, AddressingMode, Effect, InstructionDefinition, Operation};
pub use cpu::{Cpu, CpuConfig, CpuError, Phase, RegisterFile, ResetMode, StatusFlags};
pub use disassembly::{DisasmEntry, DisasmError, SymbolTable};
pub use memory::FlatMemory;
pub use result::{BugKind, OperandValue, StepTrace, ValidityError};
