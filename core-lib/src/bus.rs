/// core-lib/src/bus.rs
use thiserror::Error;

/// Errors raised by a memory bus.
///
/// The engine only surfaces these when strict addressing is enabled. In lenient
/// mode an unreadable address reads as the last value seen on the data bus and an
/// unwritable write is dropped.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("address {0:#06X} is not readable")]
    Unreadable(u16),
    #[error("address {0:#06X} is not writable")]
    Unwritable(u16),
}

/// Memory access contract the CPU drives.
///
/// `read` and `write` are the accesses the CPU makes while executing and may have
/// side effects on memory-mapped hardware. `peek` and `poke` bypass those side
/// effects and are only used by debugging tools, never by the engine.
pub trait MemoryBus {
    fn read(&mut self, addr: u16) -> Result<u8, BusError>;

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusError>;

    /// Fast path for zero-page accesses, which never need full address decoding.
    fn read_zero_page(&mut self, addr: u8) -> Result<u8, BusError> {
        self.read(u16::from(addr))
    }

    fn peek(&self, addr: u16) -> Result<u8, BusError>;

    fn poke(&mut self, addr: u16, value: u8) -> Result<(), BusError>;
}

impl<B: MemoryBus + ?Sized> MemoryBus for &mut B {
    fn read(&mut self, addr: u16) -> Result<u8, BusError> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusError> {
        (**self).write(addr, value)
    }

    fn read_zero_page(&mut self, addr: u8) -> Result<u8, BusError> {
        (**self).read_zero_page(addr)
    }

    fn peek(&self, addr: u16) -> Result<u8, BusError> {
        (**self).peek(addr)
    }

    fn poke(&mut self, addr: u16, value: u8) -> Result<(), BusError> {
        (**self).poke(addr, value)
    }
}
