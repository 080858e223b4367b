//! Reference memory bus.
//!
//! `FlatMemory` is a plain 64 KiB array with optional address masking (the 6507
//! only drives 13 address lines, so a 6507 view mirrors every 8 KiB), read-only
//! regions and unmapped regions. It exists to drive the engine in tests, benches
//! and the command line tool; real systems bring their own bus.
use crate::bus::{BusError, MemoryBus};
use std::ops::RangeInclusive;

/// Address lines driven by the 6507.
pub const MOS6507_ADDRESS_MASK: u16 = 0x1FFF;

#[derive(Clone)]
pub struct FlatMemory {
    data: Box<[u8]>,
    mask: u16,
    read_only: Vec<RangeInclusive<u16>>,
    unmapped: Vec<RangeInclusive<u16>>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatMemory")
            .field("mask", &format_args!("{:#06X}", self.mask))
            .field("read_only", &self.read_only)
            .field("unmapped", &self.unmapped)
            .finish_non_exhaustive()
    }
}

impl FlatMemory {
    /// 64 KiB of zeroed, writable memory.
    pub fn new() -> Self {
        Self {
            data: vec![0; 0x1_0000].into_boxed_slice(),
            mask: 0xFFFF,
            read_only: Vec::new(),
            unmapped: Vec::new(),
        }
    }

    /// Memory as seen through the 6507's 13-bit address bus.
    pub fn mos6507() -> Self {
        Self::new().with_address_mask(MOS6507_ADDRESS_MASK)
    }

    #[must_use]
    pub fn with_address_mask(mut self, mask: u16) -> Self {
        self.mask = mask;
        self
    }

    /// Copy `bytes` into memory starting at `origin`, ignoring protection.
    ///
    /// Addresses wrap at the top of the (masked) address space.
    pub fn load(&mut self, origin: u16, bytes: &[u8]) {
        let mut addr = origin;
        for &byte in bytes {
            let index = self.index(addr);
            self.data[index] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Reject CPU writes to `range`. Ranges are compared after masking.
    pub fn protect(&mut self, range: RangeInclusive<u16>) {
        self.read_only.push(range);
    }

    /// Reject every CPU access to `range`. Ranges are compared after masking.
    pub fn unmap(&mut self, range: RangeInclusive<u16>) {
        self.unmapped.push(range);
    }

    const fn masked(&self, addr: u16) -> u16 {
        addr & self.mask
    }

    fn index(&self, addr: u16) -> usize {
        usize::from(self.masked(addr))
    }

    fn is_unmapped(&self, addr: u16) -> bool {
        let addr = self.masked(addr);
        self.unmapped.iter().any(|range| range.contains(&addr))
    }

    fn is_read_only(&self, addr: u16) -> bool {
        let addr = self.masked(addr);
        self.read_only.iter().any(|range| range.contains(&addr))
    }
}

impl MemoryBus for FlatMemory {
    fn read(&mut self, addr: u16) -> Result<u8, BusError> {
        self.peek(addr)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusError> {
        if self.is_unmapped(addr) || self.is_read_only(addr) {
            return Err(BusError::Unwritable(addr));
        }
        let index = self.index(addr);
        self.data[index] = value;
        Ok(())
    }

    fn read_zero_page(&mut self, addr: u8) -> Result<u8, BusError> {
        let addr = u16::from(addr);
        if self.unmapped.is_empty() {
            return Ok(self.data[self.index(addr)]);
        }
        self.peek(addr)
    }

    fn peek(&self, addr: u16) -> Result<u8, BusError> {
        if self.is_unmapped(addr) {
            return Err(BusError::Unreadable(addr));
        }
        Ok(self.data[self.index(addr)])
    }

    fn poke(&mut self, addr: u16, value: u8) -> Result<(), BusError> {
        if self.is_unmapped(addr) {
            return Err(BusError::Unwritable(addr));
        }
        let index = self.index(addr);
        self.data[index] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
