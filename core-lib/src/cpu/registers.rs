//! Visible processor state: the register file and status flags.
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Hardware bit layout of the status register.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct StatusBits: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL           = 0b0000_1000;
        const BREAK             = 0b0001_0000;
        /// Not backed by storage; always reads as 1.
        const UNUSED            = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const SIGN              = 0b1000_0000;
    }
}

/// The seven status flags.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub sign: bool,
    pub overflow: bool,
    pub break_: bool,
    pub decimal: bool,
    pub interrupt_disable: bool,
    pub zero: bool,
    pub carry: bool,
}

impl StatusFlags {
    /// Decode a hardware status byte. Bit 5 is ignored.
    pub const fn from_u8(value: u8) -> Self {
        let bits = StatusBits::from_bits_retain(value);
        Self {
            sign: bits.contains(StatusBits::SIGN),
            overflow: bits.contains(StatusBits::OVERFLOW),
            break_: bits.contains(StatusBits::BREAK),
            decimal: bits.contains(StatusBits::DECIMAL),
            interrupt_disable: bits.contains(StatusBits::INTERRUPT_DISABLE),
            zero: bits.contains(StatusBits::ZERO),
            carry: bits.contains(StatusBits::CARRY),
        }
    }

    /// Encode as a hardware status byte. Bit 5 is always set.
    pub fn to_u8(self) -> u8 {
        let mut bits = StatusBits::UNUSED;
        bits.set(StatusBits::SIGN, self.sign);
        bits.set(StatusBits::OVERFLOW, self.overflow);
        bits.set(StatusBits::BREAK, self.break_);
        bits.set(StatusBits::DECIMAL, self.decimal);
        bits.set(StatusBits::INTERRUPT_DISABLE, self.interrupt_disable);
        bits.set(StatusBits::ZERO, self.zero);
        bits.set(StatusBits::CARRY, self.carry);
        bits.bits()
    }

    /// Set sign and zero from a result byte.
    pub fn set_sign_zero(&mut self, value: u8) {
        self.sign = value & 0x80 != 0;
        self.zero = value == 0;
    }
}

impl From<u8> for StatusFlags {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

impl From<StatusFlags> for u8 {
    fn from(flags: StatusFlags) -> Self {
        flags.to_u8()
    }
}

/// Renders as `SV-BDIZC`, upper case for set flags and lower case for clear ones.
impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c.to_ascii_uppercase() } else { c };
        write!(
            f,
            "{}{}-{}{}{}{}{}",
            flag(self.sign, 's'),
            flag(self.overflow, 'v'),
            flag(self.break_, 'b'),
            flag(self.decimal, 'd'),
            flag(self.interrupt_disable, 'i'),
            flag(self.zero, 'z'),
            flag(self.carry, 'c'),
        )
    }
}

/// Base of the hardware stack. The stack pointer indexes into page 1.
pub const STACK_PAGE: u16 = 0x0100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: StatusFlags,
}

impl RegisterFile {
    /// Address the stack pointer currently refers to.
    pub const fn stack_address(&self) -> u16 {
        STACK_PAGE | self.sp as u16
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC={:04X} A={:02X} X={:02X} Y={:02X} SP={:02X} P={}",
            self.pc, self.a, self.x, self.y, self.sp, self.status
        )
    }
}
