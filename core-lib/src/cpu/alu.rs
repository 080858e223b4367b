//! Arithmetic and shift helpers shared by the instruction effects.
//!
//! Every helper takes the current flags and returns the result byte, updating
//! the flags the way the NMOS part does.
use super::registers::StatusFlags;

/// ADC, honouring decimal mode.
pub fn add_with_carry(flags: &mut StatusFlags, a: u8, value: u8) -> u8 {
    if flags.decimal {
        add_decimal(flags, a, value)
    } else {
        add_binary(flags, a, value)
    }
}

/// SBC, honouring decimal mode.
pub fn subtract_with_carry(flags: &mut StatusFlags, a: u8, value: u8) -> u8 {
    if flags.decimal {
        subtract_decimal(flags, a, value)
    } else {
        add_binary(flags, a, !value)
    }
}

fn add_binary(flags: &mut StatusFlags, a: u8, value: u8) -> u8 {
    let sum = u16::from(a) + u16::from(value) + u16::from(flags.carry);
    let result = sum as u8;
    flags.carry = sum > 0xFF;
    flags.overflow = (a ^ result) & (value ^ result) & 0x80 != 0;
    flags.set_sign_zero(result);
    result
}

/// NMOS decimal addition. Zero comes from the binary sum; sign and overflow
/// from the intermediate result before the high nibble is corrected.
fn add_decimal(flags: &mut StatusFlags, a: u8, value: u8) -> u8 {
    let carry = u16::from(flags.carry);
    let binary = u16::from(a) + u16::from(value) + carry;

    let mut lo = u16::from(a & 0x0F) + u16::from(value & 0x0F) + carry;
    let mut hi = u16::from(a & 0xF0) + u16::from(value & 0xF0);
    if lo > 0x09 {
        lo += 0x06;
        hi += 0x10;
    }

    flags.zero = binary & 0xFF == 0;
    flags.sign = hi & 0x80 != 0;
    flags.overflow = !(a ^ value) & (a ^ hi as u8) & 0x80 != 0;

    if hi > 0x90 {
        hi += 0x60;
    }
    flags.carry = hi > 0xFF;

    ((lo & 0x0F) | (hi & 0xF0)) as u8
}

/// NMOS decimal subtraction. All flags come from the binary difference.
fn subtract_decimal(flags: &mut StatusFlags, a: u8, value: u8) -> u8 {
    let borrow = i16::from(!flags.carry);

    let mut binary_flags = *flags;
    add_binary(&mut binary_flags, a, !value);

    let mut lo = i16::from(a & 0x0F) - i16::from(value & 0x0F) - borrow;
    let mut hi = i16::from(a >> 4) - i16::from(value >> 4);
    if lo < 0 {
        lo -= 0x06;
        hi -= 1;
    }
    if hi < 0 {
        hi -= 0x06;
    }

    flags.carry = binary_flags.carry;
    flags.overflow = binary_flags.overflow;
    flags.sign = binary_flags.sign;
    flags.zero = binary_flags.zero;

    ((hi << 4) | (lo & 0x0F)) as u8
}

/// CMP, CPX and CPY.
pub fn compare(flags: &mut StatusFlags, register: u8, value: u8) {
    flags.carry = register >= value;
    flags.set_sign_zero(register.wrapping_sub(value));
}

pub fn shift_left(flags: &mut StatusFlags, value: u8) -> u8 {
    flags.carry = value & 0x80 != 0;
    let result = value << 1;
    flags.set_sign_zero(result);
    result
}

pub fn shift_right(flags: &mut StatusFlags, value: u8) -> u8 {
    flags.carry = value & 0x01 != 0;
    let result = value >> 1;
    flags.set_sign_zero(result);
    result
}

pub fn rotate_left(flags: &mut StatusFlags, value: u8) -> u8 {
    let result = (value << 1) | u8::from(flags.carry);
    flags.carry = value & 0x80 != 0;
    flags.set_sign_zero(result);
    result
}

pub fn rotate_right(flags: &mut StatusFlags, value: u8) -> u8 {
    let result = (value >> 1) | (u8::from(flags.carry) << 7);
    flags.carry = value & 0x01 != 0;
    flags.set_sign_zero(result);
    result
}

/// BIT: zero from the AND, sign and overflow straight from the operand.
pub fn bit_test(flags: &mut StatusFlags, a: u8, value: u8) {
    flags.zero = a & value == 0;
    flags.sign = value & 0x80 != 0;
    flags.overflow = value & 0x40 != 0;
}

/// ARR: AND then rotate right, with carry and overflow taken from bits 6 and 5.
///
/// Decimal-mode fixups are not modelled.
pub fn and_rotate_right(flags: &mut StatusFlags, a: u8, value: u8) -> u8 {
    let result = ((a & value) >> 1) | (u8::from(flags.carry) << 7);
    flags.set_sign_zero(result);
    flags.carry = result & 0x40 != 0;
    flags.overflow = ((result >> 6) ^ (result >> 5)) & 0x01 != 0;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn flags(carry: bool, decimal: bool) -> StatusFlags {
        StatusFlags {
            carry,
            decimal,
            ..StatusFlags::default()
        }
    }

    #[test_case(0x01, 0x01, false, 0x02, false, false; "simple")]
    #[test_case(0xFF, 0x01, false, 0x00, true, false; "carry out")]
    #[test_case(0x7F, 0x01, false, 0x80, false, true; "signed overflow")]
    #[test_case(0x80, 0xFF, false, 0x7F, true, true; "negative overflow")]
    #[test_case(0x10, 0x10, true, 0x21, false, false; "carry in")]
    fn test_adc_binary(a: u8, value: u8, carry: bool, result: u8, carry_out: bool, overflow: bool) {
        let mut f = flags(carry, false);
        assert_eq!(add_with_carry(&mut f, a, value), result);
        assert_eq!(f.carry, carry_out);
        assert_eq!(f.overflow, overflow);
        assert_eq!(f.zero, result == 0);
    }

    #[test_case(0x15, 0x27, false, 0x42, false; "no carry")]
    #[test_case(0x99, 0x01, false, 0x00, true; "wraps to zero")]
    #[test_case(0x58, 0x46, true, 0x05, true; "carry in and out")]
    #[test_case(0x09, 0x01, false, 0x10, false; "nibble carry")]
    fn test_adc_decimal(a: u8, value: u8, carry: bool, result: u8, carry_out: bool) {
        let mut f = flags(carry, true);
        assert_eq!(add_with_carry(&mut f, a, value), result);
        assert_eq!(f.carry, carry_out);
    }

    #[test]
    fn test_adc_decimal_zero_flag_follows_binary_sum() {
        let mut f = flags(false, true);
        assert_eq!(add_with_carry(&mut f, 0x99, 0x01), 0x00);
        assert!(!f.zero);
    }

    #[test_case(0x05, 0x03, true, 0x02, true; "no borrow")]
    #[test_case(0x00, 0x01, true, 0xFF, false; "borrow")]
    #[test_case(0x05, 0x03, false, 0x01, true; "borrow in")]
    fn test_sbc_binary(a: u8, value: u8, carry: bool, result: u8, carry_out: bool) {
        let mut f = flags(carry, false);
        assert_eq!(subtract_with_carry(&mut f, a, value), result);
        assert_eq!(f.carry, carry_out);
    }

    #[test_case(0x42, 0x13, true, 0x29, true; "nibble borrow")]
    #[test_case(0x00, 0x01, true, 0x99, false; "wraps")]
    #[test_case(0x50, 0x25, false, 0x24, true; "borrow in")]
    fn test_sbc_decimal(a: u8, value: u8, carry: bool, result: u8, carry_out: bool) {
        let mut f = flags(carry, true);
        assert_eq!(subtract_with_carry(&mut f, a, value), result);
        assert_eq!(f.carry, carry_out);
    }

    #[test]
    fn test_compare() {
        let mut f = StatusFlags::default();
        compare(&mut f, 0xF6, 0x18);
        assert!(f.sign);
        assert!(f.carry);
        assert!(!f.zero);

        compare(&mut f, 0x10, 0x10);
        assert!(f.zero);
        assert!(f.carry);
        assert!(!f.sign);

        compare(&mut f, 0x10, 0x20);
        assert!(!f.carry);
    }

    #[test]
    fn test_rotates_use_carry() {
        let mut f = flags(true, false);
        assert_eq!(rotate_left(&mut f, 0x80), 0x01);
        assert!(f.carry);
        assert_eq!(rotate_right(&mut f, 0x00), 0x80);
        assert!(!f.carry);
        assert!(f.sign);
    }

    #[test]
    fn test_shifts() {
        let mut f = StatusFlags::default();
        assert_eq!(shift_left(&mut f, 0x81), 0x02);
        assert!(f.carry);
        assert_eq!(shift_right(&mut f, 0x01), 0x00);
        assert!(f.carry);
        assert!(f.zero);
    }

    #[test]
    fn test_bit() {
        let mut f = StatusFlags::default();
        bit_test(&mut f, 0x01, 0xC0);
        assert!(f.zero);
        assert!(f.sign);
        assert!(f.overflow);
    }

    #[test]
    fn test_arr() {
        let mut f = flags(true, false);
        assert_eq!(and_rotate_right(&mut f, 0xFF, 0xC0), 0xE0);
        assert!(f.carry);
        assert!(!f.overflow);
        assert!(f.sign);
    }
}
