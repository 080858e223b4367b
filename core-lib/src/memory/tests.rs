/// core-lib/src/memory/tests.rs
use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_read_write() {
    let mut memory = FlatMemory::new();
    memory.write(0x1234, 0x42).unwrap();
    assert_eq!(memory.read(0x1234), Ok(0x42));
    assert_eq!(memory.read_zero_page(0x34), Ok(0x00));
}

#[test]
fn test_load_wraps_at_top_of_memory() {
    let mut memory = FlatMemory::new();
    memory.load(0xFFFF, &[0x01, 0x02]);
    assert_eq!(memory.peek(0xFFFF), Ok(0x01));
    assert_eq!(memory.peek(0x0000), Ok(0x02));
}

#[test]
fn test_mos6507_mirrors_every_8k() {
    let mut memory = FlatMemory::mos6507();
    memory.load(0xF000, &[0xEA]);
    assert_eq!(memory.read(0x1000), Ok(0xEA));
    assert_eq!(memory.read(0x3000), Ok(0xEA));
    memory.write(0x0080, 0x11).unwrap();
    assert_eq!(memory.read_zero_page(0x80), Ok(0x11));
    assert_eq!(memory.read(0x2080), Ok(0x11));
}

#[test]
fn test_protected_region_rejects_writes_but_not_pokes() {
    let mut memory = FlatMemory::new();
    memory.protect(0xF000..=0xFFFF);
    assert_eq!(memory.write(0xF800, 0x01), Err(BusError::Unwritable(0xF800)));
    assert_eq!(memory.read(0xF800), Ok(0x00));
    memory.poke(0xF800, 0x01).unwrap();
    assert_eq!(memory.peek(0xF800), Ok(0x01));
}

#[test]
fn test_unmapped_region_rejects_everything() {
    let mut memory = FlatMemory::new();
    memory.unmap(0x0200..=0x02FF);
    assert_eq!(memory.read(0x0210), Err(BusError::Unreadable(0x0210)));
    assert_eq!(memory.write(0x0210, 0), Err(BusError::Unwritable(0x0210)));
    assert_eq!(memory.peek(0x0210), Err(BusError::Unreadable(0x0210)));
    assert_eq!(memory.poke(0x0210, 0), Err(BusError::Unwritable(0x0210)));
    assert_eq!(memory.read(0x0300), Ok(0));
}

#[test]
fn test_unmapped_zero_page() {
    let mut memory = FlatMemory::new();
    memory.unmap(0x0000..=0x007F);
    assert_eq!(memory.read_zero_page(0x10), Err(BusError::Unreadable(0x0010)));
    assert_eq!(memory.read_zero_page(0x80), Ok(0));
}
