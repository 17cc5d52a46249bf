use pretty_assertions::assert_eq;

use crate::memory::{MemoryAddress, MMU};

#[test]
fn words_are_little_endian() {
    let mut mmu = MMU::default();
    mmu.write_u16(0x085F, 0x0100, 0x1234);
    assert_eq!(0x34, mmu.read_u8(0x085F, 0x0100));
    assert_eq!(0x12, mmu.read_u8(0x085F, 0x0101));
    assert_eq!(0x1234, mmu.read_u16(0x085F, 0x0100));
}

#[test]
fn word_access_wraps_the_offset() {
    let mut mmu = MMU::default();
    // high byte lands at offset 0x0000 of the same segment
    mmu.write_u16(0x1000, 0xFFFF, 0xAABB);
    assert_eq!(0xBB, mmu.read_u8(0x1000, 0xFFFF));
    assert_eq!(0xAA, mmu.read_u8(0x1000, 0x0000));
    assert_eq!(0xAABB, mmu.read_u16(0x1000, 0xFFFF));
}

#[test]
fn can_read_write_interrupt_vectors() {
    let mut mmu = MMU::default();
    mmu.write_vec(0x21, MemoryAddress::new(0xF000, 0x0100));
    assert_eq!(0x0100, mmu.read_u16(0, 0x21 * 4));
    assert_eq!(0xF000, mmu.read_u16(0, 0x21 * 4 + 2));
    assert_eq!((0xF000, 0x0100), mmu.read_vec(0x21));
}
