use pretty_assertions::assert_eq;

use thumb_rs::alu::{self, AluFlags};
use thumb_rs::Word;

fn w(v: u32) -> Word {
    Word::new(v)
}

fn flags(n: bool, z: bool, c: bool, v: bool) -> AluFlags {
    AluFlags { n, z, c, v }
}

#[test]
fn signed_overflow_on_add() {
    let r = alu::add(w(0x7FFF_FFFF), w(1));
    assert_eq!(r.value, w(0x8000_0000));
    assert_eq!(r.flags, flags(true, false, false, true));
}

#[test]
fn unsigned_carry_on_add() {
    let r = alu::add(w(0xFFFF_FFFF), w(1));
    assert_eq!(r.value, w(0));
    assert_eq!(r.flags, flags(false, true, true, false));
}

#[test]
fn subtraction_carry_means_no_borrow() {
    assert_eq!(alu::sub(w(5), w(3)).flags, flags(false, false, true, false));
    let r = alu::sub(w(3), w(5));
    assert_eq!(r.value, w(0xFFFF_FFFE));
    assert_eq!(r.flags, flags(true, false, false, false));
    // Subtracting zero never borrows.
    assert_eq!(alu::sub(w(0), w(0)).flags, flags(false, true, true, false));
    assert_eq!(alu::sub(w(7), w(0)).flags.c, true);
}

#[test]
fn signed_overflow_on_sub() {
    let r = alu::sub(w(0x8000_0000), w(1));
    assert_eq!(r.value, w(0x7FFF_FFFF));
    assert!(r.flags.v);
    assert!(r.flags.c);
    let r = alu::sub(w(0x7FFF_FFFF), w(0xFFFF_FFFF));
    assert!(r.flags.v);
    assert!(r.flags.n);
}

#[test]
fn carry_chains() {
    assert_eq!(alu::adc(w(1), w(1), true).value, w(3));
    assert_eq!(alu::sbc(w(5), w(3), true), alu::sub(w(5), w(3)));
    assert_eq!(alu::sbc(w(5), w(3), false).value, w(1));
}

#[test]
fn multiply_truncates_and_sets_nz() {
    let r = alu::mul(w(0x1_0000), w(0x1_0000));
    assert_eq!(r.value, w(0));
    assert!(r.flags.z);
    let r = alu::mul(w(0xFFFF_FFFF), w(2));
    assert_eq!(r.value, w(0xFFFF_FFFE));
    assert!(r.flags.n);
}

#[test]
fn shifter_carry_out() {
    assert_eq!(alu::lsl(w(0x8000_0001), 1).carry, Some(true));
    assert_eq!(alu::lsl(w(0x8000_0001), 1).value, w(2));
    assert_eq!(alu::lsl(w(5), 0).carry, None);
    assert_eq!(alu::lsr(w(3), 1).carry, Some(true));
    assert_eq!(alu::lsr(w(0x8000_0000), 32).value, w(0));
    assert_eq!(alu::asr(w(0x8000_0000), 4).value, w(0xF800_0000));
    assert_eq!(alu::asr(w(0x8000_0000), 40).value, w(0xFFFF_FFFF));
    assert_eq!(alu::ror(w(1), 1).value, w(0x8000_0000));
    assert_eq!(alu::ror(w(1), 1).carry, Some(true));
}
