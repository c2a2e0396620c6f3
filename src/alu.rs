//! Flag-setting arithmetic and the shifter.

use crate::binary::Word;
use crate::registers::{Flags, RegisterBank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AluFlags {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: Word,
    pub flags: AluFlags,
}

impl AluResult {
    /// Writes N, Z, C and V.
    pub fn apply_nzcv(&self, regs: &mut RegisterBank) {
        regs.set_flag(Flags::N, self.flags.n);
        regs.set_flag(Flags::Z, self.flags.z);
        regs.set_flag(Flags::C, self.flags.c);
        regs.set_flag(Flags::V, self.flags.v);
    }

    /// Writes N and Z only.
    pub fn apply_nz(&self, regs: &mut RegisterBank) {
        regs.set_flag(Flags::N, self.flags.n);
        regs.set_flag(Flags::Z, self.flags.z);
    }
}

fn sign(w: Word) -> bool {
    w.is_negative()
}

/// N and Z of `value`; C and V clear.
pub fn nz(value: Word) -> AluResult {
    AluResult {
        value,
        flags: AluFlags {
            n: sign(value),
            z: value == Word::ZERO,
            c: false,
            v: false,
        },
    }
}

pub fn add(a: Word, b: Word) -> AluResult {
    adc(a, b, false)
}

/// `a + b + carry`.
pub fn adc(a: Word, b: Word, carry: bool) -> AluResult {
    let wide = u64::from(a.value()) + u64::from(b.value()) + u64::from(carry);
    let value = Word::new(wide as u32);
    AluResult {
        value,
        flags: AluFlags {
            n: sign(value),
            z: value == Word::ZERO,
            c: wide > u64::from(u32::MAX),
            v: sign(a) == sign(b) && sign(value) != sign(a),
        },
    }
}

/// `a - b`, computed as `a + (-b)`.
pub fn sub(a: Word, b: Word) -> AluResult {
    let mut r = add(a, b.twos_complement());
    // -0 is 0 and produces no carry out of the addition, but nothing was borrowed.
    if b == Word::ZERO {
        r.flags.c = true;
    }
    r.flags.v = sign(a) != sign(b) && sign(r.value) != sign(a);
    r
}

/// `a + !b + carry`; `sbc(a, b, true)` equals `sub(a, b)`.
pub fn sbc(a: Word, b: Word, carry: bool) -> AluResult {
    let wide = u64::from(a.value()) + u64::from(!b.value()) + u64::from(carry);
    let value = Word::new(wide as u32);
    AluResult {
        value,
        flags: AluFlags {
            n: sign(value),
            z: value == Word::ZERO,
            c: wide > u64::from(u32::MAX),
            v: sign(a) != sign(b) && sign(value) != sign(a),
        },
    }
}

/// Truncating 32-bit multiply. Only N and Z are meaningful.
pub fn mul(a: Word, b: Word) -> AluResult {
    let wide = u64::from(a.value()) * u64::from(b.value());
    nz(Word::new(wide as u32))
}

/// Shifter output. `carry` is `None` when the carry flag is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shifted {
    pub value: Word,
    pub carry: Option<bool>,
}

impl Shifted {
    /// Writes N, Z and, if produced, C.
    pub fn apply(&self, regs: &mut RegisterBank) {
        regs.set_flag(Flags::N, sign(self.value));
        regs.set_flag(Flags::Z, self.value == Word::ZERO);
        if let Some(c) = self.carry {
            regs.set_flag(Flags::C, c);
        }
    }
}

fn bit(v: u32, n: u32) -> bool {
    (v >> n) & 1 == 1
}

pub fn lsl(value: Word, amount: u32) -> Shifted {
    let v = value.value();
    match amount {
        0 => Shifted { value, carry: None },
        1..=31 => Shifted {
            value: Word::new(v << amount),
            carry: Some(bit(v, 32 - amount)),
        },
        32 => Shifted {
            value: Word::ZERO,
            carry: Some(bit(v, 0)),
        },
        _ => Shifted {
            value: Word::ZERO,
            carry: Some(false),
        },
    }
}

pub fn lsr(value: Word, amount: u32) -> Shifted {
    let v = value.value();
    match amount {
        0 => Shifted { value, carry: None },
        1..=31 => Shifted {
            value: Word::new(v >> amount),
            carry: Some(bit(v, amount - 1)),
        },
        32 => Shifted {
            value: Word::ZERO,
            carry: Some(bit(v, 31)),
        },
        _ => Shifted {
            value: Word::ZERO,
            carry: Some(false),
        },
    }
}

pub fn asr(value: Word, amount: u32) -> Shifted {
    let v = value.value();
    match amount {
        0 => Shifted { value, carry: None },
        1..=31 => Shifted {
            value: Word::from_i32(value.to_signed() >> amount),
            carry: Some(bit(v, amount - 1)),
        },
        _ => Shifted {
            value: Word::from_i32(value.to_signed() >> 31),
            carry: Some(bit(v, 31)),
        },
    }
}

pub fn ror(value: Word, amount: u32) -> Shifted {
    if amount == 0 {
        return Shifted { value, carry: None };
    }
    let rotated = Word::new(value.value().rotate_right(amount % 32));
    Shifted {
        value: rotated,
        carry: Some(bit(rotated.value(), 31)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: u32) -> Word {
        Word::new(v)
    }

    #[test]
    fn add_flags() {
        let r = add(w(0x7FFF_FFFF), w(1));
        assert_eq!(r.value.value(), 0x8000_0000);
        assert_eq!(r.flags, AluFlags { n: true, z: false, c: false, v: true });

        let r = add(w(0xFFFF_FFFF), w(1));
        assert_eq!(r.flags, AluFlags { n: false, z: true, c: true, v: false });

        let r = add(w(0x8000_0000), w(0x8000_0000));
        assert_eq!(r.flags, AluFlags { n: false, z: true, c: true, v: true });
    }

    #[test]
    fn sub_flags() {
        let r = sub(w(5), w(5));
        assert_eq!(r.flags, AluFlags { n: false, z: true, c: true, v: false });

        let r = sub(w(3), w(5));
        assert_eq!(r.value.value(), 0xFFFF_FFFE);
        assert_eq!(r.flags, AluFlags { n: true, z: false, c: false, v: false });

        let r = sub(w(7), w(0));
        assert!(r.flags.c);

        let r = sub(w(0x8000_0000), w(1));
        assert_eq!(r.flags, AluFlags { n: false, z: false, c: true, v: true });

        let r = sub(w(0), w(0x8000_0000));
        assert!(r.flags.v);
    }

    #[test]
    fn sbc_with_carry_matches_sub() {
        for (a, b) in [(5, 5), (3, 5), (0, 0), (0x8000_0000, 1), (1, 0xFFFF_FFFF)] {
            assert_eq!(sbc(w(a), w(b), true), sub(w(a), w(b)));
        }
        assert_eq!(sbc(w(5), w(3), false).value.value(), 1);
    }

    #[test]
    fn mul_truncates() {
        let r = mul(w(0x1_0001), w(0x1_0001));
        assert_eq!(r.value.value(), 0x0002_0001);
        let r = mul(w(0x8000_0000), w(2));
        assert!(r.flags.z);
        assert!(!r.flags.c);
    }

    #[test]
    fn shifter() {
        assert_eq!(lsl(w(0x8000_0001), 1), Shifted { value: w(2), carry: Some(true) });
        assert_eq!(lsl(w(1), 0).carry, None);
        assert_eq!(lsl(w(1), 32), Shifted { value: w(0), carry: Some(true) });
        assert_eq!(lsr(w(3), 1), Shifted { value: w(1), carry: Some(true) });
        assert_eq!(lsr(w(0x8000_0000), 32), Shifted { value: w(0), carry: Some(true) });
        assert_eq!(asr(w(0x8000_0000), 4).value.value(), 0xF800_0000);
        assert_eq!(asr(w(0x8000_0000), 40), Shifted { value: w(0xFFFF_FFFF), carry: Some(true) });
        assert_eq!(ror(w(1), 1), Shifted { value: w(0x8000_0000), carry: Some(true) });
        assert_eq!(ror(w(0x8000_0000), 32).carry, Some(true));
    }
}
