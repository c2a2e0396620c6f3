//! Fixed-width binary values.
//!
//! `Byte`, `Halfword` and `Word` are plain unsigned magnitudes of 8, 16 and 32
//! bits. They never change in place: every bit operation hands back a new
//! value. Construction from an arbitrary number is range-checked against
//! either the unsigned or the two's-complement signed interpretation.

use std::fmt;

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    Unsigned,
    Signed,
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpretation::Unsigned => f.write_str("unsigned"),
            Interpretation::Signed => f.write_str("signed"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("{value} is not an integer")]
    NotInteger { value: f64 },
    #[error("{value} does not fit in {bits} bits ({interpretation})")]
    OutOfRange { value: f64, bits: u32, interpretation: Interpretation },
    #[error("expected {expected} bytes, got {found}")]
    ByteCount { expected: usize, found: usize },
}

fn integral<N: ToPrimitive>(value: &N) -> Result<i128, ValueError> {
    let as_float = value.to_f64().unwrap_or(f64::NAN);
    if !as_float.is_finite() || as_float.fract() != 0.0 {
        return Err(ValueError::NotInteger { value: as_float });
    }
    value.to_i128().ok_or(ValueError::NotInteger { value: as_float })
}

macro_rules! binary_value {
    ($(#[$meta:meta])* $name:ident, $raw:ty, $signed:ty, $bits:expr, $bytes:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($raw);

        impl $name {
            pub const BITS: u32 = $bits;
            pub const ZERO: Self = Self(0);
            pub const MAX: Self = Self(<$raw>::MAX);

            pub const fn new(value: $raw) -> Self {
                Self(value)
            }

            /// Builds a value from any number in `0..=2^BITS-1`.
            pub fn from_unsigned<N: ToPrimitive>(value: N) -> Result<Self, ValueError> {
                let v = integral(&value)?;
                <$raw>::try_from(v).map(Self).map_err(|_| ValueError::OutOfRange {
                    value: v as f64,
                    bits: $bits,
                    interpretation: Interpretation::Unsigned,
                })
            }

            /// Builds a value from a two's-complement number in
            /// `-2^(BITS-1)..=2^(BITS-1)-1`.
            pub fn from_signed<N: ToPrimitive>(value: N) -> Result<Self, ValueError> {
                let v = integral(&value)?;
                <$signed>::try_from(v)
                    .map(|s| Self(s as $raw))
                    .map_err(|_| ValueError::OutOfRange {
                        value: v as f64,
                        bits: $bits,
                        interpretation: Interpretation::Signed,
                    })
            }

            pub const fn value(self) -> $raw {
                self.0
            }

            pub const fn to_signed(self) -> $signed {
                self.0 as $signed
            }

            pub const fn is_negative(self) -> bool {
                self.to_signed() < 0
            }

            pub fn bit(self, n: u32) -> bool {
                assert!(n < $bits, "bit {} out of range for {}", n, stringify!($name));
                (self.0 >> n) & 1 == 1
            }

            pub fn set_bit(self, n: u32) -> Self {
                assert!(n < $bits, "bit {} out of range for {}", n, stringify!($name));
                Self(self.0 | (1 << n))
            }

            pub fn clear_bit(self, n: u32) -> Self {
                assert!(n < $bits, "bit {} out of range for {}", n, stringify!($name));
                Self(self.0 & !(1 << n))
            }

            pub fn toggle_bit(self, n: u32) -> Self {
                assert!(n < $bits, "bit {} out of range for {}", n, stringify!($name));
                Self(self.0 ^ (1 << n))
            }

            /// Two's-complement negation. Negating zero yields zero.
            pub const fn twos_complement(self) -> Self {
                Self(self.0.wrapping_neg())
            }

            pub const fn to_le_bytes(self) -> [u8; $bytes] {
                self.0.to_le_bytes()
            }

            pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, ValueError> {
                let arr: [u8; $bytes] = bytes.try_into().map_err(|_| ValueError::ByteCount {
                    expected: $bytes,
                    found: bytes.len(),
                })?;
                Ok(Self(<$raw>::from_le_bytes(arr)))
            }
        }

        impl From<$raw> for $name {
            fn from(value: $raw) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $raw {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#0width$x}", self.0, width = 2 + $bytes * 2)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }
    };
}

binary_value!(
    /// 8-bit value.
    Byte, u8, i8, 8, 1
);
binary_value!(
    /// 16-bit value; one Thumb opcode unit.
    Halfword, u16, i16, 16, 2
);
binary_value!(
    /// 32-bit value; register and address width.
    Word, u32, i32, 32, 4
);

impl Halfword {
    pub fn from_bytes(low: Byte, high: Byte) -> Self {
        Self(u16::from_le_bytes([low.value(), high.value()]))
    }

    /// Little-endian byte order: `[low, high]`.
    pub fn to_bytes(self) -> [Byte; 2] {
        let [lo, hi] = self.0.to_le_bytes();
        [Byte(lo), Byte(hi)]
    }
}

impl Word {
    pub fn from_halfwords(low: Halfword, high: Halfword) -> Self {
        Self(u32::from(low.value()) | (u32::from(high.value()) << 16))
    }

    pub fn from_bytes(bytes: [Byte; 4]) -> Self {
        Self(u32::from_le_bytes(bytes.map(Byte::value)))
    }

    /// Little-endian halfword order: `[low, high]`.
    pub fn to_halfwords(self) -> [Halfword; 2] {
        [Halfword(self.0 as u16), Halfword((self.0 >> 16) as u16)]
    }

    pub fn to_bytes(self) -> [Byte; 4] {
        self.0.to_le_bytes().map(Byte)
    }

    pub const fn from_i32(value: i32) -> Self {
        Self(value as u32)
    }

    pub const fn wrapping_add(self, rhs: u32) -> Self {
        Self(self.0.wrapping_add(rhs))
    }

    pub const fn wrapping_sub(self, rhs: u32) -> Self {
        Self(self.0.wrapping_sub(rhs))
    }

    pub const fn wrapping_offset(self, offset: i32) -> Self {
        Self(self.0.wrapping_add(offset as u32))
    }

    pub const fn sign_extend_byte(value: Byte) -> Self {
        Self(value.to_signed() as i32 as u32)
    }

    pub const fn sign_extend_halfword(value: Halfword) -> Self {
        Self(value.to_signed() as i32 as u32)
    }
}

impl From<Byte> for Halfword {
    fn from(value: Byte) -> Self {
        Self(u16::from(value.0))
    }
}

impl From<Byte> for Word {
    fn from(value: Byte) -> Self {
        Self(u32::from(value.0))
    }
}

impl From<Halfword> for Word {
    fn from(value: Halfword) -> Self {
        Self(u32::from(value.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranged_construction() {
        assert_eq!(Byte::from_unsigned(255).unwrap().value(), 0xFF);
        assert!(matches!(Byte::from_unsigned(256), Err(ValueError::OutOfRange { bits: 8, interpretation: Interpretation::Unsigned, .. })));
        assert!(matches!(Byte::from_unsigned(-1), Err(ValueError::OutOfRange { .. })));
        assert_eq!(Byte::from_signed(-1).unwrap().value(), 0xFF);
        assert!(matches!(Byte::from_signed(128), Err(ValueError::OutOfRange { interpretation: Interpretation::Signed, .. })));
        assert!(matches!(Word::from_unsigned(1.5f64), Err(ValueError::NotInteger { .. })));
        assert_eq!(Word::from_unsigned(2.0f64).unwrap().value(), 2);
        assert_eq!(Word::from_signed(i32::MIN).unwrap().value(), 0x8000_0000);
        assert!(Word::from_unsigned(0x1_0000_0000u64).is_err());
    }

    #[test]
    fn bit_ops_are_idempotent() {
        let v = Halfword::new(0b1010_0000_0000_0101);
        for n in 0..16 {
            assert_eq!(v.set_bit(n).set_bit(n), v.set_bit(n));
            assert_eq!(v.clear_bit(n).clear_bit(n), v.clear_bit(n));
            assert_eq!(v.toggle_bit(n).toggle_bit(n), v);
        }
        assert!(v.bit(15));
        assert!(!v.bit(14));
        assert!(v.is_negative());
    }

    #[test]
    fn byte_order() {
        let w = Word::new(0x1234_5678);
        assert_eq!(w.to_halfwords(), [Halfword::new(0x5678), Halfword::new(0x1234)]);
        assert_eq!(Word::from_halfwords(Halfword::new(0x5678), Halfword::new(0x1234)), w);
        assert_eq!(w.to_le_bytes(), [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(Word::from_bytes(w.to_bytes()), w);
        assert_eq!(Halfword::from_bytes(Byte::new(0x34), Byte::new(0x12)).value(), 0x1234);
        assert!(Word::from_le_bytes(&[1, 2]).is_err());
    }

    #[test]
    fn negation_and_extension() {
        assert_eq!(Word::ZERO.twos_complement(), Word::ZERO);
        assert_eq!(Word::new(1).twos_complement(), Word::MAX);
        assert_eq!(Word::sign_extend_byte(Byte::new(0x80)).value(), 0xFFFF_FF80);
        assert_eq!(Word::sign_extend_halfword(Halfword::new(0x7FFF)).value(), 0x7FFF);
        assert_eq!(Word::from(Halfword::new(0xFFFF)).value(), 0xFFFF);
        assert_eq!(format!("{}", Halfword::new(0xAB)), "0x00ab");
    }
}
