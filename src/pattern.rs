//! Opcode bit patterns.
//!
//! A pattern is a 16-character template, most significant bit first, made of
//! `0`, `1` and `X`. Fixed positions identify an instruction form; the `X`
//! positions carry its operand fields, read and written as one right-aligned
//! group with the leftmost `X` as the most significant bit.

use std::fmt;

use crate::binary::Halfword;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("opcode pattern must be 16 characters, got {found}")]
    Length { found: usize },
    #[error("invalid character {found:?} at position {position} of opcode pattern")]
    Character { position: usize, found: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Bits that must match (`0` or `1` positions).
    fixed: u16,
    /// Expected value of the fixed bits.
    ones: u16,
}

const fn scan(text: &[u8]) -> Result<(u16, u16), PatternError> {
    if text.len() != 16 {
        return Err(PatternError::Length { found: text.len() });
    }
    let mut fixed = 0u16;
    let mut ones = 0u16;
    let mut i = 0;
    while i < 16 {
        let bit = 1u16 << (15 - i);
        match text[i] {
            b'0' => fixed |= bit,
            b'1' => {
                fixed |= bit;
                ones |= bit;
            }
            b'X' => {}
            other => {
                return Err(PatternError::Character {
                    position: i,
                    found: other as char,
                })
            }
        }
        i += 1;
    }
    Ok((fixed, ones))
}

impl Pattern {
    /// Compile-time constructor for catalog patterns. A malformed literal is a
    /// bug in the catalog, so this panics (at compile time in const context).
    pub const fn new(text: &str) -> Self {
        match scan(text.as_bytes()) {
            Ok((fixed, ones)) => Self { fixed, ones },
            Err(_) => panic!("malformed opcode pattern"),
        }
    }

    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let (fixed, ones) = scan(text.as_bytes())?;
        Ok(Self { fixed, ones })
    }

    pub fn matches(&self, value: Halfword) -> bool {
        value.value() & self.fixed == self.ones
    }

    /// The pattern with every `X` cleared.
    pub fn create(&self) -> Halfword {
        Halfword::new(self.ones)
    }

    pub fn wildcard_count(&self) -> u32 {
        (!self.fixed).count_ones()
    }

    /// Replaces the `X` positions of `value` with the low bits of `fill`.
    pub fn set_bits(&self, value: Halfword, fill: u32) -> Halfword {
        let mut out = value.value();
        let mut k = 0;
        for bit in 0..16 {
            let mask = 1u16 << bit;
            if self.fixed & mask != 0 {
                continue;
            }
            if (fill >> k) & 1 == 1 {
                out |= mask;
            } else {
                out &= !mask;
            }
            k += 1;
        }
        Halfword::new(out)
    }

    /// Collects the `X` positions of `value` into a right-aligned number.
    pub fn get_bits(&self, value: Halfword) -> u32 {
        let raw = value.value();
        let mut out = 0u32;
        let mut k = 0;
        for bit in 0..16 {
            let mask = 1u16 << bit;
            if self.fixed & mask != 0 {
                continue;
            }
            if raw & mask != 0 {
                out |= 1 << k;
            }
            k += 1;
        }
        out
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..16).rev() {
            let mask = 1u16 << i;
            let c = if self.fixed & mask == 0 {
                'X'
            } else if self.ones & mask != 0 {
                '1'
            } else {
                '0'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

pub fn matches(value: Halfword, pattern: &str) -> Result<bool, PatternError> {
    Ok(Pattern::parse(pattern)?.matches(value))
}

pub fn create(pattern: &str) -> Result<Halfword, PatternError> {
    Ok(Pattern::parse(pattern)?.create())
}

pub fn set_bits(value: Halfword, pattern: &str, fill: u32) -> Result<Halfword, PatternError> {
    Ok(Pattern::parse(pattern)?.set_bits(value, fill))
}

pub fn get_bits(value: Halfword, pattern: &str) -> Result<u32, PatternError> {
    Ok(Pattern::parse(pattern)?.get_bits(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed() {
        assert_eq!(Pattern::parse("0101"), Err(PatternError::Length { found: 4 }));
        assert_eq!(
            Pattern::parse("010101010101010Y"),
            Err(PatternError::Character { position: 15, found: 'Y' })
        );
    }

    #[test]
    fn display_round_trips() {
        let text = "0001110XXXXXX01X";
        assert_eq!(Pattern::parse(text).unwrap().to_string(), text);
    }
}
