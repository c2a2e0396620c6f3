//! Parsing and validation of textual operands.

use super::{InstructionError, LabelOffsets};
use crate::registers::Register;

/// Accepts decimal, `0x` hex, `0b` binary and `'c'` character literals, with
/// an optional sign.
pub fn parse_number(text: &str) -> Option<i64> {
    let t = text.trim();
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else if body.len() == 3 && body.starts_with('\'') && body.ends_with('\'') {
        i64::from(body.as_bytes()[1])
    } else if body.starts_with(|c: char| c.is_ascii_digit()) {
        body.parse().ok()?
    } else {
        return None;
    };
    Some(if negative { -value } else { value })
}

pub fn expect_count(
    mnemonic: &str,
    operands: &[String],
    expected: usize,
) -> Result<(), InstructionError> {
    if operands.len() != expected {
        return Err(InstructionError::OperandCount {
            mnemonic: mnemonic.to_string(),
            expected,
            found: operands.len(),
        });
    }
    Ok(())
}

pub fn is_register(op: &str) -> bool {
    Register::parse(op).is_some()
}

pub fn is_low_register(op: &str) -> bool {
    Register::parse(op).is_some_and(Register::is_low)
}

pub fn is_immediate(op: &str) -> bool {
    op.trim_start().starts_with('#')
}

pub fn is_memory(op: &str) -> bool {
    let t = op.trim();
    t.starts_with('[') && t.ends_with(']')
}

pub fn is_register_list(op: &str) -> bool {
    let t = op.trim();
    t.starts_with('{') && t.ends_with('}')
}

/// A symbol name that is not a register.
pub fn is_label(op: &str) -> bool {
    let t = op.trim();
    let mut chars = t.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || matches!(first, '_' | '.' | '$'))
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
        && !is_register(t)
}

pub fn register(op: &str) -> Result<Register, InstructionError> {
    Register::parse(op).ok_or_else(|| InstructionError::NotRegister {
        operand: op.to_string(),
    })
}

pub fn low_register(op: &str) -> Result<Register, InstructionError> {
    let r = register(op)?;
    if !r.is_low() {
        return Err(InstructionError::NotLowRegister {
            operand: op.to_string(),
        });
    }
    Ok(r)
}

/// Requires the register `expected`, e.g. `SP` in `ADD SP, SP, #8`.
pub fn exact_register(op: &str, expected: Register) -> Result<(), InstructionError> {
    if register(op)? != expected {
        return Err(InstructionError::UnexpectedOperand {
            operand: op.to_string(),
            expected: expected.to_string(),
        });
    }
    Ok(())
}

pub fn immediate(op: &str) -> Result<i64, InstructionError> {
    let body = op
        .trim()
        .strip_prefix('#')
        .ok_or_else(|| InstructionError::MissingHash {
            operand: op.to_string(),
        })?;
    parse_number(body).ok_or_else(|| InstructionError::InvalidNumber {
        operand: op.to_string(),
    })
}

/// An unsigned immediate that is a multiple of `scale` and fits in `bits`
/// after division by it. Returns the field value.
pub fn scaled_immediate(op: &str, bits: u32, scale: u32) -> Result<u32, InstructionError> {
    let value = immediate(op)?;
    if value % i64::from(scale) != 0 {
        return Err(InstructionError::Unaligned {
            operand: op.to_string(),
            alignment: scale,
        });
    }
    let max = ((1i64 << bits) - 1) * i64::from(scale);
    if !(0..=max).contains(&value) {
        return Err(InstructionError::ImmediateOutOfRange {
            operand: op.to_string(),
            min: 0,
            max,
        });
    }
    Ok((value / i64::from(scale)) as u32)
}

pub fn unsigned_immediate(op: &str, bits: u32) -> Result<u32, InstructionError> {
    scaled_immediate(op, bits, 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offset {
    None,
    /// Raw `#...` text, kept for error messages.
    Immediate(String),
    Register(Register),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryOperand {
    pub base: Register,
    pub offset: Offset,
}

impl MemoryOperand {
    /// Field value of the immediate offset; `[Rn]` counts as `#0`.
    pub fn scaled_offset(&self, bits: u32, scale: u32) -> Result<u32, InstructionError> {
        match &self.offset {
            Offset::None => Ok(0),
            Offset::Immediate(text) => scaled_immediate(text, bits, scale),
            Offset::Register(r) => Err(InstructionError::UnexpectedOperand {
                operand: r.to_string(),
                expected: "an immediate offset".into(),
            }),
        }
    }
}

/// `[Rn]`, `[Rn, #imm]` or `[Rn, Rm]`.
pub fn memory(op: &str) -> Result<MemoryOperand, InstructionError> {
    let malformed = || InstructionError::MalformedMemory {
        operand: op.to_string(),
    };
    let inner = op
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let base = Register::parse(parts[0]).ok_or_else(malformed)?;
    let offset = match parts.as_slice() {
        [_] => Offset::None,
        [_, off] if is_immediate(off) => Offset::Immediate(off.to_string()),
        [_, off] => Offset::Register(Register::parse(off).ok_or_else(malformed)?),
        _ => return Err(malformed()),
    };
    Ok(MemoryOperand { base, offset })
}

/// Shape test used by `can_encode`; malformed operands count as no match.
pub fn memory_shape(op: &str) -> Option<MemoryOperand> {
    memory(op).ok()
}

/// `{R0, R2-R4, LR}` in any order; ranges must ascend and registers may not
/// repeat.
pub fn register_list(op: &str) -> Result<Vec<Register>, InstructionError> {
    let malformed = || InstructionError::MalformedRegisterList {
        operand: op.to_string(),
    };
    let inner = op
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(malformed)?;
    let mut out = Vec::new();
    for item in inner.split(',').map(str::trim) {
        let (first, last) = match item.split_once('-') {
            Some((a, b)) => (Register::parse(a), Register::parse(b)),
            None => (Register::parse(item), Register::parse(item)),
        };
        let (Some(first), Some(last)) = (first, last) else {
            return Err(malformed());
        };
        if first > last {
            return Err(malformed());
        }
        for register in (first.index()..=last.index()).map(super::reg) {
            if out.contains(&register) {
                return Err(InstructionError::DuplicateRegister {
                    operand: op.to_string(),
                    register,
                });
            }
            out.push(register);
        }
    }
    Ok(out)
}

/// Offset of label `op` from the instruction; zero while labels are unknown.
pub fn label_offset(
    op: &str,
    labels: Option<&LabelOffsets>,
    aligned: bool,
) -> Result<i64, InstructionError> {
    let Some(labels) = labels else {
        return Ok(0);
    };
    let name = op.trim();
    let offset = if aligned {
        labels.aligned_offset(name)
    } else {
        labels.offset(name)
    };
    offset.ok_or_else(|| InstructionError::UnknownLabel {
        label: name.to_string(),
    })
}

/// Signed label offset, divided by `scale`, as a `bits`-wide two's-complement
/// field.
pub fn signed_label_field(
    op: &str,
    labels: Option<&LabelOffsets>,
    bits: u32,
    scale: u32,
) -> Result<u32, InstructionError> {
    let offset = label_offset(op, labels, false)?;
    let scale = i64::from(scale);
    if offset % scale != 0 {
        return Err(InstructionError::MisalignedTarget {
            label: op.trim().to_string(),
            offset,
            alignment: scale as u32,
        });
    }
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    let scaled = offset / scale;
    if !(min..=max).contains(&scaled) {
        return Err(InstructionError::OffsetOutOfRange {
            label: op.trim().to_string(),
            offset,
            min: min * scale,
            max: max * scale,
        });
    }
    Ok((scaled as u32) & ((1u32 << bits) - 1))
}

/// Forward, word-aligned offset from the aligned PC as an unsigned field.
pub fn aligned_label_field(
    op: &str,
    labels: Option<&LabelOffsets>,
    bits: u32,
) -> Result<u32, InstructionError> {
    let offset = label_offset(op, labels, true)?;
    if offset % 4 != 0 {
        return Err(InstructionError::MisalignedTarget {
            label: op.trim().to_string(),
            offset,
            alignment: 4,
        });
    }
    let max = ((1i64 << bits) - 1) * 4;
    if !(0..=max).contains(&offset) {
        return Err(InstructionError::OffsetOutOfRange {
            label: op.trim().to_string(),
            offset,
            min: 0,
            max,
        });
    }
    Ok((offset / 4) as u32)
}
