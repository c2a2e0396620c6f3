//! The instruction catalog.
//!
//! Every supported instruction form is one [`Instruction`] value: it owns the
//! opcode patterns it decodes, knows which textual operand lists it can
//! encode, and executes against a [`RegisterBank`] and a [`Bus`].
//! [`InstructionSet`] keeps the forms in a fixed order; both encoding and
//! decoding pick the first form that accepts their input.

use std::collections::HashMap;

use crate::binary::{Byte, Halfword, Word};
use crate::cpu::Trap;
use crate::decoder::{Decoded, Decoder};
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Register, RegisterBank};

mod arithmetic;
mod branch;
mod compare;
mod data_processing;
mod moves;
pub mod operands;
mod shift;
mod stack;
mod transfer;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    #[error("{mnemonic} expects {expected} operand(s), got {found}")]
    OperandCount {
        mnemonic: String,
        expected: usize,
        found: usize,
    },
    #[error("{operand:?} is not a register")]
    NotRegister { operand: String },
    #[error("{operand:?} must be a low register (R0-R7)")]
    NotLowRegister { operand: String },
    #[error("{operand:?} must be {expected}")]
    UnexpectedOperand { operand: String, expected: String },
    #[error("immediate {operand:?} must start with '#'")]
    MissingHash { operand: String },
    #[error("{operand:?} is not a number")]
    InvalidNumber { operand: String },
    #[error("immediate {operand:?} is outside {min}..={max}")]
    ImmediateOutOfRange { operand: String, min: i64, max: i64 },
    #[error("{operand:?} is not a multiple of {alignment}")]
    Unaligned { operand: String, alignment: u32 },
    #[error("malformed memory operand {operand:?}")]
    MalformedMemory { operand: String },
    #[error("malformed register list {operand:?}")]
    MalformedRegisterList { operand: String },
    #[error("register {register} appears twice in {operand:?}")]
    DuplicateRegister { operand: String, register: Register },
    #[error("register {register} is not allowed in {operand:?}")]
    RegisterNotAllowed { operand: String, register: Register },
    #[error("unknown label {label:?}")]
    UnknownLabel { label: String },
    #[error("offset {offset} to {label:?} is not a multiple of {alignment}")]
    MisalignedTarget {
        label: String,
        offset: i64,
        alignment: u32,
    },
    #[error("offset {offset} to {label:?} is outside {min}..={max}")]
    OffsetOutOfRange {
        label: String,
        offset: i64,
        min: i64,
        max: i64,
    },
    #[error("no form of {mnemonic} accepts operands {operands:?}")]
    UnknownInstruction {
        mnemonic: String,
        operands: Vec<String>,
    },
}

/// Distances from one instruction to the labels it references.
///
/// Offsets are measured from the instruction address plus four, which is what
/// the PC reads as while that instruction executes.
#[derive(Debug, Clone, Default)]
pub struct LabelOffsets {
    site: u32,
    targets: HashMap<String, u32>,
}

impl LabelOffsets {
    pub fn new(site: Word) -> Self {
        Self {
            site: site.value(),
            targets: HashMap::new(),
        }
    }

    pub fn insert(&mut self, label: impl Into<String>, target: Word) {
        self.targets.insert(label.into(), target.value());
    }

    pub fn site(&self) -> Word {
        Word::new(self.site)
    }

    pub fn offset(&self, label: &str) -> Option<i64> {
        let target = *self.targets.get(label)?;
        Some(i64::from(target) - (i64::from(self.site) + 4))
    }

    /// Offset from the word-aligned PC, as used by literal loads and `ADR`.
    pub fn aligned_offset(&self, label: &str) -> Option<i64> {
        let target = *self.targets.get(label)?;
        Some(i64::from(target) - i64::from((self.site + 4) & !3))
    }
}

pub trait Instruction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mnemonics this form answers to, compared in upper case.
    fn accepts_mnemonic(&self, mnemonic: &str) -> bool {
        mnemonic == self.name()
    }

    /// One pattern per opcode halfword.
    fn patterns(&self) -> &[Pattern];

    /// Whether this form accepts `mnemonic` with `operands`. Only the shape is
    /// checked; value ranges are reported by `encode`.
    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool;

    /// Forms that reference labels are encoded only once addresses are known.
    fn needs_labels(&self) -> bool {
        false
    }

    /// Label operands encode as offset zero when `labels` is `None`.
    fn encode(
        &self,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError>;

    /// Runs the instruction. The PC register holds the instruction address;
    /// writing it suppresses the automatic advance.
    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        bus: &mut dyn Bus,
    ) -> Result<(), Trap>;

    fn width(&self) -> u32 {
        2 * self.patterns().len() as u32
    }

    fn matches(&self, opcode: &[Halfword]) -> bool {
        let patterns = self.patterns();
        opcode.len() >= patterns.len()
            && patterns.iter().zip(opcode).all(|(p, h)| p.matches(*h))
    }
}

/// Ordered registry of instruction forms.
pub struct InstructionSet {
    entries: Vec<Box<dyn Instruction>>,
}

impl InstructionSet {
    /// The Thumb catalog. Where patterns overlap the narrower one comes first:
    /// `MOVS Rd, Rm` before `LSLS Rd, Rm, #imm`. Forms of one mnemonic are
    /// listed from most to least specific operand shape.
    pub fn thumb() -> Self {
        let mut entries: Vec<Box<dyn Instruction>> = Vec::new();
        entries.extend(moves::catalog());
        entries.extend(shift::catalog());
        entries.extend(arithmetic::catalog());
        entries.extend(compare::catalog());
        entries.extend(data_processing::catalog());
        entries.extend(transfer::catalog());
        entries.extend(stack::catalog());
        entries.extend(branch::catalog());
        Self { entries }
    }

    pub fn entries(&self) -> &[Box<dyn Instruction>] {
        &self.entries
    }

    pub fn is_mnemonic(&self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        self.entries.iter().any(|e| e.accepts_mnemonic(&upper))
    }

    /// First form that accepts `mnemonic` with `operands`.
    pub fn find(
        &self,
        mnemonic: &str,
        operands: &[String],
    ) -> Result<&dyn Instruction, InstructionError> {
        let upper = mnemonic.to_ascii_uppercase();
        self.entries
            .iter()
            .find(|e| e.can_encode(&upper, operands))
            .map(|e| e.as_ref())
            .ok_or_else(|| InstructionError::UnknownInstruction {
                mnemonic: upper,
                operands: operands.to_vec(),
            })
    }

    pub fn encode(
        &self,
        mnemonic: &str,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        self.find(mnemonic, operands)?.encode(operands, labels)
    }

    /// First form whose patterns match the leading halfwords of `opcode`.
    pub fn lookup(&self, opcode: &[Halfword]) -> Option<&dyn Instruction> {
        self.entries
            .iter()
            .find(|e| e.matches(opcode))
            .map(|e| e.as_ref())
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::thumb()
    }
}

impl Decoder for InstructionSet {
    fn decode(&self, first: Halfword, second: Option<Halfword>) -> Option<Decoded<'_>> {
        let mut opcode = vec![first];
        opcode.extend(second);
        let instruction = self.lookup(&opcode)?;
        opcode.truncate(instruction.patterns().len());
        Some(Decoded {
            instruction,
            width: instruction.width(),
            opcode,
        })
    }
}

/// Packs `(value, width)` fields, most significant first.
pub(crate) fn pack(fields: &[(u32, u32)]) -> u32 {
    fields
        .iter()
        .fold(0, |acc, &(value, width)| (acc << width) | (value & ((1 << width) - 1)))
}

/// Splits a right-aligned group into fields of the given widths, most
/// significant first.
pub(crate) fn split<const N: usize>(value: u32, widths: [u32; N]) -> [u32; N] {
    let mut out = [0; N];
    let mut shift: u32 = widths.iter().sum();
    for (slot, width) in out.iter_mut().zip(widths) {
        shift -= width;
        *slot = (value >> shift) & ((1 << width) - 1);
    }
    out
}

pub(crate) fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

pub(crate) fn reg(field: u32) -> Register {
    Register::ALL[(field & 0xF) as usize]
}

/// Register value as an operand; the PC reads four bytes ahead.
pub(crate) fn read(regs: &RegisterBank, r: Register) -> Word {
    if r == Register::PC {
        regs.pc().wrapping_add(4)
    } else {
        regs.read(r)
    }
}

pub(crate) fn encode_one(pattern: &Pattern, fields: &[(u32, u32)]) -> Vec<Halfword> {
    vec![pattern.set_bits(pattern.create(), pack(fields))]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Size {
    Byte,
    Halfword,
    Word,
}

impl Size {
    pub(crate) fn bytes(self) -> u32 {
        match self {
            Size::Byte => 1,
            Size::Halfword => 2,
            Size::Word => 4,
        }
    }
}

fn check_aligned(addr: Word, size: Size) -> Result<(), Trap> {
    if addr.value() % size.bytes() != 0 {
        return Err(Trap::Unaligned { addr: addr.value() });
    }
    Ok(())
}

/// Zero-extended load.
pub(crate) fn load(bus: &mut dyn Bus, addr: Word, size: Size) -> Result<Word, Trap> {
    check_aligned(addr, size)?;
    let value = match size {
        Size::Byte => bus.read_byte(addr).map(Word::from),
        Size::Halfword => bus.read_halfword(addr).map(Word::from),
        Size::Word => bus.read_word(addr),
    };
    value.map_err(|source| Trap::Bus {
        addr: addr.value(),
        source,
    })
}

/// Stores the low `size` bytes of `value`.
pub(crate) fn store(bus: &mut dyn Bus, addr: Word, size: Size, value: Word) -> Result<(), Trap> {
    check_aligned(addr, size)?;
    let raw = value.value();
    let done = match size {
        Size::Byte => bus.write_byte(addr, Byte::new(raw as u8)),
        Size::Halfword => bus.write_halfword(addr, Halfword::new(raw as u16)),
        Size::Word => bus.write_word(addr, value),
    };
    done.map_err(|source| Trap::Bus {
        addr: addr.value(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_packing() {
        assert_eq!(pack(&[(0b101, 3), (0b11, 2)]), 0b10111);
        assert_eq!(split(0b10111, [3, 2]), [0b101, 0b11]);
        assert_eq!(sign_extend(0x7FF, 11), -1);
        assert_eq!(sign_extend(0x3FF, 11), 0x3FF);
    }

    #[test]
    fn label_offsets_are_pc_relative() {
        let mut labels = LabelOffsets::new(Word::new(0x0800_000A));
        labels.insert("loop", Word::new(0x0800_0008));
        labels.insert("pool", Word::new(0x0800_0010));
        assert_eq!(labels.offset("loop"), Some(-6));
        assert_eq!(labels.aligned_offset("pool"), Some(4));
        assert_eq!(labels.offset("missing"), None);
    }

    #[test]
    fn catalog_patterns_are_unambiguous_where_required() {
        let set = InstructionSet::thumb();
        let movs = set.lookup(&[Halfword::new(0x0011)]).map(|i| i.name());
        assert_eq!(movs, Some("MOVS"));
        let lsls = set.lookup(&[Halfword::new(0x0051)]).map(|i| i.name());
        assert_eq!(lsls, Some("LSLS"));
        assert!(set.lookup(&[Halfword::new(0xFFFF)]).is_none());
    }
}
