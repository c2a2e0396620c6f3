//! Two-register operations sharing the `010000 oooo mmm ddd` layout.

use super::operands::{immediate, is_immediate, is_low_register, is_register, low_register};
use super::{encode_one, reg, split, Instruction, InstructionError, LabelOffsets};
use crate::alu;
use crate::binary::{Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Flags, Register, RegisterBank};

/// Accepted operand shapes. The first register listed is always the one in
/// the low field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `Rdn, Rm`, or `Rdn, Rdn, Rm`.
    Pair,
    /// `Rn, Rm`; nothing is written back.
    Test,
    /// `CMP Rn, Rm` with both registers low.
    CompareLow,
    /// `Rd, Rn, #0`.
    Negate,
    /// `Rdm, Rn, Rdm`, or `Rdm, Rn`.
    Multiply,
    /// `Rd, Rm`.
    Unary,
}

/// Computes the result from the low-field and middle-field register values
/// and updates flags. `None` means no register is written.
type Operation = fn(&mut RegisterBank, Word, Word) -> Option<Word>;

struct DataProcessing {
    name: &'static str,
    shape: Shape,
    patterns: [Pattern; 1],
    op: Operation,
}

fn operand_error(op: &str, expected: &str) -> InstructionError {
    InstructionError::UnexpectedOperand {
        operand: op.to_string(),
        expected: expected.to_string(),
    }
}

fn count_error(name: &str, expected: usize, found: usize) -> InstructionError {
    InstructionError::OperandCount {
        mnemonic: name.to_string(),
        expected,
        found,
    }
}

impl DataProcessing {
    /// Returns `(low field, middle field)` registers.
    fn fields(&self, operands: &[String]) -> Result<(Register, Register), InstructionError> {
        match (self.shape, operands) {
            (Shape::Pair, [rdn, rm]) | (Shape::Pair, [rdn, _, rm]) => {
                Ok((low_register(rdn)?, low_register(rm)?))
            }
            (Shape::Test | Shape::CompareLow | Shape::Unary, [rd, rm]) => {
                Ok((low_register(rd)?, low_register(rm)?))
            }
            (Shape::Negate, [rd, rn, zero]) => {
                if immediate(zero)? != 0 {
                    return Err(operand_error(zero, "#0"));
                }
                Ok((low_register(rd)?, low_register(rn)?))
            }
            (Shape::Multiply, [rdm, rn]) => Ok((low_register(rdm)?, low_register(rn)?)),
            (Shape::Multiply, [rd, rn, rm]) => {
                let (rd, rn, rm) = (low_register(rd)?, low_register(rn)?, low_register(rm)?);
                // Multiplication commutes, so either source may be the destination.
                if rd == rm {
                    Ok((rd, rn))
                } else if rd == rn {
                    Ok((rd, rm))
                } else {
                    Err(operand_error(&operands[0], "the same register as a source"))
                }
            }
            (Shape::Pair | Shape::Multiply, _) => Err(count_error(self.name, 2, operands.len())),
            (Shape::Negate, _) => Err(count_error(self.name, 3, operands.len())),
            _ => Err(count_error(self.name, 2, operands.len())),
        }
    }
}

impl Instruction for DataProcessing {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        if mnemonic != self.name {
            return false;
        }
        let regs = |ops: &[String]| ops.iter().all(|o| is_register(o));
        match (self.shape, operands) {
            (Shape::Pair, [rd, rn, _]) => {
                regs(operands) && Register::parse(rd) == Register::parse(rn)
            }
            (Shape::Pair | Shape::Test | Shape::Unary, [_, _]) => regs(operands),
            (Shape::CompareLow, [rn, rm]) => is_low_register(rn) && is_low_register(rm),
            (Shape::Negate, [rd, rn, zero]) => is_register(rd) && is_register(rn) && is_immediate(zero),
            (Shape::Multiply, [_, _] | [_, _, _]) => regs(operands),
            _ => false,
        }
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        let (low, middle) = self.fields(operands)?;
        Ok(encode_one(
            &self.patterns[0],
            &[(middle.index(), 3), (low.index(), 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [m, d] = split(self.patterns[0].get_bits(opcode[0]), [3, 3]);
        let (rd, rm) = (reg(d), reg(m));
        let (a, b) = (regs.read(rd), regs.read(rm));
        if let Some(value) = (self.op)(regs, a, b) {
            regs.write(rd, value);
        }
        Ok(())
    }
}

fn logical(regs: &mut RegisterBank, value: u32) -> Option<Word> {
    let result = alu::nz(Word::new(value));
    result.apply_nz(regs);
    Some(result.value)
}

fn ands(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    logical(regs, a.value() & b.value())
}

fn eors(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    logical(regs, a.value() ^ b.value())
}

fn orrs(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    logical(regs, a.value() | b.value())
}

fn bics(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    logical(regs, a.value() & !b.value())
}

fn mvns(regs: &mut RegisterBank, _a: Word, b: Word) -> Option<Word> {
    logical(regs, !b.value())
}

fn shift(regs: &mut RegisterBank, shifted: alu::Shifted) -> Option<Word> {
    shifted.apply(regs);
    Some(shifted.value)
}

// Register-specified shifts use the bottom byte of Rm.
fn lsls(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    shift(regs, alu::lsl(a, b.value() & 0xFF))
}

fn lsrs(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    shift(regs, alu::lsr(a, b.value() & 0xFF))
}

fn asrs(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    shift(regs, alu::asr(a, b.value() & 0xFF))
}

fn rors(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    shift(regs, alu::ror(a, b.value() & 0xFF))
}

fn adcs(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    let result = alu::adc(a, b, regs.flag(Flags::C));
    result.apply_nzcv(regs);
    Some(result.value)
}

fn sbcs(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    let result = alu::sbc(a, b, regs.flag(Flags::C));
    result.apply_nzcv(regs);
    Some(result.value)
}

fn rsbs(regs: &mut RegisterBank, _a: Word, b: Word) -> Option<Word> {
    let result = alu::sub(Word::ZERO, b);
    result.apply_nzcv(regs);
    Some(result.value)
}

fn muls(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    let result = alu::mul(a, b);
    result.apply_nz(regs);
    Some(result.value)
}

fn tst(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    alu::nz(Word::new(a.value() & b.value())).apply_nz(regs);
    None
}

fn cmp(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    alu::sub(a, b).apply_nzcv(regs);
    None
}

fn cmn(regs: &mut RegisterBank, a: Word, b: Word) -> Option<Word> {
    alu::add(a, b).apply_nzcv(regs);
    None
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    const TABLE: [(&str, Shape, Pattern, Operation); 16] = [
        ("ANDS", Shape::Pair, Pattern::new("0100000000XXXXXX"), ands),
        ("EORS", Shape::Pair, Pattern::new("0100000001XXXXXX"), eors),
        ("LSLS", Shape::Pair, Pattern::new("0100000010XXXXXX"), lsls),
        ("LSRS", Shape::Pair, Pattern::new("0100000011XXXXXX"), lsrs),
        ("ASRS", Shape::Pair, Pattern::new("0100000100XXXXXX"), asrs),
        ("ADCS", Shape::Pair, Pattern::new("0100000101XXXXXX"), adcs),
        ("SBCS", Shape::Pair, Pattern::new("0100000110XXXXXX"), sbcs),
        ("RORS", Shape::Pair, Pattern::new("0100000111XXXXXX"), rors),
        ("TST", Shape::Test, Pattern::new("0100001000XXXXXX"), tst),
        ("RSBS", Shape::Negate, Pattern::new("0100001001XXXXXX"), rsbs),
        ("CMP", Shape::CompareLow, Pattern::new("0100001010XXXXXX"), cmp),
        ("CMN", Shape::Test, Pattern::new("0100001011XXXXXX"), cmn),
        ("ORRS", Shape::Pair, Pattern::new("0100001100XXXXXX"), orrs),
        ("MULS", Shape::Multiply, Pattern::new("0100001101XXXXXX"), muls),
        ("BICS", Shape::Pair, Pattern::new("0100001110XXXXXX"), bics),
        ("MVNS", Shape::Unary, Pattern::new("0100001111XXXXXX"), mvns),
    ];
    TABLE
        .into_iter()
        .map(|(name, shape, pattern, op)| -> Box<dyn Instruction> {
            Box::new(DataProcessing {
                name,
                shape,
                patterns: [pattern],
                op,
            })
        })
        .collect()
}
