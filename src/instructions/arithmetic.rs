use super::operands::{
    aligned_label_field, expect_count, exact_register, immediate, is_immediate, is_label,
    is_register, low_register, register, scaled_immediate, unsigned_immediate,
};
use super::{encode_one, read, reg, split, Instruction, InstructionError, LabelOffsets};
use crate::alu::{self, AluResult};
use crate::binary::{Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Register, RegisterBank};

const ADDS_REG: Pattern = Pattern::new("0001100XXXXXXXXX");
const SUBS_REG: Pattern = Pattern::new("0001101XXXXXXXXX");
const ADDS_IMM3: Pattern = Pattern::new("0001110XXXXXXXXX");
const SUBS_IMM3: Pattern = Pattern::new("0001111XXXXXXXXX");
const ADDS_IMM8: Pattern = Pattern::new("00110XXXXXXXXXXX");
const SUBS_IMM8: Pattern = Pattern::new("00111XXXXXXXXXXX");
const ADD_HIGH: Pattern = Pattern::new("01000100XXXXXXXX");
const ADR: Pattern = Pattern::new("10100XXXXXXXXXXX");
const ADD_RD_SP: Pattern = Pattern::new("10101XXXXXXXXXXX");
const ADD_SP: Pattern = Pattern::new("101100000XXXXXXX");
const SUB_SP: Pattern = Pattern::new("101100001XXXXXXX");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
}

impl Op {
    fn apply(self, a: Word, b: Word) -> AluResult {
        match self {
            Op::Add => alu::add(a, b),
            Op::Sub => alu::sub(a, b),
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Op::Add => "ADDS",
            Op::Sub => "SUBS",
        }
    }
}

fn same_register(a: &str, b: &str) -> bool {
    matches!((Register::parse(a), Register::parse(b)), (Some(x), Some(y)) if x == y)
}

/// `ADDS/SUBS Rd, Rn, #imm3`.
struct ImmediateThree {
    op: Op,
    patterns: [Pattern; 1],
}

impl Instruction for ImmediateThree {
    fn name(&self) -> &'static str {
        self.op.mnemonic()
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        let [rd, rn, imm] = operands else {
            return false;
        };
        // `ADDS R0, R0, #200` belongs to the 8-bit form.
        let wide = same_register(rd, rn) && immediate(imm).is_ok_and(|v| v > 7);
        mnemonic == self.name() && is_register(rd) && is_register(rn) && is_immediate(imm) && !wide
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name(), operands, 3)?;
        let rd = low_register(&operands[0])?;
        let rn = low_register(&operands[1])?;
        let imm = unsigned_immediate(&operands[2], 3)?;
        Ok(encode_one(
            &self.patterns[0],
            &[(imm, 3), (rn.index(), 3), (rd.index(), 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [imm, n, d] = split(self.patterns[0].get_bits(opcode[0]), [3, 3, 3]);
        let result = self.op.apply(regs.read(reg(n)), Word::new(imm));
        regs.write(reg(d), result.value);
        result.apply_nzcv(regs);
        Ok(())
    }
}

/// `ADDS/SUBS Rdn, #imm8`, also written `Rdn, Rdn, #imm8`.
struct ImmediateEight {
    op: Op,
    patterns: [Pattern; 1],
}

impl Instruction for ImmediateEight {
    fn name(&self) -> &'static str {
        self.op.mnemonic()
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == self.name()
            && match operands {
                [rdn, imm] => is_register(rdn) && is_immediate(imm),
                [rd, rn, imm] => same_register(rd, rn) && is_immediate(imm),
                _ => false,
            }
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        let (rdn, imm) = match operands {
            [rdn, imm] | [rdn, _, imm] => (rdn, imm),
            _ => {
                return Err(InstructionError::OperandCount {
                    mnemonic: self.name().into(),
                    expected: 2,
                    found: operands.len(),
                })
            }
        };
        let rdn = low_register(rdn)?;
        let imm = unsigned_immediate(imm, 8)?;
        Ok(encode_one(&self.patterns[0], &[(rdn.index(), 3), (imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [d, imm] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        let result = self.op.apply(regs.read(reg(d)), Word::new(imm));
        regs.write(reg(d), result.value);
        result.apply_nzcv(regs);
        Ok(())
    }
}

/// `ADDS/SUBS Rd, Rn, Rm`; `Rdn, Rm` is shorthand for `Rdn, Rdn, Rm`.
struct RegisterThree {
    op: Op,
    patterns: [Pattern; 1],
}

impl Instruction for RegisterThree {
    fn name(&self) -> &'static str {
        self.op.mnemonic()
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == self.name()
            && (operands.len() == 2 || operands.len() == 3)
            && operands.iter().all(|o| is_register(o))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        let (rd, rn, rm) = match operands {
            [rdn, rm] => (rdn, rdn, rm),
            [rd, rn, rm] => (rd, rn, rm),
            _ => {
                return Err(InstructionError::OperandCount {
                    mnemonic: self.name().into(),
                    expected: 3,
                    found: operands.len(),
                })
            }
        };
        let rd = low_register(rd)?;
        let rn = low_register(rn)?;
        let rm = low_register(rm)?;
        Ok(encode_one(
            &self.patterns[0],
            &[(rm.index(), 3), (rn.index(), 3), (rd.index(), 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [m, n, d] = split(self.patterns[0].get_bits(opcode[0]), [3, 3, 3]);
        let result = self.op.apply(regs.read(reg(n)), regs.read(reg(m)));
        regs.write(reg(d), result.value);
        result.apply_nzcv(regs);
        Ok(())
    }
}

/// `ADD Rdn, Rm` on any registers; flags untouched. Writing PC branches.
struct AddHigh {
    patterns: [Pattern; 1],
}

impl Instruction for AddHigh {
    fn name(&self) -> &'static str {
        "ADD"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "ADD"
            && match operands {
                [rdn, rm] => is_register(rdn) && is_register(rm),
                [rd, rn, rm] => same_register(rd, rn) && is_register(rm),
                _ => false,
            }
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        let (rdn, rm) = match operands {
            [rdn, rm] | [rdn, _, rm] => (register(rdn)?, register(rm)?),
            _ => {
                return Err(InstructionError::OperandCount {
                    mnemonic: "ADD".into(),
                    expected: 2,
                    found: operands.len(),
                })
            }
        };
        let (d, m) = (rdn.index(), rm.index());
        Ok(encode_one(
            &self.patterns[0],
            &[(d >> 3, 1), (m, 4), (d & 7, 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [dn, m, d] = split(self.patterns[0].get_bits(opcode[0]), [1, 4, 3]);
        let rdn = reg(dn << 3 | d);
        let mut sum = read(regs, rdn).wrapping_add(read(regs, reg(m)).value());
        if rdn == Register::PC {
            sum = Word::new(sum.value() & !1);
        }
        regs.write(rdn, sum);
        Ok(())
    }
}

/// `ADD Rd, SP, #imm8*4`.
struct AddSpToRegister {
    patterns: [Pattern; 1],
}

impl Instruction for AddSpToRegister {
    fn name(&self) -> &'static str {
        "ADD"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "ADD"
            && matches!(operands, [rd, sp, imm]
                if is_register(rd) && Register::parse(sp) == Some(Register::SP) && is_immediate(imm))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("ADD", operands, 3)?;
        let rd = low_register(&operands[0])?;
        exact_register(&operands[1], Register::SP)?;
        let imm = scaled_immediate(&operands[2], 8, 4)?;
        Ok(encode_one(&self.patterns[0], &[(rd.index(), 3), (imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [d, imm] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        let value = regs.sp().wrapping_add(imm * 4);
        regs.write(reg(d), value);
        Ok(())
    }
}

/// `ADD/SUB SP, SP, #imm7*4`, also written `SP, #imm`.
struct AdjustSp {
    name: &'static str,
    op: Op,
    patterns: [Pattern; 1],
}

impl Instruction for AdjustSp {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        let is_sp = |o: &str| Register::parse(o) == Some(Register::SP);
        mnemonic == self.name
            && match operands {
                [sp, imm] => is_sp(sp) && is_immediate(imm),
                [sp, sp2, imm] => is_sp(sp) && is_sp(sp2) && is_immediate(imm),
                _ => false,
            }
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        let imm = match operands {
            [sp, imm] | [sp, _, imm] => {
                exact_register(sp, Register::SP)?;
                scaled_immediate(imm, 7, 4)?
            }
            _ => {
                return Err(InstructionError::OperandCount {
                    mnemonic: self.name.into(),
                    expected: 2,
                    found: operands.len(),
                })
            }
        };
        Ok(encode_one(&self.patterns[0], &[(imm, 7)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let offset = self.patterns[0].get_bits(opcode[0]) * 4;
        let sp = match self.op {
            Op::Add => regs.sp().wrapping_add(offset),
            Op::Sub => regs.sp().wrapping_sub(offset),
        };
        regs.write(Register::SP, sp);
        Ok(())
    }
}

/// `ADR Rd, label`: address of a word-aligned label ahead of the PC.
struct Adr {
    patterns: [Pattern; 1],
}

impl Instruction for Adr {
    fn name(&self) -> &'static str {
        "ADR"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "ADR" && matches!(operands, [rd, label] if is_register(rd) && is_label(label))
    }

    fn needs_labels(&self) -> bool {
        true
    }

    fn encode(
        &self,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("ADR", operands, 2)?;
        let rd = low_register(&operands[0])?;
        let imm = aligned_label_field(&operands[1], labels, 8)?;
        Ok(encode_one(&self.patterns[0], &[(rd.index(), 3), (imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [d, imm] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        let base = regs.pc().wrapping_add(4).value() & !3;
        regs.write(reg(d), Word::new(base).wrapping_add(imm * 4));
        Ok(())
    }
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    vec![
        Box::new(ImmediateThree {
            op: Op::Add,
            patterns: [ADDS_IMM3],
        }),
        Box::new(ImmediateEight {
            op: Op::Add,
            patterns: [ADDS_IMM8],
        }),
        Box::new(RegisterThree {
            op: Op::Add,
            patterns: [ADDS_REG],
        }),
        Box::new(ImmediateThree {
            op: Op::Sub,
            patterns: [SUBS_IMM3],
        }),
        Box::new(ImmediateEight {
            op: Op::Sub,
            patterns: [SUBS_IMM8],
        }),
        Box::new(RegisterThree {
            op: Op::Sub,
            patterns: [SUBS_REG],
        }),
        Box::new(AdjustSp {
            name: "ADD",
            op: Op::Add,
            patterns: [ADD_SP],
        }),
        Box::new(AdjustSp {
            name: "SUB",
            op: Op::Sub,
            patterns: [SUB_SP],
        }),
        Box::new(AddSpToRegister {
            patterns: [ADD_RD_SP],
        }),
        Box::new(AddHigh {
            patterns: [ADD_HIGH],
        }),
        Box::new(Adr { patterns: [ADR] }),
    ]
}
