use super::operands::{
    expect_count, is_immediate, is_register, low_register, register, unsigned_immediate,
};
use super::{encode_one, read, reg, split, Instruction, InstructionError, LabelOffsets};
use crate::alu;
use crate::binary::{Byte, Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Register, RegisterBank};

const MOVS_REG: Pattern = Pattern::new("0000000000XXXXXX");
const MOVS_IMM: Pattern = Pattern::new("00100XXXXXXXXXXX");
const MOV_HIGH: Pattern = Pattern::new("01000110XXXXXXXX");
const SXTH: Pattern = Pattern::new("1011001000XXXXXX");
const SXTB: Pattern = Pattern::new("1011001001XXXXXX");
const UXTH: Pattern = Pattern::new("1011001010XXXXXX");
const UXTB: Pattern = Pattern::new("1011001011XXXXXX");
const REV: Pattern = Pattern::new("1011101000XXXXXX");
const NOP: Pattern = Pattern::new("1011111100000000");

/// `MOVS Rd, Rm` on low registers; sets N and Z.
struct MoveRegister {
    patterns: [Pattern; 1],
}

impl Instruction for MoveRegister {
    fn name(&self) -> &'static str {
        "MOVS"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "MOVS" && operands.len() == 2 && operands.iter().all(|o| is_register(o))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("MOVS", operands, 2)?;
        let rd = low_register(&operands[0])?;
        let rm = low_register(&operands[1])?;
        Ok(encode_one(&self.patterns[0], &[(rm.index(), 3), (rd.index(), 3)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [m, d] = split(self.patterns[0].get_bits(opcode[0]), [3, 3]);
        let result = alu::nz(regs.read(reg(m)));
        regs.write(reg(d), result.value);
        result.apply_nz(regs);
        Ok(())
    }
}

/// `MOVS Rd, #imm8`; sets N and Z.
struct MoveImmediate {
    patterns: [Pattern; 1],
}

impl Instruction for MoveImmediate {
    fn name(&self) -> &'static str {
        "MOVS"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "MOVS" && operands.len() == 2 && is_immediate(&operands[1])
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("MOVS", operands, 2)?;
        let rd = low_register(&operands[0])?;
        let imm = unsigned_immediate(&operands[1], 8)?;
        Ok(encode_one(&self.patterns[0], &[(rd.index(), 3), (imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [d, imm] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        let result = alu::nz(Word::new(imm));
        regs.write(reg(d), result.value);
        result.apply_nz(regs);
        Ok(())
    }
}

/// `MOV Rd, Rm` on any registers; flags untouched. Writing PC branches.
struct MoveHigh {
    patterns: [Pattern; 1],
}

impl Instruction for MoveHigh {
    fn name(&self) -> &'static str {
        "MOV"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "MOV" && operands.len() == 2 && operands.iter().all(|o| is_register(o))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("MOV", operands, 2)?;
        let rd = register(&operands[0])?.index();
        let rm = register(&operands[1])?.index();
        Ok(encode_one(
            &self.patterns[0],
            &[(rd >> 3, 1), (rm, 4), (rd & 7, 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [dn, m, d] = split(self.patterns[0].get_bits(opcode[0]), [1, 4, 3]);
        let rd = reg(dn << 3 | d);
        let mut value = read(regs, reg(m));
        if rd == Register::PC {
            value = Word::new(value.value() & !1);
        }
        regs.write(rd, value);
        Ok(())
    }
}

/// Two-low-register forms without flag effects: the extends and `REV`.
struct Unary {
    name: &'static str,
    patterns: [Pattern; 1],
    op: fn(Word) -> Word,
}

impl Instruction for Unary {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == self.name && operands.len() == 2
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name, operands, 2)?;
        let rd = low_register(&operands[0])?;
        let rm = low_register(&operands[1])?;
        Ok(encode_one(&self.patterns[0], &[(rm.index(), 3), (rd.index(), 3)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [m, d] = split(self.patterns[0].get_bits(opcode[0]), [3, 3]);
        let value = (self.op)(regs.read(reg(m)));
        regs.write(reg(d), value);
        Ok(())
    }
}

struct Nop {
    patterns: [Pattern; 1],
}

impl Instruction for Nop {
    fn name(&self) -> &'static str {
        "NOP"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "NOP" && operands.is_empty()
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("NOP", operands, 0)?;
        Ok(vec![self.patterns[0].create()])
    }

    fn execute(
        &self,
        _opcode: &[Halfword],
        _regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        Ok(())
    }
}

fn sxth(w: Word) -> Word {
    Word::sign_extend_halfword(Halfword::new(w.value() as u16))
}

fn sxtb(w: Word) -> Word {
    Word::sign_extend_byte(Byte::new(w.value() as u8))
}

fn uxth(w: Word) -> Word {
    Word::new(w.value() & 0xFFFF)
}

fn uxtb(w: Word) -> Word {
    Word::new(w.value() & 0xFF)
}

fn rev(w: Word) -> Word {
    Word::new(w.value().swap_bytes())
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    vec![
        Box::new(MoveRegister {
            patterns: [MOVS_REG],
        }),
        Box::new(MoveImmediate {
            patterns: [MOVS_IMM],
        }),
        Box::new(MoveHigh {
            patterns: [MOV_HIGH],
        }),
        Box::new(Unary {
            name: "SXTH",
            patterns: [SXTH],
            op: sxth,
        }),
        Box::new(Unary {
            name: "SXTB",
            patterns: [SXTB],
            op: sxtb,
        }),
        Box::new(Unary {
            name: "UXTH",
            patterns: [UXTH],
            op: uxth,
        }),
        Box::new(Unary {
            name: "UXTB",
            patterns: [UXTB],
            op: uxtb,
        }),
        Box::new(Unary {
            name: "REV",
            patterns: [REV],
            op: rev,
        }),
        Box::new(Nop { patterns: [NOP] }),
    ]
}
