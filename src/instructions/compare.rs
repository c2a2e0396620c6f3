use super::operands::{
    expect_count, is_immediate, is_low_register, is_register, low_register, register,
    unsigned_immediate,
};
use super::{encode_one, read, reg, split, Instruction, InstructionError, LabelOffsets};
use crate::alu;
use crate::binary::{Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::RegisterBank;

const CMP_IMM: Pattern = Pattern::new("00101XXXXXXXXXXX");
const CMP_HIGH: Pattern = Pattern::new("01000101XXXXXXXX");

/// `CMP Rn, #imm8`.
struct CompareImmediate {
    patterns: [Pattern; 1],
}

impl Instruction for CompareImmediate {
    fn name(&self) -> &'static str {
        "CMP"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "CMP" && matches!(operands, [_, imm] if is_immediate(imm))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("CMP", operands, 2)?;
        let rn = low_register(&operands[0])?;
        let imm = unsigned_immediate(&operands[1], 8)?;
        Ok(encode_one(&self.patterns[0], &[(rn.index(), 3), (imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [n, imm] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        alu::sub(regs.read(reg(n)), Word::new(imm)).apply_nzcv(regs);
        Ok(())
    }
}

/// `CMP Rn, Rm` where at least one register is R8 or above.
struct CompareHigh {
    patterns: [Pattern; 1],
}

impl Instruction for CompareHigh {
    fn name(&self) -> &'static str {
        "CMP"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "CMP"
            && matches!(operands, [rn, rm]
                if is_register(rn) && is_register(rm)
                    && !(is_low_register(rn) && is_low_register(rm)))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("CMP", operands, 2)?;
        let n = register(&operands[0])?.index();
        let m = register(&operands[1])?.index();
        Ok(encode_one(
            &self.patterns[0],
            &[(n >> 3, 1), (m, 4), (n & 7, 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [nn, m, n] = split(self.patterns[0].get_bits(opcode[0]), [1, 4, 3]);
        let a = read(regs, reg(nn << 3 | n));
        let b = read(regs, reg(m));
        alu::sub(a, b).apply_nzcv(regs);
        Ok(())
    }
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    vec![
        Box::new(CompareImmediate {
            patterns: [CMP_IMM],
        }),
        Box::new(CompareHigh {
            patterns: [CMP_HIGH],
        }),
    ]
}
