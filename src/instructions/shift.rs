use super::operands::{expect_count, immediate, is_immediate, is_register, low_register};
use super::{encode_one, split, Instruction, InstructionError, LabelOffsets};
use crate::alu;
use crate::binary::Halfword;
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::RegisterBank;

const LSLS: Pattern = Pattern::new("00000XXXXXXXXXXX");
const LSRS: Pattern = Pattern::new("00001XXXXXXXXXXX");
const ASRS: Pattern = Pattern::new("00010XXXXXXXXXXX");

#[derive(Debug, Clone, Copy)]
enum Kind {
    Lsl,
    Lsr,
    Asr,
}

/// `LSLS/LSRS/ASRS Rd, Rm, #imm5`. Right shifts take 1..=32, with 32 stored
/// as 0.
struct ShiftImmediate {
    name: &'static str,
    kind: Kind,
    patterns: [Pattern; 1],
}

impl ShiftImmediate {
    fn range(&self) -> (i64, i64) {
        match self.kind {
            Kind::Lsl => (0, 31),
            Kind::Lsr | Kind::Asr => (1, 32),
        }
    }
}

impl Instruction for ShiftImmediate {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == self.name
            && match operands {
                [rd, imm] => is_register(rd) && is_immediate(imm),
                [rd, rm, imm] => is_register(rd) && is_register(rm) && is_immediate(imm),
                _ => false,
            }
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        // `LSLS Rd, #n` shifts Rd in place.
        let (rd, rm, imm) = match operands {
            [rd, imm] => (rd, rd, imm),
            _ => {
                expect_count(self.name, operands, 3)?;
                (&operands[0], &operands[1], &operands[2])
            }
        };
        let rd = low_register(rd)?;
        let rm = low_register(rm)?;
        let amount = immediate(imm)?;
        let (min, max) = self.range();
        if !(min..=max).contains(&amount) {
            return Err(InstructionError::ImmediateOutOfRange {
                operand: imm.to_string(),
                min,
                max,
            });
        }
        let field = (amount as u32) & 0x1F;
        Ok(encode_one(
            &self.patterns[0],
            &[(field, 5), (rm.index(), 3), (rd.index(), 3)],
        ))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [imm, m, d] = split(self.patterns[0].get_bits(opcode[0]), [5, 3, 3]);
        let value = regs.read(super::reg(m));
        let shifted = match self.kind {
            Kind::Lsl => alu::lsl(value, imm),
            Kind::Lsr => alu::lsr(value, if imm == 0 { 32 } else { imm }),
            Kind::Asr => alu::asr(value, if imm == 0 { 32 } else { imm }),
        };
        regs.write(super::reg(d), shifted.value);
        shifted.apply(regs);
        Ok(())
    }
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    vec![
        Box::new(ShiftImmediate {
            name: "LSLS",
            kind: Kind::Lsl,
            patterns: [LSLS],
        }),
        Box::new(ShiftImmediate {
            name: "LSRS",
            kind: Kind::Lsr,
            patterns: [LSRS],
        }),
        Box::new(ShiftImmediate {
            name: "ASRS",
            kind: Kind::Asr,
            patterns: [ASRS],
        }),
    ]
}
