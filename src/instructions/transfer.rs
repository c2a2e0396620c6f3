//! Single-register loads and stores.

use super::operands::{
    aligned_label_field, expect_count, is_label, is_register, low_register, memory, memory_shape,
    Offset,
};
use super::{
    encode_one, load, reg, split, store, Instruction, InstructionError, LabelOffsets, Size,
};
use crate::binary::{Byte, Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Register, RegisterBank};

const LDR_LITERAL: Pattern = Pattern::new("01001XXXXXXXXXXX");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Addressing {
    /// `[Rn, #imm5 * size]`
    Immediate,
    /// `[Rn, Rm]`
    Register,
    /// `[SP, #imm8 * 4]`
    Sp,
}

struct Transfer {
    name: &'static str,
    load: bool,
    size: Size,
    signed: bool,
    addressing: Addressing,
    patterns: [Pattern; 1],
}

impl Transfer {
    fn field_bits(&self) -> u32 {
        match self.addressing {
            Addressing::Sp => 8,
            _ => 5,
        }
    }
}

impl Instruction for Transfer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        let [rt, mem] = operands else {
            return false;
        };
        let Some(mem) = memory_shape(mem) else {
            return false;
        };
        let fits = match self.addressing {
            Addressing::Immediate => {
                mem.base != Register::SP && !matches!(mem.offset, Offset::Register(_))
            }
            Addressing::Sp => {
                mem.base == Register::SP && !matches!(mem.offset, Offset::Register(_))
            }
            Addressing::Register => matches!(mem.offset, Offset::Register(_)),
        };
        mnemonic == self.name && is_register(rt) && fits
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name, operands, 2)?;
        let rt = low_register(&operands[0])?;
        let mem = memory(&operands[1])?;
        let fields = match (self.addressing, &mem.offset) {
            (Addressing::Register, Offset::Register(rm)) => {
                let rm = low_register(rm.name())?;
                let rn = low_register(mem.base.name())?;
                vec![(rm.index(), 3), (rn.index(), 3), (rt.index(), 3)]
            }
            (Addressing::Sp, _) => {
                let imm = mem.scaled_offset(self.field_bits(), 4)?;
                vec![(rt.index(), 3), (imm, 8)]
            }
            _ => {
                let rn = low_register(mem.base.name())?;
                let imm = mem.scaled_offset(self.field_bits(), self.size.bytes())?;
                vec![(imm, 5), (rn.index(), 3), (rt.index(), 3)]
            }
        };
        Ok(encode_one(&self.patterns[0], &fields))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let bits = self.patterns[0].get_bits(opcode[0]);
        let (addr, rt) = match self.addressing {
            Addressing::Immediate => {
                let [imm, n, t] = split(bits, [5, 3, 3]);
                let addr = regs.read(reg(n)).wrapping_add(imm * self.size.bytes());
                (addr, reg(t))
            }
            Addressing::Register => {
                let [m, n, t] = split(bits, [3, 3, 3]);
                let addr = regs.read(reg(n)).wrapping_add(regs.read(reg(m)).value());
                (addr, reg(t))
            }
            Addressing::Sp => {
                let [t, imm] = split(bits, [3, 8]);
                (regs.sp().wrapping_add(imm * 4), reg(t))
            }
        };
        if !self.load {
            return store(bus, addr, self.size, regs.read(rt));
        }
        let mut value = load(bus, addr, self.size)?;
        if self.signed {
            value = match self.size {
                Size::Byte => Word::sign_extend_byte(Byte::new(value.value() as u8)),
                Size::Halfword => Word::sign_extend_halfword(Halfword::new(value.value() as u16)),
                Size::Word => value,
            };
        }
        regs.write(rt, value);
        Ok(())
    }
}

/// `LDR Rt, label`, reading a word at a word-aligned PC-relative address.
struct LoadLiteral {
    patterns: [Pattern; 1],
}

impl Instruction for LoadLiteral {
    fn name(&self) -> &'static str {
        "LDR"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "LDR" && matches!(operands, [rt, label] if is_register(rt) && is_label(label))
    }

    fn needs_labels(&self) -> bool {
        true
    }

    fn encode(
        &self,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("LDR", operands, 2)?;
        let rt = low_register(&operands[0])?;
        let imm = aligned_label_field(&operands[1], labels, 8)?;
        Ok(encode_one(&self.patterns[0], &[(rt.index(), 3), (imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [t, imm] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        let base = regs.pc().wrapping_add(4).value() & !3;
        let value = load(bus, Word::new(base).wrapping_add(imm * 4), Size::Word)?;
        regs.write(reg(t), value);
        Ok(())
    }
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    use Addressing::{Immediate as Imm, Register as Reg, Sp};
    const TABLE: [(&str, bool, Size, bool, Addressing, Pattern); 16] = [
        ("STR", false, Size::Word, false, Sp, Pattern::new("10010XXXXXXXXXXX")),
        ("LDR", true, Size::Word, false, Sp, Pattern::new("10011XXXXXXXXXXX")),
        ("STR", false, Size::Word, false, Imm, Pattern::new("01100XXXXXXXXXXX")),
        ("LDR", true, Size::Word, false, Imm, Pattern::new("01101XXXXXXXXXXX")),
        ("STRB", false, Size::Byte, false, Imm, Pattern::new("01110XXXXXXXXXXX")),
        ("LDRB", true, Size::Byte, false, Imm, Pattern::new("01111XXXXXXXXXXX")),
        ("STRH", false, Size::Halfword, false, Imm, Pattern::new("10000XXXXXXXXXXX")),
        ("LDRH", true, Size::Halfword, false, Imm, Pattern::new("10001XXXXXXXXXXX")),
        ("STR", false, Size::Word, false, Reg, Pattern::new("0101000XXXXXXXXX")),
        ("STRH", false, Size::Halfword, false, Reg, Pattern::new("0101001XXXXXXXXX")),
        ("STRB", false, Size::Byte, false, Reg, Pattern::new("0101010XXXXXXXXX")),
        ("LDRSB", true, Size::Byte, true, Reg, Pattern::new("0101011XXXXXXXXX")),
        ("LDR", true, Size::Word, false, Reg, Pattern::new("0101100XXXXXXXXX")),
        ("LDRH", true, Size::Halfword, false, Reg, Pattern::new("0101101XXXXXXXXX")),
        ("LDRB", true, Size::Byte, false, Reg, Pattern::new("0101110XXXXXXXXX")),
        ("LDRSH", true, Size::Halfword, true, Reg, Pattern::new("0101111XXXXXXXXX")),
    ];
    let mut entries: Vec<Box<dyn Instruction>> = TABLE
        .into_iter()
        .map(|(name, load, size, signed, addressing, pattern)| -> Box<dyn Instruction> {
            Box::new(Transfer {
                name,
                load,
                size,
                signed,
                addressing,
                patterns: [pattern],
            })
        })
        .collect();
    entries.push(Box::new(LoadLiteral {
        patterns: [LDR_LITERAL],
    }));
    entries
}
