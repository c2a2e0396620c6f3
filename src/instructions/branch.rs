use super::operands::{expect_count, is_label, is_register, label_offset, register, signed_label_field};
use super::{encode_one, read, reg, sign_extend, split, Instruction, InstructionError, LabelOffsets};
use crate::binary::{Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Flags, Register, RegisterBank};

const B: Pattern = Pattern::new("11100XXXXXXXXXXX");
const BL_HIGH: Pattern = Pattern::new("11110XXXXXXXXXXX");
const BL_LOW: Pattern = Pattern::new("11X1XXXXXXXXXXXX");
const BX: Pattern = Pattern::new("010001110XXXX000");
const BLX: Pattern = Pattern::new("010001111XXXX000");

fn single_label(operands: &[String]) -> bool {
    matches!(operands, [label] if is_label(label))
}

/// Branch target relative to the instruction at `pc`.
fn target(pc: Word, offset: i32) -> Word {
    pc.wrapping_add(4).wrapping_offset(offset)
}

/// `B label`, within -2048..=2046 bytes.
struct Branch {
    patterns: [Pattern; 1],
}

impl Instruction for Branch {
    fn name(&self) -> &'static str {
        "B"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "B" && single_label(operands)
    }

    fn needs_labels(&self) -> bool {
        true
    }

    fn encode(
        &self,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("B", operands, 1)?;
        let imm = signed_label_field(&operands[0], labels, 11, 2)?;
        Ok(encode_one(&self.patterns[0], &[(imm, 11)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let imm = self.patterns[0].get_bits(opcode[0]);
        let dest = target(regs.pc(), sign_extend(imm, 11) * 2);
        regs.write(Register::PC, dest);
        Ok(())
    }
}

/// Condition field values, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
}

impl Condition {
    pub fn holds(self, flags: Flags) -> bool {
        let n = flags.contains(Flags::N);
        let z = flags.contains(Flags::Z);
        let c = flags.contains(Flags::C);
        let v = flags.contains(Flags::V);
        match self {
            Condition::Eq => z,
            Condition::Ne => !z,
            Condition::Cs => c,
            Condition::Cc => !c,
            Condition::Mi => n,
            Condition::Pl => !n,
            Condition::Vs => v,
            Condition::Vc => !v,
            Condition::Hi => c && !z,
            Condition::Ls => !c || z,
            Condition::Ge => n == v,
            Condition::Lt => n != v,
            Condition::Gt => !z && n == v,
            Condition::Le => z || n != v,
            Condition::Al => true,
        }
    }
}

/// `B<cond> label`, within -256..=254 bytes.
struct ConditionalBranch {
    name: &'static str,
    alias: Option<&'static str>,
    condition: Condition,
    patterns: [Pattern; 1],
}

impl Instruction for ConditionalBranch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn accepts_mnemonic(&self, mnemonic: &str) -> bool {
        mnemonic == self.name || Some(mnemonic) == self.alias
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        self.accepts_mnemonic(mnemonic) && single_label(operands)
    }

    fn needs_labels(&self) -> bool {
        true
    }

    fn encode(
        &self,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name, operands, 1)?;
        let imm = signed_label_field(&operands[0], labels, 8, 2)?;
        Ok(encode_one(&self.patterns[0], &[(imm, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        if self.condition.holds(regs.flags()) {
            let imm = self.patterns[0].get_bits(opcode[0]);
            let dest = target(regs.pc(), sign_extend(imm, 8) * 2);
            regs.write(Register::PC, dest);
        }
        Ok(())
    }
}

/// `BL label`: two halfwords, within about 16 MiB either way. LR receives
/// the return address with the Thumb bit set.
struct BranchLink {
    patterns: [Pattern; 2],
}

const BL_MIN: i64 = -(1 << 24);
const BL_MAX: i64 = (1 << 24) - 2;

impl Instruction for BranchLink {
    fn name(&self) -> &'static str {
        "BL"
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == "BL" && single_label(operands)
    }

    fn needs_labels(&self) -> bool {
        true
    }

    fn encode(
        &self,
        operands: &[String],
        labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count("BL", operands, 1)?;
        let label = operands[0].trim();
        let offset = label_offset(label, labels, false)?;
        if offset % 2 != 0 {
            return Err(InstructionError::MisalignedTarget {
                label: label.to_string(),
                offset,
                alignment: 2,
            });
        }
        if !(BL_MIN..=BL_MAX).contains(&offset) {
            return Err(InstructionError::OffsetOutOfRange {
                label: label.to_string(),
                offset,
                min: BL_MIN,
                max: BL_MAX,
            });
        }
        let [s, i1, i2, imm10, imm11] = split(((offset >> 1) as u32) & 0xFF_FFFF, [1, 1, 1, 10, 11]);
        let j1 = (i1 ^ 1) ^ s;
        let j2 = (i2 ^ 1) ^ s;
        let high = self.patterns[0].set_bits(self.patterns[0].create(), s << 10 | imm10);
        let low = self.patterns[1].set_bits(self.patterns[1].create(), j1 << 12 | j2 << 11 | imm11);
        Ok(vec![high, low])
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [s, imm10] = split(self.patterns[0].get_bits(opcode[0]), [1, 10]);
        let [j1, j2, imm11] = split(self.patterns[1].get_bits(opcode[1]), [1, 1, 11]);
        let i1 = (j1 ^ s) ^ 1;
        let i2 = (j2 ^ s) ^ 1;
        let raw = s << 23 | i1 << 22 | i2 << 21 | imm10 << 11 | imm11;
        let offset = sign_extend(raw, 24) * 2;
        let pc = regs.pc();
        regs.write(Register::LR, Word::new(pc.wrapping_add(4).value() | 1));
        regs.write(Register::PC, target(pc, offset));
        Ok(())
    }
}

/// `BX Rm` and `BLX Rm`. The Thumb bit of the target is dropped.
struct BranchExchange {
    link: bool,
    patterns: [Pattern; 1],
}

impl Instruction for BranchExchange {
    fn name(&self) -> &'static str {
        if self.link {
            "BLX"
        } else {
            "BX"
        }
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == self.name() && matches!(operands, [rm] if is_register(rm))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name(), operands, 1)?;
        let rm = register(&operands[0])?;
        Ok(encode_one(&self.patterns[0], &[(rm.index(), 4)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        _bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let m = self.patterns[0].get_bits(opcode[0]);
        let pc = regs.pc();
        let dest = Word::new(read(regs, reg(m)).value() & !1);
        if self.link {
            regs.write(Register::LR, Word::new(pc.wrapping_add(2).value() | 1));
        }
        regs.write(Register::PC, dest);
        Ok(())
    }
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    const CONDITIONS: [(&str, Option<&str>, Condition, Pattern); 15] = [
        ("BEQ", None, Condition::Eq, Pattern::new("11010000XXXXXXXX")),
        ("BNE", None, Condition::Ne, Pattern::new("11010001XXXXXXXX")),
        ("BCS", Some("BHS"), Condition::Cs, Pattern::new("11010010XXXXXXXX")),
        ("BCC", Some("BLO"), Condition::Cc, Pattern::new("11010011XXXXXXXX")),
        ("BMI", None, Condition::Mi, Pattern::new("11010100XXXXXXXX")),
        ("BPL", None, Condition::Pl, Pattern::new("11010101XXXXXXXX")),
        ("BVS", None, Condition::Vs, Pattern::new("11010110XXXXXXXX")),
        ("BVC", None, Condition::Vc, Pattern::new("11010111XXXXXXXX")),
        ("BHI", None, Condition::Hi, Pattern::new("11011000XXXXXXXX")),
        ("BLS", None, Condition::Ls, Pattern::new("11011001XXXXXXXX")),
        ("BGE", None, Condition::Ge, Pattern::new("11011010XXXXXXXX")),
        ("BLT", None, Condition::Lt, Pattern::new("11011011XXXXXXXX")),
        ("BGT", None, Condition::Gt, Pattern::new("11011100XXXXXXXX")),
        ("BLE", None, Condition::Le, Pattern::new("11011101XXXXXXXX")),
        ("BAL", None, Condition::Al, Pattern::new("11011110XXXXXXXX")),
    ];
    let mut entries: Vec<Box<dyn Instruction>> = vec![
        Box::new(Branch { patterns: [B] }),
        Box::new(BranchLink {
            patterns: [BL_HIGH, BL_LOW],
        }),
        Box::new(BranchExchange {
            link: false,
            patterns: [BX],
        }),
        Box::new(BranchExchange {
            link: true,
            patterns: [BLX],
        }),
    ];
    entries.extend(CONDITIONS.into_iter().map(
        |(name, alias, condition, pattern)| -> Box<dyn Instruction> {
            Box::new(ConditionalBranch {
                name,
                alias,
                condition,
                patterns: [pattern],
            })
        },
    ));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_comparisons() {
        let ge = Flags::N | Flags::V;
        assert!(Condition::Ge.holds(ge));
        assert!(!Condition::Lt.holds(ge));
        assert!(Condition::Gt.holds(ge));
        assert!(Condition::Le.holds(Flags::Z));
        assert!(Condition::Hi.holds(Flags::C));
        assert!(Condition::Ls.holds(Flags::C | Flags::Z));
        assert!(Condition::Al.holds(Flags::empty()));
    }

    #[test]
    fn bl_fields_round_trip() {
        let bl = BranchLink {
            patterns: [BL_HIGH, BL_LOW],
        };
        let mut labels = LabelOffsets::new(Word::new(0x0800_0100));
        labels.insert("back", Word::new(0x0800_0008));
        let op = bl.encode(&["back".to_string()], Some(&labels)).unwrap();
        assert_eq!(op.len(), 2);
        assert!(bl.matches(&op));

        let mut regs = RegisterBank::new();
        regs.write(Register::PC, Word::new(0x0800_0100));
        let mut mem = crate::memory::LinearMemory::new(0);
        bl.execute(&op, &mut regs, &mut mem).unwrap();
        assert_eq!(regs.pc().value(), 0x0800_0008);
        assert_eq!(regs.read(Register::LR).value(), 0x0800_0105);
    }
}
