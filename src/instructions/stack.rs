//! Multiple-register transfers: `PUSH`, `POP`, `LDM` and `STM`.

use bitvec::prelude::*;

use super::operands::{expect_count, is_register, is_register_list, low_register, register_list};
use super::{encode_one, load, reg, split, store, Instruction, InstructionError, LabelOffsets, Size};
use crate::binary::{Halfword, Word};
use crate::cpu::Trap;
use crate::memory::Bus;
use crate::pattern::Pattern;
use crate::registers::{Register, RegisterBank};

const PUSH: Pattern = Pattern::new("1011010XXXXXXXXX");
const POP: Pattern = Pattern::new("1011110XXXXXXXXX");
const STM: Pattern = Pattern::new("11000XXXXXXXXXXX");
const LDM: Pattern = Pattern::new("11001XXXXXXXXXXX");

/// Turns a register list into the 8-bit low-register mask plus the extra bit
/// for `extra` (LR for PUSH, PC for POP), rejecting anything else.
fn list_mask(
    operand: &str,
    extra: Option<Register>,
) -> Result<(u32, bool), InstructionError> {
    let list = register_list(operand)?;
    let mut mask = bitarr![u16, Lsb0; 0; 16];
    let mut with_extra = false;
    for r in list {
        if r.is_low() {
            mask.set(r.index() as usize, true);
        } else if Some(r) == extra {
            with_extra = true;
        } else {
            return Err(InstructionError::RegisterNotAllowed {
                operand: operand.to_string(),
                register: r,
            });
        }
    }
    Ok((u32::from(mask.into_inner()[0]), with_extra))
}

/// Registers named by the low eight bits of `mask`, ascending.
fn listed(mask: u32) -> Vec<Register> {
    let bits = (mask as u16) & 0xFF;
    bits.view_bits::<Lsb0>().iter_ones().map(|i| reg(i as u32)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Push,
    Pop,
}

/// `PUSH {list}` with R0-R7 and LR, `POP {list}` with R0-R7 and PC.
struct Stack {
    direction: Direction,
    patterns: [Pattern; 1],
}

impl Stack {
    fn extra(&self) -> Register {
        match self.direction {
            Direction::Push => Register::LR,
            Direction::Pop => Register::PC,
        }
    }
}

impl Instruction for Stack {
    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Push => "PUSH",
            Direction::Pop => "POP",
        }
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        mnemonic == self.name() && matches!(operands, [list] if is_register_list(list))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name(), operands, 1)?;
        let (mask, extra) = list_mask(&operands[0], Some(self.extra()))?;
        Ok(encode_one(&self.patterns[0], &[(u32::from(extra), 1), (mask, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [extra, mask] = split(self.patterns[0].get_bits(opcode[0]), [1, 8]);
        let mut list = listed(mask);
        if extra == 1 {
            list.push(self.extra());
        }
        let size = 4 * list.len() as u32;
        match self.direction {
            Direction::Push => {
                let base = regs.sp().wrapping_sub(size);
                for (i, r) in list.iter().enumerate() {
                    store(bus, base.wrapping_add(4 * i as u32), Size::Word, regs.read(*r))?;
                }
                regs.write(Register::SP, base);
            }
            Direction::Pop => {
                let base = regs.sp();
                for (i, r) in list.iter().enumerate() {
                    let mut value = load(bus, base.wrapping_add(4 * i as u32), Size::Word)?;
                    if *r == Register::PC {
                        value = Word::new(value.value() & !1);
                    }
                    regs.write(*r, value);
                }
                regs.write(Register::SP, base.wrapping_add(size));
            }
        }
        Ok(())
    }
}

/// `STM Rn!, {list}` and `LDM Rn{!}, {list}`, ascending from Rn. `LDM`
/// writes back unless Rn is loaded itself.
struct Multiple {
    load: bool,
    patterns: [Pattern; 1],
}

impl Instruction for Multiple {
    fn name(&self) -> &'static str {
        if self.load {
            "LDM"
        } else {
            "STM"
        }
    }

    fn accepts_mnemonic(&self, mnemonic: &str) -> bool {
        let aliases: &[&str] = if self.load {
            &["LDM", "LDMIA", "LDMFD"]
        } else {
            &["STM", "STMIA", "STMEA"]
        };
        aliases.contains(&mnemonic)
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    fn can_encode(&self, mnemonic: &str, operands: &[String]) -> bool {
        self.accepts_mnemonic(mnemonic)
            && matches!(operands, [rn, list]
                if is_register(rn.trim_end().trim_end_matches('!')) && is_register_list(list))
    }

    fn encode(
        &self,
        operands: &[String],
        _labels: Option<&LabelOffsets>,
    ) -> Result<Vec<Halfword>, InstructionError> {
        expect_count(self.name(), operands, 2)?;
        let text = operands[0].trim();
        let writeback = text.ends_with('!');
        let rn = low_register(text.trim_end_matches('!'))?;
        let (mask, _) = list_mask(&operands[1], None)?;
        let in_list = mask & (1 << rn.index()) != 0;
        // STM always writes back; LDM writes back exactly when Rn is not loaded.
        let expected = !self.load || !in_list;
        if writeback != expected {
            return Err(InstructionError::UnexpectedOperand {
                operand: operands[0].clone(),
                expected: if expected {
                    format!("{rn}!")
                } else {
                    rn.to_string()
                },
            });
        }
        Ok(encode_one(&self.patterns[0], &[(rn.index(), 3), (mask, 8)]))
    }

    fn execute(
        &self,
        opcode: &[Halfword],
        regs: &mut RegisterBank,
        bus: &mut dyn Bus,
    ) -> Result<(), Trap> {
        let [n, mask] = split(self.patterns[0].get_bits(opcode[0]), [3, 8]);
        let rn = reg(n);
        let list = listed(mask);
        let base = regs.read(rn);
        for (i, r) in list.iter().enumerate() {
            let addr = base.wrapping_add(4 * i as u32);
            if self.load {
                let value = load(bus, addr, Size::Word)?;
                regs.write(*r, value);
            } else {
                store(bus, addr, Size::Word, regs.read(*r))?;
            }
        }
        if !self.load || !list.contains(&rn) {
            regs.write(rn, base.wrapping_add(4 * list.len() as u32));
        }
        Ok(())
    }
}

pub(super) fn catalog() -> Vec<Box<dyn Instruction>> {
    vec![
        Box::new(Stack {
            direction: Direction::Push,
            patterns: [PUSH],
        }),
        Box::new(Stack {
            direction: Direction::Pop,
            patterns: [POP],
        }),
        Box::new(Multiple {
            load: false,
            patterns: [STM],
        }),
        Box::new(Multiple {
            load: true,
            patterns: [LDM],
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_follow_register_numbers() {
        assert_eq!(list_mask("{R0, R2-R3}", None), Ok((0b1101, false)));
        assert_eq!(list_mask("{R4, LR}", Some(Register::LR)), Ok((0b1_0000, true)));
        assert!(matches!(
            list_mask("{R4, PC}", Some(Register::LR)),
            Err(InstructionError::RegisterNotAllowed {
                register: Register::PC,
                ..
            })
        ));
        assert_eq!(listed(0b1000_0011), vec![Register::R0, Register::R1, Register::R7]);
    }
}
