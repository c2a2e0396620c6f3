use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::binary::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    SP,
    LR,
    PC,
}

impl Register {
    pub const ALL: [Register; 16] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::SP,
        Register::LR,
        Register::PC,
    ];

    pub fn from_index(index: u32) -> Option<Register> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// R0-R7, reachable through a 3-bit field.
    pub fn is_low(self) -> bool {
        self.index() < 8
    }

    /// Accepts `R0`-`R15`, `SP`, `LR` and `PC` in any case.
    pub fn parse(text: &str) -> Option<Register> {
        let t = text.trim().to_ascii_uppercase();
        match t.as_str() {
            "SP" => Some(Register::SP),
            "LR" => Some(Register::LR),
            "PC" => Some(Register::PC),
            _ => {
                let digits = t.strip_prefix('R')?;
                if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
                    return None;
                }
                Register::from_index(digits.parse().ok()?)
            }
        }
    }

    pub fn name(self) -> &'static str {
        const NAMES: [&str; 16] = [
            "R0", "R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12", "SP",
            "LR", "PC",
        ];
        NAMES[self as usize]
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags: u32 {
const N = 1 << 31; // Negative
const Z = 1 << 30; // Zero
const C = 1 << 29; // Carry
const V = 1 << 28; // Overflow
}
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

/// R0-R12, SP, LR, PC and the APSR.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterBank {
    regs: [Word; 16],
    apsr: Flags,
    #[serde(skip)]
    pc_written: bool,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, reg: Register) -> Word {
        self.regs[reg as usize]
    }

    pub fn write(&mut self, reg: Register, value: Word) {
        if reg == Register::PC {
            self.pc_written = true;
        }
        self.regs[reg as usize] = value;
    }

    pub fn pc(&self) -> Word {
        self.read(Register::PC)
    }

    pub fn sp(&self) -> Word {
        self.read(Register::SP)
    }

    pub fn flags(&self) -> Flags {
        self.apsr
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.apsr = flags;
    }

    pub fn set_flag(&mut self, flag: Flags, value: bool) {
        self.apsr.set(flag, value);
    }

    pub fn flag(&self, flag: Flags) -> bool {
        self.apsr.contains(flag)
    }

    /// The flags pseudo-register as a word.
    pub fn apsr(&self) -> Word {
        Word::new(self.apsr.bits())
    }

    /// Forgets earlier PC writes; called before each instruction executes.
    pub fn begin_cycle(&mut self) {
        self.pc_written = false;
    }

    pub fn pc_written(&self) -> bool {
        self.pc_written
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> Vec<(Register, Word)> {
        Register::ALL.iter().map(|&r| (r, self.read(r))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_names() {
        assert_eq!(Register::parse("r7"), Some(Register::R7));
        assert_eq!(Register::parse("R13"), Some(Register::SP));
        assert_eq!(Register::parse("lr"), Some(Register::LR));
        assert_eq!(Register::parse("R16"), None);
        assert_eq!(Register::parse("R01"), None);
        assert_eq!(Register::parse("label"), None);
        assert!(Register::R7.is_low());
        assert!(!Register::R8.is_low());
    }

    #[test]
    fn flags_sit_in_the_top_nibble() {
        let mut regs = RegisterBank::new();
        regs.set_flag(Flags::N, true);
        regs.set_flag(Flags::V, true);
        assert_eq!(regs.apsr().value(), 0x9000_0000);
        regs.write(Register::R0, Word::new(1));
        assert!(!regs.pc_written());
        regs.write(Register::PC, Word::new(0x0800_0008));
        assert!(regs.pc_written());
        regs.begin_cycle();
        assert!(!regs.pc_written());
    }
}
