use anyhow::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::binary::{Halfword, Word};
use crate::decoder::Decoder;
use crate::memory::Bus;
use crate::registers::{Register, RegisterBank};

pub const FLASH_ORIGIN: u32 = 0x0800_0000;
/// First instruction, right after the two-word vector table.
pub const CODE_ENTRY: u32 = 0x0800_0008;
pub const RAM_ORIGIN: u32 = 0x2000_0000;
pub const INITIAL_SP: u32 = 0x2000_2000;
/// Halfword the linker appends after every code section.
pub const END_OF_CODE: Halfword = Halfword::new(0xFFFF);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub flash_origin: u32,
    pub flash_size: usize,
    pub ram_origin: u32,
    pub ram_size: usize,
    pub entry: u32,
    pub initial_sp: u32,
    /// Upper bound on cycles for a single `run`.
    pub step_limit: u64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            flash_origin: FLASH_ORIGIN,
            flash_size: 0x1_0000,
            ram_origin: RAM_ORIGIN,
            ram_size: 0x8000,
            entry: CODE_ENTRY,
            initial_sp: INITIAL_SP,
            step_limit: 10_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    Running,
    Halted,
}

#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("Invalid instruction {opcode} at {pc:#010x}")]
    InvalidInstruction { pc: u32, opcode: Halfword },
    #[error("Unaligned access at {addr:#010x}")]
    Unaligned { addr: u32 },
    #[error("Bus error at {addr:#010x}: {source}")]
    Bus { addr: u32, #[source] source: Error },
    #[error("End of code reached at {pc:#010x}")]
    EndOfCode { pc: u32 },
    #[error("Processor is running")]
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub regs: RegisterBank,
    pub state: State,
    pub cycles: u64,
    pub cfg: CpuConfig,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        let mut cpu = Self {
            regs: RegisterBank::new(),
            state: State::Idle,
            cycles: 0,
            cfg,
        };
        cpu.reset_registers();
        cpu
    }

    fn reset_registers(&mut self) {
        self.regs.clear();
        self.regs.write(Register::PC, Word::new(self.cfg.entry));
        self.regs.write(Register::SP, Word::new(self.cfg.initial_sp));
        self.regs.begin_cycle();
        self.cycles = 0;
    }

    /// Idle/Halted -> Running.
    pub fn execute(&mut self) {
        if self.state != State::Running {
            debug!(from = ?self.state, "processor running");
            self.state = State::Running;
        }
    }

    /// Running -> Halted.
    pub fn halt(&mut self) {
        if self.state == State::Running {
            debug!(pc = %self.regs.pc(), cycles = self.cycles, "processor halted");
            self.state = State::Halted;
        }
    }

    /// Clears memory and registers and returns to Idle. Refused while running.
    pub fn reset(&mut self, bus: &mut dyn Bus) -> Result<(), Trap> {
        if self.state == State::Running {
            return Err(Trap::Running);
        }
        bus.clear();
        self.reset_registers();
        self.state = State::Idle;
        debug!("processor reset");
        Ok(())
    }

    /// Fetches, decodes and executes one instruction regardless of state.
    pub fn step<D: Decoder>(&mut self, bus: &mut dyn Bus, dec: &D) -> Result<(), Trap> {
        let pc = self.regs.pc();
        let first = bus
            .read_halfword(pc)
            .map_err(|source| Trap::Bus { addr: pc.value(), source })?;
        if first == END_OF_CODE {
            return Err(Trap::EndOfCode { pc: pc.value() });
        }
        // Two-halfword forms need the next unit too; it may lie past the end of memory.
        let second = bus.read_halfword(pc.wrapping_add(2)).ok();
        let d = dec
            .decode(first, second)
            .ok_or(Trap::InvalidInstruction { pc: pc.value(), opcode: first })?;
        trace!(pc = %pc, mnemonic = d.instruction.name(), "execute");
        self.regs.begin_cycle();
        d.instruction.execute(&d.opcode, &mut self.regs, bus)?;
        if !self.regs.pc_written() {
            self.regs.write(Register::PC, pc.wrapping_add(d.width));
        }
        self.cycles += 1;
        Ok(())
    }

    /// One tick of the external driver: steps only while running and halts on
    /// the first trap. Returns whether an instruction executed.
    pub fn cycle<D: Decoder>(&mut self, bus: &mut dyn Bus, dec: &D) -> Result<bool, Trap> {
        if self.state != State::Running {
            return Ok(false);
        }
        match self.step(bus, dec) {
            Ok(()) => Ok(true),
            Err(trap) => {
                self.halt();
                Err(trap)
            }
        }
    }
}
