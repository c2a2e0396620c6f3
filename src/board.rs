//! A processor wired to its memory map, with an optional loaded image.

use tracing::{debug, info};

use crate::asm::Executable;
use crate::cpu::{Cpu, CpuConfig, State, Trap};
use crate::instructions::InstructionSet;
use crate::memory::MemoryMap;

/// Why `Board::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The end-of-code marker was fetched.
    EndOfCode { pc: u32 },
    /// The cycle budget ran out with the processor still running.
    StepLimit,
}

pub struct Board {
    pub cpu: Cpu,
    pub memory: MemoryMap,
    pub set: InstructionSet,
    image: Option<Executable>,
}

impl Board {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            cpu: Cpu::new(cfg),
            memory: MemoryMap::new(&cfg),
            set: InstructionSet::thumb(),
            image: None,
        }
    }

    pub fn image(&self) -> Option<&Executable> {
        self.image.as_ref()
    }

    /// Keeps `image` and resets the board with it programmed into memory.
    pub fn load(&mut self, image: Executable) -> Result<(), Trap> {
        info!(segments = image.segments.len(), bytes = image.content.len(), "image loaded");
        self.image = Some(image);
        self.reset()
    }

    /// Processor reset followed by reprogramming the loaded image.
    pub fn reset(&mut self) -> Result<(), Trap> {
        self.cpu.reset(&mut self.memory)?;
        if let Some(image) = &self.image {
            image
                .load_into(&mut self.memory)
                .map_err(|source| Trap::Bus {
                    addr: self.cpu.cfg.flash_origin,
                    source,
                })?;
        }
        Ok(())
    }

    /// Executes one instruction regardless of the processor state.
    pub fn step(&mut self) -> Result<(), Trap> {
        self.cpu.step(&mut self.memory, &self.set)
    }

    /// Starts the processor and cycles until it halts or `limit` cycles have
    /// run. Traps other than the end-of-code marker are returned as errors.
    pub fn run(&mut self, limit: u64) -> Result<Stop, Trap> {
        self.cpu.execute();
        // Only a trap takes the processor out of the running state.
        for _ in 0..limit {
            match self.cpu.cycle(&mut self.memory, &self.set) {
                Ok(_) => {}
                Err(Trap::EndOfCode { pc }) => return Ok(Stop::EndOfCode { pc }),
                Err(trap) => return Err(trap),
            }
        }
        debug!(limit, "step limit reached");
        self.cpu.halt();
        Ok(Stop::StepLimit)
    }

    /// `run` bounded by the configured step limit.
    pub fn run_to_end(&mut self) -> Result<Stop, Trap> {
        self.run(self.cpu.cfg.step_limit)
    }

    pub fn state(&self) -> State {
        self.cpu.state
    }

    /// Source line of the instruction at the current PC, when known.
    pub fn current_line(&self) -> Option<usize> {
        let pc = self.cpu.regs.pc().value();
        self.image.as_ref()?.line_at(pc)
    }
}
