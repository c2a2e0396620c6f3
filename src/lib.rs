pub mod alu;
pub mod asm;
pub mod binary;
pub mod board;
pub mod cpu;
pub mod decoder;
pub mod instructions;
pub mod memory;
pub mod pattern;
pub mod registers;

pub use asm::{assemble, AsmError, Executable};
pub use binary::{Byte, Halfword, ValueError, Word};
pub use board::{Board, Stop};
pub use cpu::{Cpu, CpuConfig, State, Trap};
pub use instructions::{Instruction, InstructionError, InstructionSet};
pub use memory::{Bus, LinearMemory, MemoryMap};
pub use registers::{Flags, Register, RegisterBank};
