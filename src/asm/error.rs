use thiserror::Error;

use crate::binary::ValueError;
use crate::instructions::InstructionError;

/// Assembly failure. Line numbers are stored 0-based and shown 1-based.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsmError {
    #[error("line {}: {message}", .line + 1)]
    Syntax { line: usize, message: String },

    #[error("line {}: {mnemonic} {}: {source}", .line + 1, .operands.join(", "))]
    Instruction {
        line: usize,
        mnemonic: String,
        operands: Vec<String>,
        #[source]
        source: InstructionError,
    },

    #[error("line {}: symbol `{name}` is already defined", .line + 1)]
    DuplicateSymbol { line: usize, name: String },

    #[error("line {}: undefined symbol `{name}`", .line + 1)]
    UnresolvedSymbol { line: usize, name: String },

    #[error("line {}: {mnemonic} operand `{operand}`: {source}", .line + 1)]
    Value {
        line: usize,
        mnemonic: String,
        operand: String,
        #[source]
        source: ValueError,
    },

    #[error("no section with index {index}")]
    MissingSection { index: usize },

    #[error("section `{name}` does not fit the address space")]
    SectionOverflow { name: String },
}

impl AsmError {
    pub fn line(&self) -> Option<usize> {
        match self {
            AsmError::Syntax { line, .. }
            | AsmError::Instruction { line, .. }
            | AsmError::DuplicateSymbol { line, .. }
            | AsmError::UnresolvedSymbol { line, .. }
            | AsmError::Value { line, .. } => Some(*line),
            AsmError::MissingSection { .. } | AsmError::SectionOverflow { .. } => None,
        }
    }
}
