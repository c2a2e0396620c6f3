//! Two-pass assembler: text is parsed into records, encoded into a
//! relocatable object image and linked into an executable.

mod encoder;
mod error;
mod executable;
mod linker;
mod object;
mod parser;

pub use encoder::encode;
pub use error::AsmError;
pub use executable::{Executable, Segment, SegmentKind};
pub use linker::link;
pub use object::{
    ObjectImage, Relocation, RelocationKind, RelocationTarget, Section, Symbol, SymbolKind,
};
pub use parser::{parse, split_operands, Area, Constant, InstructionRecord, Program, SectionKind};

use tracing::info;

use crate::instructions::InstructionSet;

/// Assembles and links `source` with the Thumb instruction set.
pub fn assemble(source: &str) -> Result<Executable, AsmError> {
    assemble_with(source, &InstructionSet::thumb())
}

pub fn assemble_with(source: &str, set: &InstructionSet) -> Result<Executable, AsmError> {
    let program = parse(source, set)?;
    let object = encode(&program, set)?;
    let (sections, relocations) = (object.sections.len(), object.relocations.len());
    let executable = link(object, set)?;
    info!(sections, relocations, bytes = executable.content.len(), "assembled");
    Ok(executable)
}
