//! Relocatable output of the encoder: section bytes plus everything the
//! linker still has to resolve.

use std::collections::BTreeMap;

use super::error::AsmError;
use super::parser::{InstructionRecord, SectionKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub name: String,
    /// Start within `ObjectImage::content`.
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `EQU` value.
    Constant,
    /// Offset into a section.
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub section: Option<usize>,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    /// Re-encode an instruction once label addresses are known.
    Code,
    /// Patch a data value with a symbol's final value.
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationTarget {
    Record(InstructionRecord),
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub kind: RelocationKind,
    pub section: usize,
    /// Offset within the section.
    pub offset: usize,
    /// Bytes to patch.
    pub length: usize,
    pub target: RelocationTarget,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectImage {
    pub content: Vec<u8>,
    pub sections: Vec<Section>,
    pub symbols: BTreeMap<String, Symbol>,
    pub relocations: Vec<Relocation>,
    /// `(section, offset, line)` for every emitted record.
    pub source_map: Vec<(usize, usize, usize)>,
}

impl ObjectImage {
    pub fn define(&mut self, name: &str, symbol: Symbol, line: usize) -> Result<(), AsmError> {
        if self.symbols.contains_key(name) {
            return Err(AsmError::DuplicateSymbol {
                line,
                name: name.to_string(),
            });
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn section_bytes(&self, index: usize) -> Result<&[u8], AsmError> {
        let section = self
            .sections
            .get(index)
            .ok_or(AsmError::MissingSection { index })?;
        Ok(&self.content[section.offset..section.offset + section.size])
    }

    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = (usize, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.kind == kind)
    }
}
