//! Places sections at their load addresses and resolves relocations.
//!
//! Code segment at flash origin: a two-word vector table (initial SP, entry
//! point), then every code section followed by an end-of-code marker and
//! padded to a word. Data sections follow each other at RAM origin.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::encoder::data_bytes;
use super::error::AsmError;
use super::executable::{Executable, Segment, SegmentKind};
use super::object::{ObjectImage, RelocationKind, RelocationTarget, SymbolKind};
use super::parser::SectionKind;
use crate::binary::Word;
use crate::cpu::{CODE_ENTRY, END_OF_CODE, FLASH_ORIGIN, INITIAL_SP, RAM_ORIGIN};
use crate::instructions::{InstructionError, InstructionSet, LabelOffsets};

/// Where a section ended up.
#[derive(Debug, Clone, Copy)]
struct Placement {
    address: u32,
    file_offset: usize,
}

/// `origin + offset`, or an error naming the section that would not fit.
fn address(origin: u32, offset: usize, section: &str) -> Result<u32, AsmError> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| origin.checked_add(offset))
        .ok_or_else(|| AsmError::SectionOverflow {
            name: section.to_string(),
        })
}

fn pad_to_word(content: &mut Vec<u8>, start: usize) {
    while (content.len() - start) % 4 != 0 {
        content.push(0);
    }
}

/// Consumes the object image: its section and symbol tables do not survive
/// linking, only the resolved symbol values carried by the executable.
pub fn link(object: ObjectImage, set: &InstructionSet) -> Result<Executable, AsmError> {
    let mut content = Vec::new();
    let mut placements: Vec<Option<Placement>> = vec![None; object.sections.len()];

    content.extend(Word::new(INITIAL_SP).to_le_bytes());
    content.extend(Word::new(CODE_ENTRY).to_le_bytes());
    let mut code_sections = 0;
    for (index, section) in object.sections_of(SectionKind::Code) {
        let placement = Placement {
            address: address(FLASH_ORIGIN, content.len(), &section.name)?,
            file_offset: content.len(),
        };
        debug!(section = %section.name, address = %Word::new(placement.address), size = section.size, "placed code");
        placements[index] = Some(placement);
        content.extend_from_slice(object.section_bytes(index)?);
        content.extend(END_OF_CODE.to_le_bytes());
        pad_to_word(&mut content, 0);
        code_sections += 1;
    }
    if code_sections == 0 {
        content.extend(END_OF_CODE.to_le_bytes());
        pad_to_word(&mut content, 0);
    }
    let mut segments = vec![Segment {
        kind: SegmentKind::Load,
        file_offset: 0,
        size: content.len(),
        physical_address: FLASH_ORIGIN,
    }];

    let data_start = content.len();
    for (index, section) in object.sections_of(SectionKind::Data) {
        let placement = Placement {
            address: address(RAM_ORIGIN, content.len() - data_start, &section.name)?,
            file_offset: content.len(),
        };
        debug!(section = %section.name, address = %Word::new(placement.address), size = section.size, "placed data");
        placements[index] = Some(placement);
        content.extend_from_slice(object.section_bytes(index)?);
        pad_to_word(&mut content, data_start);
    }
    if content.len() > data_start {
        segments.push(Segment {
            kind: SegmentKind::Load,
            file_offset: data_start,
            size: content.len() - data_start,
            physical_address: RAM_ORIGIN,
        });
    }

    let placement = |index: usize| {
        placements
            .get(index)
            .copied()
            .flatten()
            .ok_or(AsmError::MissingSection { index })
    };

    let mut symbols = BTreeMap::new();
    for (name, symbol) in &object.symbols {
        let value = match (symbol.kind, symbol.section) {
            (SymbolKind::Constant, _) | (SymbolKind::Address, None) => symbol.value,
            (SymbolKind::Address, Some(index)) => {
                i64::from(placement(index)?.address) + symbol.value
            }
        };
        symbols.insert(name.clone(), value);
    }
    let addresses: Vec<(&String, Word)> = object
        .symbols
        .iter()
        .filter(|(_, s)| s.kind == SymbolKind::Address)
        .map(|(name, _)| (name, Word::new(symbols[name] as u32)))
        .collect();

    for relocation in &object.relocations {
        let place = placement(relocation.section)?;
        let site = place.address + relocation.offset as u32;
        let at = place.file_offset + relocation.offset;
        let bytes = match (&relocation.kind, &relocation.target) {
            (RelocationKind::Code, RelocationTarget::Record(record)) => {
                let mut labels = LabelOffsets::new(Word::new(site));
                for (name, address) in &addresses {
                    labels.insert(name.as_str(), *address);
                }
                let halfwords = set
                    .encode(&record.mnemonic, &record.operands, Some(&labels))
                    .map_err(|source| match source {
                        InstructionError::UnknownLabel { label } => AsmError::UnresolvedSymbol {
                            line: record.line,
                            name: label,
                        },
                        source => AsmError::Instruction {
                            line: record.line,
                            mnemonic: record.mnemonic.clone(),
                            operands: record.operands.clone(),
                            source,
                        },
                    })?;
                halfwords.iter().flat_map(|h| h.to_le_bytes()).collect::<Vec<u8>>()
            }
            (_, RelocationTarget::Symbol(name)) => {
                let value = *symbols.get(name).ok_or_else(|| AsmError::UnresolvedSymbol {
                    line: relocation.line,
                    name: name.clone(),
                })?;
                data_bytes(value, relocation.length).map_err(|source| AsmError::Value {
                    line: relocation.line,
                    mnemonic: "DC".to_string(),
                    operand: name.clone(),
                    source,
                })?
            }
            (RelocationKind::Data, RelocationTarget::Record(record)) => {
                return Err(AsmError::Syntax {
                    line: record.line,
                    message: "data relocation refers to an instruction".into(),
                })
            }
        };
        trace!(site = %Word::new(site), len = bytes.len(), "relocated");
        content[at..at + bytes.len()].copy_from_slice(&bytes);
    }

    let mut source_map = BTreeMap::new();
    for &(section, offset, line) in &object.source_map {
        source_map.insert(placement(section)?.address + offset as u32, line);
    }

    // Literal-pool labels are internal to the assembler.
    symbols.retain(|name, _| !name.starts_with('$'));
    Ok(Executable {
        segments,
        content,
        source_map,
        symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::encoder::encode;
    use crate::asm::parser::parse;
    use pretty_assertions::assert_eq;

    fn build(src: &str) -> Result<Executable, AsmError> {
        let set = InstructionSet::thumb();
        link(encode(&parse(src, &set)?, &set)?, &set)
    }

    #[test]
    fn empty_program_still_has_a_marker() {
        let exe = build("").unwrap();
        assert_eq!(
            exe.content,
            vec![0x00, 0x20, 0x00, 0x20, 0x08, 0x00, 0x00, 0x08, 0xFF, 0xFF, 0, 0]
        );
        assert_eq!(exe.segments.len(), 1);
    }

    #[test]
    fn data_lands_in_ram() {
        let exe = build("  AREA d, DATA\nx DCD 7\ny DCB 1\n  AREA e, DATA\nz DCD x\n").unwrap();
        assert_eq!(exe.symbol("x"), Some(0x2000_0000));
        assert_eq!(exe.symbol("y"), Some(0x2000_0004));
        assert_eq!(exe.symbol("z"), Some(0x2000_0008));
        assert_eq!(exe.bytes_at(0x2000_0008, 4), Some(&[0, 0, 0, 0x20][..]));
    }

    #[test]
    fn placement_addresses_are_checked() {
        assert_eq!(address(FLASH_ORIGIN, 8, "code"), Ok(0x0800_0008));
        assert_eq!(
            address(RAM_ORIGIN, 0xE000_0000, "data"),
            Err(AsmError::SectionOverflow {
                name: "data".into()
            })
        );
        assert!(address(RAM_ORIGIN, usize::MAX, "data").is_err());
    }

    #[test]
    fn undefined_symbols_are_reported() {
        assert_eq!(
            build("  B nowhere\n").unwrap_err(),
            AsmError::UnresolvedSymbol {
                line: 0,
                name: "nowhere".into()
            }
        );
        assert_eq!(
            build("  AREA d, DATA\n  DCD nowhere\n").unwrap_err(),
            AsmError::UnresolvedSymbol {
                line: 1,
                name: "nowhere".into()
            }
        );
    }
}
