//! Parsed program to relocatable object image.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::error::AsmError;
use super::object::{
    ObjectImage, Relocation, RelocationKind, RelocationTarget, Section, Symbol, SymbolKind,
};
use super::parser::{Area, InstructionRecord, Program, SectionKind, DATA_DIRECTIVES};
use crate::binary::{Byte, Halfword, ValueError, Word};
use crate::cpu::{END_OF_CODE, FLASH_ORIGIN, RAM_ORIGIN};
use crate::instructions::operands::{is_label, parse_number};
use crate::instructions::InstructionSet;

/// Largest section the address map can hold: flash ends where RAM begins.
const MAX_SECTION_SIZE: usize = (RAM_ORIGIN - FLASH_ORIGIN) as usize;

/// Little-endian bytes of `value` in a `size`-byte field, read as unsigned
/// first and then as two's complement.
pub(crate) fn data_bytes(value: i64, size: usize) -> Result<Vec<u8>, ValueError> {
    Ok(match size {
        1 => Byte::from_unsigned(value)
            .or_else(|_| Byte::from_signed(value))?
            .to_le_bytes()
            .to_vec(),
        2 => Halfword::from_unsigned(value)
            .or_else(|_| Halfword::from_signed(value))?
            .to_le_bytes()
            .to_vec(),
        _ => Word::from_unsigned(value)
            .or_else(|_| Word::from_signed(value))?
            .to_le_bytes()
            .to_vec(),
    })
}

fn data_size(mnemonic: &str) -> Option<usize> {
    match mnemonic {
        "DCB" => Some(1),
        "DCW" => Some(2),
        "DCD" => Some(4),
        _ => None,
    }
}

fn unquote(op: &str) -> Option<&str> {
    op.strip_prefix('"')?.strip_suffix('"')
}

fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        let c = if c == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some(other) => other,
                None => '\\',
            }
        } else {
            c
        };
        let mut buf = [0; 4];
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }
    out
}

/// Replaces `#NAME` with the value of constant `NAME`.
fn substitute_constants(op: &str, constants: &HashMap<String, i64>) -> String {
    if constants.is_empty() || !op.contains('#') {
        return op.to_string();
    }
    let mut out = String::with_capacity(op.len());
    let mut rest = op;
    while let Some(pos) = rest.find('#') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..end];
        match constants.get(name) {
            Some(value) => out.push_str(&value.to_string()),
            None => out.push_str(name),
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

struct Literal {
    label: String,
    value: String,
    line: usize,
}

struct Encoder<'a> {
    set: &'a InstructionSet,
    image: ObjectImage,
    constants: HashMap<String, i64>,
    literal_count: usize,
}

impl<'a> Encoder<'a> {
    fn section_offset(&self, start: usize) -> usize {
        self.image.content.len() - start
    }

    fn align(&mut self, start: usize, alignment: usize) {
        while self.section_offset(start) % alignment != 0 {
            self.image.content.push(0);
        }
    }

    fn value_of(&self, operand: &str) -> Option<i64> {
        let t = operand.trim().trim_start_matches('#');
        parse_number(t).or_else(|| self.constants.get(t).copied())
    }

    fn area(&mut self, area: &Area) -> Result<(), AsmError> {
        let index = self.image.sections.len();
        let start = self.image.content.len();
        let mut literals: Vec<Literal> = Vec::new();
        for record in &area.records {
            self.record(index, start, record, &mut literals)?;
        }
        if !literals.is_empty() {
            // Execution must stop before running into pooled data.
            if area.kind == SectionKind::Code {
                self.image.content.extend(END_OF_CODE.to_le_bytes());
            }
            self.align(start, 4);
            for literal in literals {
                let offset = self.section_offset(start);
                self.image.define(
                    &literal.label,
                    Symbol {
                        kind: SymbolKind::Address,
                        section: Some(index),
                        value: offset as i64,
                    },
                    literal.line,
                )?;
                self.data(index, start, "DCD", &literal.value, literal.line, 4)?;
            }
        }
        let size = self.section_offset(start);
        debug!(section = %area.name, index, size, "section encoded");
        self.image.sections.push(Section {
            kind: area.kind,
            name: area.name.clone(),
            offset: start,
            size,
        });
        Ok(())
    }

    fn record(
        &mut self,
        index: usize,
        start: usize,
        record: &InstructionRecord,
        literals: &mut Vec<Literal>,
    ) -> Result<(), AsmError> {
        let mnemonic = record.mnemonic.as_str();
        let is_instruction = !DATA_DIRECTIVES.contains(&mnemonic);
        let alignment = match mnemonic {
            "DCW" => 2,
            "DCD" => 4,
            _ if is_instruction => 2,
            _ => 1,
        };
        self.align(start, alignment);
        let offset = self.section_offset(start);
        if let Some(label) = &record.label {
            self.image.define(
                label,
                Symbol {
                    kind: SymbolKind::Address,
                    section: Some(index),
                    value: offset as i64,
                },
                record.line,
            )?;
        }
        self.image.source_map.push((index, offset, record.line));

        let syntax = |message: String| AsmError::Syntax {
            line: record.line,
            message,
        };
        if let Some(size) = data_size(mnemonic) {
            if record.operands.is_empty() {
                return Err(syntax(format!("{mnemonic} needs at least one value")));
            }
            for operand in &record.operands {
                match unquote(operand) {
                    Some(text) if size == 1 => self.image.content.extend(unescape(text)),
                    _ => self.data(index, start, mnemonic, operand, record.line, size)?,
                }
            }
            return Ok(());
        }
        match mnemonic {
            "SPACE" | "%" | "FILL" => {
                let (count, fill) = match record.operands.as_slice() {
                    [count] => (count, None),
                    [count, fill] if mnemonic == "FILL" => (count, Some(fill)),
                    _ => return Err(syntax(format!("malformed {mnemonic}"))),
                };
                let text = count;
                let count = self
                    .value_of(text)
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| syntax(format!("`{text}` is not a byte count")))?;
                let size = self.section_offset(start).checked_add(count);
                if size.map_or(true, |size| size > MAX_SECTION_SIZE) {
                    return Err(syntax(format!(
                        "{mnemonic} {text} overflows the section ({MAX_SECTION_SIZE:#x} bytes at most)"
                    )));
                }
                let fill = match fill {
                    Some(f) => {
                        let value = self
                            .value_of(f)
                            .ok_or_else(|| syntax(format!("`{f}` is not a number")))?;
                        data_bytes(value, 1).map_err(|source| AsmError::Value {
                            line: record.line,
                            mnemonic: mnemonic.to_string(),
                            operand: f.clone(),
                            source,
                        })?[0]
                    }
                    None => 0,
                };
                self.image.content.extend(std::iter::repeat(fill).take(count));
            }
            "ALIGN" => {
                let alignment = match record.operands.as_slice() {
                    [] => 4,
                    [n] => self
                        .value_of(n)
                        .and_then(|n| usize::try_from(n).ok())
                        .filter(|n| n.is_power_of_two())
                        .ok_or_else(|| syntax(format!("`{n}` is not a power of two")))?,
                    _ => return Err(syntax("ALIGN takes at most one value".into())),
                };
                self.align(start, alignment);
            }
            _ => self.instruction(index, start, record, literals)?,
        }
        Ok(())
    }

    /// One numeric or symbolic data value of `size` bytes.
    fn data(
        &mut self,
        index: usize,
        start: usize,
        mnemonic: &str,
        operand: &str,
        line: usize,
        size: usize,
    ) -> Result<(), AsmError> {
        if let Some(value) = self.value_of(operand) {
            let bytes = data_bytes(value, size).map_err(|source| AsmError::Value {
                line,
                mnemonic: mnemonic.to_string(),
                operand: operand.to_string(),
                source,
            })?;
            self.image.content.extend(bytes);
            return Ok(());
        }
        if !is_label(operand) {
            return Err(AsmError::Syntax {
                line,
                message: format!("`{operand}` is neither a number nor a symbol"),
            });
        }
        self.image.relocations.push(Relocation {
            kind: RelocationKind::Data,
            section: index,
            offset: self.section_offset(start),
            length: size,
            target: RelocationTarget::Symbol(operand.trim().to_string()),
            line,
        });
        self.image.content.extend(std::iter::repeat(0).take(size));
        Ok(())
    }

    fn instruction(
        &mut self,
        index: usize,
        start: usize,
        record: &InstructionRecord,
        literals: &mut Vec<Literal>,
    ) -> Result<(), AsmError> {
        let mut operands = Vec::with_capacity(record.operands.len());
        for operand in &record.operands {
            let operand = match operand.trim().strip_prefix('=') {
                Some(value) => {
                    let value = value.trim().to_string();
                    match literals.iter().find(|l| l.value == value) {
                        Some(existing) => existing.label.clone(),
                        None => {
                            let label = format!("$lit{}", self.literal_count);
                            self.literal_count += 1;
                            trace!(%label, %value, "literal pooled");
                            literals.push(Literal {
                                label: label.clone(),
                                value,
                                line: record.line,
                            });
                            label
                        }
                    }
                }
                None => substitute_constants(operand, &self.constants),
            };
            operands.push(operand);
        }

        let wrap = |source| AsmError::Instruction {
            line: record.line,
            mnemonic: record.mnemonic.clone(),
            operands: record.operands.clone(),
            source,
        };
        let form = self.set.find(&record.mnemonic, &operands).map_err(wrap)?;
        let halfwords = form.encode(&operands, None).map_err(wrap)?;
        if form.needs_labels() {
            self.image.relocations.push(Relocation {
                kind: RelocationKind::Code,
                section: index,
                offset: self.section_offset(start),
                length: 2 * halfwords.len(),
                target: RelocationTarget::Record(InstructionRecord {
                    operands,
                    ..record.clone()
                }),
                line: record.line,
            });
        }
        for h in halfwords {
            self.image.content.extend(h.to_le_bytes());
        }
        Ok(())
    }
}

/// Encodes every area into its own section. Instructions that refer to
/// labels get placeholder bytes and a code relocation; symbolic data values
/// get a data relocation.
pub fn encode(program: &Program, set: &InstructionSet) -> Result<ObjectImage, AsmError> {
    let mut encoder = Encoder {
        set,
        image: ObjectImage::default(),
        constants: HashMap::new(),
        literal_count: 0,
    };
    for constant in &program.constants {
        encoder.image.define(
            &constant.name,
            Symbol {
                kind: SymbolKind::Constant,
                section: None,
                value: constant.value,
            },
            constant.line,
        )?;
        encoder.constants.insert(constant.name.clone(), constant.value);
    }
    for area in &program.areas {
        encoder.area(area)?;
    }
    Ok(encoder.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::parser::parse;
    use pretty_assertions::assert_eq;

    fn object(src: &str) -> Result<ObjectImage, AsmError> {
        let set = InstructionSet::thumb();
        encode(&parse(src, &set)?, &set)
    }

    #[test]
    fn data_directives_align_and_pack() {
        let image = object(
            "  AREA d, DATA\nmsg DCB \"hi\", 0\nval DCD 0x11223344\nhalf DCW -1\n  ALIGN\ntail SPACE 2\n",
        )
        .unwrap();
        assert_eq!(
            image.content,
            vec![b'h', b'i', 0, 0, 0x44, 0x33, 0x22, 0x11, 0xFF, 0xFF, 0, 0, 0, 0]
        );
        assert_eq!(image.symbols["val"].value, 4);
        assert_eq!(image.symbols["half"].value, 8);
        assert_eq!(image.symbols["tail"].value, 12);
        assert_eq!(image.sections[0].size, 14);
    }

    #[test]
    fn constants_substitute_into_immediates() {
        let image = object("N EQU 5\n  MOVS R0, #N\n").unwrap();
        assert_eq!(image.content, vec![0x05, 0x20]);
        assert_eq!(image.symbols["N"].kind, SymbolKind::Constant);
    }

    #[test]
    fn labels_become_relocations() {
        let image = object("start B start\n  LDR R0, =0x12345678\n  DCD start\n").unwrap();
        let kinds: Vec<_> = image.relocations.iter().map(|r| (r.kind, r.offset)).collect();
        assert_eq!(
            kinds,
            vec![
                (RelocationKind::Code, 0),
                (RelocationKind::Code, 2),
                (RelocationKind::Data, 4),
            ]
        );
        // The pool follows an end-of-code marker, word aligned.
        assert_eq!(&image.content[8..10], &[0xFF, 0xFF]);
        assert_eq!(image.symbols["$lit0"].value, 12);
        assert_eq!(&image.content[12..16], &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn data_out_of_range_is_reported() {
        let err = object("  AREA d, DATA\n  DCB 300\n").unwrap_err();
        assert!(matches!(err, AsmError::Value { line: 1, .. }));
    }

    #[test]
    fn oversized_reservations_are_rejected() {
        let err = object("  AREA d, DATA\nx SPACE 0x7FFFFFFFFFFF\n").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 1, .. }), "{err}");
        let err = object("  AREA d, DATA\n  DCB 1\n  FILL 0x18000000, 0xFF\n").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 2, .. }), "{err}");
        assert!(object("  AREA d, DATA\n  SPACE 16\n").is_ok());
    }
}
