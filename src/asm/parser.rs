//! Assembly text to areas of instruction records.
//!
//! One statement per line: `[label[:]] MNEMONIC operand, operand ; comment`.
//! Operands are split on top-level commas; `[...]`, `{...}`, `"..."` and
//! `'...'` are kept whole.

use serde::{Deserialize, Serialize};

use super::error::AsmError;
use crate::instructions::operands::{is_label, parse_number};
use crate::instructions::InstructionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    Code,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRecord {
    pub label: Option<String>,
    /// Upper case.
    pub mnemonic: String,
    pub operands: Vec<String>,
    /// 0-based source line.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    pub name: String,
    pub kind: SectionKind,
    pub read_only: bool,
    pub records: Vec<InstructionRecord>,
}

/// `NAME EQU value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub value: i64,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub areas: Vec<Area>,
    pub constants: Vec<Constant>,
}

/// Directives that become records and are expanded by the encoder.
pub const DATA_DIRECTIVES: [&str; 7] = ["DCB", "DCW", "DCD", "SPACE", "FILL", "%", "ALIGN"];
const IGNORED_DIRECTIVES: [&str; 6] = ["THUMB", "PRESERVE8", "EXPORT", "GLOBAL", "ENTRY", "IMPORT"];

const DEFAULT_AREA: &str = ".text";

fn is_directive(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    DATA_DIRECTIVES.contains(&upper.as_str())
        || IGNORED_DIRECTIVES.contains(&upper.as_str())
        || matches!(upper.as_str(), "AREA" | "EQU" | "END")
}

/// Drops a `;` comment, ignoring semicolons inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, ';') => return &line[..i],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

/// Splits on commas outside brackets, braces and quotes.
pub fn split_operands(text: &str) -> Option<Vec<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Vec::new());
    }
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote = None;
    for c in text.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '{') => depth += 1,
            (None, ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        if depth < 0 {
            return None;
        }
        current.push(c);
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    out.push(current.trim().to_string());
    if out.iter().any(String::is_empty) {
        return None;
    }
    Some(out)
}

struct Parser<'a> {
    set: &'a InstructionSet,
    program: Program,
    pending: Option<(String, usize)>,
}

impl<'a> Parser<'a> {
    fn known(&self, word: &str) -> bool {
        is_directive(word) || self.set.is_mnemonic(word)
    }

    fn current_area(&mut self) -> &mut Area {
        if self.program.areas.is_empty() {
            self.program.areas.push(Area {
                name: DEFAULT_AREA.to_string(),
                kind: SectionKind::Code,
                read_only: true,
                records: Vec::new(),
            });
        }
        let last = self.program.areas.len() - 1;
        &mut self.program.areas[last]
    }

    fn push(&mut self, label: Option<String>, mnemonic: String, operands: Vec<String>, line: usize) {
        self.current_area().records.push(InstructionRecord {
            label,
            mnemonic,
            operands,
            line,
        });
    }

    /// A label with nothing after it becomes a zero-length record.
    fn flush_pending(&mut self) {
        if let Some((label, line)) = self.pending.take() {
            self.push(Some(label), "SPACE".into(), vec!["0".into()], line);
        }
    }

    /// The record's own label wins; an earlier label-only line is then
    /// emitted on its own.
    fn take_label(&mut self, label: Option<String>) -> Option<String> {
        match label {
            Some(label) => {
                self.flush_pending();
                Some(label)
            }
            None => self.pending.take().map(|(label, _)| label),
        }
    }

    /// Returns `false` once `END` is reached.
    fn line(&mut self, number: usize, raw: &str) -> Result<bool, AsmError> {
        let syntax = |message: String| AsmError::Syntax {
            line: number,
            message,
        };
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            return Ok(true);
        }
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (text, ""),
        };

        let (label, statement) = if let Some(name) = head.strip_suffix(':') {
            (Some(name.to_string()), rest)
        } else if self.known(head) {
            (None, text)
        } else if rest.is_empty() {
            // A bare word is a label only from column 0.
            if raw.starts_with(char::is_whitespace) {
                return Err(syntax(format!("unknown mnemonic `{head}`")));
            }
            (Some(head.to_string()), "")
        } else {
            let next = rest.split_whitespace().next().unwrap_or_default();
            if !self.known(next) {
                return Err(syntax(format!("unknown mnemonic `{head}`")));
            }
            (Some(head.to_string()), rest)
        };

        if let Some(name) = &label {
            if !is_label(name) || name.starts_with('$') {
                return Err(syntax(format!("invalid label `{name}`")));
            }
        }

        if statement.is_empty() {
            if let Some(name) = label {
                self.flush_pending();
                self.pending = Some((name, number));
            }
            return Ok(true);
        }

        let (mnemonic, operand_text) = match statement.split_once(char::is_whitespace) {
            Some((m, o)) => (m.to_ascii_uppercase(), o),
            None => (statement.to_ascii_uppercase(), ""),
        };
        if !self.known(&mnemonic) {
            return Err(syntax(format!("unknown mnemonic `{mnemonic}`")));
        }
        let operands = split_operands(operand_text)
            .ok_or_else(|| syntax(format!("malformed operands `{}`", operand_text.trim())))?;

        match mnemonic.as_str() {
            "END" => {
                if let Some(name) = label {
                    self.flush_pending();
                    self.pending = Some((name, number));
                }
                return Ok(false);
            }
            "AREA" => {
                if label.is_some() {
                    return Err(syntax("AREA takes no label".into()));
                }
                self.flush_pending();
                self.program.areas.push(area(&operands).map_err(syntax)?);
            }
            "EQU" => {
                let name = label.ok_or_else(|| syntax("EQU needs a name".into()))?;
                let [value] = operands.as_slice() else {
                    return Err(syntax("EQU takes one value".into()));
                };
                let value = parse_number(value.trim_start_matches('#'))
                    .ok_or_else(|| syntax(format!("`{value}` is not a number")))?;
                self.program.constants.push(Constant {
                    name,
                    value,
                    line: number,
                });
            }
            m if IGNORED_DIRECTIVES.contains(&m) => {
                if let Some(name) = label {
                    self.flush_pending();
                    self.pending = Some((name, number));
                }
            }
            _ => {
                let label = self.take_label(label);
                self.push(label, mnemonic, operands, number);
            }
        }
        Ok(true)
    }
}

/// `AREA name, CODE|DATA[, READONLY|READWRITE]...`
fn area(operands: &[String]) -> Result<Area, String> {
    let [name, kind, attributes @ ..] = operands else {
        return Err("AREA needs a name and CODE or DATA".into());
    };
    let kind = match kind.to_ascii_uppercase().as_str() {
        "CODE" => SectionKind::Code,
        "DATA" => SectionKind::Data,
        other => return Err(format!("unknown area kind `{other}`")),
    };
    let mut read_only = kind == SectionKind::Code;
    for attribute in attributes {
        match attribute.to_ascii_uppercase().as_str() {
            "READONLY" => read_only = true,
            "READWRITE" => read_only = false,
            // ALIGN=n and the like are accepted and ignored.
            _ => {}
        }
    }
    Ok(Area {
        name: name.clone(),
        kind,
        read_only,
        records: Vec::new(),
    })
}

pub fn parse(source: &str, set: &InstructionSet) -> Result<Program, AsmError> {
    let mut parser = Parser {
        set,
        program: Program::default(),
        pending: None,
    };
    for (number, raw) in source.lines().enumerate() {
        if !parser.line(number, raw)? {
            break;
        }
    }
    parser.flush_pending();
    Ok(parser.program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(label: Option<&str>, mnemonic: &str, operands: &[&str], line: usize) -> InstructionRecord {
        InstructionRecord {
            label: label.map(String::from),
            mnemonic: mnemonic.into(),
            operands: operands.iter().map(|s| s.to_string()).collect(),
            line,
        }
    }

    #[test]
    fn keeps_bracketed_operands_whole() {
        assert_eq!(
            split_operands("R1, [R2, #0x11]"),
            Some(vec!["R1".to_string(), "[R2, #0x11]".to_string()])
        );
        assert_eq!(
            split_operands("{R0-R3, LR}"),
            Some(vec!["{R0-R3, LR}".to_string()])
        );
        assert_eq!(
            split_operands("\"a,b\", 0"),
            Some(vec!["\"a,b\"".to_string(), "0".to_string()])
        );
        assert_eq!(split_operands("R1, [R2"), None);
        assert_eq!(split_operands("R1,,R2"), None);
    }

    #[test]
    fn labels_and_areas() {
        let set = InstructionSet::thumb();
        let src = "\
    AREA main, CODE, READONLY
start   MOVS R1, #1 ; set up
loop:
        adds r1, r1, #1
        B loop
    AREA vars, DATA, READWRITE
count   DCD 0
";
        let program = parse(src, &set).unwrap();
        assert_eq!(program.areas.len(), 2);
        let main = &program.areas[0];
        assert_eq!(main.kind, SectionKind::Code);
        assert!(main.read_only);
        assert_eq!(
            main.records,
            vec![
                record(Some("start"), "MOVS", &["R1", "#1"], 1),
                record(Some("loop"), "ADDS", &["r1", "r1", "#1"], 3),
                record(None, "B", &["loop"], 4),
            ]
        );
        let vars = &program.areas[1];
        assert_eq!(vars.kind, SectionKind::Data);
        assert!(!vars.read_only);
        assert_eq!(vars.records, vec![record(Some("count"), "DCD", &["0"], 6)]);
    }

    #[test]
    fn implicit_area_constants_and_end() {
        let set = InstructionSet::thumb();
        let src = "LIMIT EQU 0x10\n  THUMB\n  NOP\ndone\n  END\n  NOP\n";
        let program = parse(src, &set).unwrap();
        assert_eq!(
            program.constants,
            vec![Constant {
                name: "LIMIT".into(),
                value: 16,
                line: 0
            }]
        );
        assert_eq!(program.areas.len(), 1);
        assert_eq!(program.areas[0].name, ".text");
        assert_eq!(
            program.areas[0].records,
            vec![
                record(None, "NOP", &[], 2),
                record(Some("done"), "SPACE", &["0"], 3),
            ]
        );
    }

    #[test]
    fn rejects_unknown_mnemonics() {
        let set = InstructionSet::thumb();
        let err = parse("  FROB R1, R2\n", &set).unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 0, .. }));
        let err = parse("  MOVS R1\n  AREA x, STACK\n", &set).unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 1, .. }));
        let err = parse("  NOP\n  NOPE\n", &set).unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 1, .. }));
    }

    #[test]
    fn bare_labels_start_in_column_zero() {
        let set = InstructionSet::thumb();
        let program = parse("here\n  there:\n  NOP\n", &set).unwrap();
        assert_eq!(
            program.areas[0].records,
            vec![
                record(Some("here"), "SPACE", &["0"], 0),
                record(Some("there"), "NOP", &[], 2),
            ]
        );
    }
}
