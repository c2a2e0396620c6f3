//! Linked program image, ready to be programmed into a board.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::binary::Word;
use crate::memory::Bus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Copied to `physical_address` before execution.
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub file_offset: usize,
    pub size: usize,
    pub physical_address: u32,
}

impl Segment {
    pub fn contains(&self, addr: u32) -> bool {
        addr.checked_sub(self.physical_address)
            .is_some_and(|off| (off as usize) < self.size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    pub segments: Vec<Segment>,
    pub content: Vec<u8>,
    /// Instruction and data addresses to 0-based source lines.
    pub source_map: BTreeMap<u32, usize>,
    /// Final symbol values: addresses for labels, values for constants.
    pub symbols: BTreeMap<String, i64>,
}

impl Executable {
    pub fn segment_bytes(&self, segment: &Segment) -> &[u8] {
        &self.content[segment.file_offset..segment.file_offset + segment.size]
    }

    /// Copies every load segment to its physical address.
    pub fn load_into(&self, bus: &mut dyn Bus) -> Result<()> {
        for segment in &self.segments {
            match segment.kind {
                SegmentKind::Load => bus
                    .load(Word::new(segment.physical_address), self.segment_bytes(segment))
                    .with_context(|| {
                        format!("loading segment at {:#010x}", segment.physical_address)
                    })?,
            }
        }
        Ok(())
    }

    /// Source line of the record placed at `addr`.
    pub fn line_at(&self, addr: u32) -> Option<usize> {
        self.source_map.get(&addr).copied()
    }

    /// `len` bytes of image content as seen at `addr`.
    pub fn bytes_at(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let segment = self.segments.iter().find(|s| s.contains(addr))?;
        let start = (addr - segment.physical_address) as usize;
        if start + len > segment.size {
            return None;
        }
        let from = segment.file_offset + start;
        Some(&self.content[from..from + len])
    }

    pub fn symbol(&self, name: &str) -> Option<i64> {
        self.symbols.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LinearMemory;

    fn image() -> Executable {
        Executable {
            segments: vec![
                Segment {
                    kind: SegmentKind::Load,
                    file_offset: 0,
                    size: 4,
                    physical_address: 0x100,
                },
                Segment {
                    kind: SegmentKind::Load,
                    file_offset: 4,
                    size: 2,
                    physical_address: 0x200,
                },
            ],
            content: vec![1, 2, 3, 4, 5, 6],
            source_map: BTreeMap::from([(0x100, 0), (0x102, 3)]),
            symbols: BTreeMap::new(),
        }
    }

    #[test]
    fn segments_address_content() {
        let exe = image();
        assert_eq!(exe.bytes_at(0x102, 2), Some(&[3u8, 4][..]));
        assert_eq!(exe.bytes_at(0x201, 1), Some(&[6u8][..]));
        assert_eq!(exe.bytes_at(0x103, 2), None);
        assert_eq!(exe.line_at(0x102), Some(3));
        assert_eq!(exe.line_at(0x104), None);
    }

    #[test]
    fn loads_segments_into_memory() {
        let exe = image();
        let mut mem = LinearMemory::at(0x100, 0x200);
        exe.load_into(&mut mem).unwrap();
        assert_eq!(mem.read_word(Word::new(0x100)).unwrap(), Word::new(0x0403_0201));
        assert_eq!(mem.read_byte(Word::new(0x201)).unwrap().value(), 6);
    }
}
