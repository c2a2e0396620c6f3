use pretty_assertions::assert_eq;

use thumb_rs::asm::{
    encode, link, parse, Area, InstructionRecord, ObjectImage, Program, Relocation,
    RelocationKind, RelocationTarget, Section, SectionKind,
};
use thumb_rs::{assemble, InstructionSet};

fn movs(line: usize) -> InstructionRecord {
    InstructionRecord {
        label: None,
        mnemonic: "MOVS".into(),
        operands: vec!["R1".into(), "R2".into()],
        line,
    }
}

fn code_area(name: &str, records: Vec<InstructionRecord>) -> Area {
    Area {
        name: name.into(),
        kind: SectionKind::Code,
        read_only: true,
        records,
    }
}

#[test]
fn code_sections_are_terminated_and_word_aligned() {
    let set = InstructionSet::thumb();
    let program = Program {
        areas: vec![
            code_area("first", vec![movs(0), movs(1)]),
            code_area("second", vec![movs(2), movs(3)]),
        ],
        constants: vec![],
    };
    let exe = link(encode(&program, &set).unwrap(), &set).unwrap();
    assert_eq!(
        exe.content,
        vec![
            0x00, 0x20, 0x00, 0x20, 0x08, 0x00, 0x00, 0x08, //
            0x11, 0x00, 0x11, 0x00, 0xFF, 0xFF, 0x00, 0x00, //
            0x11, 0x00, 0x11, 0x00, 0xFF, 0xFF, 0x00, 0x00,
        ]
    );
    assert_eq!(exe.segments.len(), 1);
    assert_eq!(
        exe.source_map.into_iter().collect::<Vec<_>>(),
        vec![
            (0x0800_0008, 0),
            (0x0800_000A, 1),
            (0x0800_0010, 2),
            (0x0800_0012, 3),
        ]
    );
}

#[test]
fn data_may_point_at_code() {
    let exe = assemble("start MOVS R1, R2\n  AREA d, DATA\nptr DCD start\n").unwrap();
    assert_eq!(exe.symbol("start"), Some(0x0800_0008));
    assert_eq!(exe.symbol("ptr"), Some(0x2000_0000));
    assert_eq!(exe.bytes_at(0x2000_0000, 4), Some(&[0x08, 0x00, 0x00, 0x08][..]));
    assert_eq!(exe.segments.len(), 2);
}

#[test]
fn relocated_branches_match_their_displacement() {
    let set = InstructionSet::thumb();
    let src = "
        B fwd
        NOP
        NOP
fwd     BEQ back
back    NOP
    ";
    let exe = link(encode(&parse(src, &set).unwrap(), &set).unwrap(), &set).unwrap();
    for (site, target) in [(0x0800_0008u32, "fwd"), (0x0800_000E, "back")] {
        let bytes = exe.bytes_at(site, 2).unwrap();
        let opcode = u16::from_le_bytes([bytes[0], bytes[1]]);
        let target = exe.symbol(target).unwrap();
        let offset = (target - i64::from(site) - 4) / 2;
        let bits = if opcode >> 11 == 0b11100 { 11 } else { 8 };
        let raw = i64::from(opcode) & ((1 << bits) - 1);
        let field = (raw << (64 - bits)) >> (64 - bits);
        assert_eq!(field, offset, "{site:#x}");
    }
}

#[test]
fn linked_executables_keep_their_symbols() {
    let exe = assemble("LIMIT EQU 3\nmain MOVS R0, #LIMIT\n").unwrap();
    assert_eq!(exe.symbol("LIMIT"), Some(3));
    assert_eq!(exe.symbol("main"), Some(0x0800_0008));
    assert_eq!(exe.line_at(0x0800_0008), Some(1));
}

#[test]
fn code_relocation_is_spliced_before_the_marker() {
    let set = InstructionSet::thumb();
    let object = ObjectImage {
        content: vec![0, 0],
        sections: vec![Section {
            kind: SectionKind::Code,
            name: "code".into(),
            offset: 0,
            size: 2,
        }],
        relocations: vec![Relocation {
            kind: RelocationKind::Code,
            section: 0,
            offset: 0,
            length: 2,
            target: RelocationTarget::Record(movs(0)),
            line: 0,
        }],
        ..ObjectImage::default()
    };
    let exe = link(object, &set).unwrap();
    let bytes = exe.bytes_at(0x0800_0008, 4).unwrap();
    let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(word, 0xFFFF_0011);
}

#[test]
fn data_sections_are_padded_to_words() {
    let exe = assemble("  AREA d, DATA\nx DCB 1\n  AREA e, DATA\ny DCB 2, 3\n").unwrap();
    let data = &exe.segments[1];
    assert_eq!(data.physical_address, 0x2000_0000);
    assert_eq!(data.size, 8);
    assert_eq!(data.size % 4, 0);
    assert_eq!(exe.symbol("y"), Some(0x2000_0004));
    assert_eq!(exe.bytes_at(0x2000_0000, 8), Some(&[1, 0, 0, 0, 2, 3, 0, 0][..]));
}
