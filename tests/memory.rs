use pretty_assertions::assert_eq;

use thumb_rs::memory::{Bus, LinearMemory, MemoryMap};
use thumb_rs::{assemble, Board, Byte, CpuConfig, Halfword, Register, Stop, Trap, Word};

fn board(src: &str) -> Board {
    let mut board = Board::new(CpuConfig::default());
    board.load(assemble(src).unwrap()).unwrap();
    board
}

fn run(src: &str) -> Board {
    let mut board = board(src);
    let stop = board.run(10_000).unwrap();
    assert!(matches!(stop, Stop::EndOfCode { .. }), "{stop:?}");
    board
}

fn reg(board: &Board, r: Register) -> u32 {
    board.cpu.regs.read(r).value()
}

#[test]
fn loads_and_stores_of_every_width() {
    let mut board = run("
        LDR R0, =0x20000000
        MOVS R1, #0xAB
        STRB R1, [R0, #1]
        LDRB R2, [R0, #1]
        LDR R3, =0x12345678
        STR R3, [R0, #4]
        LDRH R4, [R0, #6]
        MOVS R5, #4
        LDR R6, [R0, R5]
        MOVS R1, #0x80
        STRB R1, [R0, #2]
        MOVS R5, #2
        LDRSB R7, [R0, R5]
        STRH R3, [R0, #8]
    ");
    assert_eq!(reg(&board, Register::R2), 0xAB);
    assert_eq!(reg(&board, Register::R4), 0x1234);
    assert_eq!(reg(&board, Register::R6), 0x1234_5678);
    assert_eq!(reg(&board, Register::R7), 0xFFFF_FF80);
    let mem = &mut board.memory;
    assert_eq!(mem.read_word(Word::new(0x2000_0000)).unwrap(), Word::new(0x0080_AB00));
    assert_eq!(mem.read_word(Word::new(0x2000_0008)).unwrap(), Word::new(0x5678));
}

#[test]
fn stack_relative_access() {
    let board = run("
        SUB SP, #8
        MOVS R0, #42
        STR R0, [SP, #4]
        LDR R1, [SP, #4]
        ADD SP, #8
    ");
    assert_eq!(reg(&board, Register::R1), 42);
    assert_eq!(reg(&board, Register::SP), 0x2000_2000);
}

#[test]
fn data_area_symbols_and_strings() {
    let mut board = run("
        AREA data, DATA, READWRITE
counter DCD 41
msg     DCB \"Hi\", 0
        AREA code, CODE, READONLY
        LDR R0, =counter
        LDR R1, [R0]
        ADDS R1, #1
        STR R1, [R0]
        LDR R2, =msg
        LDRB R3, [R2, #1]
    ");
    assert_eq!(reg(&board, Register::R2), 0x2000_0004);
    assert_eq!(reg(&board, Register::R3), u32::from(b'i'));
    assert_eq!(
        board.memory.read_word(Word::new(0x2000_0000)).unwrap(),
        Word::new(42)
    );
}

#[test]
fn unaligned_accesses_trap() {
    let mut board = board("
        LDR R0, =0x20000001
        LDR R1, [R0]
    ");
    let trap = board.run(10).unwrap_err();
    assert!(matches!(trap, Trap::Unaligned { addr: 0x2000_0001 }), "{trap}");
}

#[test]
fn unmapped_addresses_are_bus_errors() {
    let mut board = board("
        LDR R0, =0x40000000
        LDR R1, [R0]
    ");
    match board.run(10) {
        Err(Trap::Bus { addr, source }) => {
            assert_eq!(addr, 0x4000_0000);
            assert!(source.to_string().contains("no device responsible"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn flash_ignores_stores() {
    let board = run("
        LDR R0, =0x08000000
        MOVS R1, #0
        STR R1, [R0]
        LDR R2, [R0]
    ");
    assert_eq!(reg(&board, Register::R2), 0x2000_2000);
}

#[test]
fn memory_map_routes_by_address() {
    let cfg = CpuConfig::default();
    let mut map = MemoryMap::new(&cfg);
    map.write_halfword(Word::new(0x2000_7FFE), Halfword::new(0xBEEF)).unwrap();
    assert_eq!(map.read_halfword(Word::new(0x2000_7FFE)).unwrap().value(), 0xBEEF);
    assert!(map.read_word(Word::new(0x2000_7FFE)).is_err());
    map.load(Word::new(0x0800_0000), &[1, 2]).unwrap();
    map.write_byte(Word::new(0x0800_0000), Byte::new(9)).unwrap();
    assert_eq!(map.read_byte(Word::new(0x0800_0000)).unwrap().value(), 1);
    map.clear();
    assert_eq!(map.read_byte(Word::new(0x0800_0001)).unwrap().value(), 0);
}

#[test]
fn linear_memory_write_bytes() {
    let mut mem = LinearMemory::new(8);
    mem.write_bytes(Word::new(2), &[1, 2, 3]).unwrap();
    assert_eq!(mem.read_word(Word::new(0)).unwrap(), Word::new(0x0201_0000));
    assert!(mem.write_bytes(Word::new(6), &[1, 2, 3]).is_err());
}
