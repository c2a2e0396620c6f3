use pretty_assertions::assert_eq;

use thumb_rs::memory::Bus;
use thumb_rs::{assemble, Board, CpuConfig, Register, Stop, Word};

fn run(src: &str) -> Board {
    let mut board = Board::new(CpuConfig::default());
    board.load(assemble(src).unwrap()).unwrap();
    let stop = board.run(10_000).unwrap();
    assert!(matches!(stop, Stop::EndOfCode { .. }), "{stop:?}");
    board
}

fn reg(board: &Board, r: Register) -> u32 {
    board.cpu.regs.read(r).value()
}

fn word(board: &mut Board, addr: u32) -> u32 {
    board.memory.read_word(Word::new(addr)).unwrap().value()
}

#[test]
fn push_stores_ascending_below_sp() {
    let mut board = run("
        MOVS R0, #1
        MOVS R1, #2
        MOVS R2, #3
        PUSH {R0-R2}
        POP {R3, R4, R5}
    ");
    assert_eq!(reg(&board, Register::SP), 0x2000_2000);
    assert_eq!(
        [Register::R3, Register::R4, Register::R5].map(|r| reg(&board, r)),
        [1, 2, 3]
    );
    assert_eq!(word(&mut board, 0x2000_1FF4), 1);
    assert_eq!(word(&mut board, 0x2000_1FFC), 3);
}

#[test]
fn push_includes_the_link_register() {
    let mut board = run("
        MOVS R0, #7
        MOV LR, R0
        PUSH {R0, LR}
    ");
    assert_eq!(reg(&board, Register::SP), 0x2000_1FF8);
    assert_eq!(word(&mut board, 0x2000_1FF8), 7);
    assert_eq!(word(&mut board, 0x2000_1FFC), 7);
}

#[test]
fn store_and_load_multiple_with_writeback() {
    let mut board = run("
        LDR R0, =0x20000100
        MOVS R1, #1
        MOVS R2, #2
        MOVS R3, #3
        STMIA R0!, {R1-R3}
        LDR R4, =0x20000100
        LDM R4!, {R5-R7}
    ");
    assert_eq!(reg(&board, Register::R0), 0x2000_010C);
    assert_eq!(reg(&board, Register::R4), 0x2000_010C);
    assert_eq!(
        [Register::R5, Register::R6, Register::R7].map(|r| reg(&board, r)),
        [1, 2, 3]
    );
    assert_eq!(word(&mut board, 0x2000_0108), 3);
}

#[test]
fn load_multiple_into_base_skips_writeback() {
    let board = run("
        LDR R0, =0x20000000
        MOVS R1, #5
        STR R1, [R0]
        MOVS R1, #6
        STR R1, [R0, #4]
        LDM R0, {R0, R1}
    ");
    assert_eq!(reg(&board, Register::R0), 5);
    assert_eq!(reg(&board, Register::R1), 6);
}
