use pretty_assertions::assert_eq;

use thumb_rs::{assemble, Board, CpuConfig, Flags, Register, Stop};

fn run(src: &str) -> Board {
    let mut board = Board::new(CpuConfig::default());
    board.load(assemble(src).unwrap()).unwrap();
    let stop = board.run(10_000).unwrap();
    assert!(matches!(stop, Stop::EndOfCode { .. }), "{stop:?}");
    board
}

fn regs(board: &Board, list: &[Register]) -> Vec<u32> {
    list.iter().map(|r| board.cpu.regs.read(*r).value()).collect()
}

use Register::*;

#[test]
fn add_and_subtract() {
    let board = run("
        MOVS R0, #10
        MOVS R1, #3
        ADDS R2, R0, R1
        SUBS R3, R0, R1
        ADDS R4, R0, #7
        ADDS R0, #200
        SUBS R5, R1, R0
    ");
    assert_eq!(regs(&board, &[R0, R2, R3, R4, R5]), vec![210, 13, 7, 17, 0xFFFF_FF31]);
    let flags = board.cpu.regs.flags();
    assert_eq!(flags, Flags::N);
}

#[test]
fn carry_feeds_adcs() {
    let board = run("
        MOVS R0, #0
        SUBS R0, #1
        MOVS R1, #1
        ADDS R2, R0, R1
        MOVS R3, #5
        MOVS R4, #0
        ADCS R3, R4
    ");
    assert_eq!(regs(&board, &[R0, R2, R3]), vec![0xFFFF_FFFF, 0, 6]);
    assert!(!board.cpu.regs.flag(Flags::C));
    assert!(!board.cpu.regs.flag(Flags::Z));
}

#[test]
fn logic_and_multiply() {
    let board = run("
        MOVS R0, #6
        MOVS R1, #7
        MULS R0, R1, R0
        MOVS R2, #0xF0
        MOVS R3, #0x3C
        MOVS R4, R2
        ANDS R4, R3
        MOVS R5, R2
        ORRS R5, R3
        MOVS R6, R2
        EORS R6, R3
        MOVS R7, R2
        BICS R7, R3
        MVNS R1, R3
    ");
    assert_eq!(
        regs(&board, &[R0, R1, R4, R5, R6, R7]),
        vec![42, 0xFFFF_FFC3, 0x30, 0xFC, 0xCC, 0xC0]
    );
    assert_eq!(board.cpu.regs.flags(), Flags::N);
}

#[test]
fn shifts_and_rotates() {
    let board = run("
        MOVS R0, #1
        LSLS R1, R0, #31
        ASRS R2, R1, #4
        LSRS R3, R1, #31
        MOVS R4, #4
        MOVS R5, #0xFF
        RORS R5, R4
        RSBS R6, R0, #0
    ");
    assert_eq!(
        regs(&board, &[R1, R2, R3, R5, R6]),
        vec![0x8000_0000, 0xF800_0000, 1, 0xF000_000F, 0xFFFF_FFFF]
    );
}

#[test]
fn extends_and_byte_reversal() {
    let board = run("
        MOVS R0, #0x80
        SXTB R1, R0
        UXTB R2, R1
        LDR R3, =0x12345678
        REV R4, R3
        UXTH R5, R3
        SXTH R6, R1
    ");
    assert_eq!(
        regs(&board, &[R1, R2, R3, R4, R5, R6]),
        vec![0xFFFF_FF80, 0x80, 0x1234_5678, 0x7856_3412, 0x5678, 0xFFFF_FF80]
    );
}

#[test]
fn high_registers_and_stack_pointer() {
    let board = run("
        MOVS R0, #100
        MOV R8, R0
        ADD R8, R0
        MOV R1, R8
        SUB SP, #8
        ADD R2, SP, #4
        ADD SP, SP, #8
    ");
    assert_eq!(regs(&board, &[R8, R1, R2, SP]), vec![200, 200, 0x2000_1FFC, 0x2000_2000]);
}

#[test]
fn constants_feed_immediates() {
    let board = run("
LIMIT   EQU 12
        MOVS R0, #LIMIT
        ADDS R0, R0, #LIMIT
        LDR R1, =LIMIT
    ");
    assert_eq!(regs(&board, &[R0, R1]), vec![24, 12]);
}
