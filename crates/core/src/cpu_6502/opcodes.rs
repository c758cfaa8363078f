//! Opcode metadata for the documented NMOS 6502 instruction set.
//!
//! One entry per legal opcode: mnemonic, addressing mode and base cycle
//! count. Undocumented opcodes decode to `None`.

use serde::{Deserialize, Serialize};

/// 6502 addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressingMode {
    /// No operand (CLC, RTS, BRK)
    Implied,
    /// Operates on A (ASL A, ROR A)
    Accumulator,
    /// `#$nn`
    Immediate,
    /// `$nn`
    ZeroPage,
    /// `$nn,X`, wraps within the zero page
    ZeroPageX,
    /// `$nn,Y`, wraps within the zero page
    ZeroPageY,
    /// `$nnnn`
    Absolute,
    /// `$nnnn,X`
    AbsoluteX,
    /// `$nnnn,Y`
    AbsoluteY,
    /// `($nnnn)`, JMP only
    Indirect,
    /// `($nn,X)`
    IndirectX,
    /// `($nn),Y`
    IndirectY,
    /// Signed 8-bit branch offset
    Relative,
}

impl AddressingMode {
    /// Encoded instruction length in bytes, opcode included.
    pub const fn length(self) -> u16 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 1,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY
            | AddressingMode::Relative => 2,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 3,
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mnemonic {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
    CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
    JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
    RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
}

/// Decoded opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    /// Cycles before page-cross and branch penalties. Stores and
    /// read-modify-write instructions already include their indexing cycle.
    pub cycles: u8,
    /// Read-class instruction that pays one more cycle when indexing crosses a page.
    pub page_penalty: bool,
}

impl Instruction {
    pub const fn length(&self) -> u16 {
        self.mode.length()
    }
}

const fn op(opcode: u8, mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> Option<Instruction> {
    Some(Instruction {
        opcode,
        mnemonic,
        mode,
        cycles,
        page_penalty: false,
    })
}

/// Like `op`, for loads/logic/arithmetic that pay the page-cross cycle.
const fn rd(opcode: u8, mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> Option<Instruction> {
    let page_penalty = matches!(
        mode,
        AddressingMode::AbsoluteX | AddressingMode::AbsoluteY | AddressingMode::IndirectY
    );
    Some(Instruction {
        opcode,
        mnemonic,
        mode,
        cycles,
        page_penalty,
    })
}

/// Decode one opcode byte.
pub const fn decode(opcode: u8) -> Option<Instruction> {
    use AddressingMode::*;
    use Mnemonic::*;

    match opcode {
        0x69 => rd(opcode, ADC, Immediate, 2),
        0x65 => rd(opcode, ADC, ZeroPage, 3),
        0x75 => rd(opcode, ADC, ZeroPageX, 4),
        0x6D => rd(opcode, ADC, Absolute, 4),
        0x7D => rd(opcode, ADC, AbsoluteX, 4),
        0x79 => rd(opcode, ADC, AbsoluteY, 4),
        0x61 => rd(opcode, ADC, IndirectX, 6),
        0x71 => rd(opcode, ADC, IndirectY, 5),

        0x29 => rd(opcode, AND, Immediate, 2),
        0x25 => rd(opcode, AND, ZeroPage, 3),
        0x35 => rd(opcode, AND, ZeroPageX, 4),
        0x2D => rd(opcode, AND, Absolute, 4),
        0x3D => rd(opcode, AND, AbsoluteX, 4),
        0x39 => rd(opcode, AND, AbsoluteY, 4),
        0x21 => rd(opcode, AND, IndirectX, 6),
        0x31 => rd(opcode, AND, IndirectY, 5),

        0x0A => op(opcode, ASL, Accumulator, 2),
        0x06 => op(opcode, ASL, ZeroPage, 5),
        0x16 => op(opcode, ASL, ZeroPageX, 6),
        0x0E => op(opcode, ASL, Absolute, 6),
        0x1E => op(opcode, ASL, AbsoluteX, 7),

        0x90 => op(opcode, BCC, Relative, 2),
        0xB0 => op(opcode, BCS, Relative, 2),
        0xF0 => op(opcode, BEQ, Relative, 2),
        0x30 => op(opcode, BMI, Relative, 2),
        0xD0 => op(opcode, BNE, Relative, 2),
        0x10 => op(opcode, BPL, Relative, 2),
        0x50 => op(opcode, BVC, Relative, 2),
        0x70 => op(opcode, BVS, Relative, 2),

        0x24 => op(opcode, BIT, ZeroPage, 3),
        0x2C => op(opcode, BIT, Absolute, 4),

        0x00 => op(opcode, BRK, Implied, 7),

        0x18 => op(opcode, CLC, Implied, 2),
        0xD8 => op(opcode, CLD, Implied, 2),
        0x58 => op(opcode, CLI, Implied, 2),
        0xB8 => op(opcode, CLV, Implied, 2),

        0xC9 => rd(opcode, CMP, Immediate, 2),
        0xC5 => rd(opcode, CMP, ZeroPage, 3),
        0xD5 => rd(opcode, CMP, ZeroPageX, 4),
        0xCD => rd(opcode, CMP, Absolute, 4),
        0xDD => rd(opcode, CMP, AbsoluteX, 4),
        0xD9 => rd(opcode, CMP, AbsoluteY, 4),
        0xC1 => rd(opcode, CMP, IndirectX, 6),
        0xD1 => rd(opcode, CMP, IndirectY, 5),

        0xE0 => op(opcode, CPX, Immediate, 2),
        0xE4 => op(opcode, CPX, ZeroPage, 3),
        0xEC => op(opcode, CPX, Absolute, 4),
        0xC0 => op(opcode, CPY, Immediate, 2),
        0xC4 => op(opcode, CPY, ZeroPage, 3),
        0xCC => op(opcode, CPY, Absolute, 4),

        0xC6 => op(opcode, DEC, ZeroPage, 5),
        0xD6 => op(opcode, DEC, ZeroPageX, 6),
        0xCE => op(opcode, DEC, Absolute, 6),
        0xDE => op(opcode, DEC, AbsoluteX, 7),
        0xCA => op(opcode, DEX, Implied, 2),
        0x88 => op(opcode, DEY, Implied, 2),

        0x49 => rd(opcode, EOR, Immediate, 2),
        0x45 => rd(opcode, EOR, ZeroPage, 3),
        0x55 => rd(opcode, EOR, ZeroPageX, 4),
        0x4D => rd(opcode, EOR, Absolute, 4),
        0x5D => rd(opcode, EOR, AbsoluteX, 4),
        0x59 => rd(opcode, EOR, AbsoluteY, 4),
        0x41 => rd(opcode, EOR, IndirectX, 6),
        0x51 => rd(opcode, EOR, IndirectY, 5),

        0xE6 => op(opcode, INC, ZeroPage, 5),
        0xF6 => op(opcode, INC, ZeroPageX, 6),
        0xEE => op(opcode, INC, Absolute, 6),
        0xFE => op(opcode, INC, AbsoluteX, 7),
        0xE8 => op(opcode, INX, Implied, 2),
        0xC8 => op(opcode, INY, Implied, 2),

        0x4C => op(opcode, JMP, Absolute, 3),
        0x6C => op(opcode, JMP, Indirect, 5),
        0x20 => op(opcode, JSR, Absolute, 6),

        0xA9 => rd(opcode, LDA, Immediate, 2),
        0xA5 => rd(opcode, LDA, ZeroPage, 3),
        0xB5 => rd(opcode, LDA, ZeroPageX, 4),
        0xAD => rd(opcode, LDA, Absolute, 4),
        0xBD => rd(opcode, LDA, AbsoluteX, 4),
        0xB9 => rd(opcode, LDA, AbsoluteY, 4),
        0xA1 => rd(opcode, LDA, IndirectX, 6),
        0xB1 => rd(opcode, LDA, IndirectY, 5),

        0xA2 => rd(opcode, LDX, Immediate, 2),
        0xA6 => rd(opcode, LDX, ZeroPage, 3),
        0xB6 => rd(opcode, LDX, ZeroPageY, 4),
        0xAE => rd(opcode, LDX, Absolute, 4),
        0xBE => rd(opcode, LDX, AbsoluteY, 4),

        0xA0 => rd(opcode, LDY, Immediate, 2),
        0xA4 => rd(opcode, LDY, ZeroPage, 3),
        0xB4 => rd(opcode, LDY, ZeroPageX, 4),
        0xAC => rd(opcode, LDY, Absolute, 4),
        0xBC => rd(opcode, LDY, AbsoluteX, 4),

        0x4A => op(opcode, LSR, Accumulator, 2),
        0x46 => op(opcode, LSR, ZeroPage, 5),
        0x56 => op(opcode, LSR, ZeroPageX, 6),
        0x4E => op(opcode, LSR, Absolute, 6),
        0x5E => op(opcode, LSR, AbsoluteX, 7),

        0xEA => op(opcode, NOP, Implied, 2),

        0x09 => rd(opcode, ORA, Immediate, 2),
        0x05 => rd(opcode, ORA, ZeroPage, 3),
        0x15 => rd(opcode, ORA, ZeroPageX, 4),
        0x0D => rd(opcode, ORA, Absolute, 4),
        0x1D => rd(opcode, ORA, AbsoluteX, 4),
        0x19 => rd(opcode, ORA, AbsoluteY, 4),
        0x01 => rd(opcode, ORA, IndirectX, 6),
        0x11 => rd(opcode, ORA, IndirectY, 5),

        0x48 => op(opcode, PHA, Implied, 3),
        0x08 => op(opcode, PHP, Implied, 3),
        0x68 => op(opcode, PLA, Implied, 4),
        0x28 => op(opcode, PLP, Implied, 4),

        0x2A => op(opcode, ROL, Accumulator, 2),
        0x26 => op(opcode, ROL, ZeroPage, 5),
        0x36 => op(opcode, ROL, ZeroPageX, 6),
        0x2E => op(opcode, ROL, Absolute, 6),
        0x3E => op(opcode, ROL, AbsoluteX, 7),

        0x6A => op(opcode, ROR, Accumulator, 2),
        0x66 => op(opcode, ROR, ZeroPage, 5),
        0x76 => op(opcode, ROR, ZeroPageX, 6),
        0x6E => op(opcode, ROR, Absolute, 6),
        0x7E => op(opcode, ROR, AbsoluteX, 7),

        0x40 => op(opcode, RTI, Implied, 6),
        0x60 => op(opcode, RTS, Implied, 6),

        0xE9 => rd(opcode, SBC, Immediate, 2),
        0xE5 => rd(opcode, SBC, ZeroPage, 3),
        0xF5 => rd(opcode, SBC, ZeroPageX, 4),
        0xED => rd(opcode, SBC, Absolute, 4),
        0xFD => rd(opcode, SBC, AbsoluteX, 4),
        0xF9 => rd(opcode, SBC, AbsoluteY, 4),
        0xE1 => rd(opcode, SBC, IndirectX, 6),
        0xF1 => rd(opcode, SBC, IndirectY, 5),

        0x38 => op(opcode, SEC, Implied, 2),
        0xF8 => op(opcode, SED, Implied, 2),
        0x78 => op(opcode, SEI, Implied, 2),

        0x85 => op(opcode, STA, ZeroPage, 3),
        0x95 => op(opcode, STA, ZeroPageX, 4),
        0x8D => op(opcode, STA, Absolute, 4),
        0x9D => op(opcode, STA, AbsoluteX, 5),
        0x99 => op(opcode, STA, AbsoluteY, 5),
        0x81 => op(opcode, STA, IndirectX, 6),
        0x91 => op(opcode, STA, IndirectY, 6),

        0x86 => op(opcode, STX, ZeroPage, 3),
        0x96 => op(opcode, STX, ZeroPageY, 4),
        0x8E => op(opcode, STX, Absolute, 4),
        0x84 => op(opcode, STY, ZeroPage, 3),
        0x94 => op(opcode, STY, ZeroPageX, 4),
        0x8C => op(opcode, STY, Absolute, 4),

        0xAA => op(opcode, TAX, Implied, 2),
        0xA8 => op(opcode, TAY, Implied, 2),
        0xBA => op(opcode, TSX, Implied, 2),
        0x8A => op(opcode, TXA, Implied, 2),
        0x9A => op(opcode, TXS, Implied, 2),
        0x98 => op(opcode, TYA, Implied, 2),

        _ => None,
    }
}

/// `decode` for every opcode, built at compile time.
pub const OPCODE_TABLE: [Option<Instruction>; 256] = {
    let mut table = [None; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode(i as u8);
        i += 1;
    }
    table
};
