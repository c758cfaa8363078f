use super::*;

const ORIGIN: u16 = 0x0200;

fn cpu_with(program: &[u8]) -> Cpu6502<ArrayMemory> {
    let mut mem = ArrayMemory::new();
    mem.load_program(ORIGIN, program);
    let mut cpu = Cpu6502::new(mem);
    cpu.reset();
    cpu
}

fn run(cpu: &mut Cpu6502<ArrayMemory>, instructions: usize) -> u32 {
    (0..instructions).map(|_| cpu.step().expect("legal opcode")).sum()
}

#[test]
fn test_cpu_reset_loads_vector_and_masks_interrupts() {
    let mut cpu = cpu_with(&[0xEA]);
    cpu.a = 0x12;
    cpu.sp = 0x00;
    cpu.status = 0;
    cpu.reset();
    assert_eq!(cpu.pc, ORIGIN);
    assert_eq!(cpu.sp, 0xFD);
    assert_eq!(cpu.a, 0x12);
    assert!(cpu.flag(flags::INTERRUPT_DISABLE));
    assert!(cpu.flag(flags::UNUSED));
}

#[test]
fn test_cpu_nop_takes_two_cycles_and_advances_pc() {
    let mut cpu = cpu_with(&[0xEA, 0xEA, 0xEA]);
    assert_eq!(run(&mut cpu, 3), 6);
    assert_eq!(cpu.pc, ORIGIN + 3);
    assert_eq!(cpu.cycles, 6);
}

#[test]
fn test_cpu_adc_binary_flags() {
    // CLC; LDA #$50; ADC #$50
    let mut cpu = cpu_with(&[0x18, 0xA9, 0x50, 0x69, 0x50]);
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0xA0);
    assert!(cpu.flag(flags::OVERFLOW));
    assert!(cpu.flag(flags::NEGATIVE));
    assert!(!cpu.flag(flags::CARRY));
    assert!(!cpu.flag(flags::ZERO));

    // SEC; LDA #$FF; ADC #$00 -> wraps to zero with carry
    let mut cpu = cpu_with(&[0x38, 0xA9, 0xFF, 0x69, 0x00]);
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.flag(flags::CARRY));
    assert!(cpu.flag(flags::ZERO));
    assert!(!cpu.flag(flags::OVERFLOW));
}

#[test]
fn test_cpu_adc_decimal_mode() {
    // SED; CLC; LDA #$15; ADC #$27
    let mut cpu = cpu_with(&[0xF8, 0x18, 0xA9, 0x15, 0x69, 0x27]);
    run(&mut cpu, 4);
    assert_eq!(cpu.a, 0x42);
    assert!(!cpu.flag(flags::CARRY));

    // SED; SEC; LDA #$99; ADC #$00 -> 00 with carry
    let mut cpu = cpu_with(&[0xF8, 0x38, 0xA9, 0x99, 0x69, 0x00]);
    run(&mut cpu, 4);
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.flag(flags::CARRY));
}

#[test]
fn test_cpu_sbc_binary_and_decimal() {
    // SEC; LDA #$50; SBC #$F0
    let mut cpu = cpu_with(&[0x38, 0xA9, 0x50, 0xE9, 0xF0]);
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0x60);
    assert!(!cpu.flag(flags::CARRY));
    assert!(!cpu.flag(flags::OVERFLOW));

    // SEC; LDA #$80; SBC #$01 -> signed overflow
    let mut cpu = cpu_with(&[0x38, 0xA9, 0x80, 0xE9, 0x01]);
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0x7F);
    assert!(cpu.flag(flags::CARRY));
    assert!(cpu.flag(flags::OVERFLOW));

    // SED; SEC; LDA #$42; SBC #$15 -> 27
    let mut cpu = cpu_with(&[0xF8, 0x38, 0xA9, 0x42, 0xE9, 0x15]);
    run(&mut cpu, 4);
    assert_eq!(cpu.a, 0x27);
    assert!(cpu.flag(flags::CARRY));

    // SED; SEC; LDA #$10; SBC #$20 -> 90 with borrow
    let mut cpu = cpu_with(&[0xF8, 0x38, 0xA9, 0x10, 0xE9, 0x20]);
    run(&mut cpu, 4);
    assert_eq!(cpu.a, 0x90);
    assert!(!cpu.flag(flags::CARRY));
}

#[test]
fn test_cpu_absolute_indexed_read_pays_page_cross_cycle() {
    // LDX #$FF; LDA $10F0,X (crosses into $11EF)
    let mut cpu = cpu_with(&[0xA2, 0xFF, 0xBD, 0xF0, 0x10]);
    cpu.memory.data[0x11EF] = 0x5A;
    assert_eq!(run(&mut cpu, 1), 2);
    assert_eq!(run(&mut cpu, 1), 5);
    assert_eq!(cpu.a, 0x5A);

    // LDX #$01; LDA $1000,X stays on the page
    let mut cpu = cpu_with(&[0xA2, 0x01, 0xBD, 0x00, 0x10]);
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 4);
}

#[test]
fn test_cpu_indexed_store_has_fixed_timing() {
    // LDX #$FF; STA $10F0,X
    let mut cpu = cpu_with(&[0xA2, 0xFF, 0x9D, 0xF0, 0x10]);
    cpu.a = 0x33;
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 5);
    assert_eq!(cpu.memory.data[0x11EF], 0x33);
}

#[test]
fn test_cpu_indirect_y_page_cross() {
    // LDY #$10; LDA ($80),Y with pointer $12F8
    let mut cpu = cpu_with(&[0xA0, 0x10, 0xB1, 0x80]);
    cpu.memory.data[0x80] = 0xF8;
    cpu.memory.data[0x81] = 0x12;
    cpu.memory.data[0x1308] = 0x77;
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 6);
    assert_eq!(cpu.a, 0x77);
}

#[test]
fn test_cpu_zero_page_indexing_wraps() {
    // LDX #$10; LDA $F8,X reads $0008
    let mut cpu = cpu_with(&[0xA2, 0x10, 0xB5, 0xF8]);
    cpu.memory.data[0x0008] = 0x44;
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0x44);
}

/// NMOS 6502 base cycles and length per opcode, `--` for undocumented
const NMOS_TIMING: [&str; 16] = [
    "7/1 6/2 -- -- -- 3/2 5/2 -- 3/1 2/2 2/1 -- -- 4/3 6/3 --", // 0x
    "2/2 5/2 -- -- -- 4/2 6/2 -- 2/1 4/3 -- -- -- 4/3 7/3 --", // 1x
    "6/3 6/2 -- -- 3/2 3/2 5/2 -- 4/1 2/2 2/1 -- 4/3 4/3 6/3 --", // 2x
    "2/2 5/2 -- -- -- 4/2 6/2 -- 2/1 4/3 -- -- -- 4/3 7/3 --", // 3x
    "6/1 6/2 -- -- -- 3/2 5/2 -- 3/1 2/2 2/1 -- 3/3 4/3 6/3 --", // 4x
    "2/2 5/2 -- -- -- 4/2 6/2 -- 2/1 4/3 -- -- -- 4/3 7/3 --", // 5x
    "6/1 6/2 -- -- -- 3/2 5/2 -- 4/1 2/2 2/1 -- 5/3 4/3 6/3 --", // 6x
    "2/2 5/2 -- -- -- 4/2 6/2 -- 2/1 4/3 -- -- -- 4/3 7/3 --", // 7x
    "-- 6/2 -- -- 3/2 3/2 3/2 -- 2/1 -- 2/1 -- 4/3 4/3 4/3 --", // 8x
    "2/2 6/2 -- -- 4/2 4/2 4/2 -- 2/1 5/3 2/1 -- -- 5/3 -- --", // 9x
    "2/2 6/2 2/2 -- 3/2 3/2 3/2 -- 2/1 2/2 2/1 -- 4/3 4/3 4/3 --", // Ax
    "2/2 5/2 -- -- 4/2 4/2 4/2 -- 2/1 4/3 2/1 -- 4/3 4/3 4/3 --", // Bx
    "2/2 6/2 -- -- 3/2 3/2 5/2 -- 2/1 2/2 2/1 -- 4/3 4/3 6/3 --", // Cx
    "2/2 5/2 -- -- -- 4/2 6/2 -- 2/1 4/3 -- -- -- 4/3 7/3 --", // Dx
    "2/2 6/2 -- -- 3/2 3/2 5/2 -- 2/1 2/2 2/1 -- 4/3 4/3 6/3 --", // Ex
    "2/2 5/2 -- -- -- 4/2 6/2 -- 2/1 4/3 -- -- -- 4/3 7/3 --", // Fx
];

/// Read instructions that pay a cycle when indexing crosses a page
const PAGE_PENALTY_OPCODES: [u8; 23] = [
    0x11, 0x19, 0x1D, 0x31, 0x39, 0x3D, 0x51, 0x59, 0x5D, 0x71, 0x79, 0x7D, 0xB1, 0xB9, 0xBC,
    0xBD, 0xBE, 0xD1, 0xD9, 0xDD, 0xF1, 0xF9, 0xFD,
];

#[test]
fn test_cpu_opcode_table_matches_nmos_timing() {
    let mut legal = 0;
    for (high, row) in NMOS_TIMING.iter().enumerate() {
        let cells: Vec<&str> = row.split_whitespace().collect();
        assert_eq!(cells.len(), 16, "row {:X}x", high);
        for (low, cell) in cells.iter().enumerate() {
            let opcode = (high << 4 | low) as u8;
            let entry = OPCODE_TABLE[opcode as usize];
            if *cell == "--" {
                assert!(entry.is_none(), "{:02X} should not decode", opcode);
                continue;
            }
            legal += 1;
            let (cycles, length) = cell.split_once('/').unwrap();
            let inst = entry.unwrap_or_else(|| panic!("{:02X} should decode", opcode));
            assert_eq!(inst.cycles, cycles.parse::<u8>().unwrap(), "cycles of {:02X}", opcode);
            assert_eq!(inst.length(), length.parse::<u16>().unwrap(), "length of {:02X}", opcode);
            assert_eq!(
                inst.page_penalty,
                PAGE_PENALTY_OPCODES.contains(&opcode),
                "page penalty of {:02X}",
                opcode
            );
        }
    }
    assert_eq!(legal, 151);
}

#[test]
fn test_cpu_absolute_y_read_pays_page_cross_cycle() {
    // LDY #$20; LDA $10F0,Y (crosses into $1110)
    let mut cpu = cpu_with(&[0xA0, 0x20, 0xB9, 0xF0, 0x10]);
    cpu.memory.data[0x1110] = 0x6B;
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 5);
    assert_eq!(cpu.a, 0x6B);

    // LDY #$01; LDA $1000,Y stays on the page
    let mut cpu = cpu_with(&[0xA0, 0x01, 0xB9, 0x00, 0x10]);
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 4);
}

#[test]
fn test_cpu_read_modify_write_abs_x_has_fixed_timing() {
    // LDX #$20; INC $10F0,X (crosses into $1110)
    let mut cpu = cpu_with(&[0xA2, 0x20, 0xFE, 0xF0, 0x10]);
    cpu.memory.data[0x1110] = 0x41;
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 7);
    assert_eq!(cpu.memory.data[0x1110], 0x42);

    // LDX #$01; INC $1000,X without a page cross costs the same
    let mut cpu = cpu_with(&[0xA2, 0x01, 0xFE, 0x00, 0x10]);
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 7);
    assert_eq!(cpu.memory.data[0x1001], 0x01);
}

#[test]
fn test_cpu_zero_page_y_wraps() {
    // LDY #$20; LDX $F0,Y reads $0010, not $0110
    let mut cpu = cpu_with(&[0xA0, 0x20, 0xB6, 0xF0]);
    cpu.memory.data[0x0010] = 0x3C;
    cpu.memory.data[0x0110] = 0xFF;
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 4);
    assert_eq!(cpu.x, 0x3C);
}

#[test]
fn test_cpu_branch_timing() {
    // BNE not taken (Z set after LDA #0)
    let mut cpu = cpu_with(&[0xA9, 0x00, 0xD0, 0x02]);
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 2);
    assert_eq!(cpu.pc, ORIGIN + 4);

    // BEQ taken, same page
    let mut cpu = cpu_with(&[0xA9, 0x00, 0xF0, 0x02]);
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 3);
    assert_eq!(cpu.pc, ORIGIN + 6);

    // BEQ taken backwards across a page boundary
    let mut cpu = cpu_with(&[0xA9, 0x00, 0xF0, 0x80]);
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 4);
    assert_eq!(cpu.pc, ORIGIN + 4 - 0x80);
}

#[test]
fn test_cpu_illegal_opcode_leaves_pc_unchanged() {
    let mut cpu = cpu_with(&[0xEA, 0x02]);
    run(&mut cpu, 1);
    let err = cpu.step().unwrap_err();
    assert_eq!(
        err,
        CpuError::IllegalOpcode {
            opcode: 0x02,
            address: ORIGIN + 1
        }
    );
    assert_eq!(cpu.pc, ORIGIN + 1);
    assert_eq!(cpu.cycles, 2);
}

#[test]
fn test_cpu_jsr_rts_round_trip() {
    // JSR $0210; ... $0210: RTS
    let mut program = vec![0x20, 0x10, 0x02, 0xEA];
    program.resize(0x10, 0xEA);
    program.push(0x60);
    let mut cpu = cpu_with(&program);

    assert_eq!(run(&mut cpu, 1), 6);
    assert_eq!(cpu.pc, 0x0210);
    assert_eq!(cpu.sp, 0xFB);
    // Return address minus one, high byte first
    assert_eq!(cpu.memory.data[0x01FD], 0x02);
    assert_eq!(cpu.memory.data[0x01FC], 0x02);

    assert_eq!(run(&mut cpu, 1), 6);
    assert_eq!(cpu.pc, ORIGIN + 3);
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn test_cpu_brk_and_rti() {
    let mut cpu = cpu_with(&[0x00, 0xFF, 0xEA]);
    cpu.memory.data[0xFFFE] = 0x00;
    cpu.memory.data[0xFFFF] = 0x03;
    cpu.memory.data[0x0300] = 0x40;
    cpu.status = flags::UNUSED | flags::CARRY;

    assert_eq!(run(&mut cpu, 1), 7);
    assert_eq!(cpu.pc, 0x0300);
    assert!(cpu.flag(flags::INTERRUPT_DISABLE));
    let pushed = cpu.memory.data[0x01FB];
    assert_eq!(pushed & flags::BREAK, flags::BREAK);

    assert_eq!(run(&mut cpu, 1), 6);
    // Padding byte skipped
    assert_eq!(cpu.pc, ORIGIN + 2);
    assert!(cpu.flag(flags::CARRY));
    assert!(!cpu.flag(flags::INTERRUPT_DISABLE));
    assert!(!cpu.flag(flags::BREAK));
}

#[test]
fn test_cpu_stack_push_pull() {
    // LDA #$80; PHA; LDA #$00; PLA
    let mut cpu = cpu_with(&[0xA9, 0x80, 0x48, 0xA9, 0x00, 0x68]);
    run(&mut cpu, 2);
    assert_eq!(cpu.sp, 0xFC);
    assert_eq!(cpu.memory.data[0x01FD], 0x80);
    run(&mut cpu, 1);
    assert!(cpu.flag(flags::ZERO));
    assert_eq!(run(&mut cpu, 1), 4);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag(flags::NEGATIVE));
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn test_cpu_php_sets_break_and_plp_clears_it() {
    // PHP; PLP
    let mut cpu = cpu_with(&[0x08, 0x28]);
    cpu.status = flags::UNUSED | flags::ZERO;
    run(&mut cpu, 1);
    assert_eq!(cpu.memory.data[0x01FD], flags::UNUSED | flags::BREAK | flags::ZERO);
    run(&mut cpu, 1);
    assert_eq!(cpu.status, flags::UNUSED | flags::ZERO);
}

#[test]
fn test_cpu_shifts_and_rotates() {
    // LDA #$81; ASL A
    let mut cpu = cpu_with(&[0xA9, 0x81, 0x0A]);
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0x02);
    assert!(cpu.flag(flags::CARRY));

    // SEC; LDA #$01; ROR A -> $80, carry out
    let mut cpu = cpu_with(&[0x38, 0xA9, 0x01, 0x6A]);
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag(flags::CARRY));
    assert!(cpu.flag(flags::NEGATIVE));

    // CLC; ROL $40 in memory
    let mut cpu = cpu_with(&[0x18, 0x26, 0x40]);
    cpu.memory.data[0x40] = 0x40;
    assert_eq!(run(&mut cpu, 2), 7);
    assert_eq!(cpu.memory.data[0x40], 0x80);
    assert!(!cpu.flag(flags::CARRY));

    // LSR $40
    let mut cpu = cpu_with(&[0x46, 0x40]);
    cpu.memory.data[0x40] = 0x01;
    run(&mut cpu, 1);
    assert_eq!(cpu.memory.data[0x40], 0x00);
    assert!(cpu.flag(flags::ZERO));
    assert!(cpu.flag(flags::CARRY));
}

#[test]
fn test_cpu_compare_sets_carry_zero_negative() {
    // LDA #$40; CMP #$40; CMP #$41; CMP #$10
    let mut cpu = cpu_with(&[0xA9, 0x40, 0xC9, 0x40, 0xC9, 0x41, 0xC9, 0x10]);
    run(&mut cpu, 2);
    assert!(cpu.flag(flags::ZERO));
    assert!(cpu.flag(flags::CARRY));
    run(&mut cpu, 1);
    assert!(!cpu.flag(flags::CARRY));
    assert!(cpu.flag(flags::NEGATIVE));
    run(&mut cpu, 1);
    assert!(cpu.flag(flags::CARRY));
    assert!(!cpu.flag(flags::ZERO));
}

#[test]
fn test_cpu_bit_copies_high_bits() {
    let mut cpu = cpu_with(&[0xA9, 0x01, 0x24, 0x40]);
    cpu.memory.data[0x40] = 0xC0;
    run(&mut cpu, 2);
    assert!(cpu.flag(flags::ZERO));
    assert!(cpu.flag(flags::OVERFLOW));
    assert!(cpu.flag(flags::NEGATIVE));
}

#[test]
fn test_cpu_jmp_indirect_page_wrap_bug() {
    // JMP ($02FF): high byte comes from $0200, not $0300
    let mut cpu = cpu_with(&[0x6C, 0xFF, 0x02]);
    cpu.memory.data[0x02FF] = 0x34;
    cpu.memory.data[0x0300] = 0x99;
    cpu.memory.data[0x0200] = 0x6C;
    assert_eq!(run(&mut cpu, 1), 5);
    assert_eq!(cpu.pc, 0x6C34);
}

#[test]
fn test_cpu_indexed_indirect_pointer_wraps_in_zero_page() {
    // LDX #$01; LDA ($FE,X) uses pointer at $FF/$00
    let mut cpu = cpu_with(&[0xA2, 0x01, 0xA1, 0xFE]);
    cpu.memory.data[0xFF] = 0x00;
    cpu.memory.data[0x00] = 0x04;
    cpu.memory.data[0x0400] = 0xAB;
    run(&mut cpu, 1);
    assert_eq!(run(&mut cpu, 1), 6);
    assert_eq!(cpu.a, 0xAB);
}

#[test]
fn test_cpu_transfers_and_counters() {
    // LDX #$FF; TXS; INX; TXA; DEY
    let mut cpu = cpu_with(&[0xA2, 0xFF, 0x9A, 0xE8, 0x8A, 0x88]);
    run(&mut cpu, 2);
    assert_eq!(cpu.sp, 0xFF);
    run(&mut cpu, 1);
    assert_eq!(cpu.x, 0);
    assert!(cpu.flag(flags::ZERO));
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0);
    assert_eq!(cpu.y, 0xFF);
    assert!(cpu.flag(flags::NEGATIVE));
}

#[test]
fn test_cpu_registers_snapshot_round_trip() {
    let mut cpu = cpu_with(&[0xEA]);
    let regs = Registers {
        a: 1,
        x: 2,
        y: 3,
        sp: 0x80,
        status: flags::CARRY,
        pc: 0x1234,
    };
    cpu.set_registers(regs);
    let back = cpu.registers();
    assert_eq!(back.pc, 0x1234);
    assert_eq!(back.status, flags::CARRY | flags::UNUSED);
    assert_eq!((back.a, back.x, back.y, back.sp), (1, 2, 3, 0x80));
}

#[test]
fn test_cpu_instruction_at_peeks_without_side_effects() {
    let cpu = cpu_with(&[0xAD, 0x00, 0x10]);
    let inst = cpu.instruction_at(ORIGIN).expect("LDA abs");
    assert_eq!(inst.mnemonic, Mnemonic::LDA);
    assert_eq!(inst.mode, AddressingMode::Absolute);
    assert_eq!(inst.length(), 3);
}

#[test]
fn test_cpu_drives_through_generic_cpu_trait() {
    fn run_generic<C: crate::Cpu>(cpu: &mut C, steps: usize) -> Result<u32, C::Error> {
        cpu.reset();
        let mut total = 0;
        for _ in 0..steps {
            total += cpu.step()?;
        }
        Ok(total)
    }

    let mut cpu = cpu_with(&[0xEA, 0xA9, 0x01, 0x02]);
    assert_eq!(run_generic(&mut cpu, 2), Ok(4));
    assert_eq!(
        run_generic(&mut cpu, 3),
        Err(CpuError::IllegalOpcode {
            opcode: 0x02,
            address: ORIGIN + 3
        })
    );
}
