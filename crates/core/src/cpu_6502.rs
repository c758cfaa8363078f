//! MOS 6502 CPU core implementation
//!
//! A generic, instruction-stepped 6502 that any system (Atari 2600, NES,
//! Apple II, ...) can drive by implementing [`Memory6502`]. Each call to
//! [`Cpu6502::step`] executes one documented instruction and returns its
//! exact cycle count, including page-crossing and branch penalties.
//! Undocumented opcodes are reported as [`CpuError::IllegalOpcode`].

mod opcodes;
#[cfg(test)]
mod tests;

pub use opcodes::{decode, AddressingMode, Instruction, Mnemonic, OPCODE_TABLE};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{log, LogCategory, LogLevel};

/// Memory interface trait for the 6502 CPU
///
/// Systems using the 6502 must implement this trait to provide memory access.
pub trait Memory6502 {
    /// Read a byte; may have side effects (latch clears, floating bus noise)
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to memory at the given address
    fn write(&mut self, addr: u16, val: u8);

    /// Read a byte without side effects, for debuggers and disassemblers
    fn peek(&self, addr: u16) -> u8;
}

/// Status register bits (NV-BDIZC)
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const INTERRUPT_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

use flags::*;

const STACK_BASE: u16 = 0x0100;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("illegal opcode ${opcode:02X} at ${address:04X}")]
    IllegalOpcode { opcode: u8, address: u16 },
}

/// Register snapshot, used for save states and debugger views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub status: u8,
    pub pc: u16,
}

/// Where an instruction takes its operand from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    /// Implied-mode instructions have no effective address
    None,
    Accumulator,
    /// Effective address; immediate mode points at the operand byte itself
    Address(u16),
}

/// MOS 6502 CPU state and execution engine
#[derive(Debug)]
pub struct Cpu6502<M: Memory6502> {
    /// Accumulator register
    pub a: u8,
    /// X index register
    pub x: u8,
    /// Y index register
    pub y: u8,
    /// Stack pointer (points to 0x0100 + sp)
    pub sp: u8,
    /// Status register (NV-BDIZC), bit 5 always reads as set
    pub status: u8,
    /// Program counter
    pub pc: u16,
    /// Total cycles executed
    pub cycles: u64,
    /// Memory interface
    pub memory: M,
}

impl<M: Memory6502> Cpu6502<M> {
    /// Create a CPU attached to `memory`.
    ///
    /// Register contents before [`reset`](Self::reset) are unspecified on real
    /// hardware; callers that care should overwrite them.
    pub fn new(memory: M) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            status: UNUSED | INTERRUPT_DISABLE,
            pc: 0,
            cycles: 0,
            memory,
        }
    }

    /// Load PC from the reset vector, fix SP and mask interrupts.
    ///
    /// A, X, Y and the remaining flags keep whatever they held.
    pub fn reset(&mut self) {
        self.sp = 0xFD;
        self.status |= UNUSED | INTERRUPT_DISABLE;
        self.cycles = 0;
        self.pc = self.read_u16(RESET_VECTOR);
    }

    pub fn registers(&self) -> Registers {
        Registers {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            status: self.status | UNUSED,
            pc: self.pc,
        }
    }

    pub fn set_registers(&mut self, registers: Registers) {
        self.a = registers.a;
        self.x = registers.x;
        self.y = registers.y;
        self.sp = registers.sp;
        self.status = registers.status | UNUSED;
        self.pc = registers.pc;
    }

    #[inline]
    pub fn flag(&self, mask: u8) -> bool {
        self.status & mask != 0
    }

    #[inline]
    pub fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.status |= mask;
        } else {
            self.status &= !mask;
        }
    }

    /// Decode the instruction at `addr` without executing it.
    pub fn instruction_at(&self, addr: u16) -> Option<Instruction> {
        decode(self.memory.peek(addr))
    }

    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        self.memory.write(addr, val);
    }

    fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Read a pointer from the zero page; the high byte wraps to $00.
    fn read_zero_page_u16(&mut self, zp: u8) -> u16 {
        let lo = self.read(zp as u16) as u16;
        let hi = self.read(zp.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    /// JMP (indirect) never carries into the pointer's high byte.
    fn read_indirect_u16_bug(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi_addr = (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF);
        let hi = self.read(hi_addr) as u16;
        (hi << 8) | lo
    }

    #[inline]
    fn fetch_u8(&mut self) -> u8 {
        let v = self.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    #[inline]
    fn fetch_u16(&mut self) -> u16 {
        let lo = self.fetch_u8() as u16;
        let hi = self.fetch_u8() as u16;
        (hi << 8) | lo
    }

    #[inline]
    fn push_u8(&mut self, v: u8) {
        self.write(STACK_BASE | self.sp as u16, v);
        self.sp = self.sp.wrapping_sub(1);
    }

    #[inline]
    fn pop_u8(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.read(STACK_BASE | self.sp as u16)
    }

    fn push_u16(&mut self, v: u16) {
        self.push_u8((v >> 8) as u8);
        self.push_u8(v as u8);
    }

    fn pop_u16(&mut self) -> u16 {
        let lo = self.pop_u8() as u16;
        let hi = self.pop_u8() as u16;
        (hi << 8) | lo
    }

    fn set_zero_and_negative(&mut self, v: u8) {
        self.set_flag(ZERO, v == 0);
        self.set_flag(NEGATIVE, v & 0x80 != 0);
    }

    /// Fetch operand bytes and compute the effective address.
    ///
    /// Returns the operand and whether indexing crossed a page.
    fn resolve_operand(&mut self, mode: AddressingMode) -> (Operand, bool) {
        match mode {
            AddressingMode::Implied => (Operand::None, false),
            AddressingMode::Accumulator => (Operand::Accumulator, false),
            AddressingMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (Operand::Address(addr), false)
            }
            AddressingMode::ZeroPage => (Operand::Address(self.fetch_u8() as u16), false),
            AddressingMode::ZeroPageX => {
                let zp = self.fetch_u8().wrapping_add(self.x);
                (Operand::Address(zp as u16), false)
            }
            AddressingMode::ZeroPageY => {
                let zp = self.fetch_u8().wrapping_add(self.y);
                (Operand::Address(zp as u16), false)
            }
            AddressingMode::Absolute => (Operand::Address(self.fetch_u16()), false),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_u16();
                Self::indexed(base, self.x)
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_u16();
                Self::indexed(base, self.y)
            }
            AddressingMode::Indirect => {
                let pointer = self.fetch_u16();
                (Operand::Address(self.read_indirect_u16_bug(pointer)), false)
            }
            AddressingMode::IndirectX => {
                let zp = self.fetch_u8().wrapping_add(self.x);
                (Operand::Address(self.read_zero_page_u16(zp)), false)
            }
            AddressingMode::IndirectY => {
                let zp = self.fetch_u8();
                let base = self.read_zero_page_u16(zp);
                Self::indexed(base, self.y)
            }
            AddressingMode::Relative => {
                let offset = self.fetch_u8() as i8;
                let target = self.pc.wrapping_add(offset as u16);
                (Operand::Address(target), false)
            }
        }
    }

    fn indexed(base: u16, index: u8) -> (Operand, bool) {
        let addr = base.wrapping_add(index as u16);
        (Operand::Address(addr), (base & 0xFF00) != (addr & 0xFF00))
    }

    /// Execute one instruction and return the cycles it took.
    ///
    /// On an illegal opcode nothing is executed and PC stays on the opcode.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        let address = self.pc;
        let opcode = self.read(address);
        let Some(instruction) = OPCODE_TABLE[opcode as usize] else {
            log(LogCategory::CPU, LogLevel::Error, || {
                format!("illegal opcode {:02X} at {:04X}", opcode, address)
            });
            return Err(CpuError::IllegalOpcode { opcode, address });
        };

        log(LogCategory::CPU, LogLevel::Trace, || {
            format!(
                "{:04X}  {:?} {:?}  A={:02X} X={:02X} Y={:02X} P={:02X} SP={:02X}",
                address, instruction.mnemonic, instruction.mode, self.a, self.x, self.y, self.status, self.sp
            )
        });

        self.pc = self.pc.wrapping_add(1);
        let (operand, page_crossed) = self.resolve_operand(instruction.mode);

        let mut cycles = instruction.cycles as u32;
        if page_crossed && instruction.page_penalty {
            cycles += 1;
        }
        cycles += self.execute(instruction.mnemonic, operand);

        self.cycles += cycles as u64;
        Ok(cycles)
    }

    fn load(&mut self, operand: Operand) -> u8 {
        match operand {
            Operand::Address(addr) => self.read(addr),
            Operand::Accumulator => self.a,
            Operand::None => 0,
        }
    }

    fn store(&mut self, operand: Operand, val: u8) {
        match operand {
            Operand::Address(addr) => self.write(addr, val),
            Operand::Accumulator => self.a = val,
            Operand::None => {}
        }
    }

    fn target(operand: Operand) -> u16 {
        match operand {
            Operand::Address(addr) => addr,
            _ => 0,
        }
    }

    /// Run the operation; returns cycles beyond the table's base count.
    fn execute(&mut self, mnemonic: Mnemonic, operand: Operand) -> u32 {
        use Mnemonic::*;

        match mnemonic {
            LDA => {
                self.a = self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            LDX => {
                self.x = self.load(operand);
                self.set_zero_and_negative(self.x);
            }
            LDY => {
                self.y = self.load(operand);
                self.set_zero_and_negative(self.y);
            }
            STA => self.store(operand, self.a),
            STX => self.store(operand, self.x),
            STY => self.store(operand, self.y),

            ADC => {
                let val = self.load(operand);
                self.add_with_carry(val);
            }
            SBC => {
                let val = self.load(operand);
                self.subtract_with_borrow(val);
            }
            AND => {
                self.a &= self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            ORA => {
                self.a |= self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            EOR => {
                self.a ^= self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            BIT => {
                let val = self.load(operand);
                self.set_flag(ZERO, self.a & val == 0);
                self.set_flag(OVERFLOW, val & 0x40 != 0);
                self.set_flag(NEGATIVE, val & 0x80 != 0);
            }
            CMP => {
                let val = self.load(operand);
                self.compare(self.a, val);
            }
            CPX => {
                let val = self.load(operand);
                self.compare(self.x, val);
            }
            CPY => {
                let val = self.load(operand);
                self.compare(self.y, val);
            }

            ASL | LSR | ROL | ROR => {
                let old = self.load(operand);
                let carry_in = self.flag(CARRY);
                let (res, carry_out) = match mnemonic {
                    ASL => (old << 1, old & 0x80 != 0),
                    LSR => (old >> 1, old & 0x01 != 0),
                    ROL => ((old << 1) | carry_in as u8, old & 0x80 != 0),
                    _ => ((old >> 1) | ((carry_in as u8) << 7), old & 0x01 != 0),
                };
                self.store(operand, res);
                self.set_flag(CARRY, carry_out);
                self.set_zero_and_negative(res);
            }

            INC | DEC => {
                let old = self.load(operand);
                let res = if mnemonic == INC {
                    old.wrapping_add(1)
                } else {
                    old.wrapping_sub(1)
                };
                self.store(operand, res);
                self.set_zero_and_negative(res);
            }
            INX => {
                self.x = self.x.wrapping_add(1);
                self.set_zero_and_negative(self.x);
            }
            INY => {
                self.y = self.y.wrapping_add(1);
                self.set_zero_and_negative(self.y);
            }
            DEX => {
                self.x = self.x.wrapping_sub(1);
                self.set_zero_and_negative(self.x);
            }
            DEY => {
                self.y = self.y.wrapping_sub(1);
                self.set_zero_and_negative(self.y);
            }

            BCC => return self.branch(!self.flag(CARRY), operand),
            BCS => return self.branch(self.flag(CARRY), operand),
            BNE => return self.branch(!self.flag(ZERO), operand),
            BEQ => return self.branch(self.flag(ZERO), operand),
            BPL => return self.branch(!self.flag(NEGATIVE), operand),
            BMI => return self.branch(self.flag(NEGATIVE), operand),
            BVC => return self.branch(!self.flag(OVERFLOW), operand),
            BVS => return self.branch(self.flag(OVERFLOW), operand),

            JMP => self.pc = Self::target(operand),
            JSR => {
                // PC already points past the operand; the pushed address is one less
                self.push_u16(self.pc.wrapping_sub(1));
                self.pc = Self::target(operand);
            }
            RTS => {
                self.pc = self.pop_u16().wrapping_add(1);
            }
            BRK => {
                // BRK has a padding byte that the return address skips
                let brk_pc = self.pc.wrapping_sub(1);
                self.push_u16(self.pc.wrapping_add(1));
                self.push_u8(self.status | BREAK | UNUSED);
                self.status |= INTERRUPT_DISABLE;
                self.pc = self.read_u16(IRQ_VECTOR);
                log(LogCategory::CPU, LogLevel::Debug, || {
                    format!("BRK at {:04X}, vectoring to {:04X}", brk_pc, self.pc)
                });
            }
            RTI => {
                let status = self.pop_u8();
                self.status = (status & !BREAK) | UNUSED;
                self.pc = self.pop_u16();
            }

            PHA => self.push_u8(self.a),
            PHP => self.push_u8(self.status | BREAK | UNUSED),
            PLA => {
                self.a = self.pop_u8();
                self.set_zero_and_negative(self.a);
            }
            PLP => {
                let status = self.pop_u8();
                self.status = (status & !BREAK) | UNUSED;
            }

            CLC => self.set_flag(CARRY, false),
            SEC => self.set_flag(CARRY, true),
            CLI => self.set_flag(INTERRUPT_DISABLE, false),
            SEI => self.set_flag(INTERRUPT_DISABLE, true),
            CLD => self.set_flag(DECIMAL, false),
            SED => self.set_flag(DECIMAL, true),
            CLV => self.set_flag(OVERFLOW, false),

            TAX => {
                self.x = self.a;
                self.set_zero_and_negative(self.x);
            }
            TXA => {
                self.a = self.x;
                self.set_zero_and_negative(self.a);
            }
            TAY => {
                self.y = self.a;
                self.set_zero_and_negative(self.y);
            }
            TYA => {
                self.a = self.y;
                self.set_zero_and_negative(self.a);
            }
            TSX => {
                self.x = self.sp;
                self.set_zero_and_negative(self.x);
            }
            TXS => self.sp = self.x,

            NOP => {}
        }
        0
    }

    /// Taken branches cost one more cycle, two when the target is on
    /// another page than the following instruction.
    fn branch(&mut self, taken: bool, operand: Operand) -> u32 {
        if !taken {
            return 0;
        }
        let target = Self::target(operand);
        let extra = if (target & 0xFF00) != (self.pc & 0xFF00) { 2 } else { 1 };
        self.pc = target;
        extra
    }

    fn compare(&mut self, register: u8, val: u8) {
        self.set_flag(CARRY, register >= val);
        self.set_zero_and_negative(register.wrapping_sub(val));
    }

    fn add_with_carry(&mut self, val: u8) {
        let a = self.a as u16;
        let m = val as u16;
        let carry = self.flag(CARRY) as u16;

        let (result, carry_out) = if self.flag(DECIMAL) {
            let mut lo = (a & 0x0F) + (m & 0x0F) + carry;
            let mut hi = (a & 0xF0) + (m & 0xF0);
            if lo > 0x09 {
                lo += 0x06;
            }
            if lo > 0x0F {
                hi += 0x10;
            }
            if hi > 0x90 {
                hi += 0x60;
            }
            (((hi & 0xF0) | (lo & 0x0F)) as u8, hi > 0xFF)
        } else {
            let sum = a + m + carry;
            (sum as u8, sum > 0xFF)
        };

        self.finish_arithmetic(val, result, carry_out);
    }

    fn subtract_with_borrow(&mut self, val: u8) {
        if !self.flag(DECIMAL) {
            // Binary SBC is ADC of the one's complement
            self.add_with_carry(!val);
            return;
        }

        let a = self.a as i16;
        let m = val as i16;
        let borrow = 1 - self.flag(CARRY) as i16;

        let mut lo = (a & 0x0F) - (m & 0x0F) - borrow;
        let mut hi = (a >> 4) - (m >> 4);
        if lo < 0 {
            lo -= 0x06;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 0x06;
        }
        let result = (((hi << 4) & 0xF0) | (lo & 0x0F)) as u8;
        let carry_out = a - m - borrow >= 0;

        self.finish_arithmetic(!val, result, carry_out);
    }

    /// Flags shared by ADC and SBC, taken from the (decimal-adjusted) result.
    fn finish_arithmetic(&mut self, operand: u8, result: u8, carry_out: bool) {
        let overflow = (self.a ^ result) & (operand ^ result) & 0x80 != 0;
        self.set_flag(CARRY, carry_out);
        self.set_flag(OVERFLOW, overflow);
        self.a = result;
        self.set_zero_and_negative(result);
    }
}

impl<M: Memory6502> crate::Cpu for Cpu6502<M> {
    type Error = CpuError;

    fn reset(&mut self) {
        Cpu6502::reset(self);
    }

    fn step(&mut self) -> Result<u32, CpuError> {
        Cpu6502::step(self)
    }
}

/// Flat 64 KiB memory for tests and benchmarks
#[derive(Debug)]
pub struct ArrayMemory {
    pub data: Box<[u8; 0x10000]>,
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; 0x10000]),
        }
    }

    /// Copy `data` to `offset` and point the reset vector at it
    pub fn load_program(&mut self, offset: u16, data: &[u8]) {
        let off = offset as usize;
        self.data[off..off + data.len()].copy_from_slice(data);
        self.data[RESET_VECTOR as usize] = offset as u8;
        self.data[RESET_VECTOR as usize + 1] = (offset >> 8) as u8;
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory6502 for ArrayMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize] = val;
    }

    fn peek(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }
}
