//! Atari 2600 memory bus
//!
//! The 6507 only brings out 13 address lines, and the chips decode just a
//! few of them, so every device appears at many mirrors:
//!
//! ```text
//! A12 A9 A7
//!  1  x  x   cartridge ROM ($1000-$1FFF, usually seen as $F000-$FFFF)
//!  0  x  0   TIA registers (write $00-$3F, read $00-$0F)
//!  0  0  1   PIA RAM ($80-$FF, stack at $180-$1FF)
//!  0  1  1   PIA I/O and timer ($280-$29F)
//! ```
//!
//! The TIA only drives D7/D6 on reads and the remaining lines float, so the
//! low bits come from the bus PRNG.

use emu_core::cpu_6502::Memory6502;
use emu_core::logging::{log, LogCategory, LogLevel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cartridge::Cartridge;
use crate::pia::Pia;
use crate::tia::Tia;

/// Device and offset selected by an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Tia(u16),
    Ram(u16),
    Pia(u16),
    Rom(u16),
}

/// Decode a CPU address into its device
#[inline]
pub fn map(addr: u16) -> Region {
    let addr = addr & 0x1FFF;
    if addr & 0x1000 != 0 {
        Region::Rom(addr & 0x0FFF)
    } else if addr & 0x0080 == 0 {
        Region::Tia(addr & 0x3F)
    } else if addr & 0x0200 == 0 {
        Region::Ram(addr & 0x7F)
    } else {
        Region::Pia(addr & 0x1F)
    }
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// Atari 2600 memory bus
#[derive(Debug, Serialize, Deserialize)]
pub struct Atari2600Bus {
    pub tia: Tia,
    pub pia: Pia,
    #[serde(skip)]
    pub cartridge: Option<Cartridge>,
    /// Source for undriven data lines
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

impl Atari2600Bus {
    pub fn new(rng: StdRng) -> Self {
        Self {
            tia: Tia::new(),
            pia: Pia::new(),
            cartridge: None,
            rng,
        }
    }

    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    pub fn eject_cartridge(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    /// Carry over everything a snapshot does not contain: ROM, sinks, PRNG
    pub fn take_unsaved_from(&mut self, other: &mut Atari2600Bus) {
        self.cartridge = other.cartridge.take();
        std::mem::swap(&mut self.rng, &mut other.rng);
        self.tia.take_sinks_from(&mut other.tia);
        self.pia.take_ports_from(&mut other.pia);
    }

    fn noise(&mut self) -> u8 {
        self.rng.gen()
    }
}

impl Memory6502 for Atari2600Bus {
    fn read(&mut self, addr: u16) -> u8 {
        match map(addr) {
            Region::Rom(offset) => match &self.cartridge {
                Some(cart) => cart.read(offset),
                None => {
                    log(LogCategory::Bus, LogLevel::Warn, || {
                        format!("read {:04X} with no cartridge inserted", addr)
                    });
                    self.noise()
                }
            },
            Region::Tia(offset) => (self.tia.read(offset) & 0xC0) | (self.noise() & 0x3F),
            Region::Ram(offset) => self.pia.read_ram(offset),
            Region::Pia(offset) => self.pia.read_register(offset),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match map(addr) {
            Region::Rom(_) => log(LogCategory::Bus, LogLevel::Debug, || {
                format!("ignored write {:02X} to ROM at {:04X}", val, addr)
            }),
            Region::Tia(offset) => self.tia.write(offset, val),
            Region::Ram(offset) => self.pia.write_ram(offset, val),
            Region::Pia(offset) => self.pia.write_register(offset, val),
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match map(addr) {
            Region::Rom(offset) => self.cartridge.as_ref().map_or(0, |cart| cart.read(offset)),
            Region::Tia(offset) => self.tia.peek(offset) & 0xC0,
            Region::Ram(offset) => self.pia.read_ram(offset),
            Region::Pia(offset) => self.pia.peek_register(offset),
        }
    }
}
