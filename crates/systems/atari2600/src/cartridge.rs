//! Atari 2600 cartridge ROM
//!
//! Only un-bank-switched images are supported: the bytes are mapped verbatim
//! into the 4 KiB window at $1000-$1FFF (seen by most code as $F000-$FFFF).
//! Smaller images (2 KiB being the usual one) repeat across the window.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_ROM_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image is empty")]
    Empty,
    #[error("Invalid ROM size: {0} bytes (at most {MAX_ROM_SIZE} without bank switching)")]
    InvalidSize(usize),
}

/// ROM image; never serialized into save states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cartridge {
    rom: Vec<u8>,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        match rom.len() {
            0 => Err(CartridgeError::Empty),
            len if len > MAX_ROM_SIZE => Err(CartridgeError::InvalidSize(len)),
            _ => Ok(Self { rom }),
        }
    }

    /// Read at an offset into the cartridge window; wraps for short images
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.rom[(addr & 0x0FFF) as usize % self.rom.len()]
    }

    pub fn size(&self) -> usize {
        self.rom.len()
    }
}
