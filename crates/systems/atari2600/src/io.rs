//! Host-facing sinks and sources
//!
//! The TIA pushes pixels into an [`Output`]; the PIA ports and the TIA fire
//! button inputs pull bits from a [`Peripheral`]. Both are object-safe so a
//! host can plug in a renderer, a test recorder or nothing at all.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Receives the picture one color clock at a time
pub trait Output: Send {
    /// Field boundary (a debounced VSYNC)
    fn sync(&mut self);

    /// One visible pixel, as a TIA color index (bits 1-7 significant)
    fn write(&mut self, color: u8);
}

/// Something wired to a data port
pub trait Peripheral: Send {
    fn read(&mut self) -> u8;

    /// Bits the console drives as outputs
    fn write(&mut self, value: u8);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl Output for NullOutput {
    fn sync(&mut self) {}
    fn write(&mut self, _color: u8) {}
}

impl<T: Output> Output for Arc<Mutex<T>> {
    fn sync(&mut self) {
        if let Ok(mut inner) = self.lock() {
            inner.sync();
        }
    }

    fn write(&mut self, color: u8) {
        if let Ok(mut inner) = self.lock() {
            inner.write(color);
        }
    }
}

/// Shared byte a host thread can update while emulation runs.
///
/// Port A carries the joysticks (active low), port B the console switches,
/// so an unplugged latch reads all ones.
#[derive(Debug, Clone)]
pub struct InputLatch {
    value: Arc<AtomicU8>,
}

impl InputLatch {
    pub fn new(value: u8) -> Self {
        Self {
            value: Arc::new(AtomicU8::new(value)),
        }
    }

    pub fn set(&self, value: u8) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    /// Drive a single bit low (pressed) or high (released)
    pub fn press(&self, mask: u8, pressed: bool) {
        if pressed {
            self.value.fetch_and(!mask, Ordering::Relaxed);
        } else {
            self.value.fetch_or(mask, Ordering::Relaxed);
        }
    }
}

impl Default for InputLatch {
    fn default() -> Self {
        Self::new(0xFF)
    }
}

impl Peripheral for InputLatch {
    fn read(&mut self) -> u8 {
        self.get()
    }

    // Console outputs are not fed back into the latch
    fn write(&mut self, _value: u8) {}
}

/// Owned output slot; skipped by serde and shown opaquely in `Debug`
pub struct OutputSink(pub Box<dyn Output>);

impl OutputSink {
    pub fn new(output: impl Output + 'static) -> Self {
        Self(Box::new(output))
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new(NullOutput)
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputSink")
    }
}

/// Owned peripheral slot; an empty slot floats high
#[derive(Default)]
pub struct PeripheralPort(pub Option<Box<dyn Peripheral>>);

impl PeripheralPort {
    pub fn new(peripheral: impl Peripheral + 'static) -> Self {
        Self(Some(Box::new(peripheral)))
    }

    pub fn read(&mut self) -> u8 {
        self.0.as_mut().map_or(0xFF, |p| p.read())
    }

    pub fn write(&mut self, value: u8) {
        if let Some(p) = self.0.as_mut() {
            p.write(value);
        }
    }
}

impl fmt::Debug for PeripheralPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() {
            "PeripheralPort(attached)"
        } else {
            "PeripheralPort(empty)"
        })
    }
}
