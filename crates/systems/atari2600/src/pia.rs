//! PIA (MOS 6532 RIOT) - RAM, I/O ports and interval timer
//!
//! # RAM
//! 128 bytes at $80-$FF. Zero page variables and the stack both live here,
//! so $0180-$01FF mirrors the same bytes.
//!
//! # Ports
//! - **Port A** (SWCHA/SWACNT): joysticks, active low
//! - **Port B** (SWCHB/SWBCNT): console switches, active low
//!
//! Each port has a data register and a data direction register (1 = output).
//! A read merges peripheral input on input bits with the held data on
//! output bits; a write forwards the output bits to the peripheral.
//!
//! # Timer
//! Writing TIM1T/TIM8T/TIM64T/T1024T loads `value * interval` into a signed
//! down-counter that drops by one every CPU cycle. INTIM reads `clock / interval`
//! while the counter is non-negative. Once it passes zero, every cycle counts
//! and INTIM shows the raw two's complement byte, bottoming out at -255.
//!
//! ```text
//! offset  read      write
//! $00     SWCHA     SWCHA
//! $01     SWACNT    SWACNT
//! $02     SWCHB     SWCHB
//! $03     SWBCNT    SWBCNT
//! $04     INTIM     edge detect control
//! $05     TIMINT    edge detect control
//! $14-17  INTIM     TIM1T/TIM8T/TIM64T/T1024T
//! ```

use emu_core::logging::{log, LogCategory, LogLevel};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::io::{Peripheral, PeripheralPort};

mod serde_arrays {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(arr: &[u8; 128], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        arr.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 128], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<u8>::deserialize(deserializer)?;
        <[u8; 128]>::try_from(vec.as_slice())
            .map_err(|_| serde::de::Error::invalid_length(vec.len(), &"128 bytes of RAM"))
    }
}

const TIMER_FLOOR: i32 = -255;
const INTERVALS: [u16; 4] = [1, 8, 64, 1024];

/// One bidirectional data port
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Port {
    pub data: u8,
    /// Data direction register, 1 = output
    pub direction: u8,
    #[serde(skip)]
    peripheral: PeripheralPort,
}

impl Port {
    fn read(&mut self) -> u8 {
        (self.peripheral.read() & !self.direction) | (self.data & self.direction)
    }

    fn write_data(&mut self, value: u8) {
        self.data = value;
        self.peripheral.write(value & self.direction);
    }

    fn write_direction(&mut self, value: u8) {
        self.direction = value;
        self.peripheral.write(self.data & self.direction);
    }
}

/// RIOT chip state
#[derive(Debug, Serialize, Deserialize)]
pub struct Pia {
    #[serde(with = "serde_arrays")]
    ram: [u8; 128],

    /// Signed down-counter in CPU cycles
    clock: i32,

    /// Prescale selected by the last timer load
    interval: u16,

    /// TIMINT D7, set when the counter passes zero
    timer_underflowed: bool,

    pub port_a: Port,
    pub port_b: Port,
}

impl Default for Pia {
    fn default() -> Self {
        Self::new()
    }
}

impl Pia {
    pub fn new() -> Self {
        Self {
            ram: [0; 128],
            clock: 0,
            interval: 1,
            timer_underflowed: false,
            port_a: Port::default(),
            port_b: Port::default(),
        }
    }

    /// Fill RAM and the timer with power-on garbage
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        rng.fill(&mut self.ram[..]);
        self.interval = INTERVALS[rng.gen_range(0..INTERVALS.len())];
        self.clock = rng.gen::<u8>() as i32 * self.interval as i32;
        self.timer_underflowed = false;
    }

    pub fn attach_port_a(&mut self, peripheral: impl Peripheral + 'static) {
        self.port_a.peripheral = PeripheralPort::new(peripheral);
    }

    pub fn attach_port_b(&mut self, peripheral: impl Peripheral + 'static) {
        self.port_b.peripheral = PeripheralPort::new(peripheral);
    }

    /// Move the peripherals of `other` into this chip (used after loading a snapshot)
    pub fn take_ports_from(&mut self, other: &mut Pia) {
        std::mem::swap(&mut self.port_a.peripheral, &mut other.port_a.peripheral);
        std::mem::swap(&mut self.port_b.peripheral, &mut other.port_b.peripheral);
    }

    #[inline]
    pub fn read_ram(&self, addr: u16) -> u8 {
        self.ram[(addr & 0x7F) as usize]
    }

    #[inline]
    pub fn write_ram(&mut self, addr: u16, val: u8) {
        self.ram[(addr & 0x7F) as usize] = val;
    }

    pub fn ram(&self) -> &[u8; 128] {
        &self.ram
    }

    /// Register read; TIMINT clears the underflow flag
    pub fn read_register(&mut self, addr: u16) -> u8 {
        match addr & 0x07 {
            0x00 => self.port_a.read(),
            0x01 => self.port_a.direction,
            0x02 => self.port_b.read(),
            0x03 => self.port_b.direction,
            0x04 | 0x06 => self.timer_value() as u8,
            _ => {
                let flag = if self.timer_underflowed { 0x80 } else { 0x00 };
                self.timer_underflowed = false;
                flag
            }
        }
    }

    /// Register read without side effects
    pub fn peek_register(&self, addr: u16) -> u8 {
        match addr & 0x07 {
            0x00 => self.port_a.data & self.port_a.direction,
            0x01 => self.port_a.direction,
            0x02 => self.port_b.data & self.port_b.direction,
            0x03 => self.port_b.direction,
            0x04 | 0x06 => self.timer_value() as u8,
            _ => {
                if self.timer_underflowed {
                    0x80
                } else {
                    0x00
                }
            }
        }
    }

    pub fn write_register(&mut self, addr: u16, val: u8) {
        let offset = addr & 0x1F;
        if offset & 0x14 == 0x14 {
            self.load_timer(val, INTERVALS[(offset & 0x03) as usize]);
        } else if offset & 0x04 == 0 {
            match offset & 0x03 {
                0x00 => self.port_a.write_data(val),
                0x01 => self.port_a.write_direction(val),
                0x02 => self.port_b.write_data(val),
                _ => self.port_b.write_direction(val),
            }
        } else {
            log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("PIA edge detect control ${:02X} <- {:02X} ignored", offset, val)
            });
        }
    }

    fn load_timer(&mut self, value: u8, interval: u16) {
        self.interval = interval;
        self.clock = value as i32 * interval as i32;
        self.timer_underflowed = false;
        log(LogCategory::PIA, LogLevel::Trace, || {
            format!("timer load {} x {}", value, interval)
        });
    }

    /// Count down `cycles` CPU cycles
    pub fn advance_clock(&mut self, cycles: u32) {
        let before = self.clock;
        self.clock = (self.clock - cycles as i32).max(TIMER_FLOOR);
        if before >= 0 && self.clock < 0 {
            self.timer_underflowed = true;
        }
    }

    /// Value INTIM would show, as a signed number
    pub fn timer_value(&self) -> i32 {
        if self.clock >= 0 {
            self.clock / self.interval as i32
        } else {
            self.clock
        }
    }

    pub fn interval(&self) -> u16 {
        self.interval
    }

    pub fn timer_underflowed(&self) -> bool {
        self.timer_underflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InputLatch;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SWCHA: u16 = 0x00;
    const SWACNT: u16 = 0x01;
    const SWCHB: u16 = 0x02;
    const INTIM: u16 = 0x04;
    const TIMINT: u16 = 0x05;
    const TIM1T: u16 = 0x14;
    const TIM8T: u16 = 0x15;
    const TIM64T: u16 = 0x16;
    const T1024T: u16 = 0x17;

    #[test]
    fn test_pia_ram_masks_to_128_bytes() {
        let mut pia = Pia::new();
        pia.write_ram(0x0080, 0x42);
        assert_eq!(pia.read_ram(0x00), 0x42);
        assert_eq!(pia.read_ram(0x0180), 0x42);
        pia.write_ram(0x01FF, 0x99);
        assert_eq!(pia.read_ram(0x00FF), 0x99);
    }

    #[test]
    fn test_pia_timer_interval_one() {
        let mut pia = Pia::new();
        pia.write_register(TIM1T, 17);

        pia.advance_clock(1);
        assert_eq!(pia.timer_value(), 16);
        pia.advance_clock(16);
        assert_eq!(pia.timer_value(), 0);
        pia.advance_clock(7);
        assert_eq!(pia.timer_value(), -7);
        assert_eq!(pia.read_register(INTIM), 0xF9);

        pia.advance_clock(270);
        assert_eq!(pia.timer_value(), -255);
        pia.advance_clock(100);
        assert_eq!(pia.timer_value(), -255);
        assert_eq!(pia.read_register(INTIM), 0x01);
    }

    #[test]
    fn test_pia_timer_interval_eight() {
        let mut pia = Pia::new();
        pia.write_register(TIM8T, 12);
        assert_eq!(pia.timer_value(), 12);

        pia.advance_clock(1);
        assert_eq!(pia.timer_value(), 11);
        for _ in 0..7 {
            pia.advance_clock(1);
            assert_eq!(pia.timer_value(), 11);
        }
        pia.advance_clock(1);
        assert_eq!(pia.timer_value(), 10);

        pia.advance_clock(80);
        assert_eq!(pia.timer_value(), 0);
        pia.advance_clock(7);
        assert_eq!(pia.timer_value(), 0);
        pia.advance_clock(1);
        assert_eq!(pia.timer_value(), -1);
        pia.advance_clock(1);
        assert_eq!(pia.timer_value(), -2);
    }

    #[test]
    fn test_pia_timer_prescales() {
        let mut pia = Pia::new();
        for (reg, interval) in [(TIM1T, 1), (TIM8T, 8), (TIM64T, 64), (T1024T, 1024)] {
            pia.write_register(reg, 5);
            assert_eq!(pia.interval(), interval);
            pia.advance_clock(interval as u32);
            assert_eq!(pia.read_register(INTIM), 4);
        }
        // Mirrors at $1C-$1F
        pia.write_register(0x1E, 3);
        assert_eq!(pia.interval(), 64);
    }

    #[test]
    fn test_pia_timint_set_on_underflow_and_cleared_by_read() {
        let mut pia = Pia::new();
        pia.write_register(TIM1T, 2);
        pia.advance_clock(2);
        assert_eq!(pia.read_register(TIMINT), 0x00);

        pia.advance_clock(1);
        assert_eq!(pia.peek_register(TIMINT), 0x80);
        assert_eq!(pia.read_register(TIMINT), 0x80);
        assert_eq!(pia.read_register(TIMINT), 0x00);

        pia.advance_clock(10);
        pia.write_register(TIM1T, 4);
        assert!(!pia.timer_underflowed());
    }

    #[test]
    fn test_pia_port_merges_input_and_output_bits() {
        let latch = InputLatch::new(0b1010_1010);
        let mut pia = Pia::new();
        pia.attach_port_a(latch.clone());

        assert_eq!(pia.read_register(SWCHA), 0b1010_1010);

        pia.write_register(SWACNT, 0x0F);
        pia.write_register(SWCHA, 0b0000_0101);
        assert_eq!(pia.read_register(SWCHA), 0b1010_0101);

        latch.set(0x00);
        assert_eq!(pia.read_register(SWCHA), 0b0000_0101);
    }

    #[test]
    fn test_pia_unattached_port_reads_high() {
        let mut pia = Pia::new();
        assert_eq!(pia.read_register(SWCHB), 0xFF);
    }

    #[test]
    fn test_pia_edge_detect_writes_are_ignored() {
        let mut pia = Pia::new();
        pia.write_register(TIM1T, 9);
        pia.write_register(0x04, 0xFF);
        pia.write_register(0x07, 0xFF);
        assert_eq!(pia.timer_value(), 9);
        assert_eq!(pia.port_a.data, 0);
    }

    #[test]
    fn test_pia_randomize_is_seeded() {
        let mut a = Pia::new();
        let mut b = Pia::new();
        a.randomize(&mut StdRng::seed_from_u64(7));
        b.randomize(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.ram(), b.ram());
        assert_eq!(a.timer_value(), b.timer_value());
    }

    #[test]
    fn test_pia_snapshot_round_trip() {
        let mut pia = Pia::new();
        pia.write_ram(0x85, 0x5A);
        pia.write_register(TIM64T, 40);
        let json = serde_json::to_string(&pia).expect("serialize");
        let restored: Pia = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.read_ram(0x85), 0x5A);
        assert_eq!(restored.timer_value(), 40);
        assert_eq!(restored.interval(), 64);
    }
}
