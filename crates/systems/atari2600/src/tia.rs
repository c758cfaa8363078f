//! TIA (Television Interface Adapter) - video timing and graphics for the Atari 2600
//!
//! The TIA has no framebuffer. It is clocked once per color clock and decides
//! the color of the pixel under the beam from its object registers at that
//! instant, which is why kernels "race the beam" and rewrite registers mid-line.
//!
//! # Timing
//! - 228 color clocks per scanline, 3 per CPU cycle
//! - The first 68 clocks of every line are horizontal blank and never drawn
//! - `screen_clock` counts clocks since the last accepted vertical sync
//!
//! # Objects
//! Two players (8-bit patterns with copies and stretching), two missiles,
//! one ball, and a 20-bit playfield that is repeated or mirrored on the right
//! half of the screen. Color priority (highest first):
//!
//! ```text
//! normal:             P0/M0 > P1/M1 > BL > PF > BK
//! CTRLPF bit 2 set:   PF/BL > P0/M0 > P1/M1 > BK
//! ```
//!
//! # Collisions
//! Every drawn pixel latches the overlapping object pairs into the eight
//! CXxx read registers (D7/D6) until CXCLR is written.

use emu_core::logging::{log, LogCategory, LogLevel};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::io::{Output, OutputSink, Peripheral, PeripheralPort};

pub const COLOR_CLOCKS_PER_LINE: u64 = 228;
pub const HBLANK_CLOCKS: u16 = 68;
pub const VISIBLE_WIDTH: u16 = 160;
/// VSYNC must be held this long before it counts as a field boundary
pub const VSYNC_DEBOUNCE_CLOCKS: u32 = 3 * COLOR_CLOCKS_PER_LINE as u32;

/// Decode latency of the position reset strobes
const PLAYER_RESET_DELAY: u16 = 5;
const MISSILE_RESET_DELAY: u16 = 4;
const BALL_RESET_DELAY: u16 = 4;

/// Write register addresses
pub mod reg {
    pub const VSYNC: u16 = 0x00;
    pub const VBLANK: u16 = 0x01;
    pub const WSYNC: u16 = 0x02;
    pub const RSYNC: u16 = 0x03;
    pub const NUSIZ0: u16 = 0x04;
    pub const NUSIZ1: u16 = 0x05;
    pub const COLUP0: u16 = 0x06;
    pub const COLUP1: u16 = 0x07;
    pub const COLUPF: u16 = 0x08;
    pub const COLUBK: u16 = 0x09;
    pub const CTRLPF: u16 = 0x0A;
    pub const REFP0: u16 = 0x0B;
    pub const REFP1: u16 = 0x0C;
    pub const PF0: u16 = 0x0D;
    pub const PF1: u16 = 0x0E;
    pub const PF2: u16 = 0x0F;
    pub const RESP0: u16 = 0x10;
    pub const RESP1: u16 = 0x11;
    pub const RESM0: u16 = 0x12;
    pub const RESM1: u16 = 0x13;
    pub const RESBL: u16 = 0x14;
    pub const AUDC0: u16 = 0x15;
    pub const AUDV1: u16 = 0x1A;
    pub const GRP0: u16 = 0x1B;
    pub const GRP1: u16 = 0x1C;
    pub const ENAM0: u16 = 0x1D;
    pub const ENAM1: u16 = 0x1E;
    pub const ENABL: u16 = 0x1F;
    pub const HMP0: u16 = 0x20;
    pub const HMP1: u16 = 0x21;
    pub const HMM0: u16 = 0x22;
    pub const HMM1: u16 = 0x23;
    pub const HMBL: u16 = 0x24;
    pub const VDELP0: u16 = 0x25;
    pub const VDELP1: u16 = 0x26;
    pub const VDELBL: u16 = 0x27;
    pub const RESMP0: u16 = 0x28;
    pub const RESMP1: u16 = 0x29;
    pub const HMOVE: u16 = 0x2A;
    pub const HMCLR: u16 = 0x2B;
    pub const CXCLR: u16 = 0x2C;

    // Read registers
    pub const CXM0P: u16 = 0x00;
    pub const CXM1P: u16 = 0x01;
    pub const CXP0FB: u16 = 0x02;
    pub const CXP1FB: u16 = 0x03;
    pub const CXM0FB: u16 = 0x04;
    pub const CXM1FB: u16 = 0x05;
    pub const CXBLPF: u16 = 0x06;
    pub const CXPPMM: u16 = 0x07;
    pub const INPT0: u16 = 0x08;
    pub const INPT4: u16 = 0x0C;
    pub const INPT5: u16 = 0x0D;
}

// Object bits used for collision and priority resolution
const P0: u8 = 0x01;
const P1: u8 = 0x02;
const M0: u8 = 0x04;
const M1: u8 = 0x08;
const BL: u8 = 0x10;
const PF: u8 = 0x20;

/// (object a, object b, collision register, bit)
const COLLISION_PAIRS: [(u8, u8, usize, u8); 15] = [
    (M0, P1, 0, 0x80),
    (M0, P0, 0, 0x40),
    (M1, P0, 1, 0x80),
    (M1, P1, 1, 0x40),
    (P0, PF, 2, 0x80),
    (P0, BL, 2, 0x40),
    (P1, PF, 3, 0x80),
    (P1, BL, 3, 0x40),
    (M0, PF, 4, 0x80),
    (M0, BL, 4, 0x40),
    (M1, PF, 5, 0x80),
    (M1, BL, 5, 0x40),
    (BL, PF, 6, 0x80),
    (P0, P1, 7, 0x80),
    (M0, M1, 7, 0x40),
];

/// Which 8-pixel sections hold a copy, per NUSIZ mode
const COPY_SECTIONS: [u16; 8] = [
    0b1,
    0b101,
    0b1_0001,
    0b1_0101,
    0b1_0000_0001,
    0b1,
    0b1_0001_0001,
    0b1,
];

/// Section bitmask and horizontal stretch for a NUSIZ value
#[inline]
fn copy_mode(nusiz: u8) -> (u16, u16) {
    let mode = (nusiz & 0x07) as usize;
    let scale = match mode {
        5 => 2,
        7 => 4,
        _ => 1,
    };
    (COPY_SECTIONS[mode], scale)
}

/// Distance from an object's position to the beam, wrapping at 160
#[inline]
fn offset_from(position: u8, point: u16) -> u16 {
    (point as i32 - position as i32).rem_euclid(VISIBLE_WIDTH as i32) as u16
}

#[inline]
fn motion_nibble(val: u8) -> i8 {
    (val as i8) >> 4
}

#[inline]
fn apply_motion(position: u8, motion: i8) -> u8 {
    (position as i16 - motion as i16).rem_euclid(VISIBLE_WIDTH as i16) as u8
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Player {
    pub position: u8,
    pub motion: i8,
    pub nusiz: u8,
    pub color: u8,
    pub reflect: bool,
    pub graphics: u8,
    /// Value of `graphics` before the other player's GRP was last written
    pub old_graphics: u8,
    pub vertical_delay: bool,
}

impl Player {
    fn pixel(&self, point: u16) -> bool {
        let graphics = if self.vertical_delay {
            self.old_graphics
        } else {
            self.graphics
        };
        if graphics == 0 {
            return false;
        }

        let (sections, scale) = copy_mode(self.nusiz);
        let offset = offset_from(self.position, point);
        let width = 8 * scale;
        if offset >= 10 * 8 || sections & (1 << (offset / width)) == 0 {
            return false;
        }
        let bit = (offset % width) / scale;
        if self.reflect {
            graphics & (0x01 << bit) != 0
        } else {
            graphics & (0x80 >> bit) != 0
        }
    }

    /// Horizontal centre used by RESMPx
    fn centre(&self) -> u8 {
        let centre = match self.nusiz & 0x07 {
            5 => 6,
            7 => 10,
            _ => 3,
        };
        ((self.position as u16 + centre) % VISIBLE_WIDTH) as u8
    }

    fn randomize(&mut self, rng: &mut impl Rng) {
        self.position = rng.gen_range(0..VISIBLE_WIDTH as u8);
        self.motion = rng.gen_range(-8..=7);
        self.nusiz = rng.gen();
        self.color = rng.gen();
        self.reflect = rng.gen();
        self.graphics = rng.gen();
        self.old_graphics = rng.gen();
        self.vertical_delay = rng.gen();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Missile {
    pub position: u8,
    pub motion: i8,
    pub enabled: bool,
    /// RESMPx: parked on the player's centre and hidden
    pub locked: bool,
}

impl Missile {
    /// Missiles share NUSIZ (copies and width) with their player
    fn pixel(&self, point: u16, nusiz: u8) -> bool {
        if !self.enabled || self.locked {
            return false;
        }
        let size = 1u16 << ((nusiz >> 4) & 0x03);
        let (sections, _) = copy_mode(nusiz);
        let offset = offset_from(self.position, point);
        offset < 10 * 8 && sections & (1 << (offset / 8)) != 0 && offset % 8 < size
    }

    fn randomize(&mut self, rng: &mut impl Rng) {
        self.position = rng.gen_range(0..VISIBLE_WIDTH as u8);
        self.motion = rng.gen_range(-8..=7);
        self.enabled = rng.gen();
        self.locked = false;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ball {
    pub position: u8,
    pub motion: i8,
    pub enabled: bool,
    pub old_enabled: bool,
    pub vertical_delay: bool,
}

impl Ball {
    fn pixel(&self, point: u16, ctrlpf: u8) -> bool {
        let enabled = if self.vertical_delay {
            self.old_enabled
        } else {
            self.enabled
        };
        let size = 1u16 << ((ctrlpf >> 4) & 0x03);
        enabled && offset_from(self.position, point) < size
    }

    fn randomize(&mut self, rng: &mut impl Rng) {
        self.position = rng.gen_range(0..VISIBLE_WIDTH as u8);
        self.motion = rng.gen_range(-8..=7);
        self.enabled = rng.gen();
        self.old_enabled = rng.gen();
        self.vertical_delay = rng.gen();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playfield {
    pub pf0: u8,
    pub pf1: u8,
    pub pf2: u8,
    /// PF0 D4-D7, PF1 D7-D0, PF2 D0-D7 packed left to right into bits 0-19
    pattern: u32,
    /// CTRLPF: D0 reflect, D1 score mode, D2 priority, D4-D5 ball size
    pub control: u8,
    pub color: u8,
}

impl Playfield {
    fn set_registers(&mut self, pf0: u8, pf1: u8, pf2: u8) {
        self.pf0 = pf0;
        self.pf1 = pf1;
        self.pf2 = pf2;
        self.pattern =
            (pf0 >> 4) as u32 | (pf1.reverse_bits() as u32) << 4 | (pf2 as u32) << 12;
    }

    fn reflect(&self) -> bool {
        self.control & 0x01 != 0
    }

    fn score_mode(&self) -> bool {
        self.control & 0x02 != 0
    }

    fn priority(&self) -> bool {
        self.control & 0x04 != 0
    }

    fn pixel(&self, point: u16) -> bool {
        let index = point / 4;
        let bit = if index < 20 {
            index
        } else if self.reflect() {
            39 - index
        } else {
            index - 20
        };
        self.pattern & (1 << bit) != 0
    }
}

/// TIA chip state
#[derive(Debug, Serialize, Deserialize)]
pub struct Tia {
    screen_clock: u64,
    /// Clocks since VSYNC went on; `None` while VSYNC is off
    vertical_sync_clock: Option<u32>,
    vertical_blank: bool,
    waiting_horizontal_sync: bool,
    /// HMOVE strobed during this line's horizontal blank
    hmove_blank: bool,

    pub player0: Player,
    pub player1: Player,
    pub missile0: Missile,
    pub missile1: Missile,
    pub ball: Ball,
    pub playfield: Playfield,
    pub background_color: u8,

    collisions: [u8; 8],

    /// AUDC0/1, AUDF0/1, AUDV0/1
    audio: [u8; 6],

    #[serde(skip)]
    output: OutputSink,
    /// Fire buttons: bit 0 player 0, bit 1 player 1, active low
    #[serde(skip)]
    fire_buttons: PeripheralPort,
}

impl Default for Tia {
    fn default() -> Self {
        Self::new()
    }
}

impl Tia {
    pub fn new() -> Self {
        Self {
            screen_clock: 0,
            vertical_sync_clock: None,
            vertical_blank: false,
            waiting_horizontal_sync: false,
            hmove_blank: false,
            player0: Player::default(),
            player1: Player::default(),
            missile0: Missile::default(),
            missile1: Missile::default(),
            ball: Ball::default(),
            playfield: Playfield::default(),
            background_color: 0,
            collisions: [0; 8],
            audio: [0; 6],
            output: OutputSink::default(),
            fire_buttons: PeripheralPort::default(),
        }
    }

    /// Scramble the object latches the way they come up on real hardware.
    /// Beam timing is left alone.
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        self.player0.randomize(rng);
        self.player1.randomize(rng);
        self.missile0.randomize(rng);
        self.missile1.randomize(rng);
        self.ball.randomize(rng);
        self.playfield.set_registers(rng.gen(), rng.gen(), rng.gen());
        self.playfield.control = rng.gen();
        self.playfield.color = rng.gen();
        self.background_color = rng.gen();
        rng.fill(&mut self.audio[..]);
    }

    pub fn set_output(&mut self, output: impl Output + 'static) {
        self.output = OutputSink::new(output);
    }

    /// Swap sinks and peripherals with `other` (used when restoring a snapshot)
    pub fn take_sinks_from(&mut self, other: &mut Tia) {
        std::mem::swap(&mut self.output, &mut other.output);
        std::mem::swap(&mut self.fire_buttons, &mut other.fire_buttons);
    }

    pub fn attach_fire_buttons(&mut self, peripheral: impl Peripheral + 'static) {
        self.fire_buttons = PeripheralPort::new(peripheral);
    }

    #[inline]
    pub fn screen_clock(&self) -> u64 {
        self.screen_clock
    }

    /// Horizontal beam position, 0..228
    #[inline]
    pub fn color_clock(&self) -> u16 {
        (self.screen_clock % COLOR_CLOCKS_PER_LINE) as u16
    }

    #[inline]
    pub fn scan_line(&self) -> u64 {
        self.screen_clock / COLOR_CLOCKS_PER_LINE
    }

    pub fn vertical_blank(&self) -> bool {
        self.vertical_blank
    }

    pub fn vertical_sync_clock(&self) -> Option<u32> {
        self.vertical_sync_clock
    }

    #[inline]
    pub fn waiting_horizontal_sync(&self) -> bool {
        self.waiting_horizontal_sync
    }

    pub fn audio_registers(&self) -> &[u8; 6] {
        &self.audio
    }

    /// One color clock
    pub fn advance_clock(&mut self) {
        let color_clock = self.color_clock();
        if color_clock >= HBLANK_CLOCKS && !self.vertical_blank {
            let point = color_clock - HBLANK_CLOCKS;
            let color = if self.hmove_blank && point < 8 {
                0
            } else {
                self.compose_pixel(point)
            };
            self.output.0.write(color);
        }

        self.screen_clock += 1;
        if let Some(clock) = self.vertical_sync_clock.as_mut() {
            *clock = clock.saturating_add(1);
        }
        if self.color_clock() == 0 {
            self.waiting_horizontal_sync = false;
            self.hmove_blank = false;
        }
    }

    /// Run the beam to the start of the next line. Returns the clocks taken.
    pub fn advance_clock_to_horizontal_sync(&mut self) -> u32 {
        let mut ticks = 0;
        while self.color_clock() != 0 {
            self.advance_clock();
            ticks += 1;
        }
        self.waiting_horizontal_sync = false;
        ticks
    }

    fn compose_pixel(&mut self, point: u16) -> u8 {
        let mut objects = 0;
        if self.player0.pixel(point) {
            objects |= P0;
        }
        if self.player1.pixel(point) {
            objects |= P1;
        }
        if self.missile0.pixel(point, self.player0.nusiz) {
            objects |= M0;
        }
        if self.missile1.pixel(point, self.player1.nusiz) {
            objects |= M1;
        }
        if self.ball.pixel(point, self.playfield.control) {
            objects |= BL;
        }
        if self.playfield.pixel(point) {
            objects |= PF;
        }

        if objects & objects.wrapping_sub(1) != 0 {
            self.latch_collisions(objects);
        }
        self.resolve_color(objects, point)
    }

    fn latch_collisions(&mut self, objects: u8) {
        for &(a, b, register, bit) in COLLISION_PAIRS.iter() {
            if objects & (a | b) == a | b {
                self.collisions[register] |= bit;
            }
        }
    }

    fn resolve_color(&self, objects: u8, point: u16) -> u8 {
        let pf = &self.playfield;
        if pf.priority() && objects & (PF | BL) != 0 {
            return pf.color;
        }
        if objects & (P0 | M0) != 0 {
            return self.player0.color;
        }
        if objects & (P1 | M1) != 0 {
            return self.player1.color;
        }
        if objects & BL != 0 {
            return pf.color;
        }
        if objects & PF != 0 {
            return match (pf.score_mode(), point < VISIBLE_WIDTH / 2) {
                (true, true) => self.player0.color,
                (true, false) => self.player1.color,
                (false, _) => pf.color,
            };
        }
        self.background_color
    }

    /// Position latched by a RESxx strobe at the current beam position
    fn reset_position(&self, delay: u16) -> u8 {
        let visible = self.color_clock().saturating_sub(HBLANK_CLOCKS);
        ((visible + delay) % VISIBLE_WIDTH) as u8
    }

    /// Write a register; `addr` is masked to the 64-byte register window
    pub fn write(&mut self, addr: u16, val: u8) {
        use reg::*;

        let addr = addr & 0x3F;
        match addr {
            VSYNC => self.write_vsync(val),
            VBLANK => {
                self.vertical_blank = val & 0x02 != 0;
                if val & 0xC0 != 0 {
                    log(LogCategory::Stubs, LogLevel::Debug, || {
                        format!("VBLANK input control bits {:02X} not emulated", val & 0xC0)
                    });
                }
            }
            WSYNC => self.waiting_horizontal_sync = true,
            RSYNC => {
                let remaining = COLOR_CLOCKS_PER_LINE - self.color_clock() as u64;
                self.screen_clock += remaining;
                log(LogCategory::TIA, LogLevel::Debug, || {
                    format!("RSYNC skipped {} clocks", remaining)
                });
            }
            NUSIZ0 => self.player0.nusiz = val,
            NUSIZ1 => self.player1.nusiz = val,
            COLUP0 => self.player0.color = val,
            COLUP1 => self.player1.color = val,
            COLUPF => self.playfield.color = val,
            COLUBK => self.background_color = val,
            CTRLPF => self.playfield.control = val,
            REFP0 => self.player0.reflect = val & 0x08 != 0,
            REFP1 => self.player1.reflect = val & 0x08 != 0,
            PF0 => {
                let pf = &mut self.playfield;
                pf.set_registers(val, pf.pf1, pf.pf2);
            }
            PF1 => {
                let pf = &mut self.playfield;
                pf.set_registers(pf.pf0, val, pf.pf2);
            }
            PF2 => {
                let pf = &mut self.playfield;
                pf.set_registers(pf.pf0, pf.pf1, val);
            }
            RESP0 => self.player0.position = self.reset_position(PLAYER_RESET_DELAY),
            RESP1 => self.player1.position = self.reset_position(PLAYER_RESET_DELAY),
            RESM0 => self.missile0.position = self.reset_position(MISSILE_RESET_DELAY),
            RESM1 => self.missile1.position = self.reset_position(MISSILE_RESET_DELAY),
            RESBL => self.ball.position = self.reset_position(BALL_RESET_DELAY),
            AUDC0..=AUDV1 => self.audio[(addr - AUDC0) as usize] = val,
            GRP0 => {
                self.player0.graphics = val;
                self.player1.old_graphics = self.player1.graphics;
            }
            GRP1 => {
                self.player1.graphics = val;
                self.player0.old_graphics = self.player0.graphics;
                self.ball.old_enabled = self.ball.enabled;
            }
            ENAM0 => self.missile0.enabled = val & 0x02 != 0,
            ENAM1 => self.missile1.enabled = val & 0x02 != 0,
            ENABL => self.ball.enabled = val & 0x02 != 0,
            HMP0 => self.player0.motion = motion_nibble(val),
            HMP1 => self.player1.motion = motion_nibble(val),
            HMM0 => self.missile0.motion = motion_nibble(val),
            HMM1 => self.missile1.motion = motion_nibble(val),
            HMBL => self.ball.motion = motion_nibble(val),
            VDELP0 => self.player0.vertical_delay = val & 0x01 != 0,
            VDELP1 => self.player1.vertical_delay = val & 0x01 != 0,
            VDELBL => self.ball.vertical_delay = val & 0x01 != 0,
            RESMP0 => Self::lock_missile(&mut self.missile0, &self.player0, val),
            RESMP1 => Self::lock_missile(&mut self.missile1, &self.player1, val),
            HMOVE => self.hmove(),
            HMCLR => {
                self.player0.motion = 0;
                self.player1.motion = 0;
                self.missile0.motion = 0;
                self.missile1.motion = 0;
                self.ball.motion = 0;
            }
            CXCLR => self.collisions = [0; 8],
            other => log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("write to undefined TIA register {:02X} <- {:02X}", other, val)
            }),
        }
    }

    fn write_vsync(&mut self, val: u8) {
        if val & 0x02 != 0 {
            if self.vertical_sync_clock.is_none() {
                self.vertical_sync_clock = Some(0);
            }
            return;
        }

        let Some(held) = self.vertical_sync_clock.take() else {
            return;
        };
        if held >= VSYNC_DEBOUNCE_CLOCKS {
            log(LogCategory::TIA, LogLevel::Debug, || {
                format!("VSYNC after {} lines, field of {} lines", held / 228, self.scan_line())
            });
            self.output.0.sync();
            self.screen_clock = 0;
        } else {
            log(LogCategory::TIA, LogLevel::Debug, || {
                format!("VSYNC cancelled after {} clocks", held)
            });
        }
    }

    fn lock_missile(missile: &mut Missile, player: &Player, val: u8) {
        let lock = val & 0x02 != 0;
        if missile.locked && !lock {
            missile.position = player.centre();
        }
        missile.locked = lock;
    }

    fn hmove(&mut self) {
        if self.color_clock() < HBLANK_CLOCKS {
            self.hmove_blank = true;
        }
        self.player0.position = apply_motion(self.player0.position, self.player0.motion);
        self.player1.position = apply_motion(self.player1.position, self.player1.motion);
        self.missile0.position = apply_motion(self.missile0.position, self.missile0.motion);
        self.missile1.position = apply_motion(self.missile1.position, self.missile1.motion);
        self.ball.position = apply_motion(self.ball.position, self.ball.motion);
    }

    /// Read a register. Only D7 and D6 are driven; the caller fills the rest.
    pub fn read(&mut self, addr: u16) -> u8 {
        match addr & 0x0F {
            reg::INPT4 => self.fire_button(0x01),
            reg::INPT5 => self.fire_button(0x02),
            _ => self.peek(addr),
        }
    }

    /// Side-effect-free read; fire buttons read as released
    pub fn peek(&self, addr: u16) -> u8 {
        match addr & 0x0F {
            a @ 0x00..=0x07 => self.collisions[a as usize],
            reg::INPT4 | reg::INPT5 => 0x80,
            // Paddles are not emulated; the capacitors never charge
            _ => 0x00,
        }
    }

    fn fire_button(&mut self, mask: u8) -> u8 {
        if self.fire_buttons.read() & mask != 0 {
            0x80
        } else {
            0x00
        }
    }
}
