//! Console: the CPU, TIA and PIA on one clock
//!
//! Every CPU cycle is three TIA color clocks and one PIA cycle. The console
//! executes one instruction, then advances the TIA and PIA by the cycles it
//! took. While WSYNC is pending it keeps clocking the TIA to the start of the
//! next line and charges the PIA the equivalent cycles.
//!
//! Free running goes through [`Console::resume`], which loops until a halting
//! predicate holds or another thread suspends it through a [`SuspendHandle`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use emu_core::cpu_6502::{flags, Cpu6502, CpuError, Memory6502, Registers};
use emu_core::logging::{log, LogCategory, LogLevel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::Atari2600Bus;
use crate::cartridge::Cartridge;
use crate::config::ConsoleConfig;
use crate::io::{Output, Peripheral};
use crate::pia::Pia;
use crate::tia::Tia;

pub const COLOR_CLOCKS_PER_CPU_CYCLE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Resumed,
    Suspended(Priority),
}

const RESUMED: u8 = 0;
const SUSPENDED_NORMAL: u8 = 1;
const SUSPENDED_HIGH: u8 = 2;

/// Cloneable handle onto a console's run state
#[derive(Debug, Clone)]
pub struct SuspendHandle {
    state: Arc<AtomicU8>,
}

impl SuspendHandle {
    fn new(state: RunState) -> Self {
        let handle = Self {
            state: Arc::new(AtomicU8::new(RESUMED)),
        };
        handle.set(state);
        handle
    }

    /// Request suspension; an existing higher priority suspension is kept
    pub fn suspend(&self, priority: Priority) {
        let encoded = match priority {
            Priority::Normal => SUSPENDED_NORMAL,
            Priority::High => SUSPENDED_HIGH,
        };
        self.state.fetch_max(encoded, Ordering::SeqCst);
    }

    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::SeqCst) {
            RESUMED => RunState::Resumed,
            SUSPENDED_NORMAL => RunState::Suspended(Priority::Normal),
            _ => RunState::Suspended(Priority::High),
        }
    }

    fn set(&self, state: RunState) {
        let encoded = match state {
            RunState::Resumed => RESUMED,
            RunState::Suspended(Priority::Normal) => SUSPENDED_NORMAL,
            RunState::Suspended(Priority::High) => SUSPENDED_HIGH,
        };
        self.state.store(encoded, Ordering::SeqCst);
    }
}

/// Parts of a snapshot that are restored; the ROM and sinks stay attached
#[derive(Deserialize)]
struct Snapshot {
    cpu: Registers,
    cycles: u64,
    color_clock_phase: u32,
    bus: Atari2600Bus,
}

#[derive(Debug)]
pub struct Console {
    cpu: Cpu6502<Atari2600Bus>,
    run: SuspendHandle,
    /// CPU cycles elapsed, WSYNC stalls included
    cycles: u64,
    /// Color clocks of a WSYNC stall not yet charged to the PIA
    color_clock_phase: u32,
}

impl Console {
    /// Power on with indeterminate chip state drawn from the configured seed
    pub fn new(config: &ConsoleConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut bus = Atari2600Bus::new(StdRng::seed_from_u64(rng.gen()));
        bus.tia.randomize(&mut rng);
        bus.pia.randomize(&mut rng);

        let mut cpu = Cpu6502::new(bus);
        cpu.a = rng.gen();
        cpu.x = rng.gen();
        cpu.y = rng.gen();
        cpu.status = rng.gen::<u8>() | flags::UNUSED;

        Self {
            cpu,
            run: SuspendHandle::new(RunState::Suspended(Priority::Normal)),
            cycles: 0,
            color_clock_phase: 0,
        }
    }

    /// Reset line: the CPU reloads its vector, the chips keep their state
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cycles = 0;
        self.color_clock_phase = 0;
        self.run.set(RunState::Suspended(Priority::Normal));
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.cpu.memory.load_cartridge(cartridge);
    }

    pub fn eject_cartridge(&mut self) -> Option<Cartridge> {
        self.cpu.memory.eject_cartridge()
    }

    pub fn has_cartridge(&self) -> bool {
        self.cpu.memory.cartridge.is_some()
    }

    pub fn set_output(&mut self, output: impl Output + 'static) {
        self.cpu.memory.tia.set_output(output);
    }

    /// Joysticks on PIA port A
    pub fn attach_joysticks(&mut self, peripheral: impl Peripheral + 'static) {
        self.cpu.memory.pia.attach_port_a(peripheral);
    }

    /// Console switches on PIA port B
    pub fn attach_switches(&mut self, peripheral: impl Peripheral + 'static) {
        self.cpu.memory.pia.attach_port_b(peripheral);
    }

    /// Fire buttons on TIA INPT4/INPT5
    pub fn attach_fire_buttons(&mut self, peripheral: impl Peripheral + 'static) {
        self.cpu.memory.tia.attach_fire_buttons(peripheral);
    }

    pub fn cpu(&self) -> &Cpu6502<Atari2600Bus> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu6502<Atari2600Bus> {
        &mut self.cpu
    }

    pub fn registers(&self) -> Registers {
        self.cpu.registers()
    }

    pub fn tia(&self) -> &Tia {
        &self.cpu.memory.tia
    }

    pub fn pia(&self) -> &Pia {
        &self.cpu.memory.pia
    }

    pub fn bus_mut(&mut self) -> &mut Atari2600Bus {
        &mut self.cpu.memory
    }

    /// Side-effect-free read for disassemblers and memory viewers
    pub fn peek(&self, addr: u16) -> u8 {
        self.cpu.memory.peek(addr)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn screen_clock(&self) -> u64 {
        self.tia().screen_clock()
    }

    pub fn scan_line(&self) -> u64 {
        self.tia().scan_line()
    }

    pub fn color_clock(&self) -> u16 {
        self.tia().color_clock()
    }

    pub fn state(&self) -> RunState {
        self.run.state()
    }

    pub fn suspend(&self, priority: Priority) {
        self.run.suspend(priority);
    }

    pub fn suspend_handle(&self) -> SuspendHandle {
        self.run.clone()
    }

    /// Execute one instruction and clock the chips. Returns elapsed CPU
    /// cycles including any WSYNC stall.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        let cycles = self.cpu.step()?;
        let bus = &mut self.cpu.memory;

        for _ in 0..cycles * COLOR_CLOCKS_PER_CPU_CYCLE {
            bus.tia.advance_clock();
        }
        bus.pia.advance_clock(cycles);

        let mut elapsed = cycles;
        if bus.tia.waiting_horizontal_sync() {
            let phase = self.color_clock_phase + bus.tia.advance_clock_to_horizontal_sync();
            let stall = phase / COLOR_CLOCKS_PER_CPU_CYCLE;
            self.color_clock_phase = phase % COLOR_CLOCKS_PER_CPU_CYCLE;
            bus.pia.advance_clock(stall);
            elapsed += stall;
        }

        self.cycles += elapsed as u64;
        Ok(elapsed)
    }

    /// Run until `until` holds after an instruction, or until suspended
    /// from elsewhere. `on_suspend` is called exactly once when the loop stops.
    ///
    /// An illegal opcode suspends at high priority and is returned after the
    /// callback has run.
    pub fn resume<U, S>(&mut self, priority: Priority, mut until: U, on_suspend: S) -> Result<(), CpuError>
    where
        U: FnMut(&Console) -> bool,
        S: FnOnce(&Console),
    {
        self.run.set(RunState::Resumed);
        log(LogCategory::Console, LogLevel::Debug, || {
            format!("resumed at {:04X}", self.cpu.pc)
        });

        let result = loop {
            if let Err(e) = self.step() {
                self.run.suspend(Priority::High);
                break Err(e);
            }
            if until(&*self) {
                self.run.suspend(priority);
                break Ok(());
            }
            if self.run.state() != RunState::Resumed {
                break Ok(());
            }
        };

        log(LogCategory::Console, LogLevel::Debug, || {
            format!(
                "suspended ({:?}) at {:04X}, line {} clock {}",
                self.run.state(),
                self.cpu.pc,
                self.scan_line(),
                self.color_clock()
            )
        });
        on_suspend(&*self);
        result
    }

    pub fn step_instruction(&mut self) -> Result<(), CpuError> {
        self.resume(Priority::Normal, |_| true, |_| {})
    }

    /// Run until the beam reaches another scan line
    pub fn step_scanline(&mut self) -> Result<(), CpuError> {
        let line = self.scan_line();
        self.resume(Priority::Normal, move |c| c.scan_line() != line, |_| {})
    }

    /// Run until the next accepted vertical sync
    pub fn step_field(&mut self) -> Result<(), CpuError> {
        let mut last = self.screen_clock();
        self.resume(
            Priority::Normal,
            move |c| {
                let now = c.screen_clock();
                let wrapped = now < last;
                last = now;
                wrapped
            },
            |_| {},
        )
    }

    /// Registers, chip state and run state for debugger views
    pub fn debug_state(&self) -> Value {
        serde_json::json!({
            "cpu": self.cpu.registers(),
            "cycles": self.cycles,
            "run_state": self.run.state(),
            "scan_line": self.scan_line(),
            "color_clock": self.color_clock(),
            "tia": &self.cpu.memory.tia,
            "pia": &self.cpu.memory.pia,
        })
    }

    /// Machine state without ROM, sinks or peripherals
    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "cpu": self.cpu.registers(),
            "cycles": self.cycles,
            "color_clock_phase": self.color_clock_phase,
            "bus": &self.cpu.memory,
        })
    }

    /// Restore a [`snapshot`](Self::snapshot), keeping the inserted ROM and attached sinks
    pub fn restore(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let mut snapshot = Snapshot::deserialize(v)?;
        snapshot.bus.take_unsaved_from(&mut self.cpu.memory);
        self.cpu.memory = snapshot.bus;
        self.cpu.set_registers(snapshot.cpu);
        self.cycles = snapshot.cycles;
        self.color_clock_phase = snapshot.color_clock_phase;
        self.run.set(RunState::Suspended(Priority::Normal));
        Ok(())
    }
}
