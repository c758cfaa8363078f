//! Atari 2600 system implementation

#![allow(clippy::upper_case_acronyms)]

pub mod bus;
pub mod cartridge;
pub mod config;
pub mod console;
pub mod io;
pub mod pia;
pub mod tia;
pub mod video;

use std::sync::{Arc, Mutex, MutexGuard};

use cartridge::{Cartridge, CartridgeError};
use config::ConsoleConfig;
use console::{Console, Priority};
use emu_core::cpu_6502::CpuError;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::{types::Frame, MountPointInfo, System};
use io::InputLatch;
use serde::de::Error as _;
use serde_json::Value;
use thiserror::Error;
use video::FrameOutput;

const SAVE_STATE_VERSION: u64 = 1;
const CARTRIDGE_MOUNT: &str = "Cartridge";

#[derive(Debug, Error)]
pub enum Atari2600Error {
    #[error("Cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("CPU error: {0}")]
    Cpu(#[from] CpuError),
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
}

/// Atari 2600 system
#[derive(Debug)]
pub struct Atari2600System {
    console: Console,
    frame: Arc<Mutex<FrameOutput>>,
    joysticks: InputLatch,
    switches: InputLatch,
    fire_buttons: InputLatch,
    config: ConsoleConfig,
}

impl Default for Atari2600System {
    fn default() -> Self {
        Self::new()
    }
}

impl Atari2600System {
    /// Create a new Atari 2600 system
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        let frame = Arc::new(Mutex::new(FrameOutput::new(config.visible_lines)));
        let joysticks = InputLatch::default();
        let switches = InputLatch::default();
        let fire_buttons = InputLatch::default();

        let mut console = Console::new(&config);
        console.set_output(Arc::clone(&frame));
        console.attach_joysticks(joysticks.clone());
        console.attach_switches(switches.clone());
        console.attach_fire_buttons(fire_buttons.clone());

        Self {
            console,
            frame,
            joysticks,
            switches,
            fire_buttons,
            config,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    /// SWCHA lines, active low: player 0 in the high nibble
    pub fn joysticks(&self) -> &InputLatch {
        &self.joysticks
    }

    /// SWCHB lines: reset, select, color/BW and difficulty
    pub fn switches(&self) -> &InputLatch {
        &self.switches
    }

    /// Bit 0 drives INPT4, bit 1 drives INPT5, active low
    pub fn fire_buttons(&self) -> &InputLatch {
        &self.fire_buttons
    }

    /// Number of fields the frame sink has published
    pub fn fields(&self) -> u64 {
        self.frame_output().fields()
    }

    /// Get debug information
    pub fn debug_info(&self) -> Option<DebugInfo> {
        self.console.cpu().memory.cartridge.as_ref().map(|cart| DebugInfo {
            rom_size: cart.size(),
            pc: self.console.registers().pc,
            cycles: self.console.cycles(),
            scan_line: self.console.scan_line(),
            color_clock: self.console.color_clock(),
        })
    }

    fn frame_output(&self) -> MutexGuard<'_, FrameOutput> {
        self.frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct DebugInfo {
    pub rom_size: usize,
    pub pc: u16,
    pub cycles: u64,
    pub scan_line: u64,
    pub color_clock: u16,
}

impl System for Atari2600System {
    type Error = Atari2600Error;

    fn reset(&mut self) {
        self.console.reset();
    }

    /// Run to the next vertical sync. A ROM that stops syncing is cut off
    /// after `max_cycles_per_frame` and the field drawn so far is returned.
    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if !self.console.has_cartridge() {
            return Err(Atari2600Error::NoCartridge);
        }

        let fields = self.fields();
        let start = self.console.cycles();
        let budget = self.config.max_cycles_per_frame;
        let mut last = self.console.screen_clock();

        self.console.resume(
            Priority::Normal,
            move |c| {
                let now = c.screen_clock();
                let wrapped = now < last;
                last = now;
                wrapped || c.cycles() - start >= budget
            },
            |_| {},
        )?;

        let output = self.frame_output();
        if output.fields() > fields {
            Ok(output.frame().clone())
        } else {
            log(LogCategory::Console, LogLevel::Info, || {
                format!("no vertical sync within {} cycles", budget)
            });
            Ok(output.partial_frame())
        }
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": SAVE_STATE_VERSION,
            "system": "atari2600",
            "console": self.console.snapshot(),
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != SAVE_STATE_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported save state version {}",
                version
            )));
        }

        let system = v["system"].as_str().unwrap_or("");
        if system != "atari2600" {
            return Err(serde_json::Error::custom(format!(
                "save state is for system '{}'",
                system
            )));
        }

        let console = v
            .get("console")
            .ok_or_else(|| serde_json::Error::missing_field("console"))?;
        self.console.restore(console)?;
        self.frame_output().restart_field();
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE_MOUNT.to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: vec!["a26".to_string(), "bin".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(Atari2600Error::InvalidMountPoint(mount_point_id.to_string()));
        }

        let cartridge = Cartridge::new(data.to_vec())?;
        log(LogCategory::Console, LogLevel::Info, || {
            format!("inserted {} byte cartridge", cartridge.size())
        });
        self.console.insert_cartridge(cartridge);
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(Atari2600Error::InvalidMountPoint(mount_point_id.to_string()));
        }

        self.console.eject_cartridge();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE_MOUNT && self.console.has_cartridge()
    }
}
