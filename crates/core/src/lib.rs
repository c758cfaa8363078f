//! Shared pieces for console cores: the 6502 engine, logging, and the
//! traits a frontend drives a system through.

pub mod cpu_6502;
pub mod logging;
pub mod types {
    use serde::{Deserialize, Serialize};

    /// Packed 0xAARRGGBB pixels, row-major
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Pixel at (x, y), or `None` outside the frame
        pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.pixels.get((y * self.width + x) as usize).copied()
        }

        pub fn row(&self, y: u32) -> &[u32] {
            let start = (y * self.width) as usize;
            let end = start + self.width as usize;
            self.pixels.get(start..end).unwrap_or(&[])
        }
    }
}

use serde_json::Value;

/// A processor that executes one instruction per `step` and reports the
/// cycles it took.
pub trait Cpu {
    type Error: std::error::Error;

    fn reset(&mut self);
    fn step(&mut self) -> Result<u32, Self::Error>;
}

/// A media slot a system exposes, such as a cartridge port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Identifier passed to `mount`/`unmount`
    pub id: String,
    /// Display name
    pub name: String,
    /// Accepted file extensions, lowercase without the dot
    pub extensions: Vec<String>,
    /// The system cannot run with this slot empty
    pub required: bool,
}

/// A whole machine as seen by a frontend.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Pull the reset line
    fn reset(&mut self);

    /// Run until the machine finishes a picture and return it.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Machine state as JSON. Mounted media is not included, so a state can
    /// only be loaded with the same media inserted.
    fn save_state(&self) -> Value;

    /// Restore a state produced by `save_state`.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    fn supports_save_states(&self) -> bool {
        false
    }

    fn mount_points(&self) -> Vec<MountPointInfo>;

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
