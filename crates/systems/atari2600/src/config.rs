use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Console construction and host-side settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Seed for power-on state and floating bus noise; `None` draws from the OS
    pub seed: Option<u64>,
    /// Scan lines kept by the frame sink after each vertical sync
    pub visible_lines: usize,
    /// Logging spec such as `"warn,tia=debug"`
    pub log_level: Option<String>,
    /// Upper bound on CPU cycles per `step_frame` when a ROM never syncs
    pub max_cycles_per_frame: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            seed: None,
            visible_lines: 192,
            log_level: None,
            // Two NTSC fields worth of cycles
            max_cycles_per_frame: 2 * 262 * 76,
        }
    }
}

impl ConsoleConfig {
    /// Load from a JSON file, falling back to defaults on error
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                log(LogCategory::Console, LogLevel::Warn, || {
                    format!("{}: {}. Using defaults.", path.display(), e)
                });
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
