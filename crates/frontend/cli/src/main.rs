use anyhow::{Context, Result};
use clap::Parser;
use emu_atari2600::config::ConsoleConfig;
use emu_atari2600::Atari2600System;
use emu_core::logging::LogConfig;
use emu_core::System;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const CYCLES_PER_LINE: u64 = 76;

#[derive(Parser)]
#[command(about = "Run an Atari 2600 cartridge headless")]
struct Args {
    /// Cartridge image (up to 4 KiB)
    rom: PathBuf,

    /// Number of fields to run
    #[arg(long, default_value_t = 5)]
    fields: u32,

    /// Seed for power-on state; overrides the config file
    #[arg(long)]
    seed: Option<u64>,

    /// JSON console configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Core log spec, e.g. "warn" or "info,cpu=trace,tia=debug"
    #[arg(long)]
    log_level: Option<String>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Dump save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: PathBuf,

    /// Print registers and chip state after each field
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress all per-field output (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConsoleConfig::load(path),
        None => ConsoleConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let logging = LogConfig::global();
    // Core logs stay quiet unless asked for
    let spec = args
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    for entry in logging.apply_spec(&spec) {
        log::warn!("ignoring log spec entry '{}'", entry);
    }
    if let Some(path) = &args.log_file {
        logging
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom.display()))?;
    let mut sys = Atari2600System::with_config(config);
    sys.mount("Cartridge", &rom)?;
    log::info!("loaded {} ({} bytes)", args.rom.display(), rom.len());

    let mut last_cycles = 0;
    for fnum in 1..=args.fields {
        let frame = sys.step_frame()?;
        let console = sys.console();
        let cycles = console.cycles() - last_cycles;
        last_cycles = console.cycles();
        if args.quiet {
            continue;
        }

        println!(
            "Field {}: {}x{}, {} lines, {} cycles, PC={:04X}",
            fnum,
            frame.width,
            frame.height,
            cycles / CYCLES_PER_LINE,
            cycles,
            console.registers().pc
        );
        if args.debug {
            let dump_len = std::cmp::min(16, frame.pixels.len());
            let mut out = String::new();
            for pixel in &frame.pixels[..dump_len] {
                out.push_str(&format!("{:08X} ", pixel));
            }
            println!("First {} pixels: {}", dump_len, out);
            println!(
                "DEBUG STATE (field {}):\n{}",
                fnum,
                serde_json::to_string_pretty(&console.debug_state())?
            );
        }
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)
        .with_context(|| format!("creating {}", args.save.display()))?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    Ok(())
}
