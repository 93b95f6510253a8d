/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Command-line front end: converts `.tap` files into audio files or CPK
//! playback packages.
use std::path::PathBuf;
use std::process;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use clap::{Parser, ValueEnum};

use chirp_tap::audio::ClockStandard;
use chirp_tap::{convert_tap_file, ConvertOptions, OutputMode};

#[derive(Parser)]
#[command(name = "chirptap")]
#[command(version, about = "Converts C64 TAP tape images into audio files or CPK playback packages")]
struct Args {
    /// Input .tap file
    tap: PathBuf,

    /// Output format (when not packaging)
    #[arg(long, value_enum, default_value_t = Format::Wav)]
    format: Format,

    /// Create a .cpk package (.cpk archive with wav blocks and csv)
    #[arg(long)]
    cpk: bool,

    /// Generate a standalone CSV file (only if --cpk is not set)
    #[arg(long)]
    csv: bool,

    /// Clock speed standard
    #[arg(long, value_enum, default_value_t = Clock::Pal)]
    clock: Clock,

    /// Target system (e.g. c64)
    #[arg(long, default_value = "c64")]
    target: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Wav,
    Pcm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Clock {
    Pal,
    Ntsc,
}

impl From<Clock> for ClockStandard {
    fn from(clock: Clock) -> Self {
        match clock {
            Clock::Pal => ClockStandard::Pal,
            Clock::Ntsc => ClockStandard::Ntsc,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        error!("{}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::init_with_level(log::Level::Info)?;

    let args = Args::parse();
    let clock: ClockStandard = args.clock.into();
    info!("input TAP file: {}, using {} clock", args.tap.display(), clock);

    let output = if args.cpk {
        OutputMode::Cpk
    }
    else {
        match args.format {
            Format::Wav => OutputMode::Wav,
            Format::Pcm => OutputMode::Pcm,
        }
    };

    let opts = ConvertOptions {
        clock,
        target_system: args.target.clone(),
        output,
        standalone_csv: args.csv,
        ..ConvertOptions::default()
    };
    let out_path = convert_tap_file(&args.tap, &opts)?;
    info!("wrote {}", out_path.display());
    Ok(())
}
