/*
    chirp-tap: voices Commodore-64 TAP tape images as 8-bit PCM audio.
    Copyright (C) 2025-2026  Chirp the TAP developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Lesser General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
    GNU Lesser General Public License for more details.
*/
//! Converts digitized Commodore-64 cassette images (the **TAP** format) into
//! a square-wave 8-bit PCM reconstruction together with a per-block index of
//! everything recognized on the tape.
//!
//! The interesting part is the segmentation engine: a state machine that
//! walks the stream of pulse-width bytes, recognizes the pilot/sync/data
//! structures of the CBM ROM loader and of Turbotape-250, and cuts the
//! stream into typed [segments][segment::Segment]. The reconstructed audio
//! and the segment index line up sample for sample and byte for byte.
//!
//! # Pipeline
//!
//! ```text
//! TAP bytes -> header validation -> segmenter (loader recognizers)
//!           -> (PCM, segment index) -> header tags -> IDX merge
//!           -> WAV / raw PCM / CPK package
//! ```
//!
//! [convert_tap_file] drives the whole pipeline for a file on disk; the
//! individual stages are available from the topic modules for callers that
//! need only a part of it.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

pub mod audio;
pub mod export;
pub mod header;
pub mod idx;
pub mod loader;
pub mod petscii;
pub mod segment;
pub mod tap;

use audio::ClockStandard;
use tap::TapImage;

/// Errors terminating a conversion.
///
/// Only invalid input containers, truncated pulse streams and output I/O
/// are fatal. Everything a loader recognizer stumbles over degrades to a
/// generic lead/data segment and is reported through the [log] facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file is shorter than the fixed 20-byte TAP header.
    #[error("invalid tap file '{path}': file too short ({len} bytes found, 20 required)")]
    FileTooShort { path: String, len: usize },
    /// The 12-byte signature is not `C64-TAPE-RAW`.
    #[error("invalid tap file '{path}': incorrect signature (expected \"C64-TAPE-RAW\", got \"{found}\")")]
    Signature { path: String, found: String },
    /// The version byte is neither 0 nor 1.
    #[error("invalid tap file '{path}': unsupported version {version} (only versions 0 and 1 supported)")]
    Version { path: String, version: u8 },
    /// The declared payload length disagrees with the actual file size.
    #[error("invalid tap file '{path}': declared data size {declared} does not match actual data size {actual}")]
    DataSize { path: String, declared: u32, actual: u32 },
    /// The stream ended inside a TAP v1 pause duration field.
    #[error("unexpected EOF reading v1 pause duration at offset {offset}")]
    TruncatedPause { offset: usize },
    /// A malformed line in an IDX sidecar. Fatal to IDX parsing only.
    #[error("line {line}: {reason}")]
    IdxParse { line: usize, reason: String },
    /// Processing produced no audio samples at all.
    #[error("processing resulted in no audio samples")]
    EmptyAudio,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("error marshaling manifest to json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What the conversion should produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// A whole-tape `.wav` file next to the input.
    Wav,
    /// The raw `.pcm` sample bytes next to the input.
    Pcm,
    /// A `.cpk` package: gzip tar with manifest, index and per-block WAVs.
    Cpk,
}

/// Options for [convert_tap_file].
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub clock: ClockStandard,
    pub target_system: String,
    pub output: OutputMode,
    /// Also write a standalone `.csv` index. Ignored for [OutputMode::Cpk],
    /// which always carries the index inside the package.
    pub standalone_csv: bool,
    pub sample_rate: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            clock: ClockStandard::Pal,
            target_system: "c64".to_string(),
            output: OutputMode::Wav,
            standalone_csv: false,
            sample_rate: audio::DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Converts the TAP file at `tap_path`, writing the requested output next to
/// it and returning the path of the produced file.
///
/// An `.idx` sidecar next to the input is merged into the index when
/// present; a sidecar that fails to parse is skipped with a warning.
pub fn convert_tap_file(tap_path: &Path, opts: &ConvertOptions) -> Result<PathBuf> {
    let image = TapImage::open(tap_path)?;
    info!("TAP version: {}, payload size: {} bytes",
          image.version() as u8, image.payload_len());

    let idx_path = tap_path.with_extension("idx");
    let mut idx_entries = if idx_path.exists() {
        match idx::read_idx(&idx_path) {
            Ok(entries) => {
                info!("read {} entries from IDX file: {}", entries.len(), idx_path.display());
                entries
            }
            Err(err) => {
                warn!("error reading IDX file '{}': {}, continuing without tags", idx_path.display(), err);
                Vec::new()
            }
        }
    }
    else {
        Vec::new()
    };

    let clock_hz = opts.clock.hz();
    let (pcm, mut segments) = segment::segment_tape(&image, clock_hz, opts.sample_rate)?;
    info!("generated {} PCM samples, {} raw index entries", pcm.len(), segments.len());

    header::apply_header_tags(image.bytes(), &mut segments);
    idx::merge_idx_tags(&mut segments, &mut idx_entries);

    let base = tap_path.with_extension("");
    match opts.output {
        OutputMode::Cpk => {
            if pcm.is_empty() {
                return Err(Error::EmptyAudio);
            }
            export::package::write_package(
                &pcm, &segments, &base, opts.sample_rate, clock_hz, &opts.target_system)
        }
        OutputMode::Wav => {
            let out = base.with_extension("wav");
            audio::wav::write_wav_file(&out, &pcm, opts.sample_rate)?;
            if opts.standalone_csv {
                export::csv::write_block_index(
                    &base.with_extension("csv"), &segments, opts.sample_rate as f64)?;
            }
            Ok(out)
        }
        OutputMode::Pcm => {
            let out = base.with_extension("pcm");
            fs::write(&out, &pcm)?;
            if opts.standalone_csv {
                export::csv::write_block_index(
                    &base.with_extension("csv"), &segments, opts.sample_rate as f64)?;
            }
            Ok(out)
        }
    }
}
