/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! CPK ("Chirp Package") emission.
//!
//! A `.cpk` is a gzip-compressed tar archive holding the JSON manifest,
//! the `blocks.csv` index and one WAV file per exported block. Compression
//! level 7 trades a little speed for markedly smaller packages.
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use serde::Serialize;

use crate::audio::{self, wav};
use crate::segment::Segment;
use crate::Result;

use super::{block_groups, csv};

const GZIP_LEVEL: u32 = 7;
const MEMBER_MODE: u32 = 0o644;

/// Contents of `package_manifest.json`.
#[derive(Clone, Debug, Serialize)]
pub struct PackageManifest {
    pub target_system: String,
    /// `"PAL"`, `"NTSC"` or `"Unknown"`.
    pub clock_standard: String,
    /// CPU clock frequency in Hz used for processing.
    pub clock_frequency: f64,
    pub sample_rate: u32,
    /// Base name of the original `.tap` file.
    pub source_file: String,
    pub polarity: String,
    pub waveform: String,
    pub audio_bits_per_sample: u32,
    pub audio_channels: u32,
    /// RFC-3339 UTC timestamp of package creation.
    pub creation_timestamp: String,
}

impl PackageManifest {
    fn new(base_path: &Path, sample_rate: u32, clock_hz: f64, target_system: &str) -> Self {
        let clock_standard = audio::standard_name(clock_hz);
        if clock_standard == "Unknown" {
            warn!("unexpected clock frequency {} Hz; setting standard to unknown", clock_hz);
        }
        let source = base_path.with_extension("tap");
        let source_file = source.file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
        PackageManifest {
            target_system: target_system.to_string(),
            clock_standard: clock_standard.to_string(),
            clock_frequency: clock_hz,
            sample_rate,
            source_file,
            polarity: "normal".to_string(),
            waveform: "square".to_string(),
            audio_bits_per_sample: 8,
            audio_channels: 1,
            creation_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

fn append_member<W: Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(MEMBER_MODE);
    header.set_mtime(Utc::now().timestamp() as u64);
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

/// Writes the `.cpk` package for a processed tape next to `base_path` and
/// returns its path.
///
/// Blocks whose sample range escapes the PCM buffer are skipped (start out
/// of range) or truncated (end out of range) with a warning; both are
/// defensive conditions, never fatal.
pub fn write_package(
    pcm: &[u8],
    segments: &[Segment],
    base_path: &Path,
    sample_rate: u32,
    clock_hz: f64,
    target_system: &str,
) -> Result<PathBuf> {
    let out_path = base_path.with_extension("cpk");
    let file = File::create(&out_path)?;
    let encoder = GzEncoder::new(file, Compression::new(GZIP_LEVEL));
    let mut archive = tar::Builder::new(encoder);

    let manifest = PackageManifest::new(base_path, sample_rate, clock_hz, target_system);
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;
    append_member(&mut archive, "package_manifest.json", &manifest_json)?;

    let index = csv::render_block_index(segments, sample_rate as f64);

    let mut block_count = 0usize;
    for group in block_groups(segments, sample_rate as f64) {
        let name = group.wav_file_name(block_count);

        let start = group.start.start_sample;
        let end = group.end.end_sample + 1;
        if start < 0 || end <= start {
            warn!("invalid sample range for block {}: start={}, end={}; skipping",
                  name, start, group.end.end_sample);
            continue;
        }
        let start = start as usize;
        let mut end = end as usize;
        if start >= pcm.len() {
            warn!("block {} start sample {} out of bounds (pcm len {}); skipping",
                  name, start, pcm.len());
            continue;
        }
        if end > pcm.len() {
            warn!("block {} end sample {} out of bounds (pcm len {}); truncating",
                  name, end - 1, pcm.len());
            end = pcm.len();
        }
        let block_pcm = &pcm[start..end];
        if block_pcm.is_empty() {
            warn!("block {} produced zero samples; skipping", name);
            continue;
        }

        let mut buffer = Vec::with_capacity(44 + block_pcm.len());
        wav::write_wav(&mut buffer, block_pcm, sample_rate)?;
        append_member(&mut archive, &name, &buffer)?;
        block_count += 1;
    }

    append_member(&mut archive, "blocks.csv", index.as_bytes())?;

    // close in reverse order of opening; the first error wins, and the
    // encoders dropped on an earlier error path discard their own
    let encoder = archive.into_inner()?;
    encoder.finish()?;

    info!("created archive with {} blocks, manifest, and csv: {}",
          block_count, out_path.display());
    Ok(out_path)
}
