/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Rendering the block index table.
//!
//! One row per exported block, tab-separated with `|` visual separators:
//! start time, end time, block kind, IDX tag, the hexadecimal start offset
//! in the TAP file, and the block's WAV member name.
use core::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::segment::Segment;
use crate::Result;

use super::block_groups;

// Tags end up inside a tab/pipe table; keep them from breaking it.
fn sanitize_tag(tag: &str) -> String {
    tag.replace(&['\t', '\n', '|'][..], " ")
}

/// Renders the block index for `segments` as CSV text.
pub fn render_block_index(segments: &[Segment], sample_rate: f64) -> String {
    let mut out = String::new();
    out.push_str("start_time\t|\tend_time\t|\tblock\t|\tidx_tag\t|\thex_start_time\t|\tfile\t\n");
    for (count, group) in block_groups(segments, sample_rate).enumerate() {
        let _ = writeln!(
            out,
            "{:.6}\t|\t{:.6}\t|\t{}\t|\t{}\t|\t0x{:08x}\t|\t{}\t",
            group.start.start_time,
            group.end_time,
            group.kind,
            sanitize_tag(&group.start.tag),
            group.start.start_position,
            group.wav_file_name(count),
        );
    }
    out
}

/// Renders the block index and writes it to `path`.
pub fn write_block_index(path: &Path, segments: &[Segment], sample_rate: f64) -> Result<()> {
    fs::write(path, render_block_index(segments, sample_rate))?;
    Ok(())
}
