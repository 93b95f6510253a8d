/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! IDX sidecar files and the proximity merge.
//!
//! An `.idx` file maps hexadecimal byte offsets in the TAP to block names,
//! as used by emulators and hardware loaders for quick program access on
//! multi-load tapes. Offsets rarely line up exactly with detected segment
//! boundaries, so entries are matched to segments by proximity within a
//! fixed window.
use core::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::segment::{Segment, SegmentKind};
use crate::{Error, Result};

/// Matching tolerance between an IDX offset and a segment start, in bytes.
pub const MATCH_WINDOW: usize = 1_500;

/// One parsed line of an `.idx` file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdxEntry {
    /// Byte offset within the associated TAP file.
    pub position: usize,
    pub name: String,
}

/// Parses IDX text: one `HEX_POSITION NAME` entry per line, `;` comments
/// and empty lines skipped. Any malformed line fails the whole parse.
pub fn parse_idx(text: &str) -> Result<Vec<IdxEntry>> {
    let mut entries = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let number = index + 1;
        let (position, name) = line.split_once(' ').ok_or_else(|| Error::IdxParse {
            line: number,
            reason: format!("invalid idx line format: {}", line),
        })?;
        let digits = position.strip_prefix("0x").unwrap_or(position);
        let position = u32::from_str_radix(digits, 16).map_err(|err| Error::IdxParse {
            line: number,
            reason: format!("invalid hex position '{}': {}", position, err),
        })?;
        entries.push(IdxEntry {
            position: position as usize,
            name: name.trim().to_string(),
        });
    }
    Ok(entries)
}

/// Reads and parses an `.idx` file.
pub fn read_idx(path: &Path) -> Result<Vec<IdxEntry>> {
    parse_idx(&fs::read_to_string(path)?)
}

// Segment kinds an IDX entry may attach to.
fn taggable(kind: SegmentKind) -> bool {
    matches!(kind, SegmentKind::Lead | SegmentKind::Data
                 | SegmentKind::CbmHead | SegmentKind::TtHead)
}

/// Assigns IDX names to the segments they sit nearest to.
///
/// Both lists are sorted by position; for every entry the taggable segment
/// overlapping the window around the entry's offset with the smallest
/// distance to its start receives the name. Unmatched entries are dropped
/// silently. Segments end up re-sorted in canonical order.
pub fn merge_idx_tags(segments: &mut Vec<Segment>, entries: &mut Vec<IdxEntry>) {
    if segments.is_empty() || entries.is_empty() {
        return;
    }
    segments.sort_by_key(|segment| segment.start_position);
    entries.sort_by_key(|entry| entry.position);

    let mut k = 0usize;
    for entry in entries.iter() {
        let target = entry.position;
        let min_pos = target.saturating_sub(MATCH_WINDOW);
        let max_pos = target + MATCH_WINDOW;

        while k < segments.len() && segments[k].end_position < min_pos {
            k += 1;
        }

        let mut best: Option<(usize, usize)> = None;
        for (index, segment) in segments.iter().enumerate().skip(k) {
            if segment.start_position > max_pos {
                break;
            }
            if !taggable(segment.kind) || segment.end_position < min_pos {
                continue;
            }
            let distance = target.abs_diff(segment.start_position);
            if distance <= MATCH_WINDOW {
                match best {
                    Some((_, nearest)) if nearest <= distance => {}
                    _ => best = Some((index, distance))
                }
            }
        }
        if let Some((index, _)) = best {
            segments[index].tag = entry.name.clone();
        }
    }

    segments.sort_by(|a, b| {
        a.start_position.cmp(&b.start_position)
            .then(a.end_position.cmp(&b.end_position))
            .then(a.start_time.partial_cmp(&b.start_time).unwrap_or(Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_comments_and_blanks() {
        let text = "; tape index\n\n0x14 FIRST GAME\n  1f40 SECOND GAME  \n";
        let entries = parse_idx(text).unwrap();
        assert_eq!(2, entries.len());
        assert_eq!(IdxEntry { position: 0x14, name: "FIRST GAME".to_string() }, entries[0]);
        assert_eq!(IdxEntry { position: 0x1F40, name: "SECOND GAME".to_string() }, entries[1]);
    }

    #[test]
    fn malformed_line_is_fatal() {
        match parse_idx("0x14 OK\nBOGUS\n") {
            Err(Error::IdxParse { line: 2, .. }) => {}
            other => panic!("unexpected: {:?}", other.map(|_| ()))
        }
        match parse_idx("zz40 NAME\n") {
            Err(Error::IdxParse { line: 1, .. }) => {}
            other => panic!("unexpected: {:?}", other.map(|_| ()))
        }
    }

    fn segment(kind: SegmentKind, start: usize, end: usize) -> Segment {
        Segment {
            start_sample: 0,
            end_sample: -1,
            kind,
            start_time: 0.0,
            start_position: start,
            end_position: end,
            tag: String::new(),
            raw: start..end + 1,
            block_id: 0,
            pilot_end_position: 0,
        }
    }

    #[test]
    fn near_miss_attaches_to_nearest_start() {
        let mut segments = vec![
            segment(SegmentKind::Lead, 20, 1020),
            segment(SegmentKind::Data, 1021, 3021),
        ];
        let mut entries = vec![IdxEntry { position: 2000, name: "X".to_string() }];
        merge_idx_tags(&mut segments, &mut entries);
        assert_eq!("", segments[0].tag);
        assert_eq!("X", segments[1].tag);
    }

    #[test]
    fn pause_segments_are_never_tagged() {
        let mut segments = vec![
            segment(SegmentKind::Pause, 20, 1020),
            segment(SegmentKind::Data, 1021, 3021),
        ];
        let mut entries = vec![IdxEntry { position: 100, name: "X".to_string() }];
        merge_idx_tags(&mut segments, &mut entries);
        assert_eq!("", segments[0].tag);
        assert_eq!("X", segments[1].tag);
    }

    #[test]
    fn out_of_window_entry_is_dropped() {
        let mut segments = vec![segment(SegmentKind::Data, 20, 100)];
        let mut entries = vec![IdxEntry { position: 5000, name: "FAR".to_string() }];
        merge_idx_tags(&mut segments, &mut entries);
        assert_eq!("", segments[0].tag);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut segments = vec![
            segment(SegmentKind::Lead, 20, 1020),
            segment(SegmentKind::Data, 1021, 3021),
            segment(SegmentKind::Data, 3022, 9000),
        ];
        let mut entries = vec![
            IdxEntry { position: 30, name: "A".to_string() },
            IdxEntry { position: 3100, name: "B".to_string() },
        ];
        merge_idx_tags(&mut segments, &mut entries);
        let first: Vec<_> = segments.iter().map(|s| s.tag.clone()).collect();
        merge_idx_tags(&mut segments, &mut entries);
        let second: Vec<_> = segments.iter().map(|s| s.tag.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(vec!["A", "", "B"], first);
    }
}
