/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Folding adjacent segments into the logical blocks a playback front end
//! works with.
//!
//! A lead or data segment takes an immediately following pause with it; a
//! Turbotape data segment takes its trailer. Pauses that follow nothing
//! are consumed but never exported on their own. The grouping is the
//! single source of block numbering for both the CSV index and the
//! package writer.
pub mod csv;
pub mod package;

use crate::segment::{Segment, SegmentKind};

/// One logical export block: a span of one or two adjacent segments.
#[derive(Clone, Copy, Debug)]
pub struct BlockGroup<'a> {
    /// The label kind, taken from the leading segment.
    pub kind: SegmentKind,
    pub start: &'a Segment,
    /// The last segment of the block, inclusive.
    pub end: &'a Segment,
    /// End time in seconds, never earlier than the start segment's end.
    pub end_time: f64,
}

impl<'a> BlockGroup<'a> {
    /// The `block_NNN_<kind>.wav` member name for this block.
    pub fn wav_file_name(&self, index: usize) -> String {
        format!("block_{:03}_{}.wav", index, self.kind)
    }
}

// End time of a single segment from its inclusive sample range.
fn segment_end_time(segment: &Segment, sample_rate: f64) -> f64 {
    if sample_rate <= 0.0 || segment.end_sample < segment.start_sample {
        return segment.start_time;
    }
    let duration = (segment.end_sample - segment.start_sample + 1) as f64;
    segment.start_time + duration / sample_rate
}

// Examines the segments at `index`, returning the group found there (if
// exportable) and how many segments were consumed.
fn group_at<'a>(
    segments: &'a [Segment],
    index: usize,
    sample_rate: f64,
) -> (Option<BlockGroup<'a>>, usize) {
    let current = &segments[index];
    let next = segments.get(index + 1);

    let (end, consumed) = if current.kind.is_lead_family() {
        match next {
            Some(next) if next.kind == SegmentKind::Pause => (next, 2),
            _ => (current, 1)
        }
    }
    else if current.kind.is_data_family() {
        match next {
            Some(next) if next.kind == SegmentKind::Pause => (next, 2),
            Some(next) if next.kind.is_lead_family() => (current, 1),
            Some(next) if current.kind == SegmentKind::TtData
                       && next.kind == SegmentKind::TtTrailer => (next, 2),
            _ => (current, 1)
        }
    }
    else if current.kind == SegmentKind::TtTrailer {
        (current, 1)
    }
    else {
        // a pause nothing claimed; consume without exporting
        return (None, 1);
    };

    let end_time = segment_end_time(end, sample_rate)
        .max(segment_end_time(current, sample_rate));
    let group = BlockGroup { kind: current.kind, start: current, end, end_time };
    (Some(group), consumed)
}

/// Iterator over the logical export blocks of a segment list.
#[derive(Clone, Debug)]
pub struct BlockGroups<'a> {
    segments: &'a [Segment],
    sample_rate: f64,
    index: usize,
}

impl<'a> Iterator for BlockGroups<'a> {
    type Item = BlockGroup<'a>;

    fn next(&mut self) -> Option<BlockGroup<'a>> {
        while self.index < self.segments.len() {
            let (group, consumed) = group_at(self.segments, self.index, self.sample_rate);
            self.index += consumed;
            if group.is_some() {
                return group;
            }
        }
        None
    }
}

/// Groups `segments` into export blocks in producer order.
pub fn block_groups(segments: &[Segment], sample_rate: f64) -> BlockGroups<'_> {
    BlockGroups { segments, sample_rate, index: 0 }
}
