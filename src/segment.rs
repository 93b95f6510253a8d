/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Segmentation: walking the pulse stream into typed, audio-aligned
//! segments.
//!
//! The [Segmenter] advances a byte cursor over the TAP payload and a sample
//! cursor over the PCM it synthesizes on the way, so that every [Segment]
//! covers an exact byte range of the file and an exact sample range of the
//! audio. Recognizers are tried in the order Turbotape head, CBM head, CBM
//! data; anything they reject degrades to a generic lead or data run.
//!
//! A recognized Turbotape head arms the state machine: the next dispatch
//! consumes the promised data span, the one after that the fixed-length
//! trailer.
use core::fmt;
use core::ops::Range;

use log::warn;

use crate::audio;
use crate::loader::cbm::CbmReader;
use crate::loader::{turbotape, CBM_DATA, CBM_HEAD};
use crate::tap::{TapImage, TapVersion, HEADER_SIZE};
use crate::{Error, Result};

/// Minimum run of identical bytes for a generic lead tone.
pub const MIN_LEAD_RUN: usize = 25_000;
/// Fraction of the examined window that must hold the lead value.
pub const LEAD_CONSISTENCY: f64 = 0.9;
/// Fixed length of a Turbotape trailer, in pulse bytes.
pub const TT_TRAILER_PULSES: usize = 7_648;

const V0_PAUSE_CYCLES: u32 = 20_000;

/// Kind of a recognized region of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Pause,
    Lead,
    Data,
    CbmHead,
    CbmData,
    TtHead,
    TtData,
    TtTrailer,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Pause => "pause",
            SegmentKind::Lead => "lead",
            SegmentKind::Data => "data",
            SegmentKind::CbmHead => "cbm_head",
            SegmentKind::CbmData => "cbm_data",
            SegmentKind::TtHead => "tt_head",
            SegmentKind::TtData => "tt_data",
            SegmentKind::TtTrailer => "tt_trailer",
        }
    }

    /// Lead tones and loader headers.
    pub fn is_lead_family(self) -> bool {
        matches!(self, SegmentKind::Lead | SegmentKind::CbmHead | SegmentKind::TtHead)
    }

    /// Payload-carrying segments.
    pub fn is_data_family(self) -> bool {
        matches!(self, SegmentKind::Data | SegmentKind::CbmData | SegmentKind::TtData)
    }

    /// Whether segments of this kind are preceded by a pilot tone.
    pub fn has_pilot(self) -> bool {
        matches!(self, SegmentKind::CbmHead | SegmentKind::CbmData | SegmentKind::TtHead)
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognized region of the stream, aligned to both the TAP file and
/// the reconstructed PCM.
///
/// Sample indices are inclusive; a segment that produced no audio has
/// `end_sample == start_sample - 1`. Byte positions are absolute file
/// offsets, the 20-byte header included.
#[derive(Clone, Debug)]
pub struct Segment {
    pub start_sample: i64,
    pub end_sample: i64,
    pub kind: SegmentKind,
    /// `start_sample / sample_rate`, in seconds.
    pub start_time: f64,
    pub start_position: usize,
    pub end_position: usize,
    /// Human-readable label; filled in by the header reader or IDX merge.
    pub tag: String,
    /// Byte-index span of the pulse bytes backing this segment.
    pub raw: Range<usize>,
    /// Format-specific block identifier, or 0.
    pub block_id: u8,
    /// Position immediately after the pilot tone, 0 when not applicable.
    pub pilot_end_position: usize,
}

impl Segment {
    /// The pulse bytes backing this segment.
    pub fn raw_bytes<'a>(&self, tap: &'a [u8]) -> &'a [u8] {
        &tap[self.raw.start..self.raw.end]
    }
}

// The segmenter's lookahead expectation between dispatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SegmenterState {
    ReadyForDispatch,
    AwaitingTtData(usize),
    AwaitingTtTrailer(usize),
}

/// Walks a TAP image, emitting segments and synthesizing their PCM.
pub struct Segmenter<'a> {
    tap: &'a [u8],
    version: TapVersion,
    clock_hz: f64,
    sample_rate: f64,
    pos: usize,
    sample: i64,
    state: SegmenterState,
    pcm: Vec<u8>,
}

impl<'a> Segmenter<'a> {
    pub fn new(image: &'a TapImage, clock_hz: f64, sample_rate: u32) -> Self {
        Segmenter {
            tap: image.bytes(),
            version: image.version(),
            clock_hz,
            sample_rate: sample_rate as f64,
            pos: HEADER_SIZE,
            sample: 0,
            state: SegmenterState::ReadyForDispatch,
            pcm: Vec::new(),
        }
    }

    /// The PCM synthesized so far. Owned by the segmenter until [Segmenter::finish].
    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    pub fn finish(self) -> Vec<u8> {
        self.pcm
    }

    /// Produces the next segment, or `None` at the end of the payload.
    ///
    /// A dispatch that consumes no bytes would never terminate; it aborts
    /// the walk with a warning instead.
    pub fn next_segment(&mut self) -> Result<Option<Segment>> {
        if self.pos >= self.tap.len() {
            return Ok(None);
        }
        let start_position = self.pos;
        let start_sample = self.sample;

        let (kind, consumed, block_id, pilot_end) = match self.state {
            SegmenterState::AwaitingTtData(payload_size) => {
                let span = self.consume_pulse_run(payload_size * 8);
                self.state = SegmenterState::AwaitingTtTrailer(TT_TRAILER_PULSES);
                (SegmentKind::TtData, span, 0, 0)
            }
            SegmenterState::AwaitingTtTrailer(trailer_size) => {
                let span = self.consume_pulse_run(trailer_size);
                self.state = SegmenterState::ReadyForDispatch;
                (SegmentKind::TtTrailer, span, 0, 0)
            }
            SegmenterState::ReadyForDispatch => {
                if self.tap[self.pos] == 0 {
                    let consumed = self.consume_pause()?;
                    (SegmentKind::Pause, consumed, 0, 0)
                }
                else {
                    self.dispatch_block()
                }
            }
        };

        if consumed == 0 {
            warn!("block processing at offset {} consumed no bytes, stopping", start_position);
            return Ok(None);
        }
        self.pos = start_position + consumed;

        Ok(Some(Segment {
            start_sample,
            end_sample: self.sample - 1,
            kind,
            start_time: start_sample as f64 / self.sample_rate,
            start_position,
            end_position: start_position + consumed - 1,
            tag: String::new(),
            raw: start_position..start_position + consumed,
            block_id,
            pilot_end_position: pilot_end,
        }))
    }

    // Recognizers in order, then the generic lead/data fallback.
    fn dispatch_block(&mut self) -> (SegmentKind, usize, u8, usize) {
        if let Some(m) = turbotape::recognize_head(self.tap, self.pos) {
            self.synthesize_span(self.pos, m.length);
            if m.payload_size > 0 {
                self.state = SegmenterState::AwaitingTtData(m.payload_size);
            }
            return (SegmentKind::TtHead, m.length, m.block_id, m.pilot_end);
        }
        let head_reader = CbmReader::new(self.tap, &CBM_HEAD);
        if let Some(m) = head_reader.recognize_head(self.pos) {
            self.synthesize_span(self.pos, m.length);
            return (SegmentKind::CbmHead, m.length, m.block_id, m.pilot_end);
        }
        let data_reader = CbmReader::new(self.tap, &CBM_DATA);
        if let Some(m) = data_reader.recognize_data(self.pos) {
            self.synthesize_span(self.pos, m.length);
            return (SegmentKind::CbmData, m.length, m.block_id, m.pilot_end);
        }

        let kind = if self.is_lead_tone(self.pos) {
            SegmentKind::Lead
        }
        else {
            SegmentKind::Data
        };
        let mut end = self.pos;
        while end < self.tap.len() && self.tap[end] != 0 {
            end += 1;
        }
        let length = end - self.pos;
        self.synthesize_span(self.pos, length);
        (kind, length, 0, 0)
    }

    // Consumes up to `pulses` bytes for an armed Turbotape span, clamped to
    // the end of the payload.
    fn consume_pulse_run(&mut self, pulses: usize) -> usize {
        let remaining = self.tap.len() - self.pos;
        let span = pulses.min(remaining);
        if span < pulses {
            warn!("turbotape span at offset {} truncated: {} of {} pulse bytes",
                  self.pos, span, pulses);
        }
        self.synthesize_span(self.pos, span);
        span
    }

    // Square waves for every pulse byte in `[start, start + length)`; a
    // zero byte inside a recognized span contributes no samples.
    fn synthesize_span(&mut self, start: usize, length: usize) {
        for &pulse in &self.tap[start..start + length] {
            if pulse == 0 {
                continue;
            }
            let cycles = pulse as u32 * audio::CYCLES_PER_PULSE_UNIT;
            let samples = audio::cycles_to_samples(cycles, self.clock_hz, self.sample_rate);
            audio::push_pulse(&mut self.pcm, samples);
            self.sample += samples as i64;
        }
    }

    // A zero pulse byte: pause of a version-dependent duration.
    fn consume_pause(&mut self) -> Result<usize> {
        let (cycles, consumed) = if self.pos + 4 > self.tap.len() {
            match self.version {
                // v0 tolerates missing reserved bytes at the very end
                TapVersion::V0 => (V0_PAUSE_CYCLES, 1),
                TapVersion::V1 => return Err(Error::TruncatedPause { offset: self.pos }),
            }
        }
        else {
            match self.version {
                TapVersion::V0 => (V0_PAUSE_CYCLES, 4),
                TapVersion::V1 => {
                    let cycles = self.tap[self.pos + 1] as u32
                               | (self.tap[self.pos + 2] as u32) << 8
                               | (self.tap[self.pos + 3] as u32) << 16;
                    (cycles, 4)
                }
            }
        };
        let samples = audio::cycles_to_samples(cycles, self.clock_hz, self.sample_rate);
        audio::push_pause(&mut self.pcm, samples);
        self.sample += samples as i64;
        Ok(consumed)
    }

    // A generic lead tone is a long enough, consistent enough run of one
    // non-zero byte value.
    fn is_lead_tone(&self, start: usize) -> bool {
        if start + MIN_LEAD_RUN > self.tap.len() {
            return false;
        }
        let candidate = self.tap[start];
        if candidate == 0 {
            return false;
        }
        let window = (self.tap.len() - start).min(MIN_LEAD_RUN);
        let mut same = 0usize;
        for &value in &self.tap[start..start + window] {
            if value != candidate {
                break;
            }
            same += 1;
        }
        same > 0 && same as f64 / window as f64 >= LEAD_CONSISTENCY
    }
}

/// Runs the segmenter over the whole image, returning the PCM and the
/// segment index.
pub fn segment_tape(
    image: &TapImage,
    clock_hz: f64,
    sample_rate: u32,
) -> Result<(Vec<u8>, Vec<Segment>)> {
    let mut segmenter = Segmenter::new(image, clock_hz, sample_rate);
    let mut segments = Vec::with_capacity(512);
    while let Some(segment) = segmenter.next_segment()? {
        segments.push(segment);
    }
    Ok((segmenter.finish(), segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{NTSC_CLOCK_HZ, PAL_CLOCK_HZ};
    use crate::tap::TapImage;

    fn tap_image(version: u8, payload: &[u8]) -> TapImage {
        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
        data.extend_from_slice(b"C64-TAPE-RAW");
        data.push(version);
        data.extend_from_slice(&[0; 3]);
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(payload);
        TapImage::parse(data, "test").unwrap()
    }

    fn assert_invariants(image: &TapImage, pcm: &[u8], segments: &[Segment]) {
        let bytes: usize = segments.iter()
            .map(|s| s.end_position - s.start_position + 1)
            .sum();
        assert_eq!(image.payload_len(), bytes);
        let samples: i64 = segments.iter()
            .map(|s| s.end_sample - s.start_sample + 1)
            .sum();
        assert_eq!(pcm.len() as i64, samples);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_position + 1, pair[1].start_position);
            assert_eq!(pair[0].end_sample + 1, pair[1].start_sample);
        }
    }

    #[test]
    fn single_pause_v1() {
        let image = tap_image(1, &[0x00, 0x10, 0x00, 0x00]);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert!(pcm.is_empty());
        assert_eq!(1, segments.len());
        let s = &segments[0];
        assert_eq!(SegmentKind::Pause, s.kind);
        assert_eq!(20, s.start_position);
        assert_eq!(23, s.end_position);
        assert_eq!(0, s.start_sample);
        assert_eq!(-1, s.end_sample);
        assert_invariants(&image, &pcm, &segments);
    }

    #[test]
    fn pause_v1_duration_field_decodes_exactly() {
        // 24-bit little-endian duration, byte for byte
        let image = tap_image(1, &[0x00, 0x40, 0x42, 0x0F]); // 1,000,000 cycles
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(1, segments.len());
        assert_eq!(audio::cycles_to_samples(1_000_000, PAL_CLOCK_HZ, 44_100.0), pcm.len());
    }

    #[test]
    fn pause_v1_truncated_is_fatal() {
        let image = tap_image(1, &[0x00, 0x10]);
        match segment_tape(&image, PAL_CLOCK_HZ, 44_100) {
            Err(Error::TruncatedPause { offset: 20 }) => {}
            other => panic!("unexpected: {:?}", other.map(|_| ()))
        }
    }

    #[test]
    fn pause_v0_ignores_duration_bytes() {
        let image = tap_image(0, &[0x00, 0xFF, 0xFF, 0xFF]);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(1, segments.len());
        assert_eq!(SegmentKind::Pause, segments[0].kind);
        assert_eq!(23, segments[0].end_position);
        // fixed 20,000 cycles
        assert_eq!(895, pcm.len());
    }

    #[test]
    fn pause_v0_truncated_consumes_lone_byte() {
        let image = tap_image(0, &[0x00]);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(1, segments.len());
        assert_eq!(20, segments[0].end_position);
        assert_eq!(895, pcm.len());
    }

    #[test]
    fn single_short_pulse() {
        let image = tap_image(1, &[0x20]);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(1, segments.len());
        let s = &segments[0];
        assert_eq!(SegmentKind::Data, s.kind);
        assert_eq!(0, s.start_sample);
        assert_eq!(10, s.end_sample);
        assert_eq!(11, pcm.len());
        assert_eq!(&[255u8, 255, 255, 255, 255, 255, 1, 1, 1, 1, 1], &pcm[..]);
        assert_invariants(&image, &pcm, &segments);
    }

    #[test]
    fn generic_lead_run() {
        let image = tap_image(1, &vec![0x30; MIN_LEAD_RUN]);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(1, segments.len());
        let s = &segments[0];
        assert_eq!(SegmentKind::Lead, s.kind);
        assert_eq!(20, s.start_position);
        assert_eq!(20 + MIN_LEAD_RUN - 1, s.end_position);
        let per_pulse = audio::cycles_to_samples(0x30 * 8, PAL_CLOCK_HZ, 44_100.0);
        assert_eq!(MIN_LEAD_RUN * per_pulse, pcm.len());
        assert_invariants(&image, &pcm, &segments);
    }

    #[test]
    fn short_run_is_data() {
        let image = tap_image(1, &[0x30; 100]);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(1, segments.len());
        assert_eq!(SegmentKind::Data, segments[0].kind);
        assert_invariants(&image, &pcm, &segments);
    }

    fn tt_byte(pulses: &mut Vec<u8>, value: u8) {
        for i in 0..8 {
            pulses.push(if value & (0x80 >> i) != 0 { 0x28 } else { 0x1A });
        }
    }

    #[test]
    fn turbotape_triplet() {
        let mut payload = Vec::new();
        for _ in 0..60 {
            tt_byte(&mut payload, 0x02);
        }
        for value in turbotape::COUNTDOWN {
            tt_byte(&mut payload, value);
        }
        tt_byte(&mut payload, 0x01); // header block id
        for value in [0x00, 0x10, 0x00, 0x20] {
            tt_byte(&mut payload, value); // $1000..$2000 -> 0x1001 bytes
        }
        for &value in b"CHIRP THE TAP   " {
            tt_byte(&mut payload, value);
        }
        tt_byte(&mut payload, 0x20); // padding
        tt_byte(&mut payload, 0x55); // checksum
        let head_len = payload.len();
        payload.extend(std::iter::repeat(0x1A).take(0x1001 * 8));
        payload.extend(std::iter::repeat(0x28).take(TT_TRAILER_PULSES));
        payload.push(0x00);
        payload.extend_from_slice(&[0x40, 0x42, 0x0F]); // 1,000,000 cycles

        let image = tap_image(1, &payload);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(4, segments.len());

        let head = &segments[0];
        assert_eq!(SegmentKind::TtHead, head.kind);
        assert_eq!(1, head.block_id);
        assert_eq!(20 + head_len - 1, head.end_position);
        assert_eq!(20 + 60 * 8, head.pilot_end_position);

        let data = &segments[1];
        assert_eq!(SegmentKind::TtData, data.kind);
        assert_eq!(0x1001 * 8, data.end_position - data.start_position + 1);

        let trailer = &segments[2];
        assert_eq!(SegmentKind::TtTrailer, trailer.kind);
        assert_eq!(TT_TRAILER_PULSES, trailer.end_position - trailer.start_position + 1);

        assert_eq!(SegmentKind::Pause, segments[3].kind);
        assert_invariants(&image, &pcm, &segments);
    }

    #[test]
    fn turbotape_data_clamped_at_stream_end() {
        let mut payload = Vec::new();
        for _ in 0..60 {
            tt_byte(&mut payload, 0x02);
        }
        for value in turbotape::COUNTDOWN {
            tt_byte(&mut payload, value);
        }
        tt_byte(&mut payload, 0x01);
        for value in [0x00, 0x10, 0x00, 0x20] {
            tt_byte(&mut payload, value);
        }
        for _ in 0..17 {
            tt_byte(&mut payload, 0x41); // filename and checksum
        }
        payload.extend(std::iter::repeat(0x1A).take(100)); // far short of the promise

        let image = tap_image(1, &payload);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(2, segments.len());
        assert_eq!(SegmentKind::TtHead, segments[0].kind);
        assert_eq!(SegmentKind::TtData, segments[1].kind);
        assert_eq!(100, segments[1].end_position - segments[1].start_position + 1);
        assert_invariants(&image, &pcm, &segments);
    }

    #[test]
    fn ntsc_lead_and_pause() {
        let mut payload = vec![0x42u8; 50_000];
        payload.push(0x00);
        payload.extend_from_slice(&[0x40, 0x42, 0x0F]); // 1,000,000 cycles

        let image = tap_image(1, &payload);
        let (pcm, segments) = segment_tape(&image, NTSC_CLOCK_HZ, 44_100).unwrap();
        assert_eq!(2, segments.len());
        assert_eq!(SegmentKind::Lead, segments[0].kind);
        assert_eq!(SegmentKind::Pause, segments[1].kind);
        let per_pulse = audio::cycles_to_samples(0x42 * 8, NTSC_CLOCK_HZ, 44_100.0);
        assert_eq!(50_000 * per_pulse + 43_121, pcm.len());
        assert_invariants(&image, &pcm, &segments);
    }

    #[test]
    fn mixed_runs_and_pauses_cover_payload() {
        let mut payload = vec![0x25u8; 300];
        payload.extend_from_slice(&[0x00, 0x10, 0x27, 0x00]);
        payload.extend(vec![0x51u8; 200]);
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);

        let image = tap_image(1, &payload);
        let (pcm, segments) = segment_tape(&image, PAL_CLOCK_HZ, 44_100).unwrap();
        let kinds: Vec<_> = segments.iter().map(|s| s.kind).collect();
        assert_eq!(vec![SegmentKind::Data, SegmentKind::Pause,
                        SegmentKind::Data, SegmentKind::Pause], kinds);
        assert_invariants(&image, &pcm, &segments);
    }
}
