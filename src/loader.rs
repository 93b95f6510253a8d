/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Tape-loader format profiles and block recognition.
//!
//! Every historical loader encodes bits as pulse widths in its own way. A
//! [FormatProfile] captures one such encoding: ideal pulse widths, how bits
//! assemble into bytes and what the pilot tone preceding a block looks
//! like. The recognizers in [cbm] and [turbotape] match a contiguous prefix
//! of the pulse stream against a profile and report a [BlockMatch], or
//! nothing at all; a failed match is never an error.
pub mod cbm;
pub mod pulse;
pub mod turbotape;

/// Global pulse-width reading tolerance, in pulse units.
pub const DEFAULT_TOLERANCE: i32 = 16;
/// Pulses per byte for anything that is not CBM-encoded.
pub const PULSES_PER_BYTE: usize = 8;

/// The order in which bits assemble into a byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

/// The unit a pilot tone repeats: a single bit-valued pulse, or a whole
/// byte of eight pulses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PilotValue {
    Bit(u8),
    Byte(u8),
}

/// Immutable description of one tape-loader encoding.
///
/// Fields the format does not use are `None` (CBM has no threshold pulse
/// width, Turbotape no medium pulse). A `pilot_max` of `None` means the
/// pilot run is effectively unbounded.
#[derive(Clone, Copy, Debug)]
pub struct FormatProfile {
    pub name: &'static str,
    pub bit_order: BitOrder,
    /// Threshold pulse width; `None` selects the nearest-ideal method.
    pub threshold: Option<u8>,
    /// Ideal short pulse width.
    pub short: u8,
    /// Ideal medium pulse width, for three-width encodings.
    pub medium: Option<u8>,
    /// Ideal long pulse width.
    pub long: u8,
    pub pilot: Option<PilotValue>,
    pub sync: Option<u8>,
    /// Minimum count of pilot units that must be present.
    pub pilot_min: u32,
    pub pilot_max: Option<u32>,
    pub has_checksum: bool,
}

/// C64 ROM loader, header block.
pub const CBM_HEAD: FormatProfile = FormatProfile {
    name: "C64 ROM-TAPE HEADER",
    bit_order: BitOrder::LsbFirst,
    threshold: None,
    short: 0x30,
    medium: Some(0x42),
    long: 0x56,
    pilot: None,
    sync: None,
    pilot_min: 50,
    pilot_max: None,
    has_checksum: true,
};

/// C64 ROM loader, data block.
pub const CBM_DATA: FormatProfile = FormatProfile {
    name: "C64 ROM-TAPE DATA",
    bit_order: BitOrder::LsbFirst,
    threshold: None,
    short: 0x30,
    medium: Some(0x42),
    long: 0x56,
    pilot: None,
    sync: None,
    pilot_min: 50,
    pilot_max: None,
    has_checksum: true,
};

/// Turbotape-250, header block.
pub const TT_HEAD: FormatProfile = FormatProfile {
    name: "TURBOTAPE-250 HEADER",
    bit_order: BitOrder::MsbFirst,
    threshold: Some(0x20),
    short: 0x1A,
    medium: None,
    long: 0x28,
    pilot: Some(PilotValue::Byte(0x02)),
    sync: Some(0x09),
    pilot_min: 50,
    pilot_max: None,
    has_checksum: false,
};

/// Turbotape-250, data block.
pub const TT_DATA: FormatProfile = FormatProfile {
    name: "TURBOTAPE-250 DATA",
    bit_order: BitOrder::MsbFirst,
    threshold: Some(0x20),
    short: 0x1A,
    medium: None,
    long: 0x28,
    pilot: Some(PilotValue::Byte(0x02)),
    sync: Some(0x09),
    pilot_min: 50,
    pilot_max: None,
    has_checksum: true,
};

/// A successful match of a loader block at some stream position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMatch {
    /// Bytes consumed from the match position.
    pub length: usize,
    /// Format-specific block identifier: the CBM file type or the
    /// Turbotape block-id byte.
    pub block_id: u8,
    /// Data payload size promised by the block's header, in bytes. Zero
    /// when the block carries no such promise.
    pub payload_size: usize,
    /// Absolute position immediately after the pilot tone.
    pub pilot_end: usize,
}
