/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! PCM reconstruction: clock standards, the cycle-to-sample law and
//! square-wave synthesis.
//!
//! Audio is 8-bit unsigned mono. Every pulse becomes a full-amplitude
//! square wave; pauses become the same high/low rail pattern instead of
//! true silence, because the abrupt transitions in and out of the 128
//! midline are known to break edge-detecting loaders on real titles.
use core::fmt;

pub mod wav;

/// PAL C64 CPU clock in Hz.
pub const PAL_CLOCK_HZ: f64 = 985_248.0;
/// NTSC C64 CPU clock in Hz.
pub const NTSC_CLOCK_HZ: f64 = 1_022_727.0;
/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// CPU cycles represented by one unit of a TAP pulse-width byte.
pub const CYCLES_PER_PULSE_UNIT: u32 = 8;

const DC_OFFSET: i32 = 128;
const AMPLITUDE: i32 = 127;
/// High rail of the square wave.
pub const WAVE_HIGH: u8 = (DC_OFFSET + AMPLITUDE) as u8;
/// Low rail of the square wave.
pub const WAVE_LOW: u8 = (DC_OFFSET - AMPLITUDE) as u8;

/// The CPU clock standard the tape was mastered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockStandard {
    Pal,
    Ntsc,
}

impl ClockStandard {
    #[inline]
    pub fn hz(self) -> f64 {
        match self {
            ClockStandard::Pal => PAL_CLOCK_HZ,
            ClockStandard::Ntsc => NTSC_CLOCK_HZ,
        }
    }
}

impl fmt::Display for ClockStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockStandard::Pal => f.write_str("PAL"),
            ClockStandard::Ntsc => f.write_str("NTSC"),
        }
    }
}

/// Names the standard a clock frequency belongs to: `"PAL"`, `"NTSC"` or
/// `"Unknown"` for anything else.
pub fn standard_name(clock_hz: f64) -> &'static str {
    if clock_hz == PAL_CLOCK_HZ {
        "PAL"
    }
    else if clock_hz == NTSC_CLOCK_HZ {
        "NTSC"
    }
    else {
        "Unknown"
    }
}

/// Number of samples covering `cycles` CPU cycles, rounded down so the
/// audio never outlasts the original duration.
#[inline]
pub fn cycles_to_samples(cycles: u32, clock_hz: f64, sample_rate: f64) -> usize {
    (cycles as f64 * sample_rate / clock_hz).floor() as usize
}

// One symmetric square period: high rail first, low rail after. An odd
// sample count puts the extra sample on the high side.
fn push_square(pcm: &mut Vec<u8>, samples: usize, high: u8, low: u8) {
    let head = samples - samples / 2;
    for i in 0..samples {
        pcm.push(if i < head { high } else { low });
    }
}

/// Appends a full-amplitude square wave for one tape pulse.
#[inline]
pub fn push_pulse(pcm: &mut Vec<u8>, samples: usize) {
    push_square(pcm, samples, WAVE_HIGH, WAVE_LOW);
}

/// Appends the quiet-but-not-silent waveform standing in for a pause.
#[inline]
pub fn push_pause(pcm: &mut Vec<u8>, samples: usize) {
    push_square(pcm, samples, WAVE_HIGH, WAVE_LOW);
}
