/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Reading bits, bytes and pilot runs out of the raw pulse stream.
use crate::tap::HEADER_SIZE;

use super::{BitOrder, FormatProfile, PilotValue, DEFAULT_TOLERANCE, PULSES_PER_BYTE};

/// Upper bound substituted for an unbounded pilot run.
const PILOT_RUN_LIMIT: u32 = 200_000;

/// Why a pulse could not be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PulseError {
    /// The requested position is outside the stream.
    OutOfBounds,
    /// The pulse is shorter than the profile's short pulse minus tolerance.
    TooShort,
    /// The pulse is longer than the profile's long pulse plus tolerance.
    TooLong,
    /// The pulse cannot be classified under the profile.
    Unreadable,
}

pub type PulseResult<T> = Result<T, PulseError>;

/// Result of a pilot-tone scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PilotScan {
    /// Absolute position immediately after the last pilot unit.
    pub end: usize,
    /// `true` when the matched count lies within the profile's bounds.
    pub legal: bool,
}

/// Reads bits and bytes from a pulse stream under a [FormatProfile].
///
/// Positions are absolute offsets into the TAP image, header included, as
/// everywhere else in this crate.
#[derive(Clone, Copy, Debug)]
pub struct PulseReader<'a> {
    data: &'a [u8],
    profile: &'a FormatProfile,
    tolerance: i32,
}

impl<'a> PulseReader<'a> {
    pub fn new(data: &'a [u8], profile: &'a FormatProfile) -> Self {
        PulseReader { data, profile, tolerance: DEFAULT_TOLERANCE }
    }

    pub fn with_tolerance(data: &'a [u8], profile: &'a FormatProfile, tolerance: i32) -> Self {
        PulseReader { data, profile, tolerance }
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Reads the pulse at `pos` as a single bit.
    ///
    /// Pulses outside `[short - tolerance, long + tolerance]` are rejected.
    /// With a threshold width configured the bit is 0 below the threshold
    /// and 1 above; otherwise whichever ideal width is nearer wins.
    pub fn read_bit(&self, pos: usize) -> PulseResult<u8> {
        let p = *self.data.get(pos).ok_or(PulseError::OutOfBounds)? as i32;
        let sp = self.profile.short as i32;
        let lp = self.profile.long as i32;
        if p < sp - self.tolerance {
            return Err(PulseError::TooShort);
        }
        if p > lp + self.tolerance {
            return Err(PulseError::TooLong);
        }
        Ok(match self.profile.threshold {
            Some(tp) => (p >= tp as i32) as u8,
            None => ((p - sp).abs() >= (p - lp).abs()) as u8,
        })
    }

    /// Reads eight consecutive pulses as a byte, assembling bits in the
    /// profile's bit order. Fails if any bit read fails.
    pub fn read_byte(&self, pos: usize) -> PulseResult<u8> {
        if pos + PULSES_PER_BYTE > self.data.len() {
            return Err(PulseError::OutOfBounds);
        }
        let mut byte = 0u8;
        for i in 0..PULSES_PER_BYTE {
            let bit = self.read_bit(pos + i)?;
            byte |= match self.profile.bit_order {
                BitOrder::MsbFirst => bit << (7 - i),
                BitOrder::LsbFirst => bit << i,
            };
        }
        Ok(byte)
    }

    /// Scans from `pos` consuming matching pilot units.
    ///
    /// A bit-valued pilot consumes one pulse per unit, a byte-valued pilot
    /// eight. Returns `None` when the profile has no pilot or no pilot unit
    /// matches at `pos`; otherwise the end of the run and whether its
    /// length is legal.
    pub fn find_pilot(&self, pos: usize) -> Option<PilotScan> {
        if pos < HEADER_SIZE {
            return None;
        }
        let (count, end) = match self.profile.pilot? {
            PilotValue::Bit(pv) => self.scan_units(pos, pv, 1, Self::read_bit)?,
            PilotValue::Byte(pv) => self.scan_units(pos, pv, PULSES_PER_BYTE, Self::read_byte)?,
        };
        let max = self.profile.pilot_max.unwrap_or(PILOT_RUN_LIMIT);
        Some(PilotScan { end, legal: count >= self.profile.pilot_min && count <= max })
    }

    fn scan_units(
        &self,
        pos: usize,
        value: u8,
        step: usize,
        read: fn(&Self, usize) -> PulseResult<u8>,
    ) -> Option<(u32, usize)> {
        if read(self, pos).ok()? != value {
            return None;
        }
        let mut count = 0u32;
        let mut cur = pos;
        while cur < self.data.len() {
            match read(self, cur) {
                Ok(unit) if unit == value => {
                    count += 1;
                    cur += step;
                }
                _ => break
            }
        }
        if count == 0 {
            return None;
        }
        Some((count, cur))
    }
}
