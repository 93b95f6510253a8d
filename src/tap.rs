/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! **TAP** (`C64-TAPE-RAW`) container utilities.
//!
//! A *TAP* file is a 20-byte header followed by a payload of pulse-width
//! bytes. Each payload byte encodes one half-pulse of `byte * 8` CPU cycles;
//! a zero byte marks a pause, whose duration is encoded in the three bytes
//! that follow (TAP v1) or fixed at 20,000 cycles (TAP v0).
//!
//! The structure of the header is as follows.
//!
//! | offset | size | description                          |
//! |--------|------|--------------------------------------|
//! |    0   |   12 | ASCII signature `C64-TAPE-RAW`       |
//! |   12   |    1 | version, 0 or 1                      |
//! |   13   |    3 | reserved                             |
//! |   16   |    4 | payload length (LSB first)           |
use core::convert::TryFrom;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// The 12-byte ASCII signature every TAP file starts with.
pub const SIGNATURE: &[u8; 12] = b"C64-TAPE-RAW";
/// Size of the fixed TAP header in bytes. The payload starts here.
pub const HEADER_SIZE: usize = 20;

/// Supported revisions of the TAP format.
///
/// The two differ only in how pauses are timed: v0 ignores the three bytes
/// following a zero pulse, v1 reads them as a duration in cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TapVersion {
    V0 = 0,
    V1 = 1,
}

impl TryFrom<u8> for TapVersion {
    type Error = u8;

    fn try_from(version: u8) -> std::result::Result<Self, u8> {
        match version {
            0 => Ok(TapVersion::V0),
            1 => Ok(TapVersion::V1),
            other => Err(other)
        }
    }
}

/// A validated, fully loaded TAP image.
///
/// Offsets used throughout the crate are absolute file offsets, header
/// included, so the underlying buffer keeps the header in place.
#[derive(Clone, Debug)]
pub struct TapImage {
    data: Vec<u8>,
    version: TapVersion,
}

impl TapImage {
    /// Opens, validates and reads a `.tap` file (v0 or v1).
    pub fn open(path: &Path) -> Result<TapImage> {
        let data = fs::read(path)?;
        TapImage::parse(data, &path.display().to_string())
    }

    /// Validates `data` as a TAP image.
    ///
    /// Checks the signature, the version byte and the declared payload
    /// length against the actual file size. `origin` names the source in
    /// error messages.
    pub fn parse(data: Vec<u8>, origin: &str) -> Result<TapImage> {
        if data.len() < HEADER_SIZE {
            return Err(Error::FileTooShort { path: origin.to_string(), len: data.len() });
        }
        if &data[0..12] != SIGNATURE {
            return Err(Error::Signature {
                path: origin.to_string(),
                found: String::from_utf8_lossy(&data[0..12]).into_owned(),
            });
        }
        let version = TapVersion::try_from(data[12])
            .map_err(|version| Error::Version { path: origin.to_string(), version })?;
        let declared = u32::from_le_bytes([data[16], data[17], data[18], data[19]]);
        let actual = (data.len() - HEADER_SIZE) as u32;
        if declared != actual {
            return Err(Error::DataSize { path: origin.to_string(), declared, actual });
        }
        Ok(TapImage { data, version })
    }

    #[inline]
    pub fn version(&self) -> TapVersion {
        self.version
    }

    /// The whole file, header included.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The pulse stream after the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE..]
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.data.len() - HEADER_SIZE
    }
}
