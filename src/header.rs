/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! Reading the on-tape headers of recognized blocks back into file
//! metadata, and labelling segments with the filenames found there.
use log::debug;

use crate::loader::cbm::{CbmReader, PULSES_PER_CBM_BYTE};
use crate::loader::{turbotape, CBM_HEAD, PULSES_PER_BYTE};
use crate::petscii::pet_to_ascii;
use crate::segment::{Segment, SegmentKind};

// Bytes of the sync chain preceding the header payload: the lead byte and
// the eight-byte countdown.
const SYNC_CHAIN_BYTES: usize = 9;

/// Information extracted from a C64 tape header block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderInfo {
    /// File name in ASCII, trimmed.
    pub file_name: String,
    /// Memory address the file loads to.
    pub load_address: u16,
    /// Memory address the file ends at.
    pub end_address: u16,
    pub block_id: u8,
}

fn file_name_from(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    pet_to_ascii(&bytes[..end]).trim().to_string()
}

/// Decodes the header payload of a `cbm_head` segment.
///
/// The payload starts after the sync chain; its layout is file type,
/// load address, end address, then a 16-byte PETSCII filename.
pub fn read_cbm_header(tap: &[u8], segment: &Segment) -> Option<HeaderInfo> {
    if segment.kind != SegmentKind::CbmHead {
        return None;
    }
    let start = segment.pilot_end_position + SYNC_CHAIN_BYTES * PULSES_PER_CBM_BYTE;
    let reader = CbmReader::new(tap, &CBM_HEAD);
    let decoded = match reader.decode_bytes(start) {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!("cbm header at offset {} undecodable: {:?}", segment.start_position, err);
            return None;
        }
    };
    if decoded.len() < 21 {
        debug!("cbm header at offset {} too short: {} bytes", segment.start_position, decoded.len());
        return None;
    }
    Some(HeaderInfo {
        file_name: file_name_from(&decoded[5..21]),
        load_address: u16::from_le_bytes([decoded[1], decoded[2]]),
        end_address: u16::from_le_bytes([decoded[3], decoded[4]]),
        block_id: segment.block_id,
    })
}

/// Decodes the header payload of a `tt_head` segment with block id 1 or 2.
///
/// The payload starts after the countdown; its layout is block id, start
/// address, end address, a spare byte, then up to 16 filename bytes.
pub fn read_turbotape_header(tap: &[u8], segment: &Segment) -> Option<HeaderInfo> {
    if segment.kind != SegmentKind::TtHead {
        return None;
    }
    let start = segment.pilot_end_position + SYNC_CHAIN_BYTES * PULSES_PER_BYTE;
    let decoded = match turbotape::decode_bytes(tap, start) {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!("turbotape header at offset {} undecodable: {:?}", segment.start_position, err);
            return None;
        }
    };
    if decoded.len() < 6 {
        debug!("turbotape header at offset {} too short: {} bytes", segment.start_position, decoded.len());
        return None;
    }
    let name_end = decoded.len().min(6 + 16);
    Some(HeaderInfo {
        file_name: file_name_from(&decoded[6..name_end]),
        load_address: u16::from_le_bytes([decoded[1], decoded[2]]),
        end_address: u16::from_le_bytes([decoded[3], decoded[4]]),
        block_id: segment.block_id,
    })
}

/// Writes decoded header filenames into the owning segments' tags.
///
/// Runs before the IDX merge, which may overwrite these labels.
pub fn apply_header_tags(tap: &[u8], segments: &mut [Segment]) {
    for segment in segments.iter_mut() {
        let header = match segment.kind {
            SegmentKind::CbmHead => read_cbm_header(tap, segment),
            SegmentKind::TtHead if segment.block_id == 1 || segment.block_id == 2 => {
                read_turbotape_header(tap, segment)
            }
            _ => None
        };
        if let Some(header) = header {
            segment.tag = header.file_name;
        }
    }
}
