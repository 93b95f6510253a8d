/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! WAV emission for the reconstructed PCM.
//!
//! The reconstruction is already unsigned 8-bit mono, exactly what the
//! `data` chunk of a PCM WAV carries, so emission is the canonical 44-byte
//! RIFF/`fmt `/`data` header followed by the sample bytes verbatim.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::Result;

const RIFF_CHUNK_ID: &[u8; 4] = b"RIFF";
const WAVE_FORMAT_ID: &[u8; 4] = b"WAVE";
const FMT_CHUNK_ID: &[u8; 4] = b"fmt ";
const DATA_CHUNK_ID: &[u8; 4] = b"data";
const FMT_CHUNK_SIZE: u32 = 16;
const PCM_FORMAT_TAG: u16 = 1;
const NUM_CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 8;
const BLOCK_ALIGN: u16 = 1;

/// Writes the canonical PCM-WAV header for a `data` chunk of `data_size`
/// bytes of 8-bit mono samples.
pub fn write_wav_header<W: Write>(mut wr: W, sample_rate: u32, data_size: usize) -> Result<()> {
    let byte_rate = sample_rate * NUM_CHANNELS as u32 * BITS_PER_SAMPLE as u32 / 8;
    // total file size minus the 8 bytes of the RIFF chunk id and size
    let file_size = 36 + data_size as u32;

    wr.write_all(RIFF_CHUNK_ID)?;
    wr.write_all(&file_size.to_le_bytes())?;
    wr.write_all(WAVE_FORMAT_ID)?;

    wr.write_all(FMT_CHUNK_ID)?;
    wr.write_all(&FMT_CHUNK_SIZE.to_le_bytes())?;
    wr.write_all(&PCM_FORMAT_TAG.to_le_bytes())?;
    wr.write_all(&NUM_CHANNELS.to_le_bytes())?;
    wr.write_all(&sample_rate.to_le_bytes())?;
    wr.write_all(&byte_rate.to_le_bytes())?;
    wr.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    wr.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    wr.write_all(DATA_CHUNK_ID)?;
    wr.write_all(&(data_size as u32).to_le_bytes())?;
    Ok(())
}

/// Writes `pcm` as a complete WAV stream to `wr`.
pub fn write_wav<W: Write>(mut wr: W, pcm: &[u8], sample_rate: u32) -> Result<()> {
    write_wav_header(&mut wr, sample_rate, pcm.len())?;
    wr.write_all(pcm)?;
    Ok(())
}

/// Creates `path` and writes `pcm` as a WAV file.
pub fn write_wav_file(path: &Path, pcm: &[u8], sample_rate: u32) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_wav(&mut file, pcm, sample_rate)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_samples_as_written() {
        let pcm = [0u8, 1, 128, 254, 255];
        let mut bytes = Vec::new();
        write_wav(&mut bytes, &pcm, 44_100).unwrap();

        assert_eq!(b"RIFF", &bytes[0..4]);
        assert_eq!(36 + pcm.len() as u32,
                   u32::from_le_bytes(bytes[4..8].try_into().unwrap()));
        assert_eq!(b"WAVE", &bytes[8..12]);
        assert_eq!(b"fmt ", &bytes[12..16]);
        assert_eq!(16, u32::from_le_bytes(bytes[16..20].try_into().unwrap()));
        // PCM format tag, mono
        assert_eq!(1, u16::from_le_bytes(bytes[20..22].try_into().unwrap()));
        assert_eq!(1, u16::from_le_bytes(bytes[22..24].try_into().unwrap()));
        assert_eq!(44_100, u32::from_le_bytes(bytes[24..28].try_into().unwrap()));
        // byte rate and block align for 8-bit mono
        assert_eq!(44_100, u32::from_le_bytes(bytes[28..32].try_into().unwrap()));
        assert_eq!(1, u16::from_le_bytes(bytes[32..34].try_into().unwrap()));
        assert_eq!(8, u16::from_le_bytes(bytes[34..36].try_into().unwrap()));
        assert_eq!(b"data", &bytes[36..40]);
        assert_eq!(pcm.len() as u32,
                   u32::from_le_bytes(bytes[40..44].try_into().unwrap()));
        // sample bytes verbatim
        assert_eq!(&pcm[..], &bytes[44..]);
        assert_eq!(44 + pcm.len(), bytes.len());
    }

    #[test]
    fn empty_pcm_writes_header_only() {
        let mut bytes = Vec::new();
        write_wav(&mut bytes, &[], 44_100).unwrap();
        assert_eq!(44, bytes.len());
        assert_eq!(0, u32::from_le_bytes(bytes[40..44].try_into().unwrap()));
    }
}
