/*
    Copyright (C) 2025-2026  Chirp the TAP developers

    This file is part of CHIRP-TAP, a Rust tool for voicing C64 tape images.

    For the full copyright notice, see the lib.rs file.
*/
//! PETSCII to ASCII mapping for on-tape filenames.

/// Converts PETSCII-encoded bytes to an ASCII string.
///
/// The CHR$ "same as" codes are folded down first; printables pass
/// through, the shifted space becomes a plain space, everything else
/// becomes a `.` placeholder.
pub fn pet_to_ascii(petscii: &[u8]) -> String {
    let mut result = String::with_capacity(petscii.len());
    for &code in petscii {
        let code = if code == 255 {
            126
        }
        else if code > 223 {
            code - 64 // produces 160-190
        }
        else if code > 191 {
            code - 96 // produces 96-127
        }
        else {
            code
        };
        result.push(match code {
            0x20..=0x7E => code as char,
            0xA0 => ' ',
            _ => '.'
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printables_pass_through() {
        assert_eq!("LODE RUNNER 64", pet_to_ascii(b"LODE RUNNER 64"));
    }

    #[test]
    fn same_as_codes_fold() {
        assert_eq!("~", pet_to_ascii(&[255]));
        assert_eq!("a", pet_to_ascii(&[193])); // 193 - 96 = 0x61
        assert_eq!(".", pet_to_ascii(&[0xE1])); // 0xE1 - 64 = 0xA1, unprintable
    }

    #[test]
    fn shifted_space_becomes_space() {
        assert_eq!(" ", pet_to_ascii(&[0xE0])); // 0xE0 - 64 = 0xA0
    }

    #[test]
    fn unprintables_become_dots() {
        assert_eq!("...", pet_to_ascii(&[0x00, 0x1F, 0x7F]));
    }
}
