//! Repair of comments from the legacy dataset import.
//!
//! Rows with ids in [`LEGACY_IMPORT_IDS`] were imported with UTF-8 text
//! decoded as Windows-1252, so "é" reads as "Ã©". Re-encoding to
//! Windows-1252 and decoding as UTF-8 undoes it. Characters with no
//! Windows-1252 byte and byte sequences that are not valid UTF-8 are
//! dropped.

use std::ops::Range;

/// Ids assigned to the legacy dataset import.
pub const LEGACY_IMPORT_IDS: Range<i64> = 1_000_000..1_040_000;

/// Returns `true` if `id` belongs to the legacy dataset import.
#[must_use]
pub fn is_legacy_import(id: i64) -> bool {
    LEGACY_IMPORT_IDS.contains(&id)
}

/// Reverses UTF-8-read-as-Windows-1252 mojibake.
#[must_use]
pub fn repair_mojibake(text: &str) -> String {
    let bytes: Vec<u8> = text.chars().filter_map(cp1252_byte).collect();
    decode_lossy_dropping(&bytes)
}

fn cp1252_byte(c: char) -> Option<u8> {
    let code = u32::from(c);
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return u8::try_from(code).ok();
    }
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Decodes UTF-8, skipping invalid sequences instead of replacing them.
fn decode_lossy_dropping(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // valid_up_to guarantees this prefix decodes
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => return out,
                }
            }
        }
    }
}
