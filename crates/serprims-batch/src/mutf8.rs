//! Modified UTF-8, the encoding used for string bodies and type names.
//!
//! Text is encoded one UTF-16 code unit at a time:
//! - `U+0001..=U+007F` as one byte
//! - `U+0000` and `U+0080..=U+07FF` as two bytes (so no encoded byte is zero)
//! - everything else as three bytes, surrogates included, each half of a
//!   pair encoded on its own

use crate::error::{BatchError, Result};

/// Encoded length of `text`, in bytes.
pub fn encoded_len(text: &str) -> usize {
    text.encode_utf16().map(unit_len).sum()
}

fn unit_len(unit: u16) -> usize {
    match unit {
        0x0001..=0x007F => 1,
        0x0000 | 0x0080..=0x07FF => 2,
        _ => 3,
    }
}

/// Encode `text`, appending to `dst`.
pub fn encode_into(text: &str, dst: &mut Vec<u8>) {
    dst.reserve(encoded_len(text));
    for unit in text.encode_utf16() {
        match unit_len(unit) {
            1 => dst.push(unit as u8),
            2 => {
                dst.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                dst.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                dst.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                dst.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                dst.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
}

pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(text));
    encode_into(text, &mut out);
    out
}

/// Decode modified UTF-8.
///
/// Fails on truncated or malformed sequences and on surrogate halves that
/// do not pair up.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        let lead = bytes[i];
        let (unit, width) = match lead >> 4 {
            0x0..=0x7 => (u16::from(lead), 1),
            0xC | 0xD => {
                let b1 = continuation(bytes, i, 1)?;
                ((u16::from(lead & 0x1F) << 6) | b1, 2)
            }
            0xE => {
                let b1 = continuation(bytes, i, 1)?;
                let b2 = continuation(bytes, i, 2)?;
                ((u16::from(lead & 0x0F) << 12) | (b1 << 6) | b2, 3)
            }
            _ => {
                return Err(BatchError::InvalidUtf(format!(
                    "unexpected byte 0x{lead:02X} at offset {i}"
                )))
            }
        };
        units.push(unit);
        i += width;
    }
    String::from_utf16(&units).map_err(|err| BatchError::InvalidUtf(err.to_string()))
}

fn continuation(bytes: &[u8], start: usize, offset: usize) -> Result<u16> {
    match bytes.get(start + offset) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        Some(&b) => Err(BatchError::InvalidUtf(format!(
            "bad continuation byte 0x{b:02X} at offset {}",
            start + offset
        ))),
        None => Err(BatchError::InvalidUtf(format!(
            "sequence at offset {start} truncated"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_one_byte_per_char() {
        assert_eq!(encode("ab"), b"ab");
        assert_eq!(encoded_len("hello"), 5);
    }

    #[test]
    fn nul_is_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn two_and_three_byte_units() {
        assert_eq!(encode("é"), vec![0xC3, 0xA9]);
        assert_eq!(encode("€"), vec![0xE2, 0x82, 0xAC]);
        assert_eq!(decode(&[0xE2, 0x82, 0xAC]).unwrap(), "€");
    }

    #[test]
    fn supplementary_chars_use_surrogate_pairs() {
        let text = "😀";
        let encoded = encode(text);
        assert_eq!(encoded.len(), 6, "two surrogates, three bytes each");
        assert_eq!(encoded[0], 0xED);
        assert_eq!(decode(&encoded).unwrap(), text);
    }

    #[test]
    fn mixed_text_roundtrips() {
        let text = "graph: Ωμέγα \u{0} 日本 😀 end";
        assert_eq!(decode(&encode(text)).unwrap(), text);
        assert_eq!(encode(text).len(), encoded_len(text));
    }

    #[test]
    fn malformed_input_rejected() {
        assert!(matches!(decode(&[0xC3]), Err(BatchError::InvalidUtf(_))));
        assert!(matches!(decode(&[0xE2, 0x41, 0x41]), Err(BatchError::InvalidUtf(_))));
        assert!(matches!(decode(&[0xF0, 0x9F]), Err(BatchError::InvalidUtf(_))));
        // Lone high surrogate.
        assert!(matches!(decode(&[0xED, 0xA0, 0xBD]), Err(BatchError::InvalidUtf(_))));
    }
}
