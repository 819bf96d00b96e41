//! dst-string payload codec
//!
//! Payloads are UTF-16LE. Legacy files contain lone surrogates; those decode
//! into a private-use escape plane so they survive a read/write cycle:
//! unit `0xD800 + n` becomes `U+F0000 + n`, and encoding maps it back.
//!
//! A genuine character in `U+F0000..=U+F0800` is decoded behind the marker
//! [`SURROGATE_ESCAPE_MARKER`], so escapes and real characters never collide.

use distance_core::{Error, Result};

/// First code point of the surrogate escape plane
pub const SURROGATE_ESCAPE_BASE: u32 = 0xF0000;

/// Surrogate units span `0xD800..=0xDFFF`
const SURROGATE_SPAN: u32 = 0x800;

/// Precedes a genuine character that falls inside the escape window
pub const SURROGATE_ESCAPE_MARKER: char = '\u{F0800}';

fn in_escape_window(cp: u32) -> bool {
    (SURROGATE_ESCAPE_BASE..=SURROGATE_ESCAPE_BASE + SURROGATE_SPAN).contains(&cp)
}

/// Decode a UTF-16LE payload; `offset` is only used for error reports
pub fn decode_utf16le(data: &[u8], offset: u64) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(Error::bad_encoding(
            offset,
            format!("UTF-16 payload has odd length {}", data.len()),
        ));
    }

    let units = data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]));
    let mut out = String::with_capacity(data.len() / 2);
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => {
                if in_escape_window(u32::from(c)) {
                    out.push(SURROGATE_ESCAPE_MARKER);
                }
                out.push(c);
            }
            Err(err) => {
                let unit = u32::from(err.unpaired_surrogate());
                let escaped = char::from_u32(SURROGATE_ESCAPE_BASE + (unit - 0xD800))
                    .ok_or_else(|| Error::bad_encoding(offset, format!("cannot escape unit {unit:#06x}")))?;
                out.push(escaped);
            }
        }
    }
    Ok(out)
}

/// Encode a string as a UTF-16LE payload, restoring escaped lone surrogates
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    let mut buf = [0u16; 2];
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        let cp = u32::from(c);
        if c == SURROGATE_ESCAPE_MARKER {
            if let Some(literal) = chars.next_if(|n| in_escape_window(u32::from(*n))) {
                for unit in literal.encode_utf16(&mut buf) {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                continue;
            }
        }
        if (SURROGATE_ESCAPE_BASE..SURROGATE_ESCAPE_BASE + SURROGATE_SPAN).contains(&cp) {
            let unit = (0xD800 + (cp - SURROGATE_ESCAPE_BASE)) as u16;
            out.extend_from_slice(&unit.to_le_bytes());
        } else {
            for unit in c.encode_utf16(&mut buf) {
                out.extend_from_slice(&unit.to_le_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ascii() {
        let encoded = encode_utf16le("Ferreus");
        assert_eq!(encoded.len(), 14);
        assert_eq!(decode_utf16le(&encoded, 0).unwrap(), "Ferreus");
    }

    #[test]
    fn test_odd_length() {
        let err = decode_utf16le(&[0x41, 0x00, 0x42], 12).unwrap_err();
        assert!(matches!(err, Error::BadEncoding { offset: 12, .. }));
    }

    #[test]
    fn test_lone_surrogate_escape() {
        // 'A', lone high surrogate, 'B'
        let raw = [0x41, 0x00, 0x01, 0xD8, 0x42, 0x00];
        let s = decode_utf16le(&raw, 0).unwrap();
        assert_eq!(s.chars().nth(1), char::from_u32(0xF0001));
        assert_eq!(encode_utf16le(&s), raw);
    }

    #[test]
    fn test_pair_is_not_escaped() {
        let s = "\u{1F600}";
        let encoded = encode_utf16le(s);
        assert_eq!(encoded.len(), 4);
        assert_eq!(decode_utf16le(&encoded, 0).unwrap(), s);
    }

    #[test]
    fn test_genuine_escape_window_char() {
        // U+F0000 written as a proper surrogate pair
        let raw = [0x80, 0xDB, 0x00, 0xDC];
        let s = decode_utf16le(&raw, 0).unwrap();
        assert_eq!(s, "\u{F0800}\u{F0000}");
        assert_eq!(encode_utf16le(&s), raw);

        // the marker itself as a genuine character
        let raw = [0x82, 0xDB, 0x00, 0xDC];
        let s = decode_utf16le(&raw, 0).unwrap();
        assert_eq!(s, "\u{F0800}\u{F0800}");
        assert_eq!(encode_utf16le(&s), raw);
    }

    #[test]
    fn test_escaped_surrogate_next_to_genuine() {
        // lone low surrogate, then U+F0001 as a pair
        let raw = [0x00, 0xDC, 0x80, 0xDB, 0x01, 0xDC];
        let s = decode_utf16le(&raw, 0).unwrap();
        assert_eq!(s.chars().count(), 3);
        assert_eq!(encode_utf16le(&s), raw);
    }

    proptest! {
        #[test]
        fn prop_units_roundtrip(units in proptest::collection::vec(any::<u16>(), 0..64)) {
            let raw: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
            let decoded = decode_utf16le(&raw, 0).unwrap();
            prop_assert_eq!(encode_utf16le(&decoded), raw);
        }
    }
}
