//! Percent decoding of captured path segments.
//!
//! # Responsibilities
//! - Decode `%XY` escapes byte-wise over the UTF-8 encoding of the input
//! - Pass incomplete or invalid escapes through unchanged
//! - Reassemble the result as strict UTF-8
//!
//! # Design Decisions
//! - An invalid escape consumes the bytes it inspected (`%A%41` stays
//!   `%A%41`), so a broken escape never swallows the one that follows it
//! - Invalid UTF-8 after decoding is an error, never replaced with U+FFFD

use std::string::FromUtf8Error;

/// Decodes percent escapes and interprets the result as UTF-8.
pub fn url_decode(input: &str) -> Result<String, FromUtf8Error> {
    String::from_utf8(percent_decode(input.as_bytes()))
}

/// Decodes percent escapes without interpreting the resulting bytes.
pub fn percent_decode(bytes: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let current = bytes[i];
        if current != b'%' {
            decoded.push(current);
            i += 1;
            continue;
        }

        // "...%"
        let Some(&top) = bytes.get(i + 1) else {
            decoded.push(b'%');
            break;
        };
        // "...%z..."
        let Some(high) = hex_value(top) else {
            decoded.extend_from_slice(&[b'%', top]);
            i += 2;
            continue;
        };
        // "...%A"
        let Some(&bottom) = bytes.get(i + 2) else {
            decoded.extend_from_slice(&[b'%', top]);
            break;
        };
        // "...%Aw..."
        let Some(low) = hex_value(bottom) else {
            decoded.extend_from_slice(&[b'%', top, bottom]);
            i += 3;
            continue;
        };

        decoded.push((high << 4) | low);
        i += 3;
    }

    decoded
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
