use alloc::{string::ToString, vec::Vec};

use crate::bins::{BinOffsetTable, BinSet, DecodeError, decode};

/// Parse a bridge `raw` field such as `"81 25 00 00 02 C7 ..."` into bytes.
///
/// Tokens are split on any whitespace and must be exactly two hex digits.
/// Either case is accepted.
pub fn parse_hex_frame(text: &str) -> Result<Vec<u8>, DecodeError> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, token)| parse_token(token).ok_or_else(|| DecodeError::MalformedToken {
            index,
            token: token.to_string(),
        }))
        .collect()
}

fn parse_token(token: &str) -> Option<u8> {
    // from_str_radix alone would take "+1" or "7"
    if token.len() != 2 || !token.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

/// `parse_hex_frame` followed by `decode`
pub fn decode_hex(text: &str, table: &BinOffsetTable) -> Result<BinSet, DecodeError> {
    let frame = parse_hex_frame(text)?;
    decode(&frame, table)
}
