//! Case count decoding
//!
//! The count endpoint answers with numeral text. Accepted forms follow the
//! usual decode conventions: optional sign, then decimal, `0x`/`0X`/`#` hex,
//! or leading-zero octal.

use crate::error::{ConformanceError, ConformanceResult};

pub fn parse_case_count(payload: &str) -> ConformanceResult<u32> {
    let malformed = || ConformanceError::MalformedCount {
        payload: payload.to_string(),
    };

    let text = payload.trim();
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .or_else(|| unsigned.strip_prefix('#'))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    // from_str_radix would accept a second sign here
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(malformed());
    }

    let value = u32::from_str_radix(digits, radix).map_err(|_| malformed())?;
    match (negative, value) {
        (false, value) => Ok(value),
        (true, 0) => Ok(0),
        (true, _) => Err(malformed()),
    }
}
