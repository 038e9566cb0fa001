//! Memory size parsing
//!
//! Converts human-readable size tokens such as `256m`, `2g` or `131072`
//! into byte counts. Unit suffixes are binary multiples:
//! `k` = 2^10, `m` = 2^20, `g` = 2^30 (case-insensitive).

use thiserror::Error;

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

/// Error returned when a memory size token cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryParseError {
    /// The token does not match `<digits>[.<digits>][k|m|g]`
    #[error("invalid memory size {input:?}")]
    Invalid { input: String },

    /// The token is well-formed but does not fit in 64 bits
    #[error("memory size {input:?} is too large")]
    Overflow { input: String },
}

/// Parse a memory size token into a byte count.
///
/// An empty (or all-whitespace) token means "no explicit limit" and yields 0.
/// With a unit suffix the remainder may carry a fractional part; the product
/// is truncated toward zero. Without a suffix the token must be a plain
/// integer byte count.
pub fn parse_memory(input: &str) -> Result<u64, MemoryParseError> {
    let token = input.trim();
    if token.is_empty() {
        return Ok(0);
    }

    let invalid = || MemoryParseError::Invalid {
        input: input.to_string(),
    };
    let overflow = || MemoryParseError::Overflow {
        input: input.to_string(),
    };

    let (number, multiplier) = match token.char_indices().last() {
        Some((idx, unit)) => match unit.to_ascii_lowercase() {
            'k' => (&token[..idx], Some(KIB)),
            'm' => (&token[..idx], Some(MIB)),
            'g' => (&token[..idx], Some(GIB)),
            _ => (token, None),
        },
        None => return Ok(0),
    };

    match multiplier {
        None => {
            if !is_digits(number) {
                return Err(invalid());
            }
            number.parse::<u64>().map_err(|_| overflow())
        }
        Some(multiplier) => {
            if !is_decimal(number) {
                return Err(invalid());
            }
            let value: f64 = number.parse().map_err(|_| invalid())?;
            let bytes = (value * multiplier as f64).trunc();
            if !bytes.is_finite() || bytes >= u64::MAX as f64 {
                return Err(overflow());
            }
            Ok(bytes as u64)
        }
    }
}

/// `<digits>`
fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `<digits>[.<digits>]`
fn is_decimal(s: &str) -> bool {
    match s.split_once('.') {
        Some((whole, frac)) => is_digits(whole) && is_digits(frac),
        None => is_digits(s),
    }
}

/// Format bytes as a human-readable string with binary suffixes
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.2}Gi", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2}Mi", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2}Ki", bytes as f64 / KIB as f64)
    } else {
        format!("{}B", bytes)
    }
}
