use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingError {
    /// Number of hex digits left after removing spaces
    OddLength(usize),
    InvalidDigit { position: usize, found: char },
}

impl Error for EncodingError {}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::OddLength(n) => {
                write!(f, "Invalid hex data: odd number of digits ({})", n)
            }
            EncodingError::InvalidDigit { position, found } => {
                write!(
                    f,
                    "Invalid hex data: '{}' at position {} is not a hex digit",
                    found.escape_default(),
                    position
                )
            }
        }
    }
}

/// Convert a string of hex digit pairs to bytes. Spaces are ignored,
/// anything else must be a hex digit.
pub fn encode_hex(hex: &str) -> Result<Vec<u8>, EncodingError> {
    let digits: Vec<(usize, char)> = hex.char_indices().filter(|&(_, c)| c != ' ').collect();
    let mut nibbles = Vec::with_capacity(digits.len());
    for (position, c) in &digits {
        match c.to_digit(16) {
            Some(d) => nibbles.push(d as u8),
            None => {
                return Err(EncodingError::InvalidDigit {
                    position: *position,
                    found: *c,
                })
            }
        }
    }
    if nibbles.len() % 2 != 0 {
        return Err(EncodingError::OddLength(nibbles.len()));
    }
    Ok(nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
}

/// Format bytes the way frames are printed in logs, e.g. "0x12 0x82 0x01"
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<String>>()
        .join(" ")
}
