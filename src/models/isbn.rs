//! ISBN value object

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

/// Validated ISBN-10 or ISBN-13.
///
/// Hyphens and spaces are stripped and letters upper-cased before the
/// check-digit verification, so formatted and compact renditions of the
/// same number compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    /// Parse and normalize a raw ISBN.
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Err(AppError::Validation("ISBN cannot be empty".to_string()));
        }
        let normalized: String = raw
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let valid = match normalized.len() {
            10 => is_valid_isbn10(&normalized),
            13 => is_valid_isbn13(&normalized),
            _ => false,
        };
        if !valid {
            return Err(AppError::Validation(format!("Invalid ISBN: {}", raw.trim())));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISBN-10: weighted sum with weights 10..2, final character is a digit or
/// 'X' (worth 10); valid when the total is divisible by 11.
fn is_valid_isbn10(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut sum: u32 = 0;
    for (i, &b) in bytes.iter().take(9).enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        sum += u32::from(b - b'0') * (10 - i as u32);
    }
    sum += match bytes[9] {
        b'X' => 10,
        b if b.is_ascii_digit() => u32::from(b - b'0'),
        _ => return false,
    };
    sum % 11 == 0
}

/// ISBN-13: weights alternate 1 and 3 over the first twelve digits; the last
/// digit must equal (10 - sum % 10) % 10.
fn is_valid_isbn13(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut sum: u32 = 0;
    for (i, &b) in bytes.iter().take(12).enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        let weight = if i % 2 == 0 { 1 } else { 3 };
        sum += u32::from(b - b'0') * weight;
    }
    if !bytes[12].is_ascii_digit() {
        return false;
    }
    u32::from(bytes[12] - b'0') == (10 - sum % 10) % 10
}
