//! Email value object

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern")
});

/// Validated, normalized email address.
///
/// Raw input is trimmed and lower-cased before validation, so two addresses
/// differing only in case compare equal. Stored as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse and normalize a raw email address.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AppError::Validation("Email cannot be empty".to_string()));
        }
        if !EMAIL_RE.is_match(&normalized) {
            return Err(AppError::Validation(format!(
                "Invalid email: {}",
                raw.trim()
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_surrounding_whitespace() {
        let email = Email::parse("  Ana.Silva@Email.COM ").unwrap();
        assert_eq!(email.as_str(), "ana.silva@email.com");
    }

    #[test]
    fn equal_when_only_case_differs() {
        let a = Email::parse("teste@email.com").unwrap();
        let b = Email::parse("TESTE@EMAIL.COM").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn accepts_plus_tags_and_subdomains() {
        assert!(Email::parse("user+tag@mail.example.co.uk").is_ok());
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(Email::parse("").is_err());
        assert!(Email::parse("   ").is_err());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "emailsemarroba.com",
            "@dominio.com",
            "usuario@",
            "usuario @dominio.com",
            "usuario@dominio",
        ] {
            assert!(Email::parse(raw).is_err(), "{} should be rejected", raw);
        }
    }
}
