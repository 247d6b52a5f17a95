//! Input validation shared by settings and alert entry points.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MAX_DISPLAY_NAME_CHARS: usize = 80;
pub const MAX_ALERT_MESSAGE_CHARS: usize = 500;
pub const MIN_CUSTOM_HOURS: u32 = 1;
pub const MAX_CUSTOM_HOURS: u32 = 168;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("valid phone regex"));

/// Malformed caller input, rejected before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyDisplayName,
    DisplayNameTooLong(usize),
    MissingCustomHours,
    CustomHoursOutOfRange(u32),
    EmptyContactName,
    InvalidEmail(String),
    InvalidPhone(String),
    MessageTooLong(usize),
    EmptyEndpointToken,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDisplayName => write!(f, "display name cannot be empty"),
            Self::DisplayNameTooLong(len) => write!(
                f,
                "display name is {len} characters; maximum is {MAX_DISPLAY_NAME_CHARS}"
            ),
            Self::MissingCustomHours => {
                write!(f, "custom cadence requires custom hours")
            }
            Self::CustomHoursOutOfRange(hours) => write!(
                f,
                "custom hours must be within {MIN_CUSTOM_HOURS}..={MAX_CUSTOM_HOURS}, got {hours}"
            ),
            Self::EmptyContactName => write!(f, "emergency contact name cannot be empty"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidPhone(value) => write!(f, "invalid phone number: `{value}`"),
            Self::MessageTooLong(len) => write!(
                f,
                "message is {len} characters; maximum is {MAX_ALERT_MESSAGE_CHARS}"
            ),
            Self::EmptyEndpointToken => write!(f, "endpoint token cannot be empty"),
        }
    }
}

impl Error for ValidationError {}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDisplayName);
    }
    let len = trimmed.chars().count();
    if len > MAX_DISPLAY_NAME_CHARS {
        return Err(ValidationError::DisplayNameTooLong(len));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(value.to_string()))
    }
}

/// Normalizes an optional alert message: blank becomes `None`.
pub fn normalize_alert_message(message: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(trimmed) = message.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let len = trimmed.chars().count();
    if len > MAX_ALERT_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong(len));
    }
    Ok(Some(trimmed.to_string()))
}
