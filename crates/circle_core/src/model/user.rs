//! User record, cadence setting and emergency contact.
//!
//! # Invariants
//! - `streak` is never written by settings updates.
//! - `custom_hours` is only meaningful for `Cadence::Custom` and must lie in
//!   `1..=168` when present.

use crate::model::validation::{
    validate_display_name, validate_email, validate_phone, ValidationError, MAX_CUSTOM_HOURS,
    MIN_CUSTOM_HOURS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Configured minimum interval between a user's check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Hourly,
    TwiceDaily,
    Daily,
    Weekly,
    Custom,
}

impl Cadence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::TwiceDaily => "twice_daily",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Custom => "custom",
        }
    }

    /// Parses the stored form; also accepts the hyphenated spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "twice_daily" | "twice-daily" => Some(Self::TwiceDaily),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Out-of-band person notified on escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
}

impl EmergencyContact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            relationship: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyContactName);
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

/// Canonical user state as seen by the check-in and alerting core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub cadence: Cadence,
    pub custom_hours: Option<u32>,
    pub streak: u32,
    pub notify_circle_on_checkin: bool,
    pub emergency_alert_enabled: bool,
    pub emergency_contact: Option<EmergencyContact>,
}

impl User {
    /// Creates a signup-state user: daily cadence, zero streak, circle
    /// notifications on, emergency alerts off.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            cadence: Cadence::Daily,
            custom_hours: None,
            streak: 0,
            notify_circle_on_checkin: true,
            emergency_alert_enabled: false,
            emergency_contact: None,
        }
    }

    pub fn settings(&self) -> UserSettings {
        UserSettings {
            display_name: self.display_name.clone(),
            cadence: self.cadence,
            custom_hours: self.custom_hours,
            notify_circle_on_checkin: self.notify_circle_on_checkin,
            emergency_alert_enabled: self.emergency_alert_enabled,
            emergency_contact: self.emergency_contact.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.settings().validate()
    }
}

/// Owner-editable subset of [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub display_name: String,
    pub cadence: Cadence,
    pub custom_hours: Option<u32>,
    pub notify_circle_on_checkin: bool,
    pub emergency_alert_enabled: bool,
    pub emergency_contact: Option<EmergencyContact>,
}

impl UserSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_display_name(&self.display_name)?;
        match (self.cadence, self.custom_hours) {
            (Cadence::Custom, None) => return Err(ValidationError::MissingCustomHours),
            (_, Some(hours)) if !(MIN_CUSTOM_HOURS..=MAX_CUSTOM_HOURS).contains(&hours) => {
                return Err(ValidationError::CustomHoursOutOfRange(hours));
            }
            _ => {}
        }
        if let Some(contact) = &self.emergency_contact {
            contact.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cadence, EmergencyContact, User};
    use crate::model::validation::ValidationError;

    #[test]
    fn cadence_round_trips_through_storage_form() {
        for cadence in [
            Cadence::Hourly,
            Cadence::TwiceDaily,
            Cadence::Daily,
            Cadence::Weekly,
            Cadence::Custom,
        ] {
            assert_eq!(Cadence::parse(cadence.as_str()), Some(cadence));
        }
        assert_eq!(Cadence::parse("twice-daily"), Some(Cadence::TwiceDaily));
        assert_eq!(Cadence::parse("fortnightly"), None);
    }

    #[test]
    fn custom_cadence_requires_hours_in_range() {
        let mut user = User::new("Ada");
        user.cadence = Cadence::Custom;
        assert_eq!(user.validate(), Err(ValidationError::MissingCustomHours));
        user.custom_hours = Some(169);
        assert_eq!(
            user.validate(),
            Err(ValidationError::CustomHoursOutOfRange(169))
        );
        user.custom_hours = Some(36);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn contact_email_is_checked() {
        let mut contact = EmergencyContact::new("Sam");
        contact.email = Some("sam-at-example".to_string());
        assert!(matches!(
            contact.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));
    }
}
