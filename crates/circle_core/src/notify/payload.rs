//! Notification payload builders.

use crate::model::user::EmergencyContact;
use serde::{Deserialize, Serialize};

pub const DASHBOARD_LINK: &str = "/dashboard";
pub const CIRCLES_LINK: &str = "/circles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
}

/// One logical notification, independent of transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub deep_link: String,
    pub priority: Priority,
}

/// Platform options handed to the web-push gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOptions {
    pub urgency: Priority,
    pub require_interaction: bool,
    pub link: String,
}

impl PushOptions {
    pub fn for_notification(notification: &Notification) -> Self {
        Self {
            urgency: notification.priority,
            require_interaction: notification.priority == Priority::High,
            link: notification.deep_link.clone(),
        }
    }
}

impl Notification {
    pub fn checked_in(user_name: &str) -> Self {
        Self {
            title: format!("{user_name} checked in"),
            body: format!("{user_name} just checked in and is doing okay."),
            deep_link: DASHBOARD_LINK.to_string(),
            priority: Priority::Normal,
        }
    }

    pub fn reminder(sender_name: &str, recipient_name: &str) -> Self {
        Self {
            title: "Time to check in".to_string(),
            body: format!(
                "Hi {recipient_name}, {sender_name} is thinking of you. Let your circle know you're okay."
            ),
            deep_link: DASHBOARD_LINK.to_string(),
            priority: Priority::Normal,
        }
    }

    pub fn not_okay(actor_name: &str, message: Option<&str>) -> Self {
        let body = match message {
            Some(message) => format!("{actor_name}: {message}"),
            None => format!("{actor_name} isn't feeling okay and could use a check-in."),
        };
        Self {
            title: format!("{actor_name} needs support"),
            body,
            deep_link: CIRCLES_LINK.to_string(),
            priority: Priority::High,
        }
    }

    pub fn circle_escalation(user_name: &str, days_inactive: i64) -> Self {
        Self {
            title: format!("Please check on {user_name}"),
            body: format!(
                "{user_name} hasn't checked in for {days_inactive} days. Please reach out and make sure they're okay."
            ),
            deep_link: CIRCLES_LINK.to_string(),
            priority: Priority::High,
        }
    }
}

/// Subject and body of the emergency-contact email.
pub fn contact_email(user_name: &str, contact: &EmergencyContact, days_inactive: i64) -> (String, String) {
    let relationship = contact
        .relationship
        .as_deref()
        .map(|value| format!(" as their {value}"))
        .unwrap_or_default();
    let subject = format!("{user_name} hasn't checked in for {days_inactive} days");
    let body = format!(
        "Hello {},\n\n{user_name} listed you{relationship} as their emergency contact. \
They haven't checked in for {days_inactive} days and their circle has been asked to check on them.\n\n\
Please try to reach {user_name} to make sure they're okay.",
        contact.name
    );
    (subject, body)
}

pub fn contact_sms(user_name: &str, days_inactive: i64) -> String {
    format!(
        "{user_name} hasn't checked in for {days_inactive} days and listed you as their emergency contact. Please check on them."
    )
}

#[cfg(test)]
mod tests {
    use super::{contact_email, Notification, Priority, PushOptions};
    use crate::model::user::EmergencyContact;

    #[test]
    fn not_okay_is_high_priority_and_requires_interaction() {
        let notification = Notification::not_okay("Rae", Some("rough night"));
        assert_eq!(notification.priority, Priority::High);
        assert_eq!(notification.body, "Rae: rough night");
        assert!(PushOptions::for_notification(&notification).require_interaction);
    }

    #[test]
    fn contact_email_mentions_relationship() {
        let mut contact = EmergencyContact::new("Jo");
        contact.relationship = Some("sibling".to_string());
        let (subject, body) = contact_email("Rae", &contact, 3);
        assert!(subject.contains("3 days"));
        assert!(body.contains("as their sibling"));
    }
}
