//! Distress alert target and persisted record.

use crate::model::circle::CircleId;
use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AlertId = Uuid;

/// Who a not-okay alert is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlertTarget {
    Person(UserId),
    Circle(CircleId),
    AllCircles,
}

impl AlertTarget {
    /// Resolves the optional-field request shape once: a recipient wins
    /// over a circle, and neither means every circle of the actor.
    pub fn from_optional(recipient_id: Option<UserId>, circle_id: Option<CircleId>) -> Self {
        match (recipient_id, circle_id) {
            (Some(recipient_id), _) => Self::Person(recipient_id),
            (None, Some(circle_id)) => Self::Circle(circle_id),
            (None, None) => Self::AllCircles,
        }
    }

    pub fn kind_str(self) -> &'static str {
        match self {
            Self::Person(_) => "person",
            Self::Circle(_) => "circle",
            Self::AllCircles => "all_circles",
        }
    }

    pub fn target_id(self) -> Option<Uuid> {
        match self {
            Self::Person(id) | Self::Circle(id) => Some(id),
            Self::AllCircles => None,
        }
    }
}

/// Persisted record of a self-declared distress alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistressAlert {
    pub id: AlertId,
    pub actor_id: UserId,
    pub actor_name: String,
    pub target: AlertTarget,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

/// Persisted outcome of one emergency escalation, kept for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub sent_at: DateTime<Utc>,
    pub days_inactive: i64,
    pub circle_notified: u32,
    pub contact_reached: bool,
}

#[cfg(test)]
mod tests {
    use super::AlertTarget;
    use uuid::Uuid;

    #[test]
    fn recipient_takes_precedence_over_circle() {
        let recipient = Uuid::new_v4();
        let circle = Uuid::new_v4();
        assert_eq!(
            AlertTarget::from_optional(Some(recipient), Some(circle)),
            AlertTarget::Person(recipient)
        );
        assert_eq!(
            AlertTarget::from_optional(None, Some(circle)),
            AlertTarget::Circle(circle)
        );
        assert_eq!(AlertTarget::from_optional(None, None), AlertTarget::AllCircles);
    }
}
