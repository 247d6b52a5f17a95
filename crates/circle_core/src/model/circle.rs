//! Circle (trust group) record.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CircleId = Uuid;

/// A named group of users who share check-in visibility.
///
/// `members` keeps stored (join) order; membership is unique per circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub id: CircleId,
    pub name: String,
    pub owner_id: UserId,
    pub members: Vec<UserId>,
}

impl Circle {
    pub fn contains(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// First member in stored order, used as the nominal sender of
    /// scheduled reminders.
    pub fn first_member(&self) -> Option<UserId> {
        self.members.first().copied()
    }
}
