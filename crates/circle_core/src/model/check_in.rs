//! Append-only check-in record.

use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CheckInId = Uuid;

/// One check-in: the unit of truth for "this user is okay".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: CheckInId,
    pub user_id: UserId,
    pub checked_in_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn new(user_id: UserId, checked_in_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            checked_in_at,
        }
    }
}
