//! Device endpoints registered for push delivery.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Delivery protocol of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WebPush,
    NativePush,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebPush => "web_push",
            Self::NativePush => "native_push",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "web_push" => Some(Self::WebPush),
            "native_push" => Some(Self::NativePush),
            _ => None,
        }
    }
}

/// One registered device. `token` is the transport-specific address and
/// doubles as the endpoint id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    pub token: String,
    pub user_id: UserId,
    pub channel: Channel,
}

impl DeviceEndpoint {
    pub fn new(token: impl Into<String>, user_id: UserId, channel: Channel) -> Self {
        Self {
            token: token.into(),
            user_id,
            channel,
        }
    }
}
