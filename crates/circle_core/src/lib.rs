//! Check-in consistency and notification fan-out engine for wellbeing
//! circles.
//!
//! Records check-ins exactly once per cadence interval, keeps the streak in
//! step with the check-in log, and fans notifications out to circle members
//! over web and native push, with email and SMS for emergency contacts.

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use db::{DbError, Store};
pub use engine::{CheckInOutcome, CircleEngine, FanoutTask};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::alert::{AlertTarget, DistressAlert};
pub use model::endpoint::{Channel, DeviceEndpoint};
pub use model::user::{Cadence, EmergencyContact, User, UserId, UserSettings};
pub use notify::dispatcher::{DeliveryReport, MulticastDispatcher};
pub use notify::transport::{
    EmailTransport, MulticastOutcome, NativePushTransport, SmsTransport, TransportError,
    TransportSet, WebPushTransport,
};
pub use repo::error::{RepoError, RepoResult};
pub use service::alert_service::AlertError;
pub use service::check_in_service::CheckInError;

/// Minimal health-check API for hosts and the operator CLI.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
