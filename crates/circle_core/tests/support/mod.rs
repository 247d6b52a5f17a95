#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use circle_core::model::circle::CircleId;
use circle_core::notify::payload::{Notification, PushOptions};
use circle_core::{
    Channel, CircleEngine, DeviceEndpoint, EmailTransport, EngineConfig, FixedClock,
    MulticastOutcome, NativePushTransport, SmsTransport, Store, TransportError, TransportSet,
    User, UserId, WebPushTransport,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Web push fake: every token succeeds unless listed as failing.
#[derive(Default)]
pub struct RecordingWebPush {
    failing: HashSet<String>,
    delay: Option<Duration>,
    batches: Mutex<Vec<(Vec<String>, Notification)>>,
}

impl RecordingWebPush {
    pub fn failing(tokens: &[&str]) -> Self {
        Self {
            failing: tokens.iter().map(|token| token.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn sent_tokens(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(tokens, _)| tokens.clone())
            .collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, notification)| notification.title.clone())
            .collect()
    }
}

impl WebPushTransport for RecordingWebPush {
    fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
        _options: &PushOptions,
    ) -> Result<MulticastOutcome, TransportError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.batches
            .lock()
            .unwrap()
            .push((tokens.to_vec(), notification.clone()));
        let failure_count = tokens
            .iter()
            .filter(|token| self.failing.contains(token.as_str()))
            .count() as u32;
        Ok(MulticastOutcome {
            success_count: tokens.len() as u32 - failure_count,
            failure_count,
        })
    }
}

/// Native push fake; configured tokens succeed unless listed as failing,
/// and a token listed as erroring raises a transport error.
#[derive(Default)]
pub struct RecordingNativePush {
    configured: bool,
    failing: HashSet<String>,
    erroring: HashSet<String>,
    delay: Option<Duration>,
    sends: Mutex<Vec<String>>,
}

impl RecordingNativePush {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn configured(failing: &[&str], erroring: &[&str]) -> Self {
        Self {
            configured: true,
            failing: failing.iter().map(|token| token.to_string()).collect(),
            erroring: erroring.iter().map(|token| token.to_string()).collect(),
            delay: None,
            sends: Mutex::new(Vec::new()),
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self {
            configured: true,
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }
}

impl NativePushTransport for RecordingNativePush {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn send(&self, token: &str, _title: &str, _body: &str) -> Result<bool, TransportError> {
        self.sends.lock().unwrap().push(token.to_string());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.erroring.contains(token) {
            return Err(TransportError::Rejected("device unregistered".to_string()));
        }
        Ok(!self.failing.contains(token))
    }
}

/// Email/SMS fake returning a fixed result and counting calls.
pub struct RecordingContact {
    result: Result<bool, TransportError>,
    calls: AtomicUsize,
    destinations: Mutex<Vec<String>>,
}

impl RecordingContact {
    pub fn returning(result: Result<bool, TransportError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            destinations: Mutex::new(Vec::new()),
        }
    }

    pub fn delivering() -> Self {
        Self::returning(Ok(true))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn destinations(&self) -> Vec<String> {
        self.destinations.lock().unwrap().clone()
    }

    fn record(&self, destination: &str) -> Result<bool, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_string());
        self.result.clone()
    }
}

impl EmailTransport for RecordingContact {
    fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<bool, TransportError> {
        self.record(to)
    }
}

impl SmsTransport for RecordingContact {
    fn send(&self, to: &str, _message: &str) -> Result<bool, TransportError> {
        self.record(to)
    }
}

/// Transport fakes a test can inspect after running the engine.
pub struct Fakes {
    pub web: Arc<RecordingWebPush>,
    pub native: Arc<RecordingNativePush>,
    pub email: Option<Arc<RecordingContact>>,
    pub sms: Option<Arc<RecordingContact>>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            web: Arc::new(RecordingWebPush::default()),
            native: Arc::new(RecordingNativePush::unconfigured()),
            email: None,
            sms: None,
        }
    }
}

impl Fakes {
    pub fn transport_set(&self) -> TransportSet {
        let web: Arc<dyn WebPushTransport> = self.web.clone();
        let native: Arc<dyn NativePushTransport> = self.native.clone();
        TransportSet {
            web_push: web,
            native_push: native,
            email: self
                .email
                .clone()
                .map(|email| email as Arc<dyn EmailTransport>),
            sms: self.sms.clone().map(|sms| sms as Arc<dyn SmsTransport>),
        }
    }

    pub fn contact_calls(&self) -> usize {
        self.email.as_ref().map_or(0, |email| email.calls())
            + self.sms.as_ref().map_or(0, |sms| sms.calls())
    }
}

/// Engine over a temp-dir database with a controllable clock.
pub struct Harness {
    pub dir: TempDir,
    pub store: Store,
    pub clock: Arc<FixedClock>,
    pub engine: CircleEngine,
    pub fakes: Fakes,
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        transport_timeout_ms: 2_000,
        ..EngineConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(Fakes::default(), test_config())
}

pub fn harness_with(fakes: Fakes, config: EngineConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("circle.db"), config.busy_timeout()).unwrap();
    let clock = Arc::new(FixedClock::new(at(2026, 3, 2, 9, 0)));
    let engine = CircleEngine::new(
        store.clone(),
        fakes.transport_set(),
        clock.clone(),
        config,
    )
    .unwrap();
    Harness {
        dir,
        store,
        clock,
        engine,
        fakes,
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap()
}

impl Harness {
    pub fn user(&self, name: &str) -> UserId {
        self.engine.register_user(&User::new(name)).unwrap()
    }

    pub fn web_endpoint(&self, user_id: UserId, token: &str) {
        self.engine
            .register_endpoint(&DeviceEndpoint::new(token, user_id, Channel::WebPush))
            .unwrap();
    }

    pub fn native_endpoint(&self, user_id: UserId, token: &str) {
        self.engine
            .register_endpoint(&DeviceEndpoint::new(token, user_id, Channel::NativePush))
            .unwrap();
    }

    pub fn circle(&self, name: &str, owner: UserId, members: &[UserId]) -> CircleId {
        let circle = self.engine.create_circle(name, owner).unwrap();
        for member in members {
            self.engine.join_circle(circle.id, *member).unwrap();
        }
        circle.id
    }

    /// Checks `user_id` in at `when`, waiting for the background fan-out.
    pub fn check_in_at(&self, user_id: UserId, when: DateTime<Utc>) -> u32 {
        self.clock.set(when);
        let outcome = self.engine.check_in(user_id).unwrap();
        assert!(outcome.success, "{}", outcome.message);
        if let Some(task) = outcome.fanout {
            task.wait();
        }
        outcome.streak.unwrap()
    }
}
