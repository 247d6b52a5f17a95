//! Transport contracts and the timeout wrapper around them.

use crate::notify::payload::{Notification, PushOptions};
use crossbeam::channel::{bounded, RecvTimeoutError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Failure of one transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not return within the configured bound.
    TimedOut(Duration),
    /// Transport missing, misconfigured or its worker died.
    Unavailable(String),
    /// The remote side refused the request.
    Rejected(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut(limit) => write!(f, "transport call timed out after {limit:?}"),
            Self::Unavailable(details) => write!(f, "transport unavailable: {details}"),
            Self::Rejected(details) => write!(f, "transport rejected request: {details}"),
        }
    }
}

impl Error for TransportError {}

/// Per-batch counts reported by the web-push gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MulticastOutcome {
    pub success_count: u32,
    pub failure_count: u32,
}

/// Batched web-push gateway.
pub trait WebPushTransport: Send + Sync {
    fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
        options: &PushOptions,
    ) -> Result<MulticastOutcome, TransportError>;
}

/// Connection-oriented native push gateway; one token per call.
pub trait NativePushTransport: Send + Sync {
    fn is_configured(&self) -> bool;
    fn send(&self, token: &str, title: &str, body: &str) -> Result<bool, TransportError>;
}

pub trait EmailTransport: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<bool, TransportError>;
}

pub trait SmsTransport: Send + Sync {
    fn send(&self, to: &str, message: &str) -> Result<bool, TransportError>;
}

/// Native push placeholder for deployments without native credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredNativePush;

impl NativePushTransport for UnconfiguredNativePush {
    fn is_configured(&self) -> bool {
        false
    }

    fn send(&self, _token: &str, _title: &str, _body: &str) -> Result<bool, TransportError> {
        Err(TransportError::Unavailable(
            "native push is not configured".to_string(),
        ))
    }
}

/// Every outbound transport the engine may use.
///
/// Email and SMS are optional; a missing one is a configuration gap, not an
/// error.
#[derive(Clone)]
pub struct TransportSet {
    pub web_push: Arc<dyn WebPushTransport>,
    pub native_push: Arc<dyn NativePushTransport>,
    pub email: Option<Arc<dyn EmailTransport>>,
    pub sms: Option<Arc<dyn SmsTransport>>,
}

impl TransportSet {
    /// Web push only; native push unconfigured, no email or SMS.
    pub fn web_only(web_push: Arc<dyn WebPushTransport>) -> Self {
        Self {
            web_push,
            native_push: Arc::new(UnconfiguredNativePush),
            email: None,
            sms: None,
        }
    }
}

/// Runs `call` on a worker thread and waits at most `timeout` for it.
///
/// A call that outlives the bound keeps running detached; its result is
/// discarded and the caller sees `TimedOut`. Detached workers are not
/// reclaimed, so callers stop issuing calls to a transport once one has
/// timed out within a batch.
pub fn call_with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, TransportError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
{
    let (sender, receiver) = bounded(1);
    thread::Builder::new()
        .name("transport-call".to_string())
        .spawn(move || {
            let _ = sender.send(call());
        })
        .map_err(|err| TransportError::Unavailable(format!("failed to spawn worker: {err}")))?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(TransportError::TimedOut(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(TransportError::Unavailable(
            "transport worker exited without a result".to_string(),
        )),
    }
}
