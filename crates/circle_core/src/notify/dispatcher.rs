//! Multicast dispatcher.
//!
//! # Responsibility
//! - Partition endpoints into web-push and native-push buckets.
//! - Send each bucket through its transport and sum per-endpoint outcomes.
//!
//! # Invariants
//! - Duplicate tokens are sent once.
//! - Web push goes out as one batched call; native push one token at a time.
//! - An unconfigured native transport fails every native endpoint.
//! - After one native call times out, the rest of the native bucket fails
//!   without further calls, so at most one worker per bucket is left
//!   detached.
//! - A web-push failure never skips the native bucket, and vice versa.

use crate::model::endpoint::{Channel, DeviceEndpoint};
use crate::notify::payload::{Notification, PushOptions};
use crate::notify::transport::{call_with_timeout, TransportError, TransportSet};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Aggregated delivery counts for one logical send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub success_count: u32,
    pub failure_count: u32,
}

impl DeliveryReport {
    pub fn attempted(&self) -> u32 {
        self.success_count + self.failure_count
    }

    pub fn merge(&mut self, other: DeliveryReport) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
    }

    fn fail(&mut self, count: usize) {
        self.failure_count += u32::try_from(count).unwrap_or(u32::MAX);
    }
}

/// Sends one notification to many endpoints across both push channels.
#[derive(Clone)]
pub struct MulticastDispatcher {
    transports: TransportSet,
    timeout: Duration,
}

impl MulticastDispatcher {
    pub fn new(transports: TransportSet, timeout: Duration) -> Self {
        Self {
            transports,
            timeout,
        }
    }

    /// Delivers `notification` to every endpoint, returning summed counts.
    ///
    /// Zero endpoints yields an empty report without touching a transport.
    pub fn send(&self, endpoints: &[DeviceEndpoint], notification: &Notification) -> DeliveryReport {
        let started_at = Instant::now();
        let (web_tokens, native_tokens) = partition_by_channel(endpoints);

        let mut report = DeliveryReport::default();
        if !web_tokens.is_empty() {
            report.merge(self.send_web(web_tokens, notification));
        }
        if !native_tokens.is_empty() {
            report.merge(self.send_native(native_tokens, notification));
        }

        info!(
            "event=dispatch module=notify status=done endpoints={} success={} failure={} duration_ms={}",
            endpoints.len(),
            report.success_count,
            report.failure_count,
            started_at.elapsed().as_millis()
        );
        report
    }

    fn send_web(&self, tokens: Vec<String>, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let token_count = tokens.len();
        let transport = Arc::clone(&self.transports.web_push);
        let payload = notification.clone();
        let options = PushOptions::for_notification(notification);

        match call_with_timeout(self.timeout, move || {
            transport.send_multicast(&tokens, &payload, &options)
        }) {
            Ok(outcome) => {
                report.success_count += outcome.success_count;
                report.failure_count += outcome.failure_count;
            }
            Err(err) => {
                warn!(
                    "event=dispatch module=notify channel=web_push status=error tokens={} error_code={} error={}",
                    token_count,
                    error_code(&err),
                    err
                );
                report.fail(token_count);
            }
        }
        report
    }

    fn send_native(&self, tokens: Vec<String>, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if !self.transports.native_push.is_configured() {
            warn!(
                "event=dispatch module=notify channel=native_push status=skipped tokens={} error_code=native_unconfigured",
                tokens.len()
            );
            report.fail(tokens.len());
            return report;
        }

        let token_count = tokens.len();
        for (index, token) in tokens.into_iter().enumerate() {
            let transport = Arc::clone(&self.transports.native_push);
            let title = notification.title.clone();
            let body = notification.body.clone();
            match call_with_timeout(self.timeout, move || transport.send(&token, &title, &body)) {
                Ok(true) => report.success_count += 1,
                Ok(false) => report.failure_count += 1,
                Err(err @ TransportError::TimedOut(_)) => {
                    let abandoned = token_count - index;
                    warn!(
                        "event=dispatch module=notify channel=native_push status=error error_code={} abandoned={} error={}",
                        error_code(&err),
                        abandoned,
                        err
                    );
                    report.fail(abandoned);
                    break;
                }
                Err(err) => {
                    warn!(
                        "event=dispatch module=notify channel=native_push status=error error_code={} error={}",
                        error_code(&err),
                        err
                    );
                    report.failure_count += 1;
                }
            }
        }
        report
    }
}

fn partition_by_channel(endpoints: &[DeviceEndpoint]) -> (Vec<String>, Vec<String>) {
    let mut seen = BTreeSet::new();
    let mut web = Vec::new();
    let mut native = Vec::new();
    for endpoint in endpoints {
        if !seen.insert(endpoint.token.as_str()) {
            continue;
        }
        match endpoint.channel {
            Channel::WebPush => web.push(endpoint.token.clone()),
            Channel::NativePush => native.push(endpoint.token.clone()),
        }
    }
    (web, native)
}

fn error_code(err: &TransportError) -> &'static str {
    match err {
        TransportError::TimedOut(_) => "transport_timeout",
        TransportError::Unavailable(_) => "transport_unavailable",
        TransportError::Rejected(_) => "transport_rejected",
    }
}
