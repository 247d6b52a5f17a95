mod support;

use circle_core::notify::payload::Notification;
use circle_core::{Channel, DeliveryReport, DeviceEndpoint, MulticastDispatcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{Fakes, RecordingNativePush, RecordingWebPush};
use uuid::Uuid;

fn endpoints(entries: &[(&str, Channel)]) -> Vec<DeviceEndpoint> {
    let user = Uuid::new_v4();
    entries
        .iter()
        .map(|(token, channel)| DeviceEndpoint::new(*token, user, *channel))
        .collect()
}

fn dispatcher(fakes: &Fakes, timeout: Duration) -> MulticastDispatcher {
    MulticastDispatcher::new(fakes.transport_set(), timeout)
}

#[test]
fn web_partial_failure_plus_unconfigured_native_counts_both() {
    let fakes = Fakes {
        web: Arc::new(RecordingWebPush::failing(&["w2"])),
        ..Fakes::default()
    };
    let report = dispatcher(&fakes, Duration::from_secs(2)).send(
        &endpoints(&[
            ("w1", Channel::WebPush),
            ("w2", Channel::WebPush),
            ("n1", Channel::NativePush),
        ]),
        &Notification::checked_in("Ana"),
    );

    assert_eq!(
        report,
        DeliveryReport {
            success_count: 1,
            failure_count: 2,
        }
    );
    assert_eq!(fakes.web.batch_count(), 1);
    assert_eq!(fakes.native.send_count(), 0);
}

#[test]
fn native_tokens_are_sent_one_by_one_and_errors_do_not_abort() {
    let fakes = Fakes {
        native: Arc::new(RecordingNativePush::configured(&["n2"], &["n3"])),
        ..Fakes::default()
    };
    let report = dispatcher(&fakes, Duration::from_secs(2)).send(
        &endpoints(&[
            ("n1", Channel::NativePush),
            ("n2", Channel::NativePush),
            ("n3", Channel::NativePush),
            ("n4", Channel::NativePush),
        ]),
        &Notification::checked_in("Ana"),
    );

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 2);
    assert_eq!(fakes.native.send_count(), 4);
    assert_eq!(fakes.web.batch_count(), 0);
}

#[test]
fn zero_endpoints_touch_no_transport() {
    let fakes = Fakes::default();
    let report = dispatcher(&fakes, Duration::from_secs(2)).send(&[], &Notification::checked_in("Ana"));
    assert_eq!(report, DeliveryReport::default());
    assert_eq!(fakes.web.batch_count(), 0);
}

#[test]
fn slow_web_push_times_out_as_failures_without_blocking_native() {
    let fakes = Fakes {
        web: Arc::new(RecordingWebPush::slow(Duration::from_millis(800))),
        native: Arc::new(RecordingNativePush::configured(&[], &[])),
        ..Fakes::default()
    };
    let started = Instant::now();
    let report = dispatcher(&fakes, Duration::from_millis(50)).send(
        &endpoints(&[
            ("w1", Channel::WebPush),
            ("w2", Channel::WebPush),
            ("n1", Channel::NativePush),
        ]),
        &Notification::checked_in("Ana"),
    );

    assert!(started.elapsed() < Duration::from_millis(700));
    assert_eq!(report.success_count, 1);
    assert_eq!(report.failure_count, 2);
}

#[test]
fn native_timeout_fails_rest_of_bucket_without_more_calls() {
    let fakes = Fakes {
        native: Arc::new(RecordingNativePush::hanging(Duration::from_millis(500))),
        ..Fakes::default()
    };
    let report = dispatcher(&fakes, Duration::from_millis(50)).send(
        &endpoints(&[
            ("n1", Channel::NativePush),
            ("n2", Channel::NativePush),
            ("n3", Channel::NativePush),
        ]),
        &Notification::checked_in("Ana"),
    );

    assert_eq!(report.success_count, 0);
    assert_eq!(report.failure_count, 3);
    assert_eq!(fakes.native.send_count(), 1);
}
