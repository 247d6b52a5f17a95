mod support;

use circle_core::service::outcome::ContactChannel;
use circle_core::{AlertError, AlertTarget, EmergencyContact, TransportError, UserId};
use std::sync::Arc;
use support::{harness, harness_with, test_config, Fakes, Harness, RecordingContact, RecordingWebPush};

fn enable_escalation(h: &Harness, user_id: UserId, email: Option<&str>, phone: Option<&str>) {
    let mut settings = h.engine.get_user(user_id).unwrap().unwrap().settings();
    let mut contact = EmergencyContact::new("Jo");
    contact.email = email.map(str::to_string);
    contact.phone = phone.map(str::to_string);
    settings.emergency_alert_enabled = true;
    settings.emergency_contact = Some(contact);
    h.engine.update_settings(user_id, &settings).unwrap();
}

fn contact_fakes(email: Option<RecordingContact>, sms: Option<RecordingContact>) -> Fakes {
    Fakes {
        email: email.map(Arc::new),
        sms: sms.map(Arc::new),
        ..Fakes::default()
    }
}

#[test]
fn reminder_without_endpoints_asks_recipient_to_enable_notifications() {
    let h = harness();
    let b = h.user("Ben");

    let outcome = h.engine.send_reminder(b, "Ana", "Ben").unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("hasn't enabled notifications"));
    assert_eq!(h.fakes.web.batch_count(), 0);
}

#[test]
fn reminder_reports_partial_delivery() {
    let h = harness_with(
        Fakes {
            web: Arc::new(RecordingWebPush::failing(&["b-old"])),
            ..Fakes::default()
        },
        test_config(),
    );
    let b = h.user("Ben");
    h.web_endpoint(b, "b-new");
    h.web_endpoint(b, "b-old");

    let outcome = h.engine.send_reminder(b, "Ana", "Ben").unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.delivery.success_count, 1);
    assert_eq!(outcome.delivery.failure_count, 1);
    assert!(outcome.message.contains("1 of 2"));
}

#[test]
fn reminder_with_zero_successes_fails() {
    let h = harness();
    let b = h.user("Ben");
    h.native_endpoint(b, "b-phone");

    let outcome = h.engine.send_reminder(b, "Ana", "Ben").unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.delivery.failure_count, 1);
}

#[test]
fn not_okay_recipient_takes_precedence_over_circle() {
    let h = harness();
    let a = h.user("Ana");
    let b = h.user("Ben");
    let c = h.user("Cleo");
    let circle = h.circle("Home", a, &[b, c]);
    h.web_endpoint(b, "b-web");
    h.web_endpoint(c, "c-web");

    let target = AlertTarget::from_optional(Some(b), Some(circle));
    let outcome = h
        .engine
        .send_not_okay_alert(a, "Ana", target, Some("rough night"))
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.recipients, 1);
    assert_eq!(h.fakes.web.sent_tokens(), vec!["b-web".to_string()]);

    let alerts = h.engine.list_alerts_for_actor(a).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(Some(alerts[0].id), outcome.alert_id);
    assert_eq!(alerts[0].target, AlertTarget::Person(b));
    assert_eq!(alerts[0].message.as_deref(), Some("rough night"));
}

#[test]
fn not_okay_to_all_circles_reaches_every_member_once() {
    let h = harness();
    let a = h.user("Ana");
    let b = h.user("Ben");
    let c = h.user("Cleo");
    h.circle("Family", a, &[b]);
    h.circle("Friends", a, &[b, c]);
    h.web_endpoint(a, "a-web");
    h.web_endpoint(b, "b-web");
    h.web_endpoint(c, "c-web");

    let outcome = h
        .engine
        .send_not_okay_alert(a, "Ana", AlertTarget::AllCircles, None)
        .unwrap();
    assert_eq!(outcome.recipients, 2);
    assert_eq!(outcome.delivery.success_count, 2);
    let mut tokens = h.fakes.web.sent_tokens();
    tokens.sort();
    assert_eq!(tokens, vec!["b-web".to_string(), "c-web".to_string()]);
}

#[test]
fn not_okay_to_foreign_circle_is_rejected() {
    let h = harness();
    let a = h.user("Ana");
    let b = h.user("Ben");
    let circle = h.circle("Ben's", b, &[]);

    let result = h
        .engine
        .send_not_okay_alert(a, "Ana", AlertTarget::Circle(circle), None);
    assert!(matches!(result, Err(AlertError::NotCircleMember { .. })));
}

#[test]
fn not_okay_without_endpoints_is_not_persisted() {
    let h = harness();
    let a = h.user("Ana");
    let b = h.user("Ben");
    h.circle("Home", a, &[b]);

    let outcome = h
        .engine
        .send_not_okay_alert(a, "Ana", AlertTarget::AllCircles, None)
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.alert_id.is_none());
    assert!(h.engine.list_alerts_for_actor(a).unwrap().is_empty());
}

#[test]
fn oversized_alert_message_is_rejected_before_sending() {
    let h = harness();
    let a = h.user("Ana");
    let b = h.user("Ben");
    h.web_endpoint(b, "b-web");

    let message = "x".repeat(501);
    let result = h
        .engine
        .send_not_okay_alert(a, "Ana", AlertTarget::Person(b), Some(&message));
    assert!(matches!(result, Err(AlertError::Validation(_))));
    assert_eq!(h.fakes.web.batch_count(), 0);
}

#[test]
fn escalation_disabled_makes_no_transport_calls() {
    let h = harness_with(
        contact_fakes(
            Some(RecordingContact::delivering()),
            Some(RecordingContact::delivering()),
        ),
        test_config(),
    );
    let a = h.user("Ana");
    let b = h.user("Ben");
    h.circle("Home", a, &[b]);
    h.web_endpoint(b, "b-web");

    let outcome = h.engine.send_emergency_alert(a, "Ana", 3).unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("not enabled"));
    assert_eq!(h.fakes.web.batch_count(), 0);
    assert_eq!(h.fakes.contact_calls(), 0);
}

#[test]
fn escalation_email_success_skips_sms() {
    let h = harness_with(
        contact_fakes(
            Some(RecordingContact::delivering()),
            Some(RecordingContact::delivering()),
        ),
        test_config(),
    );
    let a = h.user("Ana");
    let b = h.user("Ben");
    h.circle("Home", a, &[b]);
    h.web_endpoint(b, "b-web");
    enable_escalation(&h, a, Some("jo@example.com"), Some("+15551234567"));

    let outcome = h.engine.send_emergency_alert(a, "Ana", 3).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.circle_notified, 1);
    assert!(outcome.contact_reached);
    assert_eq!(outcome.contact_channel, Some(ContactChannel::Email));
    let email = h.fakes.email.as_ref().unwrap();
    let sms = h.fakes.sms.as_ref().unwrap();
    assert_eq!(email.destinations(), vec!["jo@example.com".to_string()]);
    assert_eq!(sms.calls(), 0);
}

#[test]
fn escalation_falls_back_to_sms_when_email_fails() {
    let h = harness_with(
        contact_fakes(
            Some(RecordingContact::returning(Err(TransportError::Rejected(
                "mailbox full".to_string(),
            )))),
            Some(RecordingContact::delivering()),
        ),
        test_config(),
    );
    let a = h.user("Ana");
    enable_escalation(&h, a, Some("jo@example.com"), Some("+15551234567"));

    let outcome = h.engine.send_emergency_alert(a, "Ana", 2).unwrap();
    assert!(outcome.contact_reached);
    assert_eq!(outcome.contact_channel, Some(ContactChannel::Sms));
    assert_eq!(outcome.circle_notified, 0);
    assert_eq!(h.fakes.email.as_ref().unwrap().calls(), 1);
    assert_eq!(
        h.fakes.sms.as_ref().unwrap().destinations(),
        vec!["+15551234567".to_string()]
    );
}

#[test]
fn escalation_without_email_transport_uses_sms() {
    let h = harness_with(
        contact_fakes(None, Some(RecordingContact::delivering())),
        test_config(),
    );
    let a = h.user("Ana");
    enable_escalation(&h, a, Some("jo@example.com"), Some("+15551234567"));

    let outcome = h.engine.send_emergency_alert(a, "Ana", 4).unwrap();
    assert_eq!(outcome.contact_channel, Some(ContactChannel::Sms));
}

#[test]
fn escalation_reports_unreached_contact_truthfully() {
    let h = harness_with(
        contact_fakes(Some(RecordingContact::returning(Ok(false))), None),
        test_config(),
    );
    let a = h.user("Ana");
    enable_escalation(&h, a, Some("jo@example.com"), None);

    let outcome = h.engine.send_emergency_alert(a, "Ana", 5).unwrap();
    assert!(!outcome.success);
    assert!(!outcome.contact_reached);
    assert_eq!(outcome.contact_channel, None);
}

#[test]
fn escalation_result_survives_a_failed_record_write() {
    let h = harness_with(
        contact_fakes(Some(RecordingContact::delivering()), None),
        test_config(),
    );
    let a = h.user("Ana");
    enable_escalation(&h, a, Some("jo@example.com"), None);
    h.store
        .connect()
        .unwrap()
        .execute_batch("DROP TABLE escalations;")
        .unwrap();

    let outcome = h.engine.send_emergency_alert(a, "Ana", 3).unwrap();
    assert!(outcome.success);
    assert!(outcome.contact_reached);
    assert_eq!(outcome.contact_channel, Some(ContactChannel::Email));
    assert_eq!(h.fakes.email.as_ref().unwrap().calls(), 1);
}
