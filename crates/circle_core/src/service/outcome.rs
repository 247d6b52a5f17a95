//! Structured results returned by workflows and scans.
//!
//! Every result carries a success flag and a message meant for the person
//! who triggered the operation.

use crate::model::alert::AlertId;
use crate::notify::dispatcher::DeliveryReport;
use serde::Serialize;
use uuid::Uuid;

/// Result of a single-target or circle-wide notification workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub message: String,
    /// Distinct people the notification was addressed to.
    pub recipients: u32,
    pub delivery: DeliveryReport,
}

impl WorkflowOutcome {
    pub(crate) fn new(success: bool, message: impl Into<String>, recipients: usize) -> Self {
        Self {
            success,
            message: message.into(),
            recipients: count(recipients),
            delivery: DeliveryReport::default(),
        }
    }

    pub(crate) fn with_delivery(mut self, delivery: DeliveryReport) -> Self {
        self.delivery = delivery;
        self
    }
}

/// Result of a not-okay alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotOkayOutcome {
    pub success: bool,
    pub message: String,
    pub recipients: u32,
    pub delivery: DeliveryReport,
    /// Persisted alert id; set whenever at least one endpoint was sent to.
    pub alert_id: Option<AlertId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Email,
    Sms,
}

/// Result of an emergency escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationOutcome {
    pub success: bool,
    pub message: String,
    /// Circle devices that accepted the escalation notification.
    pub circle_notified: u32,
    pub circle_delivery: DeliveryReport,
    pub contact_reached: bool,
    pub contact_channel: Option<ContactChannel>,
}

impl EscalationOutcome {
    pub(crate) fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            circle_notified: 0,
            circle_delivery: DeliveryReport::default(),
            contact_reached: false,
            contact_channel: None,
        }
    }
}

/// One entity a batch left out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub subject: Uuid,
    pub reason: String,
}

/// Result of reminding a circle's inactive members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub message: String,
    pub sent: u32,
    pub failed: u32,
    pub skipped: Vec<SkippedItem>,
}

/// Aggregate counts of one scheduled scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Entities (circles or users) examined.
    pub scanned: u32,
    pub sent: u32,
    pub failed: u32,
    pub skipped: Vec<SkippedItem>,
}

impl ScanReport {
    pub(crate) fn skip(&mut self, subject: Uuid, reason: impl Into<String>) {
        self.skipped.push(SkippedItem {
            subject,
            reason: reason.into(),
        });
    }
}

/// Both scheduled scans run back to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InactivityScanReport {
    pub reminders: ScanReport,
    pub escalations: ScanReport,
}

pub(crate) fn count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
