//! Core services.
//!
//! # Responsibility
//! - Check-in coordination, fan-out resolution and alerting workflows.
//! - Pure cadence and streak policy.

pub mod alert_service;
pub mod check_in_service;
pub mod fanout;
pub mod inactivity_scanner;
pub mod interval_policy;
pub mod outcome;
pub mod streak;
