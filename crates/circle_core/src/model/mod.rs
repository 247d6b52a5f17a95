//! Domain model for circles, check-ins and delivery endpoints.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and workflows.
//! - Keep input validation next to the shapes it protects.
//!
//! # Invariants
//! - Every user, circle, check-in and alert is identified by a stable UUID.
//! - A user's streak is only ever written together with a new check-in.

pub mod alert;
pub mod check_in;
pub mod circle;
pub mod endpoint;
pub mod user;
pub mod validation;
