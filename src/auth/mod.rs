//! Identity and session management.
//!
//! This module provides:
//! - `Actor` and `Role`: the authenticated identity issuing commands.
//!   The core trusts this value and never re-derives it.
//! - `Session`: token-based session management with automatic expiry,
//!   persisted to disk across restarts.

pub mod session;

pub use session::{Actor, Approver, Role, Session, SessionData};
