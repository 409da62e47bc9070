//! Core library for hostelpass - a hostel leave-request approval tool.
//!
//! Students submit leave requests, parents and administrators independently
//! approve or reject them, and a final status is derived from both decisions.
//!
//! The crate is organized around a few collaborators:
//!
//! - [`LeaveRegistry`]: the session-scoped command surface. Owns the canonical
//!   in-memory collection, applies the dual-approval state machine, and
//!   reconciles remote and cached data.
//! - [`ApiClient`]: REST client for the hostelpass backend (the authoritative
//!   store for leave records).
//! - [`SeedStore`]: offline data source implementing the same read/write
//!   contract as the remote client, selected through [`ConfiguredStore`].
//! - [`CacheManager`]: local JSON cache used as a fallback when the backend
//!   is unreachable, and as a write-through shadow of the collection.
//! - [`Session`]: the current actor's identity (id, name, role) with
//!   disk persistence and token expiry.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod registry;
pub mod store;

pub use api::{ApiClient, ApiError};
pub use auth::{Actor, Approver, Role, Session, SessionData};
pub use cache::CacheManager;
pub use config::Config;
pub use models::{Decision, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest};
pub use registry::{LeaveRegistry, RegistryError, SyncOutcome};
pub use store::{ConfiguredStore, LeaveStore, SeedStore};
