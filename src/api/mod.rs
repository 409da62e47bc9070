//! REST API client module for the hostelpass backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend that is authoritative for leave records, and the `ApiError`
//! taxonomy mapped from HTTP status codes.
//!
//! The API uses JWT bearer token authentication obtained through the
//! `/auth/login` endpoint.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
