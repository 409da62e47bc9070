//! Data models for hostelpass entities.
//!
//! This module contains the data structures for the sole domain entity,
//! the leave request, together with the dual-approval state machine:
//!
//! - `LeaveRequest`: a student's leave request with both approval slots
//! - `NewLeaveRequest`: the submission payload
//! - `LeaveType`, `LeaveStatus`, `Decision`: closed enumerations
//! - `derive_status`: the single pure derivation every mutation path uses

pub mod leave;

pub use leave::{
    derive_status, Decision, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest,
};
