//! Domain model for leave requests and the dual-approval state machine.
//!
//! A request reaches `Approved` only when both the parent and an
//! administrator have approved it; a rejection from either side moves it to
//! `Rejected`. Both slots are plain booleans, and `status`/`final_approval`
//! are always recomputed from them through [`derive_status`] - never set
//! independently. A later approval from the same role that rejected earlier
//! re-opens the request; the state machine is an idempotent recomputation,
//! not a ratchet.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Approver;

/// Leave window start time used when the student does not pick one.
/// Morning roll call at the hostel is 08:00.
pub fn default_from_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).expect("valid constant time")
}

/// Leave window end time used when the student does not pick one.
/// Evening curfew at the hostel is 18:00.
pub fn default_to_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).expect("valid constant time")
}

/// Category of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    HomeLeave,
    OneDayLeave,
    MedicalLeave,
    EmergencyLeave,
    Other,
}

impl LeaveType {
    /// Human-readable label for display surfaces.
    pub fn label(&self) -> &'static str {
        match self {
            LeaveType::HomeLeave => "Home Leave",
            LeaveType::OneDayLeave => "One Day Leave",
            LeaveType::MedicalLeave => "Medical Leave",
            LeaveType::EmergencyLeave => "Emergency Leave",
            LeaveType::Other => "Other",
        }
    }
}

/// Overall status of a leave request, derived from the two approval slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// A single approve/reject decision issued by a parent or admin.
/// Serializes to the `status` value the backend expects on PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

/// A student's leave request.
///
/// `id`, `student_id` and `student_name` are set at creation and immutable
/// thereafter. The approval booleans are each owned by the matching role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub leave_type: LeaveType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(default = "default_from_time")]
    pub from_time: NaiveTime,
    #[serde(default = "default_to_time")]
    pub to_time: NaiveTime,
    pub reason: String,
    pub status: LeaveStatus,
    // Older backend records predate these fields, so default them
    #[serde(default)]
    pub parent_approval: bool,
    #[serde(default)]
    pub admin_approval: bool,
    #[serde(default)]
    pub final_approval: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission payload for a new leave request.
/// Student identity is taken from the session, never from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLeaveRequest {
    pub leave_type: LeaveType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(default = "default_from_time")]
    pub from_time: NaiveTime,
    #[serde(default = "default_to_time")]
    pub to_time: NaiveTime,
    pub reason: String,
}

/// Derive `(status, final_approval)` from the two approval slots and the
/// decision that was just applied.
///
/// The booleans are the post-decision values. A rejection wins outright;
/// otherwise the request is approved only once both slots agree, and stays
/// pending until then.
pub fn derive_status(
    parent_approval: bool,
    admin_approval: bool,
    decision: Decision,
) -> (LeaveStatus, bool) {
    match decision {
        Decision::Rejected => (LeaveStatus::Rejected, false),
        Decision::Approved if parent_approval && admin_approval => (LeaveStatus::Approved, true),
        Decision::Approved => (LeaveStatus::Pending, false),
    }
}

impl LeaveRequest {
    /// Apply a decision from one approver slot and recompute the derived
    /// fields. This is the only mutation path for approvals; remote and
    /// offline stores both funnel through it.
    pub fn apply_decision(&mut self, approver: Approver, decision: Decision) {
        match approver {
            Approver::Parent => self.parent_approval = decision == Decision::Approved,
            Approver::Admin => self.admin_approval = decision == Decision::Approved,
        }
        let (status, final_approval) =
            derive_status(self.parent_approval, self.admin_approval, decision);
        self.status = status;
        self.final_approval = final_approval;
        self.updated_at = Utc::now();
    }
}
