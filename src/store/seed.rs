//! Offline data source seeded with demo records.
//!
//! Implements the same read/write contract as the remote client so the
//! registry can run untouched when the backend is out of reach or during
//! demos. Decisions are applied through the same pure derivation the server
//! uses, so status never diverges between the two stores.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use crate::auth::Actor;
use crate::models::leave::{default_from_time, default_to_time};
use crate::models::{Decision, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest};

use super::LeaveStore;

pub struct SeedStore {
    leaves: Mutex<Vec<LeaveRequest>>,
    // Seeded from the clock once, then strictly increasing. Ids must stay
    // unique across rapid back-to-back creates within a session.
    next_id: AtomicU64,
}

impl SeedStore {
    /// A store pre-populated with sample requests in each status.
    pub fn new() -> Self {
        Self::with_records(sample_leaves())
    }

    /// A store starting from the given records (empty for tests).
    pub fn with_records(records: Vec<LeaveRequest>) -> Self {
        Self {
            leaves: Mutex::new(records),
            next_id: AtomicU64::new(Utc::now().timestamp_millis() as u64),
        }
    }
}

impl Default for SeedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaveStore for SeedStore {
    async fn create(&self, actor: &Actor, data: &NewLeaveRequest) -> Result<LeaveRequest> {
        let now = Utc::now();
        let leave = LeaveRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
            student_id: actor.id.clone(),
            student_name: actor.name.clone(),
            leave_type: data.leave_type,
            from_date: data.from_date,
            to_date: data.to_date,
            from_time: data.from_time,
            to_time: data.to_time,
            reason: data.reason.clone(),
            status: LeaveStatus::Pending,
            parent_approval: false,
            admin_approval: false,
            final_approval: false,
            created_at: now,
            updated_at: now,
        };

        let mut leaves = self.leaves.lock().expect("seed store lock");
        leaves.insert(0, leave.clone());
        Ok(leave)
    }

    async fn fetch_all(&self) -> Result<Vec<LeaveRequest>> {
        let leaves = self.leaves.lock().expect("seed store lock");
        Ok(leaves.clone())
    }

    async fn update(&self, actor: &Actor, id: &str, decision: Decision) -> Result<LeaveRequest> {
        let approver = actor
            .role
            .approver()
            .with_context(|| format!("role {} cannot decide leave requests", actor.role))?;

        let mut leaves = self.leaves.lock().expect("seed store lock");
        let leave = leaves
            .iter_mut()
            .find(|l| l.id == id)
            .with_context(|| format!("no leave request with id {}", id))?;

        leave.apply_decision(approver, decision);
        Ok(leave.clone())
    }
}

/// Sample records shown before any real data exists: one in each status,
/// all belonging to the demo student account.
fn sample_leaves() -> Vec<LeaveRequest> {
    let now = Utc::now();
    let base = |id: &str, leave_type: LeaveType, from: NaiveDate, to: NaiveDate, reason: &str| {
        LeaveRequest {
            id: id.to_string(),
            student_id: "1".to_string(),
            student_name: "John Student".to_string(),
            leave_type,
            from_date: from,
            to_date: to,
            from_time: default_from_time(),
            to_time: default_to_time(),
            reason: reason.to_string(),
            status: LeaveStatus::Pending,
            parent_approval: false,
            admin_approval: false,
            final_approval: false,
            created_at: now,
            updated_at: now,
        }
    };

    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).expect("valid seed date");

    let mut approved = base(
        "1",
        LeaveType::HomeLeave,
        date(2023, 10, 12),
        date(2023, 10, 15),
        "Family function",
    );
    approved.status = LeaveStatus::Approved;
    approved.parent_approval = true;
    approved.admin_approval = true;
    approved.final_approval = true;
    approved.created_at = now - Duration::days(7);
    approved.updated_at = now - Duration::days(5);

    let mut rejected = base(
        "2",
        LeaveType::MedicalLeave,
        date(2023, 11, 5),
        date(2023, 11, 7),
        "Medical appointment",
    );
    rejected.status = LeaveStatus::Rejected;
    rejected.created_at = now - Duration::days(14);
    rejected.updated_at = now - Duration::days(13);

    let mut pending = base(
        "3",
        LeaveType::HomeLeave,
        date(2023, 12, 20),
        date(2023, 12, 25),
        "Winter holidays",
    );
    pending.created_at = now - Duration::days(2);
    pending.updated_at = now - Duration::days(2);

    vec![approved, rejected, pending]
}
