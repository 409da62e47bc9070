//! Session-scoped registry of leave requests.
//!
//! The registry owns the canonical in-memory collection, exposes the command
//! surface (`submit`, `decide`) and query surface to the presentation layer,
//! and reconciles the authoritative store with the local cache. It is an
//! explicit, owned object constructed per session - there is no module-level
//! state.
//!
//! Failure policy:
//! - write-path failures (`submit`, `decide`) surface to the caller and the
//!   collection keeps its pre-call value; nothing is fabricated locally
//! - read-path failures degrade to cached data; the degraded condition stays
//!   observable through [`LeaveRegistry::degraded`]

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{Actor, Role};
use crate::cache::CacheManager;
use crate::models::{Decision, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::store::LeaveStore;

/// Errors surfaced by registry commands.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("role {0} may not decide leave requests")]
    Forbidden(Role),

    #[error("no leave request with id {0}")]
    NotFound(String),

    #[error("reason must not be empty")]
    EmptyReason,

    #[error("leave start date is after its end date")]
    InvalidDateRange,

    #[error("failed to submit leave request")]
    SubmissionFailed(#[source] anyhow::Error),

    #[error("failed to update leave request")]
    UpdateFailed(#[source] anyhow::Error),
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Collection adopted from the authoritative store.
    Fresh,
    /// Store unreachable; best-effort collection adopted from cache.
    Degraded,
    /// No actor; collection cleared.
    SignedOut,
}

/// The leave-request registry.
///
/// Generic over the store so the remote client, the seeded offline source,
/// and test doubles all plug in through the same contract.
pub struct LeaveRegistry<S> {
    store: S,
    cache: CacheManager,
    leaves: Vec<LeaveRequest>,
    degraded: bool,
}

impl<S: LeaveStore> LeaveRegistry<S> {
    pub fn new(store: S, cache: CacheManager) -> Self {
        Self {
            store,
            cache,
            leaves: Vec::new(),
            degraded: false,
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Rebuild the collection for the given actor. Call on every actor
    /// change: sign-in, sign-out, role switch.
    ///
    /// With no actor the collection is cleared; nothing is served across a
    /// logged-out state. Otherwise the store is fetched and adopted, and on
    /// failure the cache stands in as a best-effort substitute while the
    /// degraded flag is raised.
    pub async fn reconcile(&mut self, actor: Option<&Actor>) -> SyncOutcome {
        let Some(actor) = actor else {
            self.leaves.clear();
            self.degraded = false;
            debug!("No actor; collection cleared");
            return SyncOutcome::SignedOut;
        };

        match self.store.fetch_all().await {
            Ok(records) => {
                self.leaves = dedup_by_id(records);
                self.degraded = false;
                self.mirror_cache();
                info!(actor_id = %actor.id, count = self.leaves.len(), "Collection reconciled");
                SyncOutcome::Fresh
            }
            Err(e) => {
                warn!(error = %e, "Store fetch failed, falling back to cache");
                self.leaves = match self.cache.load_leaves() {
                    Ok(Some(cached)) => {
                        debug!(age_minutes = cached.age_minutes(), "Serving cached collection");
                        dedup_by_id(cached.data)
                    }
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        // Malformed cache is absent data, never a crash
                        debug!(error = %e, "Cache unreadable, starting empty");
                        Vec::new()
                    }
                };
                self.degraded = true;
                SyncOutcome::Degraded
            }
        }
    }

    /// Whether the collection currently comes from the cache because the
    /// authoritative store was unreachable.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Submit a new leave request as the current actor.
    ///
    /// The store is authoritative for new records: nothing is created
    /// locally until it confirms, so a failed submission leaves the
    /// collection untouched.
    pub async fn submit(
        &mut self,
        actor: Option<&Actor>,
        data: NewLeaveRequest,
    ) -> Result<LeaveRequest, RegistryError> {
        let actor = actor.ok_or(RegistryError::Unauthenticated)?;

        if data.reason.trim().is_empty() {
            return Err(RegistryError::EmptyReason);
        }
        if data.from_date > data.to_date {
            return Err(RegistryError::InvalidDateRange);
        }

        match self.store.create(actor, &data).await {
            Ok(created) => {
                // The store owns id assignment; drop any stale copy before
                // prepending so ids stay unique
                self.leaves.retain(|l| l.id != created.id);
                self.leaves.insert(0, created.clone());
                self.mirror_cache();
                info!(id = %created.id, student = %created.student_name, "Leave request submitted");
                Ok(created)
            }
            Err(e) => {
                warn!(error = %e, "Leave submission failed");
                Err(RegistryError::SubmissionFailed(e))
            }
        }
    }

    /// Apply an approve/reject decision to one request.
    ///
    /// Only the matching role's approval slot moves; status and final
    /// approval are recomputed by the store through the shared derivation.
    /// The store-confirmed record replaces the local entry - the client
    /// never trusts its own recomputation once the store has answered.
    pub async fn decide(
        &mut self,
        actor: Option<&Actor>,
        id: &str,
        decision: Decision,
    ) -> Result<LeaveRequest, RegistryError> {
        let actor = actor.ok_or(RegistryError::Unauthenticated)?;

        let idx = self
            .leaves
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if actor.role.approver().is_none() {
            return Err(RegistryError::Forbidden(actor.role));
        }

        match self.store.update(actor, id, decision).await {
            Ok(updated) => {
                self.leaves[idx] = updated.clone();
                self.mirror_cache();
                info!(id, role = %actor.role, status = ?updated.status, "Leave request decided");
                Ok(updated)
            }
            Err(e) => {
                warn!(id, error = %e, "Leave decision failed");
                Err(RegistryError::UpdateFailed(e))
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All requests submitted by the given student, most recent first.
    pub fn leaves_for_student(&self, student_id: &str) -> Vec<LeaveRequest> {
        self.leaves
            .iter()
            .filter(|l| l.student_id == student_id)
            .cloned()
            .collect()
    }

    /// All requests still awaiting a decision.
    pub fn pending(&self) -> Vec<LeaveRequest> {
        self.leaves
            .iter()
            .filter(|l| l.status == LeaveStatus::Pending)
            .cloned()
            .collect()
    }

    /// The full collection, unfiltered, in collection order.
    pub fn all(&self) -> &[LeaveRequest] {
        &self.leaves
    }

    /// Mirror the collection into the local cache. Mirror failures only
    /// cost offline fallback freshness, so they are logged, not surfaced.
    fn mirror_cache(&self) {
        if let Err(e) = self.cache.save_leaves(&self.leaves) {
            warn!(error = %e, "Failed to mirror leave collection to cache");
        }
    }
}

/// Deduplicate records by id: the last occurrence of each id wins, and the
/// result keeps the order of those last occurrences.
fn dedup_by_id(records: Vec<LeaveRequest>) -> Vec<LeaveRequest> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        last_index.insert(record.id.clone(), i);
    }
    records
        .into_iter()
        .enumerate()
        .filter(|(i, record)| last_index[&record.id] == *i)
        .map(|(_, record)| record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use crate::auth::Role;
    use crate::models::leave::{default_from_time, default_to_time};
    use crate::models::LeaveType;
    use crate::store::SeedStore;

    /// Store double whose every call fails, for exercising the degraded and
    /// write-failure paths.
    struct UnreachableStore;

    #[async_trait]
    impl LeaveStore for UnreachableStore {
        async fn create(&self, _actor: &Actor, _data: &NewLeaveRequest) -> Result<LeaveRequest> {
            bail!("connection refused")
        }

        async fn fetch_all(&self) -> Result<Vec<LeaveRequest>> {
            bail!("connection refused")
        }

        async fn update(
            &self,
            _actor: &Actor,
            _id: &str,
            _decision: Decision,
        ) -> Result<LeaveRequest> {
            bail!("connection refused")
        }
    }

    fn actor(id: &str, name: &str, role: Role) -> Actor {
        Actor {
            id: id.to_string(),
            name: name.to_string(),
            role,
        }
    }

    fn student() -> Actor {
        actor("1", "John Student", Role::Student)
    }

    fn parent() -> Actor {
        actor("2", "Mary Parent", Role::Parent)
    }

    fn admin() -> Actor {
        actor("3", "Alex Admin", Role::Admin)
    }

    fn trip_request() -> NewLeaveRequest {
        NewLeaveRequest {
            leave_type: LeaveType::HomeLeave,
            from_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
            from_time: default_from_time(),
            to_time: default_to_time(),
            reason: "trip".to_string(),
        }
    }

    fn record(id: &str, student_id: &str, reason: &str) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: id.to_string(),
            student_id: student_id.to_string(),
            student_name: "John Student".to_string(),
            leave_type: LeaveType::HomeLeave,
            from_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
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
    }

    fn temp_cache(tag: &str) -> CacheManager {
        let dir = std::env::temp_dir().join(format!(
            "hostelpass-registry-test-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        CacheManager::new(dir).expect("temp cache dir")
    }

    fn registry<S: LeaveStore>(store: S, tag: &str) -> LeaveRegistry<S> {
        LeaveRegistry::new(store, temp_cache(tag))
    }

    // ===== Dedup =====

    #[test]
    fn test_dedup_last_occurrence_wins() {
        let records = vec![
            record("1", "1", "first payload"),
            record("2", "1", "other"),
            record("1", "1", "second payload"),
        ];
        let deduped = dedup_by_id(records);
        assert_eq!(deduped.len(), 2);
        // Order follows each id's last occurrence
        assert_eq!(deduped[0].id, "2");
        assert_eq!(deduped[1].id, "1");
        assert_eq!(deduped[1].reason, "second payload");
    }

    #[test]
    fn test_dedup_is_identity_on_unique_ids() {
        let records = vec![record("1", "1", "a"), record("2", "1", "b")];
        let deduped = dedup_by_id(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, "1");
    }

    // ===== Submit =====

    #[tokio::test]
    async fn test_submit_creates_pending_request() {
        let mut reg = registry(SeedStore::with_records(vec![]), "submit");
        let created = reg.submit(Some(&student()), trip_request()).await.unwrap();

        assert_eq!(created.status, LeaveStatus::Pending);
        assert!(!created.parent_approval);
        assert!(!created.admin_approval);
        assert_eq!(created.student_id, "1");
        assert_eq!(created.student_name, "John Student");
        assert_eq!(reg.all().len(), 1);
        assert_eq!(reg.all()[0].id, created.id);
    }

    #[tokio::test]
    async fn test_submit_requires_actor() {
        let mut reg = registry(SeedStore::with_records(vec![]), "submit-noactor");
        let err = reg.submit(None, trip_request()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_reason() {
        let mut reg = registry(SeedStore::with_records(vec![]), "submit-reason");
        let mut data = trip_request();
        data.reason = "   ".to_string();
        let err = reg.submit(Some(&student()), data).await.unwrap_err();
        assert!(matches!(err, RegistryError::EmptyReason));
        assert!(reg.all().is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_inverted_date_range() {
        let mut reg = registry(SeedStore::with_records(vec![]), "submit-dates");
        let mut data = trip_request();
        data.from_date = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let err = reg.submit(Some(&student()), data).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDateRange));
    }

    #[tokio::test]
    async fn test_failed_submit_leaves_collection_unchanged() {
        let mut reg = registry(UnreachableStore, "submit-fail");
        let err = reg.submit(Some(&student()), trip_request()).await.unwrap_err();
        assert!(matches!(err, RegistryError::SubmissionFailed(_)));
        assert!(reg.all().is_empty());
    }

    // ===== Decide =====

    #[tokio::test]
    async fn test_dual_approval_end_to_end() {
        let mut reg = registry(SeedStore::with_records(vec![]), "decide-e2e");
        let created = reg.submit(Some(&student()), trip_request()).await.unwrap();

        let after_parent = reg
            .decide(Some(&parent()), &created.id, Decision::Approved)
            .await
            .unwrap();
        assert_eq!(after_parent.status, LeaveStatus::Pending);
        assert!(after_parent.parent_approval);
        assert!(!after_parent.final_approval);

        let after_admin = reg
            .decide(Some(&admin()), &created.id, Decision::Approved)
            .await
            .unwrap();
        assert_eq!(after_admin.status, LeaveStatus::Approved);
        assert!(after_admin.final_approval);

        // The registry adopted the store-confirmed record
        assert_eq!(reg.all()[0].status, LeaveStatus::Approved);
    }

    #[tokio::test]
    async fn test_parent_rejection_then_admin_approval_is_pending() {
        let mut reg = registry(SeedStore::with_records(vec![]), "decide-reopen");
        let created = reg.submit(Some(&student()), trip_request()).await.unwrap();

        reg.decide(Some(&parent()), &created.id, Decision::Rejected)
            .await
            .unwrap();
        let after = reg
            .decide(Some(&admin()), &created.id, Decision::Approved)
            .await
            .unwrap();

        // Admin cannot speak for the parent slot
        assert_eq!(after.status, LeaveStatus::Pending);
        assert!(!after.parent_approval);
        assert!(after.admin_approval);
    }

    #[tokio::test]
    async fn test_decide_requires_actor() {
        let mut reg = registry(SeedStore::with_records(vec![]), "decide-noactor");
        let created = reg.submit(Some(&student()), trip_request()).await.unwrap();

        let err = reg
            .decide(None, &created.id, Decision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthenticated));
        assert_eq!(reg.all()[0].status, LeaveStatus::Pending);
    }

    #[tokio::test]
    async fn test_decide_forbidden_for_students() {
        let mut reg = registry(SeedStore::with_records(vec![]), "decide-forbidden");
        let created = reg.submit(Some(&student()), trip_request()).await.unwrap();

        let err = reg
            .decide(Some(&student()), &created.id, Decision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(Role::Student)));
    }

    #[tokio::test]
    async fn test_decide_unknown_id() {
        let mut reg = registry(SeedStore::with_records(vec![]), "decide-notfound");
        let err = reg
            .decide(Some(&admin()), "missing", Decision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_decide_keeps_local_record() {
        let mut reg = registry(UnreachableStore, "decide-fail");
        reg.leaves = vec![record("1", "1", "trip")];

        let err = reg
            .decide(Some(&admin()), "1", Decision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UpdateFailed(_)));
        assert_eq!(reg.all()[0].status, LeaveStatus::Pending);
        assert!(!reg.all()[0].admin_approval);
    }

    // ===== Queries =====

    #[tokio::test]
    async fn test_queries_filter_and_preserve_order() {
        let mut reg = registry(SeedStore::with_records(vec![]), "queries");
        let first = reg.submit(Some(&student()), trip_request()).await.unwrap();
        let mut second_data = trip_request();
        second_data.reason = "second".to_string();
        let second = reg.submit(Some(&student()), second_data).await.unwrap();
        let other = actor("9", "Dana Student", Role::Student);
        reg.submit(Some(&other), trip_request()).await.unwrap();

        // Most recent first: creation prepends
        let mine = reg.leaves_for_student("1");
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert_eq!(mine[1].id, first.id);

        assert_eq!(reg.pending().len(), 3);
        reg.decide(Some(&parent()), &first.id, Decision::Rejected)
            .await
            .unwrap();
        assert_eq!(reg.pending().len(), 2);
        assert_eq!(reg.all().len(), 3);
    }

    // ===== Reconciliation =====

    #[tokio::test]
    async fn test_reconcile_without_actor_clears_collection() {
        let mut reg = registry(SeedStore::new(), "reconcile-signout");
        assert_eq!(reg.reconcile(Some(&student())).await, SyncOutcome::Fresh);
        assert_eq!(reg.all().len(), 3);

        assert_eq!(reg.reconcile(None).await, SyncOutcome::SignedOut);
        assert!(reg.all().is_empty());
        assert!(!reg.degraded());
    }

    #[tokio::test]
    async fn test_reconcile_dedups_fetched_records() {
        let store = SeedStore::with_records(vec![
            record("1", "1", "stale copy"),
            record("1", "1", "fresh copy"),
        ]);
        let mut reg = registry(store, "reconcile-dedup");
        reg.reconcile(Some(&student())).await;

        assert_eq!(reg.all().len(), 1);
        assert_eq!(reg.all()[0].reason, "fresh copy");
    }

    #[tokio::test]
    async fn test_reconcile_falls_back_to_cache_when_degraded() {
        let cache = temp_cache("reconcile-degraded");
        cache.save_leaves(&[record("1", "1", "cached trip")]).unwrap();

        let mut reg = LeaveRegistry::new(UnreachableStore, cache);
        let outcome = reg.reconcile(Some(&student())).await;

        assert_eq!(outcome, SyncOutcome::Degraded);
        assert!(reg.degraded());
        assert_eq!(reg.all().len(), 1);
        assert_eq!(reg.all()[0].id, "1");
        assert_eq!(reg.all()[0].status, LeaveStatus::Pending);
    }

    #[tokio::test]
    async fn test_reconcile_treats_malformed_cache_as_absent() {
        let cache = temp_cache("reconcile-malformed");
        cache.save_leaves(&[record("1", "1", "x")]).unwrap();
        // Corrupt the cache file underneath the manager
        let dir = std::env::temp_dir().join(format!(
            "hostelpass-registry-test-reconcile-malformed-{}",
            std::process::id()
        ));
        std::fs::write(dir.join("leaves.json"), "not json {{{").unwrap();

        let mut reg = LeaveRegistry::new(UnreachableStore, cache);
        let outcome = reg.reconcile(Some(&student())).await;

        assert_eq!(outcome, SyncOutcome::Degraded);
        assert!(reg.all().is_empty());
    }

    #[tokio::test]
    async fn test_successful_reconcile_clears_degraded_flag() {
        let cache = temp_cache("reconcile-recover");
        let mut reg = LeaveRegistry::new(UnreachableStore, cache);
        reg.reconcile(Some(&student())).await;
        assert!(reg.degraded());

        let cache = temp_cache("reconcile-recover2");
        let mut reg = LeaveRegistry::new(SeedStore::new(), cache);
        reg.reconcile(Some(&student())).await;
        assert!(!reg.degraded());
    }

    #[tokio::test]
    async fn test_mutations_mirror_into_cache() {
        let tag = "mirror";
        let mut reg = registry(SeedStore::with_records(vec![]), tag);
        let created = reg.submit(Some(&student()), trip_request()).await.unwrap();

        // A second registry over the same cache dir sees the shadow copy
        let reread = temp_cache_no_reset(tag);
        let cached = reread.load_leaves().unwrap().expect("mirrored collection");
        assert_eq!(cached.data.len(), 1);
        assert_eq!(cached.data[0].id, created.id);
    }

    fn temp_cache_no_reset(tag: &str) -> CacheManager {
        let dir = std::env::temp_dir().join(format!(
            "hostelpass-registry-test-{}-{}",
            tag,
            std::process::id()
        ));
        CacheManager::new(dir).expect("temp cache dir")
    }
}
