//! Storage abstraction over the authoritative leave-record store.
//!
//! `LeaveStore` is the read/write contract the registry depends on. Two
//! implementations exist: the remote `ApiClient` (the normal backend) and
//! `SeedStore`, an in-memory offline source carrying demo records. Which one
//! runs is a configuration decision, made once in `ConfiguredStore`, never a
//! hard-coded fallback branch inside the client.

pub mod seed;

pub use seed::SeedStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::api::ApiClient;
use crate::auth::Actor;
use crate::config::Config;
use crate::models::{Decision, LeaveRequest, NewLeaveRequest};

/// Read/write contract shared by the remote client and the offline source.
///
/// The store is authoritative: `create` assigns the id and timestamps, and
/// `update` returns the record whose derived fields the registry adopts.
#[async_trait]
pub trait LeaveStore: Send + Sync {
    /// Create a new leave request on behalf of the actor.
    async fn create(&self, actor: &Actor, data: &NewLeaveRequest) -> Result<LeaveRequest>;

    /// Fetch all records visible to the current actor.
    async fn fetch_all(&self) -> Result<Vec<LeaveRequest>>;

    /// Apply an approve/reject decision and return the updated record.
    async fn update(&self, actor: &Actor, id: &str, decision: Decision) -> Result<LeaveRequest>;
}

/// Store backend selected from configuration.
pub enum ConfiguredStore {
    Remote(ApiClient),
    Seed(SeedStore),
}

impl ConfiguredStore {
    pub fn from_config(config: &Config, api: ApiClient) -> Self {
        if config.offline_mode {
            ConfiguredStore::Seed(SeedStore::new())
        } else {
            ConfiguredStore::Remote(api)
        }
    }
}

#[async_trait]
impl LeaveStore for ConfiguredStore {
    async fn create(&self, actor: &Actor, data: &NewLeaveRequest) -> Result<LeaveRequest> {
        match self {
            ConfiguredStore::Remote(api) => api.create(actor, data).await,
            ConfiguredStore::Seed(seed) => seed.create(actor, data).await,
        }
    }

    async fn fetch_all(&self) -> Result<Vec<LeaveRequest>> {
        match self {
            ConfiguredStore::Remote(api) => api.fetch_all().await,
            ConfiguredStore::Seed(seed) => seed.fetch_all().await,
        }
    }

    async fn update(&self, actor: &Actor, id: &str, decision: Decision) -> Result<LeaveRequest> {
        match self {
            ConfiguredStore::Remote(api) => api.update(actor, id, decision).await,
            ConfiguredStore::Seed(seed) => seed.update(actor, id, decision).await,
        }
    }
}
