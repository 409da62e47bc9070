//! Local caching module for offline data access.
//!
//! This module provides the `CacheManager` for storing and retrieving the
//! leave-request collection locally. The cache is a write-through shadow of
//! the registry's in-memory collection: it is overwritten wholesale on every
//! successful mutation and read back only when the backend is unreachable.
//!
//! Data is cached in JSON format and considered stale after 60 minutes.

pub mod manager;

pub use manager::{CacheManager, CachedData};
