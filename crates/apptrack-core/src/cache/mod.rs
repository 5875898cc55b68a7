//! In-memory query caching.
//!
//! This module provides the `QueryCache` for keeping recent API responses so
//! repeated reads within a short window skip the network. Entries are keyed by
//! a query key such as `applications:status=offer` or `application:<id>`, and
//! writes invalidate every key under the affected prefix.

pub mod query;

pub use query::{CachedData, QueryCache};
