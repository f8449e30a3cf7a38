//! Ranked post views
//!
//! Keeps two bounded, ranked projections of the primary store in a key-value
//! backing store:
//!
//! - **latest**: the most recently updated eligible posts, with head comments
//! - **hottest**: the top posts by `0.6 × follows + 0.4 × comments`
//!
//! Mutation paths call [`CacheTrigger`], which only enqueues; [`CacheConsumer`]
//! drains the queue and asks [`CacheRegistry`] to insert into or resync the
//! affected views. Every view write replaces its whole generation in one atomic
//! batch.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "redis"
//! view_capacity = 20
//! key_prefix = "postrank"
//! # ... see config.rs for all options
//! ```

mod config;
mod consumer;
mod events;
mod hottest;
mod keys;
mod latest;
mod lock;
pub mod metrics;
mod planner;
mod registry;
mod store;
mod trigger;
mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CacheConfig;
pub use consumer::CacheConsumer;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue, ResyncReason};
pub use hottest::{
    COMMENT_WEIGHT, FOLLOW_WEIGHT, HottestView, ScoreRecord, popularity_score, rank_candidates,
};
pub use keys::{ViewKeys, ViewKind, position_field};
pub use latest::{LatestView, recency_order};
pub use planner::ConsumptionPlan;
pub use registry::{CacheRegistry, DispatchOutcome, ViewFailure};
pub use store::{BackingStore, FieldGuard, MemoryStore, StoreError, WriteBatch, WriteOp};
pub use trigger::CacheTrigger;
pub use view::{CacheError, CachedPosition, View};
