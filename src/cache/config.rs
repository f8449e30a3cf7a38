//! Cache configuration.
//!
//! Built from the `[cache]` section of `postrank.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_VIEW_CAPACITY: usize = 20;
const DEFAULT_KEY_PREFIX: &str = "postrank";
const DEFAULT_QUEUE_LIMIT: usize = 1024;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 0;
const DEFAULT_HEAD_COMMENT_LIMIT: u32 = 2;

/// Runtime cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Publish maintenance events at all.
    pub enabled: bool,
    /// Maximum entries held by every view.
    pub view_capacity: usize,
    /// Namespace prefix for backing-store keys.
    pub key_prefix: String,
    /// Maximum pending events before the queue collapses into a full resync.
    pub queue_limit: usize,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
    /// Fallback wake-up interval (ms) for the consumer loop.
    pub poll_interval_ms: u64,
    /// Scheduled full resync cadence; zero disables it.
    pub resync_interval_secs: u64,
    /// Comments embedded in each latest entry.
    pub head_comment_limit: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            view_capacity: DEFAULT_VIEW_CAPACITY,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            queue_limit: DEFAULT_QUEUE_LIMIT,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            head_comment_limit: DEFAULT_HEAD_COMMENT_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            view_capacity: settings.view_capacity.get(),
            key_prefix: settings.key_prefix.clone(),
            queue_limit: settings.queue_limit.get(),
            consume_batch_limit: settings.consume_batch_limit.get(),
            poll_interval_ms: settings.poll_interval.as_millis() as u64,
            resync_interval_secs: settings
                .resync_interval
                .map(|interval| interval.as_secs())
                .unwrap_or(0),
            head_comment_limit: settings.head_comment_limit,
        }
    }
}

impl CacheConfig {
    /// View capacity, clamped to at least one slot.
    pub fn view_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.view_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Queue limit, clamped to at least one event.
    pub fn queue_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.queue_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }
}
