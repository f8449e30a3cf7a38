//! Metric names emitted by view maintenance.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

pub const EVENT_QUEUE_LEN: &str = "postrank_cache_event_queue_len";
pub const EVENT_COLLAPSED_TOTAL: &str = "postrank_cache_event_collapsed_total";
pub const CONSUME_MS: &str = "postrank_cache_consume_ms";
/// Labelled by `view`.
pub const RESYNC_MS: &str = "postrank_cache_resync_ms";
/// Labelled by `view`.
pub const RESYNC_FAILED_TOTAL: &str = "postrank_cache_resync_failed_total";

/// Register units and help text with the installed recorder.
pub fn describe() {
    describe_gauge!(
        EVENT_QUEUE_LEN,
        Unit::Count,
        "Cache events waiting for the consumer."
    );
    describe_counter!(
        EVENT_COLLAPSED_TOTAL,
        Unit::Count,
        "Pending cache events folded into a full resync on queue overflow."
    );
    describe_histogram!(
        CONSUME_MS,
        Unit::Milliseconds,
        "Time spent planning and dispatching one drained batch."
    );
    describe_histogram!(
        RESYNC_MS,
        Unit::Milliseconds,
        "Full rebuild latency of one view."
    );
    describe_counter!(
        RESYNC_FAILED_TOTAL,
        Unit::Count,
        "View maintenance work aborted by a store or primary-store error."
    );
}
