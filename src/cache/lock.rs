use std::sync::LockResult;

use tracing::warn;

/// Unwrap a std lock result, recovering the guard when a holder panicked.
///
/// Cache state is always rebuildable from the primary store, so a poisoned
/// lock degrades to possibly-stale data instead of taking the worker down.
pub(crate) fn recover<G>(result: LockResult<G>, target: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            result = "poisoned_recovered",
            hint = "state may be stale after panic in another thread",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}
