use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter,
    filter::Directive,
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// sqlx logs every statement at info; the worker issues one per view resync.
const QUIET_SQLX: &str = "sqlx::query=warn";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber and describe the cache metrics.
///
/// `RUST_LOG` directives extend the configured base level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    METRIC_DESCRIPTIONS.call_once(cache::metrics::describe);

    let quiet_sqlx: Directive = QUIET_SQLX
        .parse()
        .map_err(|err| InfraError::Telemetry(format!("invalid directive `{QUIET_SQLX}`: {err}")))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy()
        .add_directive(quiet_sqlx);

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}
