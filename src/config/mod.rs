//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, InspectArgs, Overrides, ResyncArgs, RunArgs, ViewArg};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "postrank";
const ENV_PREFIX: &str = "POSTRANK";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_REDIS_CONNECTION_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REDIS_RETRIES: u64 = 3;
const DEFAULT_VIEW_CAPACITY: u64 = 20;
const DEFAULT_KEY_PREFIX: &str = "postrank";
const DEFAULT_QUEUE_LIMIT: u64 = 1024;
const DEFAULT_CONSUME_BATCH_LIMIT: u64 = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_HEAD_COMMENT_LIMIT: u32 = 2;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub connection_timeout: Duration,
    pub retries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub view_capacity: NonZeroUsize,
    pub key_prefix: String,
    pub queue_limit: NonZeroUsize,
    pub consume_batch_limit: NonZeroUsize,
    pub poll_interval: Duration,
    /// `None` disables scheduled resyncs.
    pub resync_interval: Option<Duration>,
    pub head_comment_limit: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Run(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Resync(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Inspect(args)) => raw.apply_overrides(&args.overrides),
        None => raw.apply_overrides(&Overrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(capacity) = overrides.cache_view_capacity {
            self.cache.view_capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            redis,
            cache,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            redis: build_redis_settings(redis)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_connections.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let url = redis
        .url
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    if url.is_empty() {
        return Err(LoadError::invalid("redis.url", "url must not be empty"));
    }

    let timeout_ms = redis
        .connection_timeout_ms
        .unwrap_or(DEFAULT_REDIS_CONNECTION_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "redis.connection_timeout_ms",
            "must be greater than zero",
        ));
    }

    let retries = redis.retries.unwrap_or(DEFAULT_REDIS_RETRIES);
    let retries = usize::try_from(retries).map_err(|_| {
        LoadError::invalid("redis.retries", "value exceeds supported range for usize")
    })?;

    Ok(RedisSettings {
        url,
        connection_timeout: Duration::from_millis(timeout_ms),
        retries,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match cache.backend.as_deref().map(str::trim) {
        None | Some("redis") => CacheBackend::Redis,
        Some("memory") => CacheBackend::Memory,
        Some(other) => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{other}`; expected `redis` or `memory`"),
            ));
        }
    };

    let key_prefix = cache
        .key_prefix
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
    if key_prefix.is_empty() {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "prefix must not be empty",
        ));
    }
    if key_prefix.contains(char::is_whitespace) {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "prefix must not contain whitespace",
        ));
    }

    let poll_interval_ms = cache.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        return Err(LoadError::invalid(
            "cache.poll_interval_ms",
            "must be greater than zero",
        ));
    }

    let resync_interval = cache
        .resync_interval_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        backend,
        // Capacity doubles as the primary-store listing limit, which is a u32.
        view_capacity: non_zero_usize(
            non_zero_u32(
                cache.view_capacity.unwrap_or(DEFAULT_VIEW_CAPACITY),
                "cache.view_capacity",
            )?
            .get()
            .into(),
            "cache.view_capacity",
        )?,
        key_prefix,
        queue_limit: non_zero_usize(
            cache.queue_limit.unwrap_or(DEFAULT_QUEUE_LIMIT),
            "cache.queue_limit",
        )?,
        consume_batch_limit: non_zero_usize(
            cache
                .consume_batch_limit
                .unwrap_or(DEFAULT_CONSUME_BATCH_LIMIT),
            "cache.consume_batch_limit",
        )?,
        poll_interval: Duration::from_millis(poll_interval_ms),
        resync_interval,
        head_comment_limit: cache
            .head_comment_limit
            .unwrap_or(DEFAULT_HEAD_COMMENT_LIMIT),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
    connection_timeout_ms: Option<u64>,
    retries: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    backend: Option<String>,
    view_capacity: Option<u64>,
    key_prefix: Option<String>,
    queue_limit: Option<u64>,
    consume_batch_limit: Option<u64>,
    poll_interval_ms: Option<u64>,
    resync_interval_secs: Option<u64>,
    head_comment_limit: Option<u32>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
