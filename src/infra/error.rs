use thiserror::Error;

/// Start-up and shutdown failures of the worker's external connections.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured")]
    MissingDatabaseUrl,
    #[error("postgres {stage} failed: {source}")]
    Postgres {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("redis {stage} failed: {source}")]
    Redis {
        stage: &'static str,
        #[source]
        source: redis::RedisError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

impl InfraError {
    pub fn postgres(stage: &'static str, source: sqlx::Error) -> Self {
        Self::Postgres { stage, source }
    }

    pub fn redis(stage: &'static str, source: redis::RedisError) -> Self {
        Self::Redis { stage, source }
    }
}
