//! Redis backing store.
//!
//! Every [`WriteBatch`] becomes one `MULTI`/`EXEC` pipeline, so readers see a
//! view's old generation or its new one. Guarded batches run as a Lua script:
//! redis executes it without interleaving other clients' commands, so the guard
//! check and the writes form one step.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::{debug, info};

use crate::cache::{BackingStore, FieldGuard, StoreError, WriteBatch, WriteOp};
use crate::config::RedisSettings;

use super::error::InfraError;

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(settings: &RedisSettings) -> Result<Self, InfraError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(settings.retries)
            .set_connection_timeout(settings.connection_timeout);

        let client = Client::open(settings.url.as_str())
            .map_err(|err| InfraError::redis("url parse", err))?;
        let manager = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|err| InfraError::redis("connect", err))?;

        info!(retries = settings.retries, "Connected to redis");
        Ok(Self { manager })
    }
}

/// KEYS[1] is the guard hash. ARGV holds the guard field, `1`/`0` for whether
/// a value is expected, the expected value, then the ops flattened as
/// `hset key field value`, `sadd key member` and `del key`.
const GUARDED_BATCH_LUA: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if ARGV[2] == '1' then
  if current ~= ARGV[3] then return 0 end
elseif current then
  return 0
end
local i = 4
while i <= #ARGV do
  local op = ARGV[i]
  if op == 'hset' then
    redis.call('HSET', ARGV[i + 1], ARGV[i + 2], ARGV[i + 3])
    i = i + 4
  elseif op == 'sadd' then
    redis.call('SADD', ARGV[i + 1], ARGV[i + 2])
    i = i + 3
  elseif op == 'del' then
    redis.call('DEL', ARGV[i + 1])
    i = i + 2
  else
    return redis.error_reply('unknown batch op ' .. op)
  end
end
return 1
"#;

static GUARDED_BATCH: LazyLock<Script> = LazyLock::new(|| Script::new(GUARDED_BATCH_LUA));

fn guarded_args(guard: &FieldGuard, batch: WriteBatch) -> Vec<String> {
    let mut args = vec![guard.field.clone()];
    match &guard.expected {
        Some(expected) => args.extend(["1".to_string(), expected.clone()]),
        None => args.extend(["0".to_string(), String::new()]),
    }
    for op in batch {
        match op {
            WriteOp::HashSet { key, field, value } => {
                args.extend(["hset".to_string(), key, field, value]);
            }
            WriteOp::SetAdd { key, member } => {
                args.extend(["sadd".to_string(), key, member]);
            }
            WriteOp::Delete { key } => {
                args.extend(["del".to_string(), key]);
            }
        }
    }
    args
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Protocol(err.to_string())
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn execute(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let ops = batch.len();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch {
            match op {
                WriteOp::HashSet { key, field, value } => {
                    pipe.hset(key, field, value).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
                WriteOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
            }
        }

        let mut conn = self.manager.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)?;
        debug!(ops, "Redis batch committed");
        Ok(())
    }

    async fn execute_if(&self, guard: &FieldGuard, batch: WriteBatch) -> Result<bool, StoreError> {
        let ops = batch.len();
        let mut invocation = GUARDED_BATCH.prepare_invoke();
        invocation.key(guard.key.as_str());
        for arg in guarded_args(guard, batch) {
            invocation.arg(arg);
        }

        let mut conn = self.manager.clone();
        let applied: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        debug!(ops, applied = applied == 1, "Redis guarded batch evaluated");
        Ok(applied == 1)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.hgetall(key).await.map_err(map_redis_error)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.hget(key, field).await.map_err(map_redis_error)
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.smembers(key).await.map_err(map_redis_error)
    }
}
