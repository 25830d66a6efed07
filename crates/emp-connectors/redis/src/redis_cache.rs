use ::async_trait::async_trait;
use emp_core::{Error, Result, Snapshot, SnapshotCache, CACHE_KEY, DEFAULT_CACHE_TTL};
use redis::{aio::MultiplexedConnection, Client, ConnectionInfo, RedisError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., redis://localhost:6379)
    #[serde(default = "default_url")]
    pub url: String,

    /// Key the snapshot is stored under
    #[serde(default = "default_key")]
    pub key: String,

    /// Time-to-live of the cached snapshot in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Redis database number
    #[serde(default = "default_database")]
    pub database: i64,
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key() -> String {
    CACHE_KEY.to_string()
}

fn default_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

fn default_database() -> i64 {
    0
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key: default_key(),
            ttl_secs: default_ttl_secs(),
            database: default_database(),
        }
    }
}

/// Snapshot cache stored as one JSON string value with an expiry.
///
/// The connection is opened on first use and dropped after any command
/// failure, so an unavailable Redis only ever degrades to a cache miss.
pub struct RedisSnapshotCache {
    config: RedisCacheConfig,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisSnapshotCache {
    pub fn new(config: RedisCacheConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<MultiplexedConnection> {
        info!(
            "Connecting to Redis: {} (db={})",
            self.config.url, self.config.database
        );

        let mut connection_info: ConnectionInfo = Client::open(self.config.url.as_str())
            .map_err(|e| Error::CacheUnavailable(format!("Invalid Redis URL: {}", e)))?
            .get_connection_info()
            .clone();

        // Override database if specified
        connection_info.redis.db = self.config.database;

        let client = Client::open(connection_info).map_err(|e| {
            Error::CacheUnavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| Error::CacheUnavailable(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis successfully");
        Ok(conn)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.connect().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self, action: &str, e: RedisError) -> Error {
        error!("Failed to {} (connection reset): {}", action, e);
        *self.connection.lock().await = None;
        Error::CacheUnavailable(format!("Failed to {}: {}", action, e))
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn get(&self) -> Result<Option<Snapshot>> {
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<Option<String>> = redis::cmd("GET")
            .arg(&self.config.key)
            .query_async(&mut conn)
            .await;

        let raw = match result {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for key '{}'", self.config.key);
                return Ok(None);
            }
            Err(e) => return Err(self.reset("read cached snapshot", e).await),
        };

        let snapshot = Snapshot::from_cache_json(&raw).map_err(|e| {
            Error::CacheUnavailable(format!(
                "Invalid snapshot under key '{}': {}",
                self.config.key, e
            ))
        })?;

        info!("Using cached employee data");
        Ok(Some(snapshot))
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<()> {
        let value = snapshot.to_cache_json()?;
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(&self.config.key)
            .arg(value)
            .arg("EX")
            .arg(self.config.ttl_secs)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                debug!(
                    "Cached {} records under '{}' for {}s",
                    snapshot.len(),
                    self.config.key,
                    self.config.ttl_secs
                );
                Ok(())
            }
            Err(e) => Err(self.reset("cache snapshot", e).await),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.connection.lock().await.take().is_some() {
            info!("Disconnecting from Redis");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: RedisCacheConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.key, "employee_data");
        assert_eq!(config.ttl_secs, 3600);
        assert_eq!(config.database, 0);
    }

    #[tokio::test]
    async fn test_invalid_url_is_cache_unavailable() {
        let cache = RedisSnapshotCache::new(RedisCacheConfig {
            url: "not-a-url".to_string(),
            ..Default::default()
        });

        assert!(matches!(cache.get().await, Err(Error::CacheUnavailable(_))));
        assert!(matches!(
            cache.put(&Snapshot::empty()).await,
            Err(Error::CacheUnavailable(_))
        ));
        assert!(cache.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_cache_unavailable() {
        let cache = RedisSnapshotCache::new(RedisCacheConfig {
            url: "redis://127.0.0.1:1".to_string(),
            ..Default::default()
        });

        assert!(matches!(cache.get().await, Err(Error::CacheUnavailable(_))));
    }
}
