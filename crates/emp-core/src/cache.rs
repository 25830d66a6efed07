use crate::{Result, Snapshot};
use async_trait::async_trait;
use std::time::Duration;

/// Key the snapshot is stored under
pub const CACHE_KEY: &str = "employee_data";

/// Default time-to-live of a cached snapshot
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Best-effort memo of the current snapshot
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Read the cached snapshot. `Ok(None)` is a miss; any I/O or parse
    /// failure is [`crate::Error::CacheUnavailable`].
    async fn get(&self) -> Result<Option<Snapshot>>;

    /// Store the snapshot with the cache TTL.
    async fn put(&self, snapshot: &Snapshot) -> Result<()>;

    /// Close the cache connection
    async fn close(&self) -> Result<()>;
}
