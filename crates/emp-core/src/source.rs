use crate::{Result, Snapshot};
use async_trait::async_trait;

/// Source of truth for employee snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Load a fresh snapshot of currently-active employees.
    ///
    /// An empty snapshot is a successful outcome. Connection and query
    /// failures are reported as [`crate::Error::SourceUnavailable`].
    async fn load(&self) -> Result<Snapshot>;

    /// Release the underlying connection, if one is open
    async fn close(&self) -> Result<()>;
}
