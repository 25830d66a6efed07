use crate::{EmployeeRecord, Snapshot};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Snapshot and emission cursor shared by the emission and refresh tasks.
///
/// The snapshot is immutable and replaced by pointer swap; the cursor and
/// the last emitted timestamp live under the same short-lived lock. Callers
/// copy the record out and perform I/O after the lock is released.
#[derive(Debug, Default)]
pub struct SnapshotState {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: Arc<Snapshot>,
    cursor: usize,
    last_timestamp_ms: i64,
}

/// Record selected for the next emission
#[derive(Debug, Clone)]
pub struct Checkout {
    pub index: usize,
    pub record: EmployeeRecord,
    /// Publish timestamp, never lower than the previous checkout's
    pub timestamp_ms: i64,
}

impl SnapshotState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new snapshot and clamp the cursor to its length.
    ///
    /// When the new snapshot is empty the cursor is left untouched and is
    /// clamped again by the next non-empty replacement.
    pub async fn replace(&self, snapshot: Snapshot) -> usize {
        let mut inner = self.inner.lock().await;
        if !snapshot.is_empty() {
            inner.cursor %= snapshot.len();
        }
        inner.snapshot = Arc::new(snapshot);
        inner.cursor
    }

    pub async fn reset_cursor(&self) {
        self.inner.lock().await.cursor = 0;
    }

    pub async fn cursor(&self) -> usize {
        self.inner.lock().await.cursor
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.lock().await.snapshot.clone()
    }

    /// Take the record under the cursor and advance it, wrapping at the
    /// snapshot length. Returns `None` for an empty snapshot.
    pub async fn checkout(&self, now_ms: i64) -> Option<Checkout> {
        let mut inner = self.inner.lock().await;
        let len = inner.snapshot.len();
        if len == 0 {
            return None;
        }

        let index = inner.cursor % len;
        let record = inner.snapshot.get(index)?.clone();
        inner.cursor = (index + 1) % len;

        let timestamp_ms = now_ms.max(inner.last_timestamp_ms);
        inner.last_timestamp_ms = timestamp_ms;

        Some(Checkout {
            index,
            record,
            timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee_record::tests::record;

    fn snapshot_of(len: i64) -> Snapshot {
        Snapshot::new((0..len).map(|i| record(10001 + i, 50000, "1990-01-01")).collect())
    }

    #[tokio::test]
    async fn test_checkout_rotates_in_order() {
        let state = SnapshotState::new();
        state.replace(snapshot_of(3)).await;

        let mut ids = Vec::new();
        for _ in 0..7 {
            ids.push(state.checkout(0).await.unwrap().record.emp_no);
        }

        assert_eq!(ids, vec![10001, 10002, 10003, 10001, 10002, 10003, 10001]);
    }

    #[tokio::test]
    async fn test_cursor_wraps_after_full_cycles() {
        let state = SnapshotState::new();
        state.replace(snapshot_of(4)).await;
        state.checkout(0).await;
        let start = state.cursor().await;

        for _ in 0..(3 * 4) {
            state.checkout(0).await;
        }

        assert_eq!(state.cursor().await, start);
    }

    #[tokio::test]
    async fn test_shrinking_snapshot_clamps_cursor() {
        let state = SnapshotState::new();
        state.replace(snapshot_of(10)).await;
        for _ in 0..9 {
            state.checkout(0).await;
        }
        assert_eq!(state.cursor().await, 9);

        assert_eq!(state.replace(snapshot_of(7)).await, 9 % 7);
        assert_eq!(state.checkout(0).await.unwrap().index, 2);
    }

    #[tokio::test]
    async fn test_empty_snapshot_yields_nothing() {
        let state = SnapshotState::new();
        assert!(state.checkout(0).await.is_none());

        state.replace(snapshot_of(3)).await;
        state.checkout(0).await;
        state.replace(Snapshot::empty()).await;

        assert!(state.checkout(0).await.is_none());
        assert_eq!(state.cursor().await, 1);
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let state = SnapshotState::new();
        state.replace(snapshot_of(2)).await;

        let first = state.checkout(2_000).await.unwrap().timestamp_ms;
        let second = state.checkout(1_000).await.unwrap().timestamp_ms;
        let third = state.checkout(3_000).await.unwrap().timestamp_ms;

        assert_eq!((first, second, third), (2_000, 2_000, 3_000));
    }
}
