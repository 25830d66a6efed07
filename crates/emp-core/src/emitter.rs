use std::sync::Arc;
use std::time::Duration;

use crate::{
    EmployeeMessage, MessagePublisher, Result, SnapshotCache, SnapshotSource, SnapshotState,
    DEFAULT_CACHE_TTL,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing of the two periodic emitter tasks
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Time between two emissions
    pub publish_interval: Duration,

    /// Time between two snapshot refreshes
    pub refresh_interval: Duration,
}

impl EmitterConfig {
    /// Refresh at half the cache TTL so a live publisher always rewrites the
    /// cache before it expires.
    pub fn new(publish_interval: Duration, cache_ttl: Duration) -> Self {
        Self {
            publish_interval,
            refresh_interval: cache_ttl / 2,
        }
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000), DEFAULT_CACHE_TTL)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmitterStatus {
    pub records_published: u64,
    pub publish_errors: u64,
    pub refresh_errors: u64,
    pub cache_hits: u64,
    pub empty_ticks: u64,
    pub last_error: Option<String>,
}

/// Result of a single emission tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Published { emp_no: i64, index: usize },
    Skipped,
    Failed,
}

/// Periodic emitter cycling through the current snapshot, one message per tick
pub struct Emitter {
    source: Arc<dyn SnapshotSource>,
    cache: Arc<dyn SnapshotCache>,
    publisher: Arc<dyn MessagePublisher>,
    config: EmitterConfig,
    state: SnapshotState,
    status: RwLock<EmitterStatus>,
}

impl Emitter {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        cache: Arc<dyn SnapshotCache>,
        publisher: Arc<dyn MessagePublisher>,
        config: EmitterConfig,
    ) -> Self {
        Self {
            source,
            cache,
            publisher,
            config,
            state: SnapshotState::new(),
            status: RwLock::new(EmitterStatus::default()),
        }
    }

    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    pub async fn status(&self) -> EmitterStatus {
        self.status.read().await.clone()
    }

    /// Reload the snapshot: cache first, database on a miss.
    ///
    /// On a database failure the previous snapshot stays in place and the
    /// error is returned for the caller to log.
    pub async fn refresh(&self) -> Result<()> {
        match self.cache.get().await {
            Ok(Some(snapshot)) if !snapshot.is_empty() => {
                info!("Retrieved {} employees from cache", snapshot.len());
                self.status.write().await.cache_hits += 1;
                let cursor = self.state.replace(snapshot).await;
                debug!("Cursor after refresh: {}", cursor);
                return Ok(());
            }
            Ok(_) => debug!("No cached employee data"),
            Err(e) => warn!("Cache read failed, falling back to database: {}", e),
        }

        let snapshot = match self.source.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let mut status = self.status.write().await;
                status.refresh_errors += 1;
                status.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        if snapshot.is_empty() {
            info!("No employee data found");
            self.state.replace(snapshot).await;
            return Ok(());
        }

        info!("Fetched {} employees from database", snapshot.len());
        let cursor = self.state.replace(snapshot.clone()).await;
        debug!("Cursor after refresh: {}", cursor);

        match self.cache.put(&snapshot).await {
            Ok(_) => info!("Employee data cached successfully"),
            Err(e) => warn!("Error caching employee data: {}", e),
        }

        Ok(())
    }

    /// Publish the record under the cursor. The cursor moves on whether or
    /// not the publish succeeds; a failed record is not retried.
    pub async fn emit_once(&self) -> EmitOutcome {
        let now_ms = Utc::now().timestamp_millis();

        let Some(checkout) = self.state.checkout(now_ms).await else {
            info!("No employee data to publish");
            self.status.write().await.empty_ticks += 1;
            return EmitOutcome::Skipped;
        };

        let emp_no = checkout.record.emp_no;
        let result = match EmployeeMessage::from_record(&checkout.record, checkout.timestamp_ms) {
            Ok(message) => self.publisher.publish(message).await,
            Err(e) => Err(e),
        };

        let mut status = self.status.write().await;
        match result {
            Ok(_) => {
                info!("Published employee {} to Kafka", emp_no);
                status.records_published += 1;
                EmitOutcome::Published {
                    emp_no,
                    index: checkout.index,
                }
            }
            Err(e) => {
                error!("Error publishing employee {}: {}", emp_no, e);
                status.publish_errors += 1;
                status.last_error = Some(e.to_string());
                EmitOutcome::Failed
            }
        }
    }

    /// Initial load, cursor reset and one immediate emission
    pub async fn start(&self) {
        if let Err(e) = self.refresh().await {
            error!("Error fetching employee data: {}", e);
        }
        self.state.reset_cursor().await;
        self.emit_once().await;
    }

    /// Run until `shutdown` is cancelled, then close every backend.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Starting employee emitter");
        self.start().await;

        info!(
            "Starting to publish employee data every {} ms",
            self.config.publish_interval.as_millis()
        );

        let emission = tokio::spawn(self.clone().emission_loop(shutdown.clone()));
        let refresh = tokio::spawn(self.clone().refresh_loop(shutdown.clone()));

        let (emission, refresh) = tokio::join!(emission, refresh);
        for (task, result) in [("emission", emission), ("refresh", refresh)] {
            if let Err(e) = result {
                error!("Emitter {} task failed: {}", task, e);
            }
        }

        self.close().await;
    }

    async fn emission_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let period = self.config.publish_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.emit_once().await;
                }
            }
        }
        debug!("Emission task stopped");
    }

    async fn refresh_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let period = self.config.refresh_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        error!("Error refreshing employee data, keeping previous snapshot: {}", e);
                    }
                }
            }
        }
        debug!("Refresh task stopped");
    }

    /// Disconnect the producer, then close the database and the cache.
    pub async fn close(&self) {
        info!("Shutting down gracefully...");
        let status = self.status().await;
        info!(
            published = status.records_published,
            publish_errors = status.publish_errors,
            refresh_errors = status.refresh_errors,
            cache_hits = status.cache_hits,
            "Emitter stopped"
        );

        if let Err(e) = self.publisher.disconnect().await {
            error!("Failed to disconnect producer: {}", e);
        }
        if let Err(e) = self.source.close().await {
            error!("Failed to close database connection: {}", e);
        }
        if let Err(e) = self.cache.close().await {
            error!("Failed to close cache connection: {}", e);
        }
    }
}
