//! Refresher - background task that keeps the published license state current.
//!
//! Every interval it performs one status fetch and one publish. Store
//! failures never stop the loop: after `tolerated_failures` consecutive
//! failures the cache falls back to `EmptyLicense` until the store recovers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::StatusCache;
use crate::config::RefreshConfig;
use crate::error::StoreError;
use crate::status::StatusSource;
use crate::violation::Violation;

pub struct Refresher {
    source: StatusSource,
    cache: StatusCache,
    interval: Duration,
    fetch_timeout: Duration,
    tolerated_failures: u32,
    consecutive_failures: u32,
}

impl Refresher {
    pub fn new(source: StatusSource, cache: StatusCache, config: &RefreshConfig) -> Self {
        Self {
            source,
            cache,
            interval: config.interval(),
            fetch_timeout: config.fetch_timeout(),
            tolerated_failures: config.tolerated_failures,
            consecutive_failures: 0,
        }
    }

    /// Fetch once and publish the result. Returns the value now in the cache.
    pub async fn tick(&mut self) -> Arc<Violation> {
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.fetch_timeout)),
        };

        match fetched {
            Ok(violation) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        failures = self.consecutive_failures,
                        "License status store recovered"
                    );
                }
                self.consecutive_failures = 0;
                self.publish(violation);
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures <= self.tolerated_failures {
                    tracing::warn!(
                        error = %e,
                        failures = self.consecutive_failures,
                        tolerated = self.tolerated_failures,
                        "License status fetch failed, keeping last published state"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        failures = self.consecutive_failures,
                        "License status fetch failed, treating license as empty"
                    );
                    self.publish(Violation::empty_license());
                }
            }
        }

        self.cache.current()
    }

    fn publish(&self, violation: Violation) {
        let previous = self.cache.current();
        if previous.kind != violation.kind {
            tracing::info!(
                from = %previous.kind,
                to = %violation.kind,
                "License violation state changed"
            );
        }
        self.cache.publish(violation);
    }

    /// Run the refresh loop until the shutdown signal is received.
    ///
    /// The first refresh happens immediately.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(
            interval = ?self.interval,
            fetch_timeout = ?self.fetch_timeout,
            "Refresher started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                // Also fires when the handle is dropped.
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!("Refresher stopped");
    }

    /// Spawn the loop on the runtime. Dropping the handle stops it too.
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        RefresherHandle { shutdown_tx, task }
    }
}

/// Owner of a running refresher.
pub struct RefresherHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Refresher task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusConfig;
    use crate::status::{MemoryRecordStore, RecordStore, StoredRecord};
    use crate::violation::ViolationType;
    use async_trait::async_trait;

    const NODE_LIMIT: &str =
        r#"{"violation":{"type":"NodeCountExceeded","expected":5,"current":7}}"#;

    fn refresher_over(
        store: Arc<dyn RecordStore>,
        config: RefreshConfig,
    ) -> (Refresher, StatusCache) {
        let cache = StatusCache::new();
        let source = StatusSource::new(store, &StatusConfig::default());
        (Refresher::new(source, cache.clone(), &config), cache)
    }

    fn put_status(store: &MemoryRecordStore, status: &str) {
        let config = StatusConfig::default();
        store.put(
            &config.namespace,
            &config.record_name,
            StoredRecord::with_annotation(&config.annotation, status),
        );
    }

    #[tokio::test]
    async fn test_tick_publishes_fetched_state() {
        let store = Arc::new(MemoryRecordStore::new());
        let (mut refresher, cache) = refresher_over(store.clone(), RefreshConfig::default());

        assert_eq!(*refresher.tick().await, Violation::empty_license());

        put_status(&store, NODE_LIMIT);
        refresher.tick().await;
        assert_eq!(
            *cache.current(),
            Violation::quantitative(ViolationType::NodeCountExceeded, 5, 7)
        );
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_to_empty_license() {
        let store = Arc::new(MemoryRecordStore::new());
        put_status(&store, r#"{"violation":{"type":"NoViolation"}}"#);
        let (mut refresher, cache) = refresher_over(store.clone(), RefreshConfig::default());

        refresher.tick().await;
        assert_eq!(*cache.current(), Violation::none());

        store.fail_with("apiserver unreachable");
        refresher.tick().await;
        assert_eq!(*cache.current(), Violation::empty_license());

        store.recover();
        refresher.tick().await;
        assert_eq!(*cache.current(), Violation::none());
    }

    #[tokio::test]
    async fn test_tolerated_failures_keep_last_state() {
        let store = Arc::new(MemoryRecordStore::new());
        put_status(&store, NODE_LIMIT);
        let config = RefreshConfig {
            tolerated_failures: 2,
            ..RefreshConfig::default()
        };
        let (mut refresher, cache) = refresher_over(store.clone(), config);

        refresher.tick().await;
        store.fail_with("down");

        refresher.tick().await;
        refresher.tick().await;
        assert_eq!(cache.current().kind, ViolationType::NodeCountExceeded);

        refresher.tick().await;
        assert_eq!(*cache.current(), Violation::empty_license());

        // recovery resets the failure budget
        store.recover();
        refresher.tick().await;
        store.fail_with("down again");
        refresher.tick().await;
        assert_eq!(cache.current().kind, ViolationType::NodeCountExceeded);
    }

    struct HangingStore;

    #[async_trait]
    impl RecordStore for HangingStore {
        async fn get(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> Result<Option<StoredRecord>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_fetch_times_out() {
        let (mut refresher, cache) =
            refresher_over(Arc::new(HangingStore), RefreshConfig::default());
        cache.publish(Violation::none());

        refresher.tick().await;
        assert_eq!(*cache.current(), Violation::empty_license());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_each_interval_until_shutdown() {
        let store = Arc::new(MemoryRecordStore::new());
        let (refresher, cache) = refresher_over(store.clone(), RefreshConfig::default());
        let handle = refresher.spawn();

        // first tick is immediate
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*cache.current(), Violation::empty_license());

        put_status(&store, NODE_LIMIT);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*cache.current(), Violation::empty_license());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(cache.current().kind, ViolationType::NodeCountExceeded);

        handle.shutdown().await;

        put_status(&store, r#"{"violation":{"type":"NoViolation"}}"#);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.current().kind, ViolationType::NodeCountExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_loop() {
        let store = Arc::new(MemoryRecordStore::new());
        let (refresher, cache) = refresher_over(store.clone(), RefreshConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(refresher.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(shutdown_tx);
        task.await.unwrap();

        put_status(&store, NODE_LIMIT);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*cache.current(), Violation::empty_license());
    }
}
