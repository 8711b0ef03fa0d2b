//! Periodic snapshots of the live site measurements into the series store.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

use crate::{db::Db, prelude::*};

/// Last measurement pushed for a series.
#[must_use]
#[derive(Copy, Clone, Debug)]
struct Measurement {
    value: f64,
    observed_at: DateTime<Utc>,
}

/// Persists the cached measurements on a fixed interval.
///
/// Producers push measurements with [`SnapshotScheduler::update_measurement`] at their own pace,
/// and every tick writes each cached series unless its measurement is stale, that is older
/// than two intervals.
pub struct SnapshotScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

struct Shared {
    db: Db,
    interval: Duration,
    stale_after: TimeDelta,
    cache: RwLock<BTreeMap<String, Measurement>>,
}

/// Running tick loop.
struct Worker {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl SnapshotScheduler {
    /// The interval must be non-zero.
    pub fn new(db: Db, interval: Duration) -> Result<Self> {
        ensure!(!interval.is_zero(), "the snapshot interval must be non-zero");
        let stale_after = interval
            .checked_mul(2)
            .and_then(|stale_after| TimeDelta::from_std(stale_after).ok())
            .unwrap_or(TimeDelta::MAX);
        let shared = Shared { db, interval, stale_after, cache: RwLock::default() };
        Ok(Self { shared: Arc::new(shared), worker: Mutex::default() })
    }

    /// Spawn the tick loop, unless it is already running.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            warn!("the scheduler is already running");
            return;
        }
        info!(interval = ?self.shared.interval, "starting the scheduler…");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&self.shared).run(shutdown_rx));
        *worker = Some(Worker { handle, shutdown_tx });
    }

    /// Stop the tick loop and wait for it to exit.
    ///
    /// A tick that is already persisting is allowed to finish, no writes happen after this returns.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return;
        };
        info!("stopping the scheduler…");
        let _ = worker.shutdown_tx.send(true);
        if let Err(error) = worker.handle.await {
            error!("the scheduler loop has failed: {error:#}");
        }
    }

    /// Replace the cached measurement of the series, observed right now.
    ///
    /// The key is not validated here: empty keys are skipped by the ticks.
    pub fn update_measurement(&self, series_key: &str, value: f64) {
        self.shared.update_measurement(series_key, value, Utc::now());
    }

    pub fn status(&self) -> Status {
        let is_running = self.worker.lock().unwrap_or_else(PoisonError::into_inner).is_some();
        let now = Utc::now();
        let cache = self.shared.cache.read().unwrap_or_else(PoisonError::into_inner);
        Status {
            is_running,
            interval: self.shared.interval,
            series: cache
                .iter()
                .map(|(series_key, measurement)| SeriesStatus {
                    series_key: series_key.clone(),
                    value: measurement.value,
                    observed_at: measurement.observed_at,
                    data_age: (now - measurement.observed_at).to_std().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

impl Shared {
    fn update_measurement(&self, series_key: &str, value: f64, observed_at: DateTime<Utc>) {
        let measurement = Measurement { value, observed_at };
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(series_key.to_owned(), measurement);
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = interval(self.interval);
        interval.reset();
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("the scheduler loop is cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.persist(Utc::now()).await;
                }
            }
        }
    }

    /// Write the fresh cached measurements and return how many were written.
    ///
    /// Failures are only logged: the next tick retries with whatever the cache holds by then.
    async fn persist(&self, now: DateTime<Utc>) -> usize {
        let snapshot: Vec<(String, Measurement)> = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(series_key, measurement)| (series_key.clone(), *measurement))
            .collect();

        if snapshot.is_empty() {
            debug!("no measurements yet, skipping");
            return 0;
        }

        let mut n_written = 0;
        for (series_key, measurement) in snapshot {
            if series_key.is_empty() {
                debug!("no series key, skipping");
                continue;
            }
            if now - measurement.observed_at > self.stale_after {
                warn!(
                    %series_key,
                    observed_at = %measurement.observed_at,
                    "the measurement is stale, skipping",
                );
                continue;
            }
            match self.db.series().write(&series_key, measurement.value).await {
                Ok(()) => {
                    debug!(%series_key, value = measurement.value, "saved");
                    n_written += 1;
                }
                Err(error) => {
                    error!(%series_key, "failed to save the measurement: {error:#}");
                }
            }
        }
        n_written
    }
}

#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct Status {
    #[serde(rename = "isRunning")]
    pub is_running: bool,

    #[serde(rename = "interval", serialize_with = "serialize_duration")]
    pub interval: Duration,

    pub series: Vec<SeriesStatus>,
}

#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct SeriesStatus {
    #[serde(rename = "seriesKey")]
    pub series_key: String,

    pub value: f64,

    #[serde(rename = "observedAt")]
    pub observed_at: DateTime<Utc>,

    #[serde(rename = "dataAge", serialize_with = "serialize_duration")]
    pub data_age: Duration,
}

fn serialize_duration<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_duration(*duration))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use approx::assert_abs_diff_eq;
    use tokio::time::sleep;

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    async fn scheduler() -> Result<SnapshotScheduler> {
        SnapshotScheduler::new(Db::connect(Path::new(":memory:")).await?, INTERVAL)
    }

    async fn count_records(db: &Db, series_key: &str) -> Result<usize> {
        let now = Utc::now();
        Ok(db.series().query_range(series_key, (now - TimeDelta::hours(1))..=now).await?.len())
    }

    #[tokio::test]
    async fn start_persist_stop_ok() -> Result {
        let scheduler = scheduler().await?;
        assert!(!scheduler.status().is_running);

        scheduler.start();
        assert!(scheduler.status().is_running);

        scheduler.update_measurement("Site A", 3.2);
        sleep(Duration::from_millis(150)).await;

        let record =
            scheduler.shared.db.series().query_latest("Site A").await?.context("not saved")?;
        assert_eq!(record.series_key, "Site A");
        assert_abs_diff_eq!(record.value, 3.2);

        scheduler.stop().await;
        assert!(!scheduler.status().is_running);

        let n_records = count_records(&scheduler.shared.db, "Site A").await?;
        scheduler.update_measurement("Site A", 3.3);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(count_records(&scheduler.shared.db, "Site A").await?, n_records);
        Ok(())
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() -> Result {
        let db = Db::connect(Path::new(":memory:")).await?;
        assert!(SnapshotScheduler::new(db.clone(), Duration::ZERO).is_err());
        assert!(SnapshotScheduler::new(db, Duration::from_nanos(1)).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() -> Result {
        let scheduler = scheduler().await?;
        scheduler.stop().await;
        scheduler.start();
        scheduler.start();
        assert!(scheduler.status().is_running);
        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.status().is_running);
        Ok(())
    }

    #[tokio::test]
    async fn can_restart() -> Result {
        let scheduler = scheduler().await?;
        scheduler.start();
        scheduler.stop().await;
        scheduler.start();
        scheduler.update_measurement("Site A", 1.0);
        sleep(Duration::from_millis(150)).await;
        scheduler.stop().await;
        assert!(count_records(&scheduler.shared.db, "Site A").await? >= 1);
        Ok(())
    }

    #[tokio::test]
    async fn stale_measurement_is_skipped() -> Result {
        let scheduler = scheduler().await?;
        let observed_at = Utc::now();
        scheduler.shared.update_measurement("Site A", 1.0, observed_at);

        let stale_at = observed_at + TimeDelta::from_std(INTERVAL * 2)?;
        assert_eq!(scheduler.shared.persist(stale_at).await, 1);
        assert_eq!(scheduler.shared.persist(stale_at + TimeDelta::milliseconds(1)).await, 0);
        assert_eq!(count_records(&scheduler.shared.db, "Site A").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_series_key_is_skipped() -> Result {
        let scheduler = scheduler().await?;
        assert_eq!(scheduler.shared.persist(Utc::now()).await, 0);

        scheduler.update_measurement("", 1.0);
        assert_eq!(scheduler.shared.persist(Utc::now()).await, 0);
        assert_eq!(count_records(&scheduler.shared.db, "").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn series_are_independent() -> Result {
        let scheduler = scheduler().await?;
        let now = Utc::now();
        scheduler.shared.update_measurement("Site A", 1.0, now - TimeDelta::seconds(10));
        scheduler.shared.update_measurement("Site B", 2.0, now);

        assert_eq!(scheduler.shared.persist(now).await, 1);
        assert_eq!(count_records(&scheduler.shared.db, "Site A").await?, 0);
        assert_eq!(count_records(&scheduler.shared.db, "Site B").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn last_update_wins() -> Result {
        let scheduler = scheduler().await?;
        scheduler.update_measurement("Site A", 1.0);
        scheduler.update_measurement("Site A", 2.0);
        assert_eq!(scheduler.shared.persist(Utc::now()).await, 1);

        let record =
            scheduler.shared.db.series().query_latest("Site A").await?.context("not saved")?;
        assert_abs_diff_eq!(record.value, 2.0);
        Ok(())
    }

    #[tokio::test]
    async fn status_ok() -> Result {
        let scheduler = scheduler().await?;
        scheduler.update_measurement("Site A", 3.2);

        let status = scheduler.status();
        assert_eq!(status.interval, INTERVAL);
        assert_eq!(status.series.len(), 1);
        assert_eq!(status.series[0].series_key, "Site A");
        assert_abs_diff_eq!(status.series[0].value, 3.2);
        assert!(status.series[0].data_age < Duration::from_secs(1));
        Ok(())
    }
}
