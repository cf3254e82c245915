//! Background aggregate refresh.
//!
//! A single tokio task owns the receiving end of a bounded channel and
//! recomputes one budget or income at a time. Callers enqueue and move on:
//! `schedule` only waits when the queue is full. Failures are logged and
//! counted in [`RefreshStats`]; they never reach the caller that triggered the
//! refresh, so the persisted aggregate columns may lag the transactions by up
//! to one queue drain.

use crate::config::settings::Settings;
use crate::core::aggregates;
use crate::core::clock::Clock;
use crate::errors::{Error, Result};
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// What to recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    /// Budget aggregates and persisted periods
    Budget(i64),
    /// Income totals
    Income(i64),
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Budget(id) => write!(f, "budget {id}"),
            Self::Income(id) => write!(f, "income {id}"),
        }
    }
}

/// Counters updated by the worker.
#[derive(Debug, Default)]
pub struct RefreshStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RefreshStats {
    /// Refreshes that finished successfully.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Refreshes that returned an error.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

enum Command {
    Refresh(RefreshTarget),
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing refreshes.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<Command>,
    stats: Arc<RefreshStats>,
}

impl fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("capacity", &self.tx.max_capacity())
            .field("stats", &self.stats)
            .finish()
    }
}

impl RefreshHandle {
    /// Enqueues a refresh, waiting only while the queue is full.
    pub async fn schedule(&self, target: RefreshTarget) -> Result<()> {
        self.tx
            .send(Command::Refresh(target))
            .await
            .map_err(|_| Error::RefreshWorkerStopped)?;
        debug!(%target, "Scheduled aggregate refresh");
        Ok(())
    }

    /// Enqueues a refresh without waiting. Returns `false` if the queue is full.
    pub fn try_schedule(&self, target: RefreshTarget) -> Result<bool> {
        match self.tx.try_send(Command::Refresh(target)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::RefreshWorkerStopped),
        }
    }

    /// Waits until every refresh enqueued before this call has been processed.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(done_tx))
            .await
            .map_err(|_| Error::RefreshWorkerStopped)?;
        done_rx.await.map_err(|_| Error::RefreshWorkerStopped)
    }

    /// Worker counters.
    #[must_use]
    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }
}

/// Spawns the refresh worker on the current tokio runtime.
///
/// The worker stops once every [`RefreshHandle`] has been dropped.
pub fn spawn_refresh_worker(
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
    tz: Tz,
    settings: Settings,
) -> RefreshHandle {
    let (tx, mut rx) = mpsc::channel::<Command>(settings.refresh_queue_capacity.max(1));
    let stats = Arc::new(RefreshStats::default());
    let worker_stats = Arc::clone(&stats);

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Refresh(target) => {
                    let today = clock.today(tz);
                    match aggregates::refresh(&db, target, today, tz, &settings).await {
                        Ok(()) => {
                            worker_stats.completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                            error!(%target, "Aggregate refresh failed: {}", e);
                        }
                    }
                }
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        info!("Aggregate refresh worker stopped");
    });

    RefreshHandle { tx, stats }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::test_utils::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_missing_budget_is_not_a_failure() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let handle = spawn_refresh_worker(
            db,
            Arc::new(FixedClock::on(today)),
            Tz::UTC,
            Settings::default(),
        );

        handle.schedule(RefreshTarget::Budget(404)).await?;
        handle.flush().await?;
        assert_eq!(handle.stats().completed(), 1);
        assert_eq!(handle.stats().failed(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_try_schedule_reports_full_queue() -> Result<()> {
        let db = setup_test_db().await?;
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let settings = Settings {
            refresh_queue_capacity: 1,
            ..Settings::default()
        };
        let handle = spawn_refresh_worker(db, Arc::new(FixedClock::on(today)), Tz::UTC, settings);

        // The current-thread test runtime has not polled the worker yet.
        assert!(handle.try_schedule(RefreshTarget::Income(1))?);
        assert!(!handle.try_schedule(RefreshTarget::Income(2))?);

        handle.flush().await?;
        assert_eq!(handle.stats().completed(), 1);
        Ok(())
    }

    #[test]
    fn test_target_display() {
        assert_eq!(RefreshTarget::Budget(3).to_string(), "budget 3");
        assert_eq!(RefreshTarget::Income(9).to_string(), "income 9");
    }
}
