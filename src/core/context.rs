//! Application context shared by every service call.

use crate::config::settings::Settings;
use crate::core::cache::PeriodCache;
use crate::core::clock::Clock;
use crate::core::recurring::TemplateLocks;
use crate::core::refresh::{RefreshHandle, RefreshTarget, spawn_refresh_worker};
use crate::errors::Result;
use chrono::NaiveDate;
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use std::fmt;
use std::sync::Arc;

/// Database, caches, background worker and time source.
///
/// Cloning is cheap; all clones share the same cache and worker.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    cache: PeriodCache,
    refresher: RefreshHandle,
    locks: TemplateLocks,
    clock: Arc<dyn Clock>,
    tz: Tz,
    settings: Arc<Settings>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("tz", &self.tz)
            .field("settings", &self.settings)
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Builds the context and starts the refresh worker.
    ///
    /// Must be called from within a tokio runtime. Settings are validated
    /// first, since callers may build them by hand.
    pub fn start(db: DatabaseConnection, settings: Settings, clock: Arc<dyn Clock>) -> Result<Self> {
        settings.validate()?;
        let tz = settings.tz()?;
        let refresher = spawn_refresh_worker(db.clone(), Arc::clone(&clock), tz, settings.clone());
        Ok(Self {
            db,
            cache: PeriodCache::default(),
            refresher,
            locks: TemplateLocks::default(),
            clock,
            tz,
            settings: Arc::new(settings),
        })
    }

    /// The same context observed through another clock.
    ///
    /// Database, cache, template locks and refresh queue are shared. The
    /// refresh worker keeps the clock it was started with.
    #[must_use]
    pub fn with_clock(&self, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ..self.clone()
        }
    }

    /// Database connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Read cache.
    #[must_use]
    pub const fn cache(&self) -> &PeriodCache {
        &self.cache
    }

    /// Aggregate refresh queue.
    #[must_use]
    pub const fn refresher(&self) -> &RefreshHandle {
        &self.refresher
    }

    /// Per-template expansion locks.
    #[must_use]
    pub const fn template_locks(&self) -> &TemplateLocks {
        &self.locks
    }

    /// Time source.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Timezone "today" is evaluated in.
    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Loaded settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current calendar day in the configured timezone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.tz)
    }

    /// Drops cached views of a budget and its owner, then queues a refresh.
    pub async fn budget_changed(&self, budget_id: i64, user_id: i64) -> Result<()> {
        self.cache.invalidate_budget(budget_id).await;
        self.cache.invalidate_user(user_id).await;
        self.refresher.schedule(RefreshTarget::Budget(budget_id)).await
    }

    /// Drops cached views of an income and its owner, then queues a refresh.
    pub async fn income_changed(&self, income_id: i64, user_id: i64) -> Result<()> {
        self.cache.invalidate_income(income_id).await;
        self.cache.invalidate_user(user_id).await;
        self.refresher.schedule(RefreshTarget::Income(income_id)).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::errors::Error;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_start_rejects_invalid_settings() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = Settings {
            variable_income_window_days: 0,
            ..Settings::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let result = AppContext::start(db, settings, Arc::new(FixedClock::on(today)));
        assert!(matches!(result, Err(Error::Config { .. })));
        Ok(())
    }
}
