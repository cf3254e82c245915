//! In-process read cache.
//!
//! Entries are keyed by budget, income and user, and are only valid for the
//! day they were computed on. Every mutation drops the affected entries before
//! it returns. A reader that started computing before a mutation cannot write
//! its now-outdated result back: `generation()` is read before the fetch and a
//! store is ignored when any invalidation happened in between.

use crate::core::budget::BudgetSnapshot;
use crate::core::income::IncomeFigures;
use crate::core::report::DashboardSummary;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug)]
struct Slot<T> {
    as_of: NaiveDate,
    value: Arc<T>,
}

impl<T> Slot<T> {
    fn get(&self, today: NaiveDate) -> Option<Arc<T>> {
        (self.as_of == today).then(|| Arc::clone(&self.value))
    }
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    budgets: HashMap<i64, Slot<BudgetSnapshot>>,
    incomes: HashMap<i64, Slot<IncomeFigures>>,
    dashboards: HashMap<i64, Slot<DashboardSummary>>,
}

/// Shared read cache, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct PeriodCache {
    state: Arc<RwLock<CacheState>>,
}

impl PeriodCache {
    /// Current invalidation generation; pass it back to the `store_*` calls.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Cached budget snapshot computed on `today`.
    pub async fn budget(&self, budget_id: i64, today: NaiveDate) -> Option<Arc<BudgetSnapshot>> {
        self.state.read().await.budgets.get(&budget_id)?.get(today)
    }

    /// Cached income figures computed on `today`.
    pub async fn income(&self, income_id: i64, today: NaiveDate) -> Option<Arc<IncomeFigures>> {
        self.state.read().await.incomes.get(&income_id)?.get(today)
    }

    /// Cached dashboard computed on `today`.
    pub async fn dashboard(&self, user_id: i64, today: NaiveDate) -> Option<Arc<DashboardSummary>> {
        self.state.read().await.dashboards.get(&user_id)?.get(today)
    }

    /// Stores a budget snapshot unless an invalidation happened since `generation`.
    pub async fn store_budget(
        &self,
        budget_id: i64,
        today: NaiveDate,
        value: Arc<BudgetSnapshot>,
        generation: u64,
    ) {
        let mut state = self.state.write().await;
        if state.generation == generation {
            state.budgets.insert(budget_id, Slot { as_of: today, value });
        }
    }

    /// Stores income figures unless an invalidation happened since `generation`.
    pub async fn store_income(
        &self,
        income_id: i64,
        today: NaiveDate,
        value: Arc<IncomeFigures>,
        generation: u64,
    ) {
        let mut state = self.state.write().await;
        if state.generation == generation {
            state.incomes.insert(income_id, Slot { as_of: today, value });
        }
    }

    /// Stores a dashboard unless an invalidation happened since `generation`.
    pub async fn store_dashboard(
        &self,
        user_id: i64,
        today: NaiveDate,
        value: Arc<DashboardSummary>,
        generation: u64,
    ) {
        let mut state = self.state.write().await;
        if state.generation == generation {
            state.dashboards.insert(user_id, Slot { as_of: today, value });
        }
    }

    /// Drops the entry for a budget.
    pub async fn invalidate_budget(&self, budget_id: i64) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.budgets.remove(&budget_id);
        trace!(budget_id, "Invalidated budget cache entry");
    }

    /// Drops the entry for an income.
    pub async fn invalidate_income(&self, income_id: i64) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.incomes.remove(&income_id);
        trace!(income_id, "Invalidated income cache entry");
    }

    /// Drops the per-user roll-up.
    pub async fn invalidate_user(&self, user_id: i64) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.dashboards.remove(&user_id);
        trace!(user_id, "Invalidated dashboard cache entry");
    }

    /// Drops everything.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.budgets.clear();
        state.incomes.clear();
        state.dashboards.clear();
    }

    /// Number of cached entries across all keys.
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.budgets.len() + state.incomes.len() + state.dashboards.len()
    }

    /// Whether the cache holds nothing.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
