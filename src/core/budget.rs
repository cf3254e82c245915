//! Budget business logic.
//!
//! CRUD for budgets plus the read side of the period engine: every period query
//! goes through a [`BudgetSnapshot`], which is the budget row and its full
//! transaction set fetched once and cached for the rest of the day.

use crate::core::context::AppContext;
use crate::core::history;
use crate::core::period::{PeriodEngine, PeriodSummary};
use crate::core::stats;
use crate::entities::{
    Budget, BudgetPeriod, Money, PeriodFrequency, RecurringTransaction, Transaction, budget,
    budget_period, recurring_transaction, transaction,
};
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::sync::Arc;
use tracing::{info, instrument};

/// A budget and the engine built over its transactions.
#[derive(Debug, Clone)]
pub struct BudgetSnapshot {
    /// Budget row at fetch time
    pub budget: budget::Model,
    /// Engine over every transaction of the budget
    pub engine: PeriodEngine,
}

impl BudgetSnapshot {
    /// Summary of the period containing today.
    #[must_use]
    pub fn current_period(&self) -> PeriodSummary {
        history::current_period(&self.engine)
    }

    /// Up to `num_periods` summaries, most recent first.
    #[must_use]
    pub fn history(&self, num_periods: usize) -> Vec<PeriodSummary> {
        history::history(&self.engine, num_periods)
    }

    /// Weekly equivalent of the nominal amount.
    #[must_use]
    pub fn weekly_amount(&self) -> Decimal {
        stats::weekly_equivalent(self.budget.amount.value(), self.budget.frequency)
    }

    /// Average weekly spend since the first transaction.
    #[must_use]
    pub fn avg_weekly_spent(&self) -> Decimal {
        stats::avg_weekly_spent(self.engine.entries(), self.engine.today())
    }
}

/// Input for [`create_budget`].
#[derive(Debug, Clone)]
pub struct NewBudget {
    /// Owning user
    pub user_id: i64,
    /// Category label
    pub category: String,
    /// Nominal amount per period
    pub amount: Decimal,
    /// Period length
    pub frequency: PeriodFrequency,
    /// Whether unspent funds carry forward
    pub rollover: bool,
    /// Optional carry cap
    pub rollover_max: Option<Decimal>,
}

/// Partial update for a budget; `None` leaves a field unchanged.
///
/// `rollover_max: Some(None)` removes the cap.
#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    /// New category label
    pub category: Option<String>,
    /// New nominal amount
    pub amount: Option<Decimal>,
    /// New period length
    pub frequency: Option<PeriodFrequency>,
    /// New rollover flag
    pub rollover: Option<bool>,
    /// New carry cap
    pub rollover_max: Option<Option<Decimal>>,
}

fn validate_budget(category: &str, amount: Decimal, rollover_max: Option<Decimal>) -> Result<()> {
    if category.trim().is_empty() {
        return Err(Error::Validation {
            message: "Budget category cannot be empty".to_string(),
        });
    }
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    if let Some(cap) = rollover_max {
        if cap < Decimal::ZERO {
            return Err(Error::InvalidAmount { amount: cap });
        }
    }
    Ok(())
}

/// Creates a budget owned by `new.user_id`.
#[instrument(skip(ctx, new), fields(user_id = new.user_id))]
pub async fn create_budget(ctx: &AppContext, new: NewBudget) -> Result<budget::Model> {
    validate_budget(&new.category, new.amount, new.rollover_max)?;

    let now = ctx.clock().now();
    let model = budget::ActiveModel {
        user_id: Set(new.user_id),
        category: Set(new.category.trim().to_string()),
        amount: Set(Money(new.amount)),
        frequency: Set(new.frequency),
        rollover: Set(new.rollover),
        rollover_max: Set(new.rollover_max.map(Money)),
        created_at: Set(now),
        updated_at: Set(now),
        total_spent: Set(Money::ZERO),
        avg_weekly_spent: Set(Money::ZERO),
        historical_periods: Set(None),
        aggregates_refreshed_at: Set(None),
        ..Default::default()
    };
    let created = model.insert(ctx.db()).await?;
    info!(budget_id = created.id, category = %created.category, "Created budget");
    ctx.budget_changed(created.id, created.user_id).await?;
    Ok(created)
}

/// Retrieves a budget by id.
pub async fn get_budget_by_id(
    db: &DatabaseConnection,
    budget_id: i64,
) -> Result<Option<budget::Model>> {
    Budget::find_by_id(budget_id).one(db).await.map_err(Into::into)
}

/// All budgets of a user, ordered by category.
pub async fn get_budgets_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<budget::Model>> {
    Budget::find()
        .filter(budget::Column::UserId.eq(user_id))
        .order_by_asc(budget::Column::Category)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every budget, ordered by id.
pub async fn get_all_budgets(db: &DatabaseConnection) -> Result<Vec<budget::Model>> {
    Budget::find()
        .order_by_asc(budget::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update.
///
/// Changing the frequency or rollover rules re-derives every past period from
/// the new rules.
pub async fn update_budget(
    ctx: &AppContext,
    budget_id: i64,
    update: BudgetUpdate,
) -> Result<budget::Model> {
    let existing = get_budget_by_id(ctx.db(), budget_id)
        .await?
        .ok_or(Error::BudgetNotFound { id: budget_id })?;

    let category = update
        .category
        .unwrap_or_else(|| existing.category.clone());
    let amount = update.amount.unwrap_or_else(|| existing.amount.value());
    let rollover_max = update
        .rollover_max
        .unwrap_or_else(|| existing.rollover_max.map(Money::value));
    validate_budget(&category, amount, rollover_max)?;

    let mut model: budget::ActiveModel = existing.clone().into();
    model.category = Set(category.trim().to_string());
    model.amount = Set(Money(amount));
    model.frequency = Set(update.frequency.unwrap_or(existing.frequency));
    model.rollover = Set(update.rollover.unwrap_or(existing.rollover));
    model.rollover_max = Set(rollover_max.map(Money));
    model.updated_at = Set(ctx.clock().now());
    let updated = model.update(ctx.db()).await?;

    ctx.budget_changed(updated.id, updated.user_id).await?;
    Ok(updated)
}

/// Deletes a budget with its transactions, templates and persisted periods.
pub async fn delete_budget(ctx: &AppContext, budget_id: i64) -> Result<()> {
    let txn = ctx.db().begin().await?;
    let existing = Budget::find_by_id(budget_id)
        .one(&txn)
        .await?
        .ok_or(Error::BudgetNotFound { id: budget_id })?;
    let user_id = existing.user_id;

    Transaction::delete_many()
        .filter(transaction::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    RecurringTransaction::delete_many()
        .filter(recurring_transaction::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    BudgetPeriod::delete_many()
        .filter(budget_period::Column::BudgetId.eq(budget_id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;
    txn.commit().await?;

    info!(budget_id, "Deleted budget");
    ctx.cache().invalidate_budget(budget_id).await;
    ctx.cache().invalidate_user(user_id).await;
    Ok(())
}

/// Budget row and engine for today, from the cache or a single fetch.
pub async fn snapshot(ctx: &AppContext, budget_id: i64) -> Result<Arc<BudgetSnapshot>> {
    let today = ctx.today();
    if let Some(hit) = ctx.cache().budget(budget_id, today).await {
        return Ok(hit);
    }
    let generation = ctx.cache().generation().await;

    let budget = get_budget_by_id(ctx.db(), budget_id)
        .await?
        .ok_or(Error::BudgetNotFound { id: budget_id })?;
    let transactions = Transaction::find()
        .filter(transaction::Column::BudgetId.eq(budget_id))
        .order_by_asc(transaction::Column::Date)
        .all(ctx.db())
        .await?;
    let engine = PeriodEngine::for_budget(&budget, &transactions, ctx.tz(), today);
    let snapshot = Arc::new(BudgetSnapshot { budget, engine });

    ctx.cache()
        .store_budget(budget_id, today, Arc::clone(&snapshot), generation)
        .await;
    Ok(snapshot)
}

/// Summary of the budget's current period.
pub async fn current_period(ctx: &AppContext, budget_id: i64) -> Result<PeriodSummary> {
    Ok(snapshot(ctx, budget_id).await?.current_period())
}

/// Up to `num_periods` summaries of the budget, most recent first.
pub async fn history(
    ctx: &AppContext,
    budget_id: i64,
    num_periods: usize,
) -> Result<Vec<PeriodSummary>> {
    Ok(snapshot(ctx, budget_id).await?.history(num_periods))
}

/// History sized for a budget detail page.
pub async fn detail_history(ctx: &AppContext, budget_id: i64) -> Result<Vec<PeriodSummary>> {
    history(ctx, budget_id, ctx.settings().detail_history_periods).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_create_budget_validation() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;

        let mut new = test_new_budget("Groceries");
        new.amount = dec!(-1);
        assert!(matches!(
            create_budget(&ctx, new).await,
            Err(Error::InvalidAmount { .. })
        ));

        let mut new = test_new_budget("Groceries");
        new.rollover_max = Some(dec!(-5));
        assert!(matches!(
            create_budget(&ctx, new).await,
            Err(Error::InvalidAmount { .. })
        ));

        assert!(matches!(
            create_budget(&ctx, test_new_budget("   ")).await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_weekly_rollover_scenario() -> Result<()> {
        // Created in the week of Monday 2024-05-06, nothing spent that week
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        let budget = create_budget(
            &ctx,
            NewBudget {
                rollover: true,
                rollover_max: Some(dec!(50)),
                ..test_new_budget("Eating out")
            },
        )
        .await?;

        let ctx = ctx_on(&ctx, d(2024, 5, 16));
        create_test_transaction(&ctx, budget.id, dec!(30), d(2024, 5, 15)).await?;

        let current = current_period(&ctx, budget.id).await?;
        assert_eq!(current.start_date, d(2024, 5, 13));
        assert_eq!(current.rollover_amount, dec!(50));
        assert_eq!(current.budget_amount, dec!(150));
        assert_eq!(current.balance, dec!(120));

        let periods = history(&ctx, budget.id, 10).await?;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].start_date, d(2024, 5, 6));
        Ok(())
    }

    #[tokio::test]
    async fn test_new_budget_reports_full_amount() -> Result<()> {
        let ctx = setup_test_context(d(2024, 2, 10)).await?;
        let budget = create_test_budget(&ctx, "Books").await?;
        let current = current_period(&ctx, budget.id).await?;
        assert_eq!(current.total_spent, dec!(0));
        assert_eq!(current.balance, budget.amount.value());
        assert!(current.is_current);
        assert_eq!(history(&ctx, budget.id, 0).await?.len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_budget_recomputes_from_new_rules() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        let budget = create_test_budget(&ctx, "Transport").await?;
        let ctx = ctx_on(&ctx, d(2024, 5, 20));

        let before = current_period(&ctx, budget.id).await?;
        assert_eq!(before.rollover_amount, dec!(0));

        let updated = update_budget(
            &ctx,
            budget.id,
            BudgetUpdate {
                rollover: Some(true),
                amount: Some(dec!(80)),
                ..BudgetUpdate::default()
            },
        )
        .await?;
        assert!(updated.rollover);

        let after = current_period(&ctx, budget.id).await?;
        assert_eq!(after.base_budget, dec!(80));
        assert_eq!(after.rollover_amount, dec!(160));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_budget() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        let result = update_budget(&ctx, 42, BudgetUpdate::default()).await;
        assert!(matches!(result, Err(Error::BudgetNotFound { id: 42 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_budget_cascades() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        let budget = create_test_budget(&ctx, "Hobbies").await?;
        create_test_transaction(&ctx, budget.id, dec!(12), d(2024, 5, 7)).await?;
        ctx.refresher().flush().await?;
        assert!(current_period(&ctx, budget.id).await.is_ok());

        delete_budget(&ctx, budget.id).await?;

        assert!(get_budget_by_id(ctx.db(), budget.id).await?.is_none());
        let orphans = Transaction::find()
            .filter(transaction::Column::BudgetId.eq(budget.id))
            .all(ctx.db())
            .await?;
        assert!(orphans.is_empty());
        assert!(matches!(
            current_period(&ctx, budget.id).await,
            Err(Error::BudgetNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_budgets_for_user_are_isolated() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        create_test_budget(&ctx, "Rent").await?;
        create_budget(
            &ctx,
            NewBudget {
                user_id: TEST_USER_ID + 1,
                ..test_new_budget("Other")
            },
        )
        .await?;

        let mine = get_budgets_for_user(ctx.db(), TEST_USER_ID).await?;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].category, "Rent");
        assert_eq!(get_all_budgets(ctx.db()).await?.len(), 2);
        Ok(())
    }
}
