//! Persisted aggregate columns.
//!
//! Budgets and incomes carry denormalized totals so list pages do not need to
//! scan every transaction. These functions recompute them from scratch and
//! write the result; they are what the refresh worker runs and what
//! `recompute_all` loops over.

use crate::config::settings::Settings;
use crate::core::history;
use crate::core::income::{self, IncomeFigures};
use crate::core::period::{PeriodEngine, PeriodSummary};
use crate::core::refresh::RefreshTarget;
use crate::core::stats;
use crate::entities::{
    Budget, BudgetPeriod, Income, IncomeTransaction, Money, Transaction, budget, budget_period,
    income as income_entity, income_transaction, transaction,
};
use crate::errors::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, instrument};

/// Recomputes whichever entity `target` names.
pub async fn refresh(
    db: &DatabaseConnection,
    target: RefreshTarget,
    today: NaiveDate,
    tz: Tz,
    settings: &Settings,
) -> Result<()> {
    match target {
        RefreshTarget::Budget(id) => refresh_budget(db, id, today, tz, settings).await,
        RefreshTarget::Income(id) => refresh_income(db, id, today, tz, settings).await,
    }
}

/// Recomputes a budget's totals, serialized history and persisted period rows.
///
/// A budget deleted after the refresh was queued is skipped.
#[instrument(skip(db, tz, settings))]
pub async fn refresh_budget(
    db: &DatabaseConnection,
    budget_id: i64,
    today: NaiveDate,
    tz: Tz,
    settings: &Settings,
) -> Result<()> {
    let Some(budget) = Budget::find_by_id(budget_id).one(db).await? else {
        debug!("Budget vanished before refresh");
        return Ok(());
    };
    let transactions = Transaction::find()
        .filter(transaction::Column::BudgetId.eq(budget_id))
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await?;

    let engine = PeriodEngine::for_budget(&budget, &transactions, tz, today);
    let total_spent = stats::total(engine.entries());
    let avg_weekly_spent = stats::avg_weekly_spent(engine.entries(), today);
    // Both windows are prefixes of the longest one.
    let longest = history::history(
        &engine,
        settings.history_periods.max(settings.detail_history_periods),
    );
    let recent = &longest[..settings.history_periods.min(longest.len())];
    let detail = &longest[..settings.detail_history_periods.min(longest.len())];

    let txn = db.begin().await?;
    replace_periods(&txn, budget_id, detail).await?;

    let mut model: budget::ActiveModel = budget.into();
    model.total_spent = Set(Money(total_spent));
    model.avg_weekly_spent = Set(Money(avg_weekly_spent));
    model.historical_periods = Set(Some(serde_json::to_string(recent)?));
    model.aggregates_refreshed_at = Set(Some(Utc::now()));
    model.update(&txn).await?;
    txn.commit().await?;

    debug!(periods = detail.len(), %total_spent, "Budget aggregates refreshed");
    Ok(())
}

/// Recomputes an income's totals.
#[instrument(skip(db, tz, settings))]
pub async fn refresh_income(
    db: &DatabaseConnection,
    income_id: i64,
    today: NaiveDate,
    tz: Tz,
    settings: &Settings,
) -> Result<()> {
    let Some(income) = Income::find_by_id(income_id).one(db).await? else {
        debug!("Income vanished before refresh");
        return Ok(());
    };
    let payments = IncomeTransaction::find()
        .filter(income_transaction::Column::IncomeId.eq(income_id))
        .all(db)
        .await?;

    let figures = IncomeFigures::compute(
        &income,
        &income::entries(&payments),
        tz,
        today,
        settings.variable_income_window_days,
    );

    let mut model: income_entity::ActiveModel = income.into();
    model.total_received = Set(Money(figures.total_received));
    model.weekly_amount = Set(Money(figures.weekly_amount));
    model.current_period_income = Set(Money(figures.current_period_income));
    model.aggregates_refreshed_at = Set(Some(Utc::now()));
    model.update(db).await?;
    Ok(())
}

/// Replaces every persisted period of a budget with `periods`.
pub async fn replace_periods<C>(db: &C, budget_id: i64, periods: &[PeriodSummary]) -> Result<()>
where
    C: ConnectionTrait,
{
    BudgetPeriod::delete_many()
        .filter(budget_period::Column::BudgetId.eq(budget_id))
        .exec(db)
        .await?;
    if periods.is_empty() {
        return Ok(());
    }
    BudgetPeriod::insert_many(periods.iter().map(|p| period_row(budget_id, p)))
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Builds the persisted row for one period summary.
#[must_use]
pub fn period_row(budget_id: i64, period: &PeriodSummary) -> budget_period::ActiveModel {
    budget_period::ActiveModel {
        budget_id: Set(budget_id),
        start_date: Set(period.start_date),
        end_date: Set(period.end_date),
        total_spent: Set(Money(period.total_spent)),
        balance: Set(Money(period.balance)),
        budget_amount: Set(Money(period.budget_amount)),
        base_budget: Set(Money(period.base_budget)),
        rollover_amount: Set(Money(period.rollover_amount)),
        difference: Set(Money(period.difference)),
        is_over_budget: Set(period.is_over_budget),
        is_current: Set(period.is_current),
        ..Default::default()
    }
}

/// Persisted periods of a budget, most recent first.
pub async fn stored_periods(
    db: &DatabaseConnection,
    budget_id: i64,
) -> Result<Vec<budget_period::Model>> {
    BudgetPeriod::find()
        .filter(budget_period::Column::BudgetId.eq(budget_id))
        .order_by_desc(budget_period::Column::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}
