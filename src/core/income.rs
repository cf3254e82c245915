//! Income sources and the money actually received from them.
//!
//! Fixed incomes contribute their nominal amount. Variable incomes are averaged
//! over a trailing window of received payments for the weekly figure and summed
//! over the current pay period for the "actual" figure.

use crate::core::calendar;
use crate::core::clock::local_date;
use crate::core::context::AppContext;
use crate::core::period::Entry;
use crate::core::stats;
use crate::entities::{
    Income, IncomeFrequency, IncomeTransaction, IncomeTransactionModel, Money, income,
    income_transaction,
};
use crate::errors::{Error, Result};
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::sync::Arc;
use tracing::info;

impl From<&IncomeTransactionModel> for Entry {
    fn from(payment: &IncomeTransactionModel) -> Self {
        Self {
            date: payment.date,
            amount: payment.amount.value(),
        }
    }
}

/// Payments as engine entries, sorted by date.
#[must_use]
pub fn entries(payments: &[IncomeTransactionModel]) -> Vec<Entry> {
    let mut entries: Vec<Entry> = payments.iter().map(Entry::from).collect();
    entries.sort_by_key(|e| e.date);
    entries
}

/// Weekly equivalent of an income.
///
/// Variable-frequency income averages the payments dated within the last
/// `window_days` days over `window_days / 7` weeks, and falls back to the
/// nominal amount while there are none.
#[must_use]
pub fn weekly_amount(
    income: &income::Model,
    entries: &[Entry],
    today: NaiveDate,
    window_days: i64,
) -> Decimal {
    if income.frequency != IncomeFrequency::Variable {
        return stats::weekly_equivalent(income.amount.value(), income.frequency.period_frequency());
    }

    let cutoff = today
        .checked_sub_signed(Duration::days(window_days))
        .unwrap_or(NaiveDate::MIN);
    let recent: Vec<Decimal> = entries
        .iter()
        .filter(|e| e.date >= cutoff)
        .map(|e| e.amount)
        .collect();
    if recent.is_empty() {
        return income.amount.value();
    }
    let weeks = Decimal::from(window_days) / Decimal::from(7);
    recent
        .iter()
        .sum::<Decimal>()
        .checked_div(weeks)
        .unwrap_or_else(|| income.amount.value())
}

/// Bounds of the pay period containing `today`.
///
/// Variable income uses calendar years. Fortnights alternate from the week the
/// income was created in.
#[must_use]
pub fn period_bounds(income: &income::Model, tz: Tz, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let frequency = income.frequency.period_frequency();
    let reference = local_date(income.created_at, tz);
    let start = calendar::period_start(today, frequency, reference);
    (start, calendar::period_end(start, frequency))
}

/// Income attributed to the current pay period.
///
/// Fixed incomes report their nominal amount; variable ones the sum actually
/// received inside the period.
#[must_use]
pub fn current_period_income(
    income: &income::Model,
    entries: &[Entry],
    tz: Tz,
    today: NaiveDate,
) -> Decimal {
    if !income.is_variable {
        return income.amount.value();
    }
    let (start, end) = period_bounds(income, tz, today);
    entries
        .iter()
        .filter(|e| e.date >= start && e.date <= end)
        .map(|e| e.amount)
        .sum()
}

/// Derived figures for one income.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeFigures {
    /// Sum of every payment
    pub total_received: Decimal,
    /// Weekly equivalent
    pub weekly_amount: Decimal,
    /// Income attributed to the current pay period
    pub current_period_income: Decimal,
}

impl IncomeFigures {
    /// Computes every figure from an income and its sorted payments.
    #[must_use]
    pub fn compute(
        income: &income::Model,
        entries: &[Entry],
        tz: Tz,
        today: NaiveDate,
        window_days: i64,
    ) -> Self {
        Self {
            total_received: stats::total(entries),
            weekly_amount: weekly_amount(income, entries, today, window_days),
            current_period_income: current_period_income(income, entries, tz, today),
        }
    }
}

/// Input for [`create_income`].
#[derive(Debug, Clone)]
pub struct NewIncome {
    /// Owning user
    pub user_id: i64,
    /// Where the money comes from
    pub source: String,
    /// Expected amount per pay period
    pub amount: Decimal,
    /// Pay cycle
    pub frequency: IncomeFrequency,
    /// Whether the period figure uses received payments
    pub is_variable: bool,
}

/// Partial update for an income; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct IncomeUpdate {
    /// New source label
    pub source: Option<String>,
    /// New expected amount
    pub amount: Option<Decimal>,
    /// New pay cycle
    pub frequency: Option<IncomeFrequency>,
    /// New variable flag
    pub is_variable: Option<bool>,
}

/// Input for [`create_income_transaction`].
#[derive(Debug, Clone)]
pub struct NewIncomeTransaction {
    /// Income the payment belongs to
    pub income_id: i64,
    /// Amount received
    pub amount: Decimal,
    /// Description
    pub description: String,
    /// Day the money arrived
    pub date: NaiveDate,
}

/// Partial update for [`update_income_transaction`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct IncomeTransactionUpdate {
    /// Move to another income of the same user
    pub income_id: Option<i64>,
    /// New amount
    pub amount: Option<Decimal>,
    /// New description
    pub description: Option<String>,
    /// New day
    pub date: Option<NaiveDate>,
}

fn validate_income(source: &str, amount: Decimal) -> Result<()> {
    if source.trim().is_empty() {
        return Err(Error::Validation {
            message: "Income source cannot be empty".to_string(),
        });
    }
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Creates an income source. A variable frequency always marks it variable.
pub async fn create_income(ctx: &AppContext, new: NewIncome) -> Result<income::Model> {
    validate_income(&new.source, new.amount)?;

    let now = ctx.clock().now();
    let model = income::ActiveModel {
        user_id: Set(new.user_id),
        source: Set(new.source.trim().to_string()),
        amount: Set(Money(new.amount)),
        frequency: Set(new.frequency),
        is_variable: Set(new.is_variable || new.frequency == IncomeFrequency::Variable),
        created_at: Set(now),
        updated_at: Set(now),
        total_received: Set(Money::ZERO),
        weekly_amount: Set(Money::ZERO),
        current_period_income: Set(Money::ZERO),
        aggregates_refreshed_at: Set(None),
        ..Default::default()
    };
    let created = model.insert(ctx.db()).await?;
    info!(income_id = created.id, user_id = created.user_id, "Created income");
    ctx.income_changed(created.id, created.user_id).await?;
    Ok(created)
}

/// Retrieves an income by id.
pub async fn get_income_by_id(
    db: &DatabaseConnection,
    income_id: i64,
) -> Result<Option<income::Model>> {
    Income::find_by_id(income_id).one(db).await.map_err(Into::into)
}

/// All incomes of a user, ordered by source.
pub async fn get_incomes_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<income::Model>> {
    Income::find()
        .filter(income::Column::UserId.eq(user_id))
        .order_by_asc(income::Column::Source)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update to an income.
pub async fn update_income(
    ctx: &AppContext,
    income_id: i64,
    update: IncomeUpdate,
) -> Result<income::Model> {
    let existing = get_income_by_id(ctx.db(), income_id)
        .await?
        .ok_or(Error::IncomeNotFound { id: income_id })?;

    let source = update.source.unwrap_or_else(|| existing.source.clone());
    let amount = update.amount.unwrap_or_else(|| existing.amount.value());
    validate_income(&source, amount)?;
    let frequency = update.frequency.unwrap_or(existing.frequency);
    let is_variable = update.is_variable.unwrap_or(existing.is_variable)
        || frequency == IncomeFrequency::Variable;

    let mut model: income::ActiveModel = existing.into();
    model.source = Set(source.trim().to_string());
    model.amount = Set(Money(amount));
    model.frequency = Set(frequency);
    model.is_variable = Set(is_variable);
    model.updated_at = Set(ctx.clock().now());
    let updated = model.update(ctx.db()).await?;

    ctx.income_changed(updated.id, updated.user_id).await?;
    Ok(updated)
}

/// Deletes an income and every payment recorded against it.
pub async fn delete_income(ctx: &AppContext, income_id: i64) -> Result<()> {
    let txn = ctx.db().begin().await?;
    let existing = Income::find_by_id(income_id)
        .one(&txn)
        .await?
        .ok_or(Error::IncomeNotFound { id: income_id })?;
    let user_id = existing.user_id;

    IncomeTransaction::delete_many()
        .filter(income_transaction::Column::IncomeId.eq(income_id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;
    txn.commit().await?;

    info!(income_id, "Deleted income");
    ctx.cache().invalidate_income(income_id).await;
    ctx.cache().invalidate_user(user_id).await;
    Ok(())
}

/// Records a payment against an income.
pub async fn create_income_transaction(
    ctx: &AppContext,
    new: NewIncomeTransaction,
) -> Result<income_transaction::Model> {
    if new.amount.is_zero() {
        return Err(Error::InvalidAmount { amount: new.amount });
    }
    let parent = get_income_by_id(ctx.db(), new.income_id)
        .await?
        .ok_or(Error::IncomeNotFound { id: new.income_id })?;

    let model = income_transaction::ActiveModel {
        income_id: Set(parent.id),
        user_id: Set(parent.user_id),
        amount: Set(Money(new.amount)),
        description: Set(new.description),
        date: Set(new.date),
        ..Default::default()
    };
    let created = model.insert(ctx.db()).await?;
    ctx.income_changed(parent.id, parent.user_id).await?;
    Ok(created)
}

/// Applies a partial update to a payment.
///
/// Moving a payment to another income refreshes both incomes.
pub async fn update_income_transaction(
    ctx: &AppContext,
    payment_id: i64,
    update: IncomeTransactionUpdate,
) -> Result<income_transaction::Model> {
    let existing = IncomeTransaction::find_by_id(payment_id)
        .one(ctx.db())
        .await?
        .ok_or(Error::TransactionNotFound { id: payment_id })?;
    let old_income_id = existing.income_id;

    let mut model: income_transaction::ActiveModel = existing.clone().into();
    if let Some(amount) = update.amount {
        if amount.is_zero() {
            return Err(Error::InvalidAmount { amount });
        }
        model.amount = Set(Money(amount));
    }
    if let Some(description) = update.description {
        model.description = Set(description);
    }
    if let Some(date) = update.date {
        model.date = Set(date);
    }
    if let Some(income_id) = update.income_id.filter(|id| *id != old_income_id) {
        let target = get_income_by_id(ctx.db(), income_id)
            .await?
            .ok_or(Error::IncomeNotFound { id: income_id })?;
        if target.user_id != existing.user_id {
            return Err(Error::Validation {
                message: "Cannot move a payment to another user's income".to_string(),
            });
        }
        model.income_id = Set(income_id);
    }
    let updated = model.update(ctx.db()).await?;

    if updated.income_id != old_income_id {
        ctx.income_changed(old_income_id, updated.user_id).await?;
    }
    ctx.income_changed(updated.income_id, updated.user_id).await?;
    Ok(updated)
}

/// Deletes a payment.
pub async fn delete_income_transaction(ctx: &AppContext, payment_id: i64) -> Result<()> {
    let payment = IncomeTransaction::find_by_id(payment_id)
        .one(ctx.db())
        .await?
        .ok_or(Error::TransactionNotFound { id: payment_id })?;
    let (income_id, user_id) = (payment.income_id, payment.user_id);
    payment.delete(ctx.db()).await?;
    ctx.income_changed(income_id, user_id).await
}

/// Payments for one income, newest first.
pub async fn get_income_transactions(
    db: &DatabaseConnection,
    income_id: i64,
) -> Result<Vec<income_transaction::Model>> {
    IncomeTransaction::find()
        .filter(income_transaction::Column::IncomeId.eq(income_id))
        .order_by_desc(income_transaction::Column::Date)
        .order_by_desc(income_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A user's most recent payments across all incomes.
pub async fn recent_income_transactions_for_user(
    db: &DatabaseConnection,
    user_id: i64,
    limit: u64,
) -> Result<Vec<income_transaction::Model>> {
    IncomeTransaction::find()
        .filter(income_transaction::Column::UserId.eq(user_id))
        .order_by_desc(income_transaction::Column::Date)
        .order_by_desc(income_transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Live figures for an income, served from the read cache when possible.
pub async fn income_figures(ctx: &AppContext, income_id: i64) -> Result<Arc<IncomeFigures>> {
    let today = ctx.today();
    if let Some(hit) = ctx.cache().income(income_id, today).await {
        return Ok(hit);
    }
    let generation = ctx.cache().generation().await;

    let existing = get_income_by_id(ctx.db(), income_id)
        .await?
        .ok_or(Error::IncomeNotFound { id: income_id })?;
    let payments = get_income_transactions(ctx.db(), income_id).await?;
    let figures = Arc::new(IncomeFigures::compute(
        &existing,
        &entries(&payments),
        ctx.tz(),
        today,
        ctx.settings().variable_income_window_days,
    ));

    ctx.cache()
        .store_income(income_id, today, Arc::clone(&figures), generation)
        .await;
    Ok(figures)
}
