//! Recurring transaction expansion.
//!
//! A template is either active or exhausted. Each expansion pass with a given
//! "today" walks the template's due dates from the watermark forward and makes
//! sure exactly one transaction exists for each of them. Re-running a pass is
//! always safe: dates that already have a transaction only advance the
//! watermark. Passes for the same template are serialized by [`TemplateLocks`],
//! and the `(recurring_transaction_id, date)` unique index rejects any duplicate
//! that slips past (for example from a second process).
//!
//! Each due date is one step after the previous one. Monthly and yearly steps
//! clamp to the last day of a short month, and the clamped day carries
//! forward: a template starting Jan 31 fires Jan 31, Feb 29, Mar 29.

use crate::core::calendar::{add_days, add_months_clamped};
use crate::core::context::AppContext;
use crate::entities::{
    Budget, Money, RecurrenceFrequency, RecurringTransaction, Transaction, recurring_transaction,
    transaction,
};
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Per-template async locks held for a whole expansion pass.
#[derive(Debug, Clone, Default)]
pub struct TemplateLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TemplateLocks {
    /// Lock handle for one template.
    #[must_use]
    pub fn for_template(&self, template_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(map.entry(template_id).or_default())
    }
}

/// What one expansion pass should do, computed without touching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionPlan {
    /// Template is paused or already exhausted
    Inactive,
    /// `today` is past the end date; deactivate and emit nothing
    Exhaust,
    /// Make sure a transaction exists for each of these dates, in order
    Generate(Vec<NaiveDate>),
}

/// The due date one step after `from`.
pub fn next_due_date(from: NaiveDate, frequency: RecurrenceFrequency) -> Result<NaiveDate> {
    match frequency {
        RecurrenceFrequency::Daily => add_days(from, 1),
        RecurrenceFrequency::Weekly => add_days(from, 7),
        RecurrenceFrequency::Fortnightly => add_days(from, 14),
        RecurrenceFrequency::Monthly => add_months_clamped(from, 1),
        RecurrenceFrequency::Yearly => add_months_clamped(from, 12),
    }
}

/// Plans an expansion pass for `template` as of `today`.
pub fn plan_expansion(
    template: &recurring_transaction::Model,
    today: NaiveDate,
) -> Result<ExpansionPlan> {
    if !template.active {
        return Ok(ExpansionPlan::Inactive);
    }
    if template.end_date.is_some_and(|end| today > end) {
        return Ok(ExpansionPlan::Exhaust);
    }

    let mut due = Vec::new();
    let mut next = match template.last_generated {
        Some(watermark) => next_due_date(watermark, template.frequency)?,
        None => template.start_date,
    };
    while next <= today && template.end_date.is_none_or(|end| next <= end) {
        due.push(next);
        next = next_due_date(next, template.frequency)?;
    }
    Ok(ExpansionPlan::Generate(due))
}

/// Input for [`create_template`].
#[derive(Debug, Clone)]
pub struct NewTemplate {
    /// Budget the generated transactions belong to
    pub budget_id: i64,
    /// Amount of each generated transaction
    pub amount: Decimal,
    /// Description copied onto generated transactions
    pub description: String,
    /// Step between due dates
    pub frequency: RecurrenceFrequency,
    /// First due date
    pub start_date: NaiveDate,
    /// Optional last due date
    pub end_date: Option<NaiveDate>,
}

/// Partial update for [`update_template`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    /// Move to another budget of the same user
    pub budget_id: Option<i64>,
    /// New amount
    pub amount: Option<Decimal>,
    /// New description
    pub description: Option<String>,
    /// New step
    pub frequency: Option<RecurrenceFrequency>,
    /// New first due date
    pub start_date: Option<NaiveDate>,
    /// New end date; `Some(None)` removes it
    pub end_date: Option<Option<NaiveDate>>,
}

fn validate_template(
    description: &str,
    amount: Decimal,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<()> {
    if description.trim().is_empty() {
        return Err(Error::Validation {
            message: "Recurring transaction description cannot be empty".to_string(),
        });
    }
    if amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    if end_date.is_some_and(|end| end < start_date) {
        return Err(Error::Validation {
            message: "End date cannot be before start date".to_string(),
        });
    }
    Ok(())
}

/// Creates an active recurring template.
pub async fn create_template(
    ctx: &AppContext,
    template: NewTemplate,
) -> Result<recurring_transaction::Model> {
    validate_template(
        &template.description,
        template.amount,
        template.start_date,
        template.end_date,
    )?;

    let budget = Budget::find_by_id(template.budget_id)
        .one(ctx.db())
        .await?
        .ok_or(Error::BudgetNotFound {
            id: template.budget_id,
        })?;

    let model = recurring_transaction::ActiveModel {
        budget_id: Set(budget.id),
        user_id: Set(budget.user_id),
        amount: Set(Money(template.amount)),
        description: Set(template.description.trim().to_string()),
        frequency: Set(template.frequency),
        start_date: Set(template.start_date),
        end_date: Set(template.end_date),
        last_generated: Set(None),
        active: Set(true),
        ..Default::default()
    };
    let created = model.insert(ctx.db()).await?;
    info!(template_id = created.id, "Created recurring transaction");
    ctx.cache().invalidate_user(created.user_id).await;
    Ok(created)
}

/// Applies a partial update to a template.
///
/// The watermark is kept, so dates already generated are not generated again
/// and a new frequency takes effect from the last generated date. Moving
/// `start_date` past the watermark clears it and the schedule restarts at the
/// new start. Transactions already generated stay where they are.
pub async fn update_template(
    ctx: &AppContext,
    template_id: i64,
    update: TemplateUpdate,
) -> Result<recurring_transaction::Model> {
    let lock = ctx.template_locks().for_template(template_id);
    let _guard = lock.lock().await;

    let existing = get_template_by_id(ctx.db(), template_id)
        .await?
        .ok_or(Error::TemplateNotFound { id: template_id })?;

    let description = update
        .description
        .unwrap_or_else(|| existing.description.clone());
    let amount = update.amount.unwrap_or_else(|| existing.amount.value());
    let start_date = update.start_date.unwrap_or(existing.start_date);
    let end_date = update.end_date.unwrap_or(existing.end_date);
    validate_template(&description, amount, start_date, end_date)?;

    let budget_id = match update.budget_id.filter(|id| *id != existing.budget_id) {
        Some(budget_id) => {
            let target = Budget::find_by_id(budget_id)
                .one(ctx.db())
                .await?
                .ok_or(Error::BudgetNotFound { id: budget_id })?;
            if target.user_id != existing.user_id {
                return Err(Error::Validation {
                    message: "Cannot move a recurring transaction to another user's budget"
                        .to_string(),
                });
            }
            budget_id
        }
        None => existing.budget_id,
    };
    let last_generated = existing
        .last_generated
        .filter(|watermark| start_date <= *watermark);

    let mut model: recurring_transaction::ActiveModel = existing.into();
    model.budget_id = Set(budget_id);
    model.amount = Set(Money(amount));
    model.description = Set(description.trim().to_string());
    if let Some(frequency) = update.frequency {
        model.frequency = Set(frequency);
    }
    model.start_date = Set(start_date);
    model.end_date = Set(end_date);
    model.last_generated = Set(last_generated);
    let updated = model.update(ctx.db()).await?;

    info!(template_id, "Updated recurring transaction");
    ctx.cache().invalidate_user(updated.user_id).await;
    Ok(updated)
}

/// Retrieves a template by id.
pub async fn get_template_by_id(
    db: &DatabaseConnection,
    template_id: i64,
) -> Result<Option<recurring_transaction::Model>> {
    RecurringTransaction::find_by_id(template_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Active templates of a user, ordered by start date.
pub async fn get_active_templates_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<recurring_transaction::Model>> {
    RecurringTransaction::find()
        .filter(recurring_transaction::Column::UserId.eq(user_id))
        .filter(recurring_transaction::Column::Active.eq(true))
        .order_by_asc(recurring_transaction::Column::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Flips a template between active and paused.
pub async fn toggle_template(
    ctx: &AppContext,
    template_id: i64,
) -> Result<recurring_transaction::Model> {
    let template = get_template_by_id(ctx.db(), template_id)
        .await?
        .ok_or(Error::TemplateNotFound { id: template_id })?;
    let active = !template.active;
    let mut model: recurring_transaction::ActiveModel = template.into();
    model.active = Set(active);
    let updated = model.update(ctx.db()).await?;
    info!(template_id, active, "Toggled recurring transaction");
    ctx.cache().invalidate_user(updated.user_id).await;
    Ok(updated)
}

/// Deletes a template. Transactions it generated are kept and unlinked.
pub async fn delete_template(ctx: &AppContext, template_id: i64) -> Result<()> {
    let txn = ctx.db().begin().await?;

    let template = RecurringTransaction::find_by_id(template_id)
        .one(&txn)
        .await?
        .ok_or(Error::TemplateNotFound { id: template_id })?;

    Transaction::update_many()
        .col_expr(
            transaction::Column::RecurringTransactionId,
            Expr::value(Option::<i64>::None),
        )
        .filter(transaction::Column::RecurringTransactionId.eq(template_id))
        .exec(&txn)
        .await?;

    let (budget_id, user_id) = (template.budget_id, template.user_id);
    template.delete(&txn).await?;
    txn.commit().await?;

    info!(template_id, "Deleted recurring transaction");
    ctx.budget_changed(budget_id, user_id).await
}

/// Runs one expansion pass for a template and returns the transactions it created.
///
/// Budgets touched by new transactions have their read cache entries dropped
/// and an aggregate refresh queued before this returns.
#[instrument(skip(ctx))]
pub async fn expand_recurring(
    ctx: &AppContext,
    template_id: i64,
    today: NaiveDate,
) -> Result<Vec<transaction::Model>> {
    let lock = ctx.template_locks().for_template(template_id);
    let _guard = lock.lock().await;

    // Re-read under the lock so a pass that just finished is visible.
    let template = get_template_by_id(ctx.db(), template_id)
        .await?
        .ok_or(Error::TemplateNotFound { id: template_id })?;

    let due_dates = match plan_expansion(&template, today)? {
        ExpansionPlan::Inactive => return Ok(Vec::new()),
        ExpansionPlan::Exhaust => {
            let user_id = template.user_id;
            let mut model: recurring_transaction::ActiveModel = template.into();
            model.active = Set(false);
            model.update(ctx.db()).await?;
            info!(template_id, "Recurring transaction reached its end date");
            ctx.cache().invalidate_user(user_id).await;
            return Ok(Vec::new());
        }
        ExpansionPlan::Generate(dates) => dates,
    };

    let mut created = Vec::new();
    for date in due_dates {
        if let Some(tx) = materialize(ctx.db(), &template, date).await? {
            created.push(tx);
        } else {
            debug!(template_id, %date, "Transaction already exists, advancing watermark");
        }
        set_watermark(ctx.db(), template_id, date).await?;
    }

    if !created.is_empty() {
        info!(template_id, count = created.len(), "Generated recurring transactions");
        ctx.budget_changed(template.budget_id, template.user_id).await?;
    }
    Ok(created)
}

/// Expands every active template of a user.
///
/// A failing template is logged and skipped so one bad row cannot block the
/// rest of the user's schedule.
pub async fn process_recurring_for_user(
    ctx: &AppContext,
    user_id: i64,
    today: NaiveDate,
) -> Result<usize> {
    let templates = get_active_templates_for_user(ctx.db(), user_id).await?;
    let mut created = 0;
    for template in templates {
        match expand_recurring(ctx, template.id, today).await {
            Ok(transactions) => created += transactions.len(),
            Err(e) => warn!(template_id = template.id, "Recurring expansion failed: {}", e),
        }
    }
    Ok(created)
}

/// Inserts the transaction for `(template, date)` unless one already exists.
async fn materialize(
    db: &DatabaseConnection,
    template: &recurring_transaction::Model,
    date: NaiveDate,
) -> Result<Option<transaction::Model>> {
    let existing = Transaction::find()
        .filter(transaction::Column::RecurringTransactionId.eq(template.id))
        .filter(transaction::Column::Date.eq(date))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let model = transaction::ActiveModel {
        budget_id: Set(template.budget_id),
        user_id: Set(template.user_id),
        amount: Set(template.amount),
        description: Set(format!("{} (Recurring)", template.description)),
        date: Set(date),
        recurring_transaction_id: Set(Some(template.id)),
        ..Default::default()
    };

    let inserted = Transaction::insert(model)
        .on_conflict(
            OnConflict::columns([
                transaction::Column::RecurringTransactionId,
                transaction::Column::Date,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    if inserted == 0 {
        return Ok(None);
    }

    Transaction::find()
        .filter(transaction::Column::RecurringTransactionId.eq(template.id))
        .filter(transaction::Column::Date.eq(date))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn set_watermark(db: &DatabaseConnection, template_id: i64, date: NaiveDate) -> Result<()> {
    RecurringTransaction::update_many()
        .col_expr(
            recurring_transaction::Column::LastGenerated,
            Expr::value(Some(date)),
        )
        .filter(recurring_transaction::Column::Id.eq(template_id))
        .exec(db)
        .await?;
    Ok(())
}
