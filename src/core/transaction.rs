//! Transaction business logic - Spend and refunds logged against a budget.
//!
//! Transactions store a calendar day only; instants are reduced to the local
//! day before saving. Every mutation drops the cached views of the affected
//! budget and its owner before returning and queues an aggregate refresh.

use crate::core::clock::normalize_to_day;
use crate::core::context::AppContext;
use crate::entities::{Budget, Money, Transaction, transaction};
use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::debug;

/// Input for [`create_transaction`].
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Budget to charge
    pub budget_id: i64,
    /// Signed amount; positive is spend, negative a refund
    pub amount: Decimal,
    /// Description
    pub description: String,
    /// Calendar day of the transaction
    pub date: NaiveDate,
}

impl NewTransaction {
    /// Input dated on the local day `instant` falls on in `tz`.
    #[must_use]
    pub fn at<T: TimeZone>(
        budget_id: i64,
        amount: Decimal,
        description: impl Into<String>,
        instant: &DateTime<T>,
        tz: Tz,
    ) -> Self {
        Self {
            budget_id,
            amount,
            description: description.into(),
            date: normalize_to_day(instant, tz),
        }
    }
}

/// Partial update for a transaction; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    /// Move to another budget of the same user
    pub budget_id: Option<i64>,
    /// New amount
    pub amount: Option<Decimal>,
    /// New description
    pub description: Option<String>,
    /// New calendar day
    pub date: Option<NaiveDate>,
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Creates a transaction against an existing budget.
pub async fn create_transaction(
    ctx: &AppContext,
    new: NewTransaction,
) -> Result<transaction::Model> {
    validate_amount(new.amount)?;

    let budget = Budget::find_by_id(new.budget_id)
        .one(ctx.db())
        .await?
        .ok_or(Error::BudgetNotFound { id: new.budget_id })?;

    let model = transaction::ActiveModel {
        budget_id: Set(budget.id),
        user_id: Set(budget.user_id),
        amount: Set(Money(new.amount)),
        description: Set(new.description),
        date: Set(new.date),
        recurring_transaction_id: Set(None),
        ..Default::default()
    };
    let created = model.insert(ctx.db()).await?;
    debug!(transaction_id = created.id, budget_id = budget.id, "Created transaction");

    ctx.budget_changed(budget.id, budget.user_id).await?;
    Ok(created)
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All transactions of a budget, newest first.
pub async fn get_transactions_for_budget(
    db: &DatabaseConnection,
    budget_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::BudgetId.eq(budget_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A user's most recent transactions across all budgets.
pub async fn get_recent_transactions_for_user(
    db: &DatabaseConnection,
    user_id: i64,
    limit: u64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update. Moving a transaction refreshes both budgets.
pub async fn update_transaction(
    ctx: &AppContext,
    transaction_id: i64,
    update: TransactionUpdate,
) -> Result<transaction::Model> {
    let existing = get_transaction_by_id(ctx.db(), transaction_id)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;
    let old_budget_id = existing.budget_id;

    let mut model: transaction::ActiveModel = existing.clone().into();
    if let Some(amount) = update.amount {
        validate_amount(amount)?;
        model.amount = Set(Money(amount));
    }
    if let Some(description) = update.description {
        model.description = Set(description);
    }
    if let Some(date) = update.date {
        model.date = Set(date);
    }
    if let Some(budget_id) = update.budget_id.filter(|id| *id != old_budget_id) {
        let target = Budget::find_by_id(budget_id)
            .one(ctx.db())
            .await?
            .ok_or(Error::BudgetNotFound { id: budget_id })?;
        if target.user_id != existing.user_id {
            return Err(Error::Validation {
                message: "Cannot move a transaction to another user's budget".to_string(),
            });
        }
        model.budget_id = Set(budget_id);
    }
    let updated = model.update(ctx.db()).await?;

    if updated.budget_id != old_budget_id {
        ctx.budget_changed(old_budget_id, updated.user_id).await?;
    }
    ctx.budget_changed(updated.budget_id, updated.user_id).await?;
    Ok(updated)
}

/// Deletes a transaction.
pub async fn delete_transaction(ctx: &AppContext, transaction_id: i64) -> Result<()> {
    let existing = get_transaction_by_id(ctx.db(), transaction_id)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;
    let (budget_id, user_id) = (existing.budget_id, existing.user_id);

    existing.delete(ctx.db()).await?;
    ctx.budget_changed(budget_id, user_id).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::budget::{self, NewBudget};
    use crate::test_utils::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_create_transaction_validation() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        let result = create_transaction(
            &ctx,
            NewTransaction {
                budget_id: 1,
                amount: dec!(0),
                description: "test".to_string(),
                date: d(2024, 5, 7),
            },
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidAmount { amount } if amount.is_zero()
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_transaction_budget_not_found() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 7)).await?;
        let result = create_transaction(
            &ctx,
            NewTransaction {
                budget_id: 999,
                amount: dec!(50),
                description: "test".to_string(),
                date: d(2024, 5, 7),
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::BudgetNotFound { id: 999 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_transaction_by_id_not_found() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<transaction::Model>::new()])
            .into_connection();
        assert!(get_transaction_by_id(&db, 404).await?.is_none());
        Ok(())
    }

    #[test]
    fn test_new_transaction_at_uses_local_day() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let new = NewTransaction::at(1, dec!(5), "Late snack", &instant, chrono_tz::Pacific::Auckland);
        assert_eq!(new.date, d(2024, 3, 11));
    }

    #[tokio::test]
    async fn test_mutations_are_visible_immediately() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let budget = create_test_budget(&ctx, "Groceries").await?;

        // Warm the cache
        assert_eq!(budget::current_period(&ctx, budget.id).await?.total_spent, dec!(0));

        let tx = create_test_transaction(&ctx, budget.id, dec!(25.10), d(2024, 5, 8)).await?;
        assert_eq!(budget::current_period(&ctx, budget.id).await?.total_spent, dec!(25.10));

        update_transaction(
            &ctx,
            tx.id,
            TransactionUpdate {
                amount: Some(dec!(40)),
                ..TransactionUpdate::default()
            },
        )
        .await?;
        assert_eq!(budget::current_period(&ctx, budget.id).await?.total_spent, dec!(40));

        delete_transaction(&ctx, tx.id).await?;
        assert_eq!(budget::current_period(&ctx, budget.id).await?.total_spent, dec!(0));
        assert!(matches!(
            delete_transaction(&ctx, tx.id).await,
            Err(Error::TransactionNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_move_transaction_between_budgets() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let food = create_test_budget(&ctx, "Food").await?;
        let fun = create_test_budget(&ctx, "Fun").await?;
        let tx = create_test_transaction(&ctx, food.id, dec!(18), d(2024, 5, 8)).await?;

        update_transaction(
            &ctx,
            tx.id,
            TransactionUpdate {
                budget_id: Some(fun.id),
                ..TransactionUpdate::default()
            },
        )
        .await?;

        assert_eq!(budget::current_period(&ctx, food.id).await?.total_spent, dec!(0));
        assert_eq!(budget::current_period(&ctx, fun.id).await?.total_spent, dec!(18));
        Ok(())
    }

    #[tokio::test]
    async fn test_cannot_move_to_another_users_budget() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let mine = create_test_budget(&ctx, "Mine").await?;
        let theirs = budget::create_budget(
            &ctx,
            NewBudget {
                user_id: TEST_USER_ID + 1,
                ..test_new_budget("Theirs")
            },
        )
        .await?;
        let tx = create_test_transaction(&ctx, mine.id, dec!(5), d(2024, 5, 8)).await?;

        let result = update_transaction(
            &ctx,
            tx.id,
            TransactionUpdate {
                budget_id: Some(theirs.id),
                ..TransactionUpdate::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_transactions_for_user() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let budget = create_test_budget(&ctx, "Misc").await?;
        for day in 1..=12 {
            create_test_transaction(&ctx, budget.id, dec!(1), d(2024, 5, day)).await?;
        }

        let recent = get_recent_transactions_for_user(ctx.db(), TEST_USER_ID, 10).await?;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].date, d(2024, 5, 12));
        assert_eq!(get_transactions_for_budget(ctx.db(), budget.id).await?.len(), 12);
        Ok(())
    }
}
