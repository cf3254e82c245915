//! Shared test utilities for `budget-tracker`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::settings::Settings,
    core::{
        budget::{self, NewBudget},
        clock::FixedClock,
        context::AppContext,
        transaction::{self, NewTransaction},
    },
    entities::{self, PeriodFrequency},
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// User id the builders below assign ownership to.
pub const TEST_USER_ID: i64 = 1;

/// Installs a test-writer tracing subscriber once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a context over a fresh database whose clock is frozen on `today`.
pub async fn setup_test_context(today: NaiveDate) -> Result<AppContext> {
    init_test_tracing();
    let db = setup_test_db().await?;
    AppContext::start(db, Settings::default(), Arc::new(FixedClock::on(today)))
}

/// The same context with its clock moved to `today`.
#[must_use]
pub fn ctx_on(ctx: &AppContext, today: NaiveDate) -> AppContext {
    ctx.with_clock(Arc::new(FixedClock::on(today)))
}

/// Budget input with sensible defaults.
///
/// # Defaults
/// * `user_id`: [`TEST_USER_ID`]
/// * `amount`: 100
/// * `frequency`: weekly
/// * `rollover`: false
#[must_use]
pub fn test_new_budget(category: &str) -> NewBudget {
    NewBudget {
        user_id: TEST_USER_ID,
        category: category.to_string(),
        amount: dec!(100),
        frequency: PeriodFrequency::Weekly,
        rollover: false,
        rollover_max: None,
    }
}

/// Creates a test budget with the defaults of [`test_new_budget`].
pub async fn create_test_budget(ctx: &AppContext, category: &str) -> Result<entities::BudgetModel> {
    budget::create_budget(ctx, test_new_budget(category)).await
}

/// Creates a transaction with a generic description.
pub async fn create_test_transaction(
    ctx: &AppContext,
    budget_id: i64,
    amount: Decimal,
    date: NaiveDate,
) -> Result<entities::TransactionModel> {
    transaction::create_transaction(
        ctx,
        NewTransaction {
            budget_id,
            amount,
            description: "Test transaction".to_string(),
            date,
        },
    )
    .await
}
