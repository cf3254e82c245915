//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Two unique indexes are added on top:
//! one on `(recurring_transaction_id, date)` so a recurring template can never write
//! the same day twice, and one on `(budget_id, start_date)` for persisted periods.

use crate::entities::{
    Budget, BudgetPeriod, Income, IncomeTransaction, RecurringTransaction, Transaction,
    budget_period, transaction,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/budget_tracker.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(parent) = sqlite_file_parent(&database_url) {
        std::fs::create_dir_all(parent)?;
    }
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Directory holding the `SQLite` file of a `sqlite://` URL, if it has one.
fn sqlite_file_parent(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}

/// Creates all tables and indexes if they do not exist yet.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Budget).await?;
    create_table(db, &schema, RecurringTransaction).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, BudgetPeriod).await?;
    create_table(db, &schema, Income).await?;
    create_table(db, &schema, IncomeTransaction).await?;

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    info!("Database schema ready");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_transactions_template_date")
            .table(Transaction)
            .col(transaction::Column::RecurringTransactionId)
            .col(transaction::Column::Date)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_transactions_budget_date")
            .table(Transaction)
            .col(transaction::Column::BudgetId)
            .col(transaction::Column::Date)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_budget_periods_budget_start")
            .table(BudgetPeriod)
            .col(budget_period::Column::BudgetId)
            .col(budget_period::Column::StartDate)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BudgetModel, BudgetPeriodModel, IncomeModel, TransactionModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<BudgetModel> = Budget::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<BudgetPeriodModel> = BudgetPeriod::find().limit(1).all(&db).await?;
        let _: Vec<IncomeModel> = Income::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[test]
    fn test_sqlite_file_parent() {
        assert_eq!(
            sqlite_file_parent("sqlite://data/budget_tracker.sqlite?mode=rwc"),
            Some(Path::new("data"))
        );
        assert_eq!(sqlite_file_parent("sqlite://budget.sqlite"), None);
        assert_eq!(sqlite_file_parent("sqlite::memory:"), None);
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
