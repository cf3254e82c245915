//! Budget entity - A spending allowance for one category that resets every period.
//!
//! Besides the user-entered fields a budget carries denormalized aggregate
//! columns (`total_spent`, `avg_weekly_spent`, `historical_periods`) that the
//! background refresh worker recomputes after every transaction mutation.

use super::frequency::PeriodFrequency;
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier for the budget
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Category label (e.g., "Groceries")
    pub category: String,
    /// Nominal amount available each period
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Period length
    pub frequency: PeriodFrequency,
    /// Whether unspent funds carry into the next period
    pub rollover: bool,
    /// Optional cap on the carried amount
    #[sea_orm(column_type = "Text", nullable)]
    pub rollover_max: Option<Money>,
    /// When the budget was created
    pub created_at: DateTimeUtc,
    /// When the budget was last modified
    pub updated_at: DateTimeUtc,
    /// Sum of every transaction ever logged against the budget
    #[sea_orm(column_type = "Text")]
    pub total_spent: Money,
    /// Average weekly spend since the first transaction
    #[sea_orm(column_type = "Text")]
    pub avg_weekly_spent: Money,
    /// Serialized bounded history, most recent period first
    #[sea_orm(column_type = "Text", nullable)]
    pub historical_periods: Option<String>,
    /// When the aggregate columns were last recomputed
    pub aggregates_refreshed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Budget and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One budget has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One budget has many recurring templates
    #[sea_orm(has_many = "super::recurring_transaction::Entity")]
    RecurringTransactions,
    /// One budget has many persisted history rows
    #[sea_orm(has_many = "super::budget_period::Entity")]
    BudgetPeriods,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::recurring_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecurringTransactions.def()
    }
}

impl Related<super::budget_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetPeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
