//! Transaction entity - A single spend logged against a budget.
//!
//! `date` is a calendar day. Any time-of-day supplied by a caller is dropped
//! before the row is written, so period filters compare whole days only.
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the budget this transaction belongs to
    pub budget_id: i64,
    /// User who logged the transaction
    pub user_id: i64,
    /// Signed amount, positive for spending
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Human-readable description of the transaction
    pub description: String,
    /// Calendar day the transaction applies to
    pub date: Date,
    /// Template that generated this transaction, if any
    pub recurring_transaction_id: Option<i64>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
    /// Optional link to the recurring template that produced it
    #[sea_orm(
        belongs_to = "super::recurring_transaction::Entity",
        from = "Column::RecurringTransactionId",
        to = "super::recurring_transaction::Column::Id",
        on_delete = "SetNull"
    )]
    RecurringTransaction,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl Related<super::recurring_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecurringTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
