//! Recurring transaction entity - A template that materializes transactions on a schedule.
//!
//! `last_generated` is the watermark: the most recent due date for which a
//! transaction was created or found to already exist.

use super::frequency::RecurrenceFrequency;
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recurring template database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recurring_transactions")]
pub struct Model {
    /// Unique identifier for the template
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Budget the generated transactions are charged to
    pub budget_id: i64,
    /// Owning user
    pub user_id: i64,
    /// Amount of each generated transaction
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Description copied onto generated transactions
    pub description: String,
    /// Step between due dates
    pub frequency: RecurrenceFrequency,
    /// First due date
    pub start_date: Date,
    /// Last day on which a transaction may be generated
    pub end_date: Option<Date>,
    /// Watermark of the last processed due date
    pub last_generated: Option<Date>,
    /// False once the template is exhausted or paused
    pub active: bool,
}

/// Defines relationships between the template and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each template belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
    /// Transactions generated by this template
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
