//! Budget period entity - Persisted snapshot of one computed period.
//!
//! Rows are rewritten wholesale by the aggregate refresh and compared against
//! fresh computations by the integrity check.

use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Persisted period database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_periods")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Budget the period belongs to
    pub budget_id: i64,
    /// First day of the period
    pub start_date: Date,
    /// Last day of the period
    pub end_date: Date,
    /// Spend inside the period
    #[sea_orm(column_type = "Text")]
    pub total_spent: Money,
    /// `budget_amount - total_spent`
    #[sea_orm(column_type = "Text")]
    pub balance: Money,
    /// Nominal amount plus carried rollover
    #[sea_orm(column_type = "Text")]
    pub budget_amount: Money,
    /// Nominal amount
    #[sea_orm(column_type = "Text")]
    pub base_budget: Money,
    /// Carry-in from the previous period
    #[sea_orm(column_type = "Text")]
    pub rollover_amount: Money,
    /// Same as `balance`, kept for older readers
    #[sea_orm(column_type = "Text")]
    pub difference: Money,
    /// Whether the period was overspent
    pub is_over_budget: bool,
    /// Whether the period contained "today" at refresh time
    pub is_current: bool,
}

/// Defines relationships between the period and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each period belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
