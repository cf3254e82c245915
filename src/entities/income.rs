//! Income entity - A source of money coming in.

use super::frequency::IncomeFrequency;
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Income database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "incomes")]
pub struct Model {
    /// Unique identifier for the income source
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Where the money comes from (e.g., "Salary")
    pub source: String,
    /// Expected amount per period
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Pay cycle
    pub frequency: IncomeFrequency,
    /// Whether period income is the actual received sum rather than `amount`
    pub is_variable: bool,
    /// When the income was created
    pub created_at: DateTimeUtc,
    /// When the income was last modified
    pub updated_at: DateTimeUtc,
    /// Sum of all income transactions
    #[sea_orm(column_type = "Text")]
    pub total_received: Money,
    /// Weekly equivalent at last refresh
    #[sea_orm(column_type = "Text")]
    pub weekly_amount: Money,
    /// Income attributed to the current period at last refresh
    #[sea_orm(column_type = "Text")]
    pub current_period_income: Money,
    /// When the aggregate columns were last recomputed
    pub aggregates_refreshed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Income and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One income has many income transactions
    #[sea_orm(has_many = "super::income_transaction::Entity")]
    IncomeTransactions,
}

impl Related<super::income_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IncomeTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
