//! Income transaction entity - Money actually received from an income source.
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Income transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "income_transactions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Income source this payment belongs to
    pub income_id: i64,
    /// Owning user
    pub user_id: i64,
    /// Amount received
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Human-readable description
    pub description: String,
    /// Calendar day the money arrived
    pub date: Date,
}

/// Defines relationships between the payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one income source
    #[sea_orm(
        belongs_to = "super::income::Entity",
        from = "Column::IncomeId",
        to = "super::income::Column::Id",
        on_delete = "Cascade"
    )]
    Income,
}

impl Related<super::income::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Income.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
