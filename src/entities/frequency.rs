//! Frequency enums shared by budgets, incomes and recurring templates.
//!
//! Stored as lowercase strings so the database stays readable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often a budget resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PeriodFrequency {
    /// Monday to Sunday
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Two weeks, aligned to the budget's own history
    #[sea_orm(string_value = "fortnightly")]
    Fortnightly,
    /// Calendar month
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Calendar year
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

impl fmt::Display for PeriodFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Weekly => "Weekly",
            Self::Fortnightly => "Fortnightly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        };
        f.write_str(label)
    }
}

/// How often an income source pays out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum IncomeFrequency {
    /// Paid weekly
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Paid fortnightly
    #[sea_orm(string_value = "fortnightly")]
    Fortnightly,
    /// Paid monthly
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Paid yearly
    #[sea_orm(string_value = "yearly")]
    Yearly,
    /// Irregular; weekly amount is averaged from recent income transactions
    #[sea_orm(string_value = "variable")]
    Variable,
}

impl IncomeFrequency {
    /// Period rule used when bucketing income transactions.
    ///
    /// Variable income is tracked per calendar year.
    #[must_use]
    pub const fn period_frequency(self) -> PeriodFrequency {
        match self {
            Self::Weekly => PeriodFrequency::Weekly,
            Self::Fortnightly => PeriodFrequency::Fortnightly,
            Self::Monthly => PeriodFrequency::Monthly,
            Self::Yearly | Self::Variable => PeriodFrequency::Yearly,
        }
    }
}

/// How often a recurring template fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceFrequency {
    /// Every day
    #[sea_orm(string_value = "daily")]
    Daily,
    /// Every 7 days
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Every 14 days
    #[sea_orm(string_value = "fortnightly")]
    Fortnightly,
    /// Same day each calendar month, clamped to month end
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Same day each calendar year
    #[sea_orm(string_value = "yearly")]
    Yearly,
}
