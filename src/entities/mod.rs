//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod budget;
pub mod budget_period;
pub mod frequency;
pub mod income;
pub mod income_transaction;
pub mod money;
pub mod recurring_transaction;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use budget_period::{
    Column as BudgetPeriodColumn, Entity as BudgetPeriod, Model as BudgetPeriodModel,
};
pub use frequency::{IncomeFrequency, PeriodFrequency, RecurrenceFrequency};
pub use income::{Column as IncomeColumn, Entity as Income, Model as IncomeModel};
pub use income_transaction::{
    Column as IncomeTransactionColumn, Entity as IncomeTransaction,
    Model as IncomeTransactionModel,
};
pub use money::Money;
pub use recurring_transaction::{
    Column as RecurringTransactionColumn, Entity as RecurringTransaction,
    Model as RecurringTransactionModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
