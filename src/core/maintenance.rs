//! Operational jobs run from the command line.
//!
//! - `recompute_all` rebuilds every budget's and income's aggregate columns.
//! - `check_integrity` compares persisted periods with a fresh computation.
//! - `migrate_legacy_history` turns the serialized `historical_periods` column
//!   into `budget_periods` rows, skipping records it cannot read.

use crate::core::aggregates::{self, period_row, stored_periods};
use crate::core::budget::get_all_budgets;
use crate::core::context::AppContext;
use crate::core::history;
use crate::core::period::{PeriodEngine, PeriodSummary};
use crate::entities::{BudgetPeriod, Income, Transaction, budget, budget_period, transaction};
use crate::errors::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{QueryOrder, prelude::*};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Counts from a [`recompute_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Budgets refreshed
    pub budgets: usize,
    /// Incomes refreshed
    pub incomes: usize,
}

/// Recomputes every aggregate synchronously.
#[instrument(skip(ctx))]
pub async fn recompute_all(ctx: &AppContext) -> Result<RecomputeReport> {
    let today = ctx.today();
    let mut report = RecomputeReport::default();

    for row in get_all_budgets(ctx.db()).await? {
        aggregates::refresh_budget(ctx.db(), row.id, today, ctx.tz(), ctx.settings()).await?;
        report.budgets += 1;
    }
    for row in Income::find().all(ctx.db()).await? {
        aggregates::refresh_income(ctx.db(), row.id, today, ctx.tz(), ctx.settings()).await?;
        report.incomes += 1;
    }

    ctx.cache().clear().await;
    info!(budgets = report.budgets, incomes = report.incomes, "Recomputed all aggregates");
    Ok(report)
}

/// One disagreement between stored and computed periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// Different number of periods
    CountMismatch {
        /// Budget checked
        budget_id: i64,
        /// Periods a fresh computation yields
        expected: usize,
        /// Rows stored
        found: usize,
    },
    /// A stored period differs from the computed one
    FieldMismatch {
        /// Budget checked
        budget_id: i64,
        /// 1-based position, most recent first
        position: usize,
        /// Field name
        field: &'static str,
        /// Computed value
        expected: String,
        /// Stored value
        found: String,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CountMismatch {
                budget_id,
                expected,
                found,
            } => write!(
                f,
                "Budget {budget_id}: period count mismatch (expected {expected}, found {found})"
            ),
            Self::FieldMismatch {
                budget_id,
                position,
                field,
                expected,
                found,
            } => write!(
                f,
                "Budget {budget_id} period {position}: {field}: expected {expected}, got {found}"
            ),
        }
    }
}

/// Compares each budget's stored periods with a fresh computation.
///
/// An empty result means every stored row is correct.
#[instrument(skip(ctx))]
pub async fn check_integrity(ctx: &AppContext) -> Result<Vec<IntegrityIssue>> {
    let today = ctx.today();
    let mut issues = Vec::new();

    for row in get_all_budgets(ctx.db()).await? {
        let transactions = Transaction::find()
            .filter(transaction::Column::BudgetId.eq(row.id))
            .order_by_asc(transaction::Column::Date)
            .all(ctx.db())
            .await?;
        let engine = PeriodEngine::for_budget(&row, &transactions, ctx.tz(), today);
        let expected = history::history(&engine, ctx.settings().detail_history_periods);
        let found = stored_periods(ctx.db(), row.id).await?;
        issues.extend(compare_periods(row.id, &expected, &found));
    }

    if issues.is_empty() {
        info!("All stored periods are correct");
    } else {
        warn!(count = issues.len(), "Stored periods differ from computed history");
    }
    Ok(issues)
}

fn compare_periods(
    budget_id: i64,
    expected: &[PeriodSummary],
    found: &[budget_period::Model],
) -> Vec<IntegrityIssue> {
    if expected.len() != found.len() {
        return vec![IntegrityIssue::CountMismatch {
            budget_id,
            expected: expected.len(),
            found: found.len(),
        }];
    }

    let mut issues = Vec::new();
    for (index, (exp, act)) in expected.iter().zip(found).enumerate() {
        let pairs: [(&'static str, String, String); 7] = [
            ("start_date", exp.start_date.to_string(), act.start_date.to_string()),
            ("end_date", exp.end_date.to_string(), act.end_date.to_string()),
            (
                "budget_amount",
                exp.budget_amount.normalize().to_string(),
                act.budget_amount.value().normalize().to_string(),
            ),
            (
                "total_spent",
                exp.total_spent.normalize().to_string(),
                act.total_spent.value().normalize().to_string(),
            ),
            (
                "difference",
                exp.difference.normalize().to_string(),
                act.difference.value().normalize().to_string(),
            ),
            ("is_current", exp.is_current.to_string(), act.is_current.to_string()),
            (
                "is_over_budget",
                exp.is_over_budget.to_string(),
                act.is_over_budget.to_string(),
            ),
        ];
        for (field, expected, found) in pairs {
            if expected != found {
                issues.push(IntegrityIssue::FieldMismatch {
                    budget_id,
                    position: index + 1,
                    field,
                    expected,
                    found,
                });
            }
        }
    }
    issues
}

/// Counts from a [`migrate_legacy_history`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Rows inserted
    pub migrated: usize,
    /// Records that already had a row
    pub existing: usize,
    /// Records that could not be read
    pub skipped: usize,
}

/// Copies serialized history records into `budget_periods` rows.
///
/// Existing rows for the same `(budget, start_date)` are left untouched.
/// Missing money fields default to the budget amount (for `budget_amount`) or
/// zero; a record without readable dates is logged and skipped.
#[instrument(skip(ctx))]
pub async fn migrate_legacy_history(ctx: &AppContext) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    for row in get_all_budgets(ctx.db()).await? {
        let Some(raw) = row.historical_periods.as_deref() else {
            continue;
        };
        let records = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                warn!(budget_id = row.id, "Serialized history is not a list, skipping");
                continue;
            }
            Err(e) => {
                warn!(budget_id = row.id, "Unreadable serialized history: {}", e);
                continue;
            }
        };

        for record in &records {
            let period = match parse_legacy_period(&row, record) {
                Ok(period) => period,
                Err(reason) => {
                    warn!(budget_id = row.id, "Skipping history record: {}", reason);
                    report.skipped += 1;
                    continue;
                }
            };
            let inserted = BudgetPeriod::insert(period_row(row.id, &period))
                .on_conflict(
                    OnConflict::columns([
                        budget_period::Column::BudgetId,
                        budget_period::Column::StartDate,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(ctx.db())
                .await?;
            if inserted == 0 {
                report.existing += 1;
            } else {
                report.migrated += 1;
            }
        }
    }

    info!(
        migrated = report.migrated,
        existing = report.existing,
        skipped = report.skipped,
        "Legacy history migration finished"
    );
    Ok(report)
}

fn parse_legacy_period(
    budget: &budget::Model,
    record: &Value,
) -> std::result::Result<PeriodSummary, String> {
    let start_date = legacy_date(record, "start_date")?;
    let end_date = legacy_date(record, "end_date")?;
    if end_date < start_date {
        return Err(format!("end_date {end_date} precedes start_date {start_date}"));
    }

    let base_budget = legacy_decimal(record, "base_budget")?.unwrap_or(budget.amount.value());
    let budget_amount = legacy_decimal(record, "budget_amount")?.unwrap_or(budget.amount.value());
    let total_spent = legacy_decimal(record, "total_spent")?.unwrap_or(Decimal::ZERO);
    let rollover_amount = legacy_decimal(record, "rollover_amount")?.unwrap_or(Decimal::ZERO);
    let difference = legacy_decimal(record, "difference")?.unwrap_or(Decimal::ZERO);
    let balance = legacy_decimal(record, "balance")?.unwrap_or(difference);

    Ok(PeriodSummary {
        start_date,
        end_date,
        total_spent,
        balance,
        budget_amount,
        base_budget,
        rollover_amount,
        difference,
        is_over_budget: record
            .get("is_over_budget")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        is_current: record
            .get("is_current")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn legacy_date(record: &Value, field: &str) -> std::result::Result<NaiveDate, String> {
    let text = record
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing {field}"))?;
    // Datetime strings keep only their date part
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| format!("bad {field} {text:?}: {e}"))
}

fn legacy_decimal(record: &Value, field: &str) -> std::result::Result<Option<Decimal>, String> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Decimal::from_str(text)
            .map(Some)
            .map_err(|e| format!("bad {field} {text:?}: {e}")),
        // Go through the textual form so 0.1 stays 0.1
        Some(Value::Number(number)) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .map(Some)
            .map_err(|e| format!("bad {field} {number}: {e}")),
        Some(other) => Err(format!("bad {field}: {other}")),
    }
}
