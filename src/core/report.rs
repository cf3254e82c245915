//! Dashboard roll-up and text formatting.
//!
//! The dashboard combines every budget's current period with the user's income
//! into one summary. Due recurring transactions are materialized first so the
//! figures include them. Formatting helpers render summaries for the binary.

use crate::core::budget::{self, BudgetSnapshot};
use crate::core::context::AppContext;
use crate::core::income;
use crate::core::period::PeriodSummary;
use crate::core::recurring;
use crate::core::stats;
use crate::core::transaction;
use crate::entities::{
    BudgetModel, IncomeModel, IncomeTransactionModel, RecurringTransactionModel, TransactionModel,
};
use crate::errors::Result;
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument};

const RECENT_TRANSACTIONS: u64 = 10;
const RECENT_INCOME_TRANSACTIONS: u64 = 5;
const VARIABLE_INCOME_RECENT_DAYS: i64 = 30;
const VARIABLE_INCOME_RECENT_LIMIT: usize = 5;

/// One budget's row on the dashboard.
#[derive(Debug, Clone)]
pub struct BudgetLine {
    /// The budget
    pub budget: BudgetModel,
    /// Its current period
    pub current: PeriodSummary,
    /// Weekly equivalent of the nominal amount
    pub weekly_amount: Decimal,
    /// Average weekly spend
    pub avg_weekly_spent: Decimal,
    /// Balance as a percentage of the effective budget
    pub percentage_remaining: Decimal,
}

impl BudgetLine {
    fn from_snapshot(snapshot: &BudgetSnapshot) -> Self {
        let current = snapshot.current_period();
        Self {
            budget: snapshot.budget.clone(),
            percentage_remaining: stats::percentage_of(current.balance, current.budget_amount),
            weekly_amount: snapshot.weekly_amount(),
            avg_weekly_spent: snapshot.avg_weekly_spent(),
            current,
        }
    }
}

/// Expected versus received for a variable income.
#[derive(Debug, Clone)]
pub struct VariableIncomeLine {
    /// The income source
    pub income: IncomeModel,
    /// Received in the current pay period
    pub actual_period_amount: Decimal,
    /// Nominal amount
    pub expected_amount: Decimal,
    /// `actual_period_amount - expected_amount`
    pub difference: Decimal,
    /// Latest payments from the last 30 days
    pub recent_transactions: Vec<IncomeTransactionModel>,
}

/// Everything the dashboard shows for one user.
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    /// Owner
    pub user_id: i64,
    /// Day the figures were computed for
    pub as_of: NaiveDate,
    /// Per-budget rows
    pub budgets: Vec<BudgetLine>,
    /// Sum of nominal budget amounts
    pub total_budget: Decimal,
    /// Sum of current-period balances
    pub remaining_budget: Decimal,
    /// Sum of current-period spend
    pub total_spent: Decimal,
    /// Sum of weekly budget equivalents
    pub weekly_budgeted: Decimal,
    /// Sum of average weekly spend
    pub weekly_spent: Decimal,
    /// Weekly income across all sources
    pub total_weekly_income: Decimal,
    /// Monthly equivalent of the weekly income
    pub total_monthly_income: Decimal,
    /// Yearly equivalent of the weekly income
    pub total_yearly_income: Decimal,
    /// Weekly income minus weekly budgets
    pub income_remaining_after_budgets: Decimal,
    /// Weekly income minus average weekly spend
    pub income_remaining_after_spend: Decimal,
    /// Income sources
    pub incomes: Vec<IncomeModel>,
    /// Variable income breakdown
    pub variable_incomes: Vec<VariableIncomeLine>,
    /// Latest transactions
    pub recent_transactions: Vec<TransactionModel>,
    /// Latest income payments
    pub recent_income_transactions: Vec<IncomeTransactionModel>,
    /// Active recurring templates
    pub recurring_transactions: Vec<RecurringTransactionModel>,
}

/// Builds (or serves from cache) the dashboard of a user.
#[instrument(skip(ctx))]
pub async fn dashboard(ctx: &AppContext, user_id: i64) -> Result<Arc<DashboardSummary>> {
    let today = ctx.today();
    let generated = recurring::process_recurring_for_user(ctx, user_id, today).await?;
    if generated > 0 {
        debug!(generated, "Materialized recurring transactions");
    }

    if let Some(hit) = ctx.cache().dashboard(user_id, today).await {
        return Ok(hit);
    }
    let generation = ctx.cache().generation().await;

    let mut lines = Vec::new();
    for row in budget::get_budgets_for_user(ctx.db(), user_id).await? {
        let snapshot = budget::snapshot(ctx, row.id).await?;
        lines.push(BudgetLine::from_snapshot(&snapshot));
    }

    let incomes = income::get_incomes_for_user(ctx.db(), user_id).await?;
    let mut total_weekly_income = Decimal::ZERO;
    let mut variable_incomes = Vec::new();
    let recent_cutoff = today
        .checked_sub_signed(Duration::days(VARIABLE_INCOME_RECENT_DAYS))
        .unwrap_or(NaiveDate::MIN);
    for source in &incomes {
        let figures = income::income_figures(ctx, source.id).await?;
        total_weekly_income += figures.weekly_amount;

        if source.is_variable {
            let recent_transactions = income::get_income_transactions(ctx.db(), source.id)
                .await?
                .into_iter()
                .filter(|p| p.date >= recent_cutoff)
                .take(VARIABLE_INCOME_RECENT_LIMIT)
                .collect();
            variable_incomes.push(VariableIncomeLine {
                income: source.clone(),
                actual_period_amount: figures.current_period_income,
                expected_amount: source.amount.value(),
                difference: figures.current_period_income - source.amount.value(),
                recent_transactions,
            });
        }
    }

    let total_budget = lines.iter().map(|l| l.budget.amount.value()).sum();
    let remaining_budget = lines.iter().map(|l| l.current.balance).sum();
    let total_spent = lines.iter().map(|l| l.current.total_spent).sum();
    let weekly_budgeted: Decimal = lines.iter().map(|l| l.weekly_amount).sum();
    let weekly_spent: Decimal = lines.iter().map(|l| l.avg_weekly_spent).sum();

    let summary = Arc::new(DashboardSummary {
        user_id,
        as_of: today,
        total_budget,
        remaining_budget,
        total_spent,
        weekly_budgeted,
        weekly_spent,
        total_weekly_income,
        total_monthly_income: stats::monthly_from_weekly(total_weekly_income),
        total_yearly_income: stats::yearly_from_weekly(total_weekly_income),
        income_remaining_after_budgets: total_weekly_income - weekly_budgeted,
        income_remaining_after_spend: total_weekly_income - weekly_spent,
        budgets: lines,
        incomes,
        variable_incomes,
        recent_transactions: transaction::get_recent_transactions_for_user(
            ctx.db(),
            user_id,
            RECENT_TRANSACTIONS,
        )
        .await?,
        recent_income_transactions: income::recent_income_transactions_for_user(
            ctx.db(),
            user_id,
            RECENT_INCOME_TRANSACTIONS,
        )
        .await?,
        recurring_transactions: recurring::get_active_templates_for_user(ctx.db(), user_id).await?,
    });

    ctx.cache()
        .store_dashboard(user_id, today, Arc::clone(&summary), generation)
        .await;
    Ok(summary)
}

/// Formats money with two decimals and thousands separators, e.g. `-$1,234.50`.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{frac_part}")
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`. The bar is
/// clamped to 0-100 while the label shows the real percentage.
#[must_use]
pub fn format_progress_bar(percent: Decimal, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let filled = (clamped * Decimal::from(length) / Decimal::ONE_HUNDRED)
        .round()
        .to_usize()
        .unwrap_or(0)
        .min(length);
    let empty = length - filled;

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        percent.round_dp(1)
    )
}

/// One line describing a period, e.g. `2024-05-13 to 2024-05-19: spent $30.00 of $150.00`.
#[must_use]
pub fn format_period_line(period: &PeriodSummary) -> String {
    let mut line = format!(
        "{} to {}: spent {} of {}",
        period.start_date,
        period.end_date,
        format_money(period.total_spent),
        format_money(period.budget_amount),
    );
    if !period.rollover_amount.is_zero() {
        let _ = write!(line, " (incl. {} rollover)", format_money(period.rollover_amount));
    }
    if period.is_over_budget {
        let _ = write!(line, ", over by {}", format_money(-period.balance));
    } else {
        let _ = write!(line, ", {} left", format_money(period.balance));
    }
    if period.is_current {
        line.push_str(" [current]");
    }
    line
}

/// Renders a dashboard as plain text.
#[must_use]
pub fn render_dashboard(summary: &DashboardSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dashboard for user {} as of {}", summary.user_id, summary.as_of);
    let _ = writeln!(out);

    for line in &summary.budgets {
        let _ = writeln!(
            out,
            "{} ({}) {}",
            line.budget.category,
            line.budget.frequency,
            format_progress_bar(line.percentage_remaining, None)
        );
        let _ = writeln!(out, "  {}", format_period_line(&line.current));
        let _ = writeln!(
            out,
            "  weekly {} budgeted, {} spent on average",
            format_money(line.weekly_amount),
            format_money(line.avg_weekly_spent)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Budgets: {} total, {} spent, {} remaining",
        format_money(summary.total_budget),
        format_money(summary.total_spent),
        format_money(summary.remaining_budget)
    );
    let _ = writeln!(
        out,
        "Income: {} / week, {} / month, {} / year",
        format_money(summary.total_weekly_income),
        format_money(summary.total_monthly_income),
        format_money(summary.total_yearly_income)
    );
    let _ = writeln!(
        out,
        "Left each week: {} after budgets, {} after spending",
        format_money(summary.income_remaining_after_budgets),
        format_money(summary.income_remaining_after_spend)
    );
    for variable in &summary.variable_incomes {
        let _ = writeln!(
            out,
            "  {}: received {} of {} expected ({})",
            variable.income.source,
            format_money(variable.actual_period_amount),
            format_money(variable.expected_amount),
            format_money(variable.difference)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::income::{NewIncome, NewIncomeTransaction};
    use crate::core::recurring::{NewTemplate, TemplateUpdate};
    use crate::entities::{IncomeFrequency, RecurrenceFrequency};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(dec!(0)), "$0.00");
        assert_eq!(format_money(dec!(5.5)), "$5.50");
        assert_eq!(format_money(dec!(1234.5)), "$1,234.50");
        assert_eq!(format_money(dec!(-1234567.891)), "-$1,234,567.89");
        assert_eq!(format_money(dec!(999.995)), "$1,000.00");
        assert_eq!(format_money(dec!(-0.001)), "$0.00");
    }

    #[test]
    fn test_format_progress_bar() {
        assert_eq!(format_progress_bar(dec!(100), Some(10)), "[██████████] 100.0%");
        assert_eq!(format_progress_bar(dec!(50), Some(10)), "[█████░░░░░] 50.0%");
        assert_eq!(format_progress_bar(dec!(-25), Some(10)), "[░░░░░░░░░░] -25.0%");
        assert_eq!(format_progress_bar(dec!(180), Some(4)), "[████] 180.0%");
    }

    #[test]
    fn test_format_period_line() {
        let period = PeriodSummary {
            start_date: d(2024, 5, 13),
            end_date: d(2024, 5, 19),
            total_spent: dec!(30),
            balance: dec!(120),
            budget_amount: dec!(150),
            base_budget: dec!(100),
            rollover_amount: dec!(50),
            difference: dec!(120),
            is_over_budget: false,
            is_current: true,
        };
        assert_eq!(
            format_period_line(&period),
            "2024-05-13 to 2024-05-19: spent $30.00 of $150.00 (incl. $50.00 rollover), $120.00 left [current]"
        );
    }

    #[tokio::test]
    async fn test_dashboard_totals() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let groceries = create_test_budget(&ctx, "Groceries").await?;
        create_test_budget(&ctx, "Transport").await?;
        create_test_transaction(&ctx, groceries.id, dec!(40), d(2024, 5, 7)).await?;

        income::create_income(
            &ctx,
            NewIncome {
                user_id: TEST_USER_ID,
                source: "Salary".to_string(),
                amount: dec!(1040),
                frequency: IncomeFrequency::Fortnightly,
                is_variable: false,
            },
        )
        .await?;

        let summary = dashboard(&ctx, TEST_USER_ID).await?;
        assert_eq!(summary.budgets.len(), 2);
        assert_eq!(summary.total_budget, dec!(200));
        assert_eq!(summary.total_spent, dec!(40));
        assert_eq!(summary.remaining_budget, dec!(160));
        assert_eq!(summary.weekly_budgeted, dec!(200));
        assert_eq!(summary.total_weekly_income, dec!(520));
        assert_eq!(summary.total_monthly_income, stats::monthly_from_weekly(dec!(520)));
        assert_eq!(summary.total_yearly_income, dec!(27040));
        assert_eq!(summary.income_remaining_after_budgets, dec!(320));
        assert_eq!(summary.recent_transactions.len(), 1);

        let groceries_line = summary
            .budgets
            .iter()
            .find(|l| l.budget.id == groceries.id)
            .unwrap();
        assert_eq!(groceries_line.percentage_remaining, dec!(60));
        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_processes_recurring_first() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let bills = create_test_budget(&ctx, "Bills").await?;
        recurring::create_template(
            &ctx,
            NewTemplate {
                budget_id: bills.id,
                amount: dec!(15),
                description: "Phone".to_string(),
                frequency: RecurrenceFrequency::Weekly,
                start_date: d(2024, 5, 6),
                end_date: None,
            },
        )
        .await?;

        let summary = dashboard(&ctx, TEST_USER_ID).await?;
        assert_eq!(summary.total_spent, dec!(15));
        assert_eq!(summary.recurring_transactions.len(), 1);
        assert_eq!(summary.recent_transactions[0].description, "Phone (Recurring)");

        // A second call is served from cache and generates nothing new
        let again = dashboard(&ctx, TEST_USER_ID).await?;
        assert!(Arc::ptr_eq(&summary, &again));
        Ok(())
    }

    #[tokio::test]
    async fn test_template_changes_refresh_cached_dashboard() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 8)).await?;
        let bills = create_test_budget(&ctx, "Bills").await?;
        let phone = recurring::create_template(
            &ctx,
            NewTemplate {
                budget_id: bills.id,
                amount: dec!(15),
                description: "Phone".to_string(),
                frequency: RecurrenceFrequency::Weekly,
                start_date: d(2024, 5, 6),
                end_date: None,
            },
        )
        .await?;
        assert_eq!(dashboard(&ctx, TEST_USER_ID).await?.recurring_transactions.len(), 1);

        let internet = recurring::create_template(
            &ctx,
            NewTemplate {
                budget_id: bills.id,
                amount: dec!(60),
                description: "Internet".to_string(),
                frequency: RecurrenceFrequency::Monthly,
                start_date: d(2024, 6, 1),
                end_date: None,
            },
        )
        .await?;
        assert_eq!(dashboard(&ctx, TEST_USER_ID).await?.recurring_transactions.len(), 2);

        recurring::update_template(
            &ctx,
            internet.id,
            TemplateUpdate {
                description: Some("Fibre".to_string()),
                ..Default::default()
            },
        )
        .await?;
        let summary = dashboard(&ctx, TEST_USER_ID).await?;
        assert!(summary.recurring_transactions.iter().any(|t| t.description == "Fibre"));

        recurring::toggle_template(&ctx, internet.id).await?;
        assert_eq!(dashboard(&ctx, TEST_USER_ID).await?.recurring_transactions.len(), 1);

        recurring::delete_template(&ctx, phone.id).await?;
        let summary = dashboard(&ctx, TEST_USER_ID).await?;
        assert!(summary.recurring_transactions.is_empty());
        // The generated transaction survives the template
        assert_eq!(summary.total_spent, dec!(15));
        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_variable_income_line() -> Result<()> {
        let ctx = setup_test_context(d(2024, 5, 20)).await?;
        let gig = income::create_income(
            &ctx,
            NewIncome {
                user_id: TEST_USER_ID,
                source: "Gigs".to_string(),
                amount: dec!(500),
                frequency: IncomeFrequency::Monthly,
                is_variable: true,
            },
        )
        .await?;
        income::create_income_transaction(
            &ctx,
            NewIncomeTransaction {
                income_id: gig.id,
                amount: dec!(650),
                description: "Festival".to_string(),
                date: d(2024, 5, 11),
            },
        )
        .await?;

        let summary = dashboard(&ctx, TEST_USER_ID).await?;
        assert_eq!(summary.variable_incomes.len(), 1);
        let line = &summary.variable_incomes[0];
        assert_eq!(line.actual_period_amount, dec!(650));
        assert_eq!(line.difference, dec!(150));
        assert_eq!(line.recent_transactions.len(), 1);
        assert_eq!(summary.recent_income_transactions.len(), 1);

        let text = render_dashboard(&summary);
        assert!(text.contains("Gigs: received $650.00 of $500.00 expected ($150.00)"));
        Ok(())
    }
}
