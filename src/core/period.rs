//! Period aggregator.
//!
//! A [`PeriodEngine`] is built once per budget from its full transaction set
//! and then answers any number of per-period questions without touching the
//! database again. Spend inside a period is an inclusive whole-day range sum
//! over the sorted entries. Rollover is resolved by walking forward from the
//! budget's effective start, one period at a time, feeding each summary into the
//! next.

use crate::core::calendar::{self, next_period_start};
use crate::core::clock::local_date;
use crate::core::rollover::{PriorPeriod, resolve_rollover};
use crate::entities::{BudgetModel, PeriodFrequency, TransactionModel};
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The budget fields that drive period math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetRules {
    /// Nominal amount per period
    pub amount: Decimal,
    /// Period length
    pub frequency: PeriodFrequency,
    /// Whether unspent funds carry forward
    pub rollover: bool,
    /// Optional carry cap
    pub rollover_max: Option<Decimal>,
}

impl BudgetRules {
    /// Extracts the rules from a stored budget.
    #[must_use]
    pub fn from_model(budget: &BudgetModel) -> Self {
        Self {
            amount: budget.amount.value(),
            frequency: budget.frequency,
            rollover: budget.rollover,
            rollover_max: budget.rollover_max.map(|m| m.value()),
        }
    }
}

/// One dated amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Calendar day
    pub date: NaiveDate,
    /// Signed amount
    pub amount: Decimal,
}

impl From<&TransactionModel> for Entry {
    fn from(tx: &TransactionModel) -> Self {
        Self {
            date: tx.date,
            amount: tx.amount.value(),
        }
    }
}

/// Computed state of one budget period.
///
/// This is also the persisted history record; dates serialize as `YYYY-MM-DD`
/// and money as exact decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// First day of the period
    pub start_date: NaiveDate,
    /// Last day of the period
    pub end_date: NaiveDate,
    /// Spend inside the period
    pub total_spent: Decimal,
    /// `budget_amount - total_spent`
    pub balance: Decimal,
    /// Nominal amount plus carry-in
    pub budget_amount: Decimal,
    /// Nominal amount
    pub base_budget: Decimal,
    /// Carry-in from the previous period
    pub rollover_amount: Decimal,
    /// Same as `balance`
    pub difference: Decimal,
    /// `balance < 0`
    pub is_over_budget: bool,
    /// Whether the period contains today
    pub is_current: bool,
}

/// Answers period questions for one budget over an already-fetched transaction set.
#[derive(Debug, Clone)]
pub struct PeriodEngine {
    rules: BudgetRules,
    entries: Vec<Entry>,
    effective_start: NaiveDate,
    today: NaiveDate,
}

impl PeriodEngine {
    /// Builds an engine from rules and entries in any order.
    ///
    /// `created_on` is the budget's creation day in the user's timezone. The
    /// effective start is the period containing the earlier of that day and the
    /// first entry.
    pub fn new<I>(rules: BudgetRules, entries: I, created_on: NaiveDate, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut entries: Vec<Entry> = entries.into_iter().collect();
        entries.sort_by_key(|e| e.date);

        let anchor = entries.first().map_or(created_on, |e| e.date.min(created_on));
        let effective_start = calendar::period_start(anchor, rules.frequency, anchor);

        Self {
            rules,
            entries,
            effective_start,
            today,
        }
    }

    /// Builds an engine for a stored budget and its transactions.
    #[must_use]
    pub fn for_budget(
        budget: &BudgetModel,
        transactions: &[TransactionModel],
        tz: Tz,
        today: NaiveDate,
    ) -> Self {
        Self::new(
            BudgetRules::from_model(budget),
            transactions.iter().map(Entry::from),
            local_date(budget.created_at, tz),
            today,
        )
    }

    /// Rules the engine was built with.
    #[must_use]
    pub const fn rules(&self) -> &BudgetRules {
        &self.rules
    }

    /// Entries sorted by date.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Earliest period boundary relevant to the budget.
    #[must_use]
    pub const fn effective_start(&self) -> NaiveDate {
        self.effective_start
    }

    /// The reference day.
    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }

    /// Start of the period containing `date`.
    #[must_use]
    pub fn period_start_for(&self, date: NaiveDate) -> NaiveDate {
        calendar::period_start(date, self.rules.frequency, self.effective_start)
    }

    /// Start of the period containing today.
    #[must_use]
    pub fn current_period_start(&self) -> NaiveDate {
        self.period_start_for(self.today)
    }

    /// Sum of entries dated within `[start, end]`, both days inclusive.
    #[must_use]
    pub fn spent_between(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        let lo = self.entries.partition_point(|e| e.date < start);
        let hi = self.entries.partition_point(|e| e.date <= end);
        self.entries
            .get(lo..hi)
            .map_or(Decimal::ZERO, |slice| slice.iter().map(|e| e.amount).sum())
    }

    /// Summary of the period containing `date`.
    #[must_use]
    pub fn summarize(&self, date: NaiveDate) -> PeriodSummary {
        let start = self.period_start_for(date);
        if !self.carries_into(start) {
            return self.build_summary(start, None);
        }
        self.periods_through(start)
            .pop()
            .unwrap_or_else(|| self.build_summary(start, None))
    }

    /// Every period from the effective start up to and including the one
    /// containing `date`, oldest first.
    ///
    /// When `date` precedes the effective start only its own period is
    /// returned, with no carry.
    #[must_use]
    pub fn periods_through(&self, date: NaiveDate) -> Vec<PeriodSummary> {
        let target = self.period_start_for(date);
        if target < self.effective_start {
            return vec![self.build_summary(target, None)];
        }

        let mut periods: Vec<PeriodSummary> = Vec::new();
        let mut start = self.effective_start;
        loop {
            let prior = if self.rules.rollover {
                periods.last().map(|p| PriorPeriod {
                    budget_amount: p.budget_amount,
                    total_spent: p.total_spent,
                })
            } else {
                None
            };
            periods.push(self.build_summary(start, prior));

            if start >= target {
                break;
            }
            match next_period_start(start, self.rules.frequency) {
                Some(next) => start = next,
                None => break,
            }
        }
        periods
    }

    fn carries_into(&self, start: NaiveDate) -> bool {
        self.rules.rollover && start > self.effective_start
    }

    fn build_summary(&self, start: NaiveDate, prior: Option<PriorPeriod>) -> PeriodSummary {
        let end = calendar::period_end(start, self.rules.frequency);
        let total_spent = self.spent_between(start, end);
        let outcome = resolve_rollover(self.rules.amount, self.rules.rollover_max, prior);
        let balance = outcome.budget_amount - total_spent;

        PeriodSummary {
            start_date: start,
            end_date: end,
            total_spent,
            balance,
            budget_amount: outcome.budget_amount,
            base_budget: self.rules.amount,
            rollover_amount: outcome.rollover_amount,
            difference: balance,
            is_over_budget: balance < Decimal::ZERO,
            is_current: start == self.current_period_start(),
        }
    }
}
