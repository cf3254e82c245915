//! History builder.
//!
//! Produces a bounded, most-recent-first window of period summaries for a
//! budget. The walk starts at the current period and steps back one period at
//! a time until either the requested count is reached or the next step would
//! fall before the budget's effective start, so young budgets return fewer
//! entries than asked for.

use crate::core::calendar::previous_period_start;
use crate::core::period::{PeriodEngine, PeriodSummary};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Summary of the period containing today.
#[must_use]
pub fn current_period(engine: &PeriodEngine) -> PeriodSummary {
    engine.summarize(engine.today())
}

/// Up to `num_periods` summaries, most recent first.
#[must_use]
pub fn history(engine: &PeriodEngine, num_periods: usize) -> Vec<PeriodSummary> {
    let starts = period_starts(engine, num_periods);
    if starts.is_empty() {
        return Vec::new();
    }

    if !engine.rules().rollover {
        return starts.into_iter().map(|start| engine.summarize(start)).collect();
    }

    // One forward pass resolves every carry the window needs.
    let current = engine.current_period_start();
    let mut by_start: HashMap<NaiveDate, PeriodSummary> = engine
        .periods_through(current)
        .into_iter()
        .map(|p| (p.start_date, p))
        .collect();

    starts
        .into_iter()
        .map(|start| {
            by_start
                .remove(&start)
                .unwrap_or_else(|| engine.summarize(start))
        })
        .collect()
}

/// Period starts the history walk visits, most recent first.
fn period_starts(engine: &PeriodEngine, num_periods: usize) -> Vec<NaiveDate> {
    let mut starts = Vec::with_capacity(num_periods.min(64));
    if num_periods == 0 {
        return starts;
    }

    let frequency = engine.rules().frequency;
    let effective_start = engine.effective_start();
    let mut start = engine.current_period_start();
    starts.push(start);

    while starts.len() < num_periods {
        match previous_period_start(start, frequency, effective_start) {
            Some(previous) if previous >= effective_start => {
                starts.push(previous);
                start = previous;
            }
            _ => break,
        }
    }
    starts
}
