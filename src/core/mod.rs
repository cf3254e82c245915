/// Denormalized aggregate columns and persisted periods
pub mod aggregates;

/// Budget CRUD and period queries
pub mod budget;

/// In-process read cache
pub mod cache;

/// Period boundary arithmetic
pub mod calendar;

/// Time sources and local-day conversion
pub mod clock;

/// Shared application context
pub mod context;

/// Bounded history of period summaries
pub mod history;

/// Income sources and payments
pub mod income;

/// Recompute, integrity check and legacy migration jobs
pub mod maintenance;

/// Per-period spend and rollover
pub mod period;

/// Recurring transaction templates and expansion
pub mod recurring;

/// Background aggregate refresh worker
pub mod refresh;

/// Dashboard roll-up and text formatting
pub mod report;

/// Rollover carry computation
pub mod rollover;

/// Weekly equivalents and spending averages
pub mod stats;

/// Transactions logged against budgets
pub mod transaction;
