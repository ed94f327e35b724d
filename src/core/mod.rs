//! Core business logic abstractions

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod history;
pub mod log;
pub mod monitor;
pub mod quote;
pub mod series;

// Re-export main types for cleaner imports
pub use aggregate::{FundMetrics, HoldingDetail};
pub use history::{HistoryBuffer, HistoryEntry};
pub use monitor::{CycleReport, Diagnostic, FundMonitor};
pub use quote::{QuoteOutcome, QuoteProvider, QuoteSnapshot};
pub use series::{IntradaySeries, SeriesProvider, SeriesView};
