//! Real-time quote abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One instrument's current trading snapshot. `change` is a signed fraction,
/// so `0.0123` means +1.23%.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub last_price: f64,
    pub change: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
}

impl QuoteSnapshot {
    /// The all-zero snapshot shown in place of a quote that failed to load.
    pub fn sentinel() -> Self {
        Self::default()
    }
}

/// Result of a single quote fetch, kept explicit so that aggregation can tell
/// a failed instrument apart from a flat one.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Fetched(QuoteSnapshot),
    Failed { reason: String },
}

impl QuoteOutcome {
    pub fn snapshot(&self) -> Option<&QuoteSnapshot> {
        match self {
            QuoteOutcome::Fetched(snapshot) => Some(snapshot),
            QuoteOutcome::Failed { .. } => None,
        }
    }

    pub fn snapshot_or_sentinel(&self) -> QuoteSnapshot {
        self.snapshot().copied().unwrap_or_else(QuoteSnapshot::sentinel)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QuoteOutcome::Fetched(_) => None,
            QuoteOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QuoteOutcome::Failed { .. })
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, code: &str) -> Result<QuoteSnapshot>;
}

/// Fetches one quote and converts any failure into `QuoteOutcome::Failed`,
/// logging a diagnostic. A single bad instrument never aborts a cycle.
pub async fn fetch_quote_outcome(
    provider: &(dyn QuoteProvider + Send + Sync),
    code: &str,
) -> QuoteOutcome {
    match provider.fetch_quote(code).await {
        Ok(snapshot) => QuoteOutcome::Fetched(snapshot),
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(code = %code, error = %reason, "Quote fetch failed");
            QuoteOutcome::Failed { reason }
        }
    }
}
