//! Weighted aggregation of holding quotes into fund-level metrics.
use crate::core::config::{FailurePolicy, FundConfig, Holding};
use crate::core::quote::{QuoteOutcome, QuoteProvider, fetch_quote_outcome};
use futures::stream::{self, StreamExt};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::debug;

/// Fund-level figures for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FundMetrics {
    /// Estimated fund change in percent, 2 dp.
    pub fund_change_pct: f64,
    /// Estimated earnings on the principal for the session, 2 dp.
    pub real_earnings: f64,
    /// `real_earnings` plus the configured base hold earnings, 2 dp.
    pub hold_earnings: f64,
}

/// Per-holding row of a cycle, rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingDetail {
    pub code: String,
    pub name: String,
    pub weight: f64,
    pub last_price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    /// Holding change in percent, 2 dp.
    pub change_pct: f64,
    /// `change × weight` in percent, 4 dp. Display only; the fund figures
    /// are computed from the unrounded values.
    pub weighted_change_pct: f64,
    pub error: Option<String>,
}

/// Rounds half to even on the exact binary value of `value`.
pub(crate) fn round_dp(value: f64, dp: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Fetches a quote for every holding, in holding order. With a concurrency
/// of 1 the fetches run strictly one after another; otherwise up to
/// `concurrency` run at once and all of them complete before returning.
pub async fn collect_quotes(
    provider: &(dyn QuoteProvider + Send + Sync),
    holdings: &[Holding],
    concurrency: usize,
    on_progress: &(dyn Fn() + Send + Sync),
) -> Vec<QuoteOutcome> {
    stream::iter(holdings)
        .map(|holding| async move {
            let outcome = fetch_quote_outcome(provider, &holding.code).await;
            on_progress();
            outcome
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Combines quote outcomes (one per holding, same order) into the detail
/// rows and the fund metrics:
///
/// ```text
/// fund_change_pct = round(weighted_sum / total_weight_ratio × 100, 2)
/// real_earnings   = round(principal × weighted_sum / total_weight_ratio, 2)
/// hold_earnings   = round(real_earnings + base_hold_earnings, 2)
/// ```
///
/// Under `FailurePolicy::TreatAsFlat` a failed holding contributes zero.
/// Under `FailurePolicy::Exclude` its weight is also taken out of the
/// denominator; if no holding was fetched at all the fund is reported flat.
/// `fund` must be validated (`AppConfig::validate`).
pub fn compute_metrics(
    fund: &FundConfig,
    outcomes: &[QuoteOutcome],
    policy: FailurePolicy,
) -> (Vec<HoldingDetail>, FundMetrics) {
    let mut details = Vec::with_capacity(fund.holdings.len());
    let mut weighted_sum = 0.0;
    let mut excluded_weight = 0.0;

    for (holding, outcome) in fund.holdings.iter().zip(outcomes) {
        let snapshot = outcome.snapshot_or_sentinel();
        if outcome.is_failed() && policy == FailurePolicy::Exclude {
            excluded_weight += holding.weight;
        }
        let contribution = snapshot.change * holding.weight;
        weighted_sum += contribution;

        details.push(HoldingDetail {
            code: holding.code.clone(),
            name: holding.name.clone(),
            weight: holding.weight,
            last_price: round_dp(snapshot.last_price, 2),
            open: round_dp(snapshot.open, 2),
            high: round_dp(snapshot.high, 2),
            low: round_dp(snapshot.low, 2),
            previous_close: round_dp(snapshot.previous_close, 2),
            change_pct: round_dp(snapshot.change * 100.0, 2),
            weighted_change_pct: round_dp(contribution * 100.0, 4),
            error: outcome.error().map(str::to_string),
        });
    }

    // Positive for a validated fund unless every holding was excluded
    let denominator = fund.total_weight_ratio - excluded_weight;
    let any_fetched = outcomes.iter().any(|outcome| !outcome.is_failed());
    let fund_change = if any_fetched || policy == FailurePolicy::TreatAsFlat {
        weighted_sum / denominator
    } else {
        0.0
    };
    debug!(weighted_sum, denominator, fund_change, "Computed fund change");

    let real_earnings = round_dp(fund.principal * fund_change, 2);
    let metrics = FundMetrics {
        fund_change_pct: round_dp(fund_change * 100.0, 2),
        real_earnings,
        hold_earnings: round_dp(real_earnings + fund.base_hold_earnings, 2),
    };
    (details, metrics)
}
