//! Runs refresh cycles over a fund's holdings and owns the mutable state
//! shared between cycles: the rolling history and the intraday series cache.
use crate::core::aggregate::{FundMetrics, HoldingDetail, collect_quotes, compute_metrics};
use crate::core::config::AppConfig;
use crate::core::history::{HistoryBuffer, HistoryEntry};
use crate::core::quote::{QuoteOutcome, QuoteProvider, fetch_quote_outcome};
use crate::core::series::{SeriesProvider, SeriesView};
use crate::providers::caching::SeriesCache;
use crate::providers::jqka::JqkaSeriesProvider;
use crate::providers::tencent::TencentQuoteProvider;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, SubsecRound};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Non-fatal problem with one holding during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: String,
    pub name: String,
    pub message: String,
}

/// Everything the presentation layer needs from one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Local>,
    pub details: Vec<HoldingDetail>,
    pub metrics: FundMetrics,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct FundMonitor {
    config: AppConfig,
    quotes: Arc<dyn QuoteProvider + Send + Sync>,
    series: SeriesCache<Arc<dyn SeriesProvider + Send + Sync>>,
    history: Mutex<HistoryBuffer>,
    cycle_guard: Mutex<()>,
}

impl FundMonitor {
    /// Fails on an invalid configuration, so a monitor never runs a cycle
    /// with, for example, a zero total weight ratio.
    pub fn new(
        config: AppConfig,
        quotes: Arc<dyn QuoteProvider + Send + Sync>,
        series: Arc<dyn SeriesProvider + Send + Sync>,
    ) -> Result<Self> {
        config.validate().context("Invalid fund configuration")?;
        let series = SeriesCache::new(series, config.series_freshness(), config.series_fallback);
        let history = Mutex::new(HistoryBuffer::with_capacity(config.history_capacity));
        Ok(Self {
            config,
            quotes,
            series,
            history,
            cycle_guard: Mutex::new(()),
        })
    }

    /// Wires the HTTP providers named in the configuration.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let quotes = Arc::new(TencentQuoteProvider::new(&config.providers.quote)?);
        let series = Arc::new(JqkaSeriesProvider::new(&config.providers.series)?);
        Self::new(config, quotes, series)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Fetches every holding's quote, computes the fund metrics and appends
    /// them to the history. Each call is a new sample and always appends.
    #[instrument(name = "FundCycle", skip_all, fields(fund = %self.config.fund.name))]
    pub async fn run_cycle(&self, on_progress: &(dyn Fn() + Send + Sync)) -> CycleReport {
        let _cycle = self.cycle_guard.lock().await;
        self.run_cycle_locked(on_progress).await
    }

    /// Like `run_cycle`, but returns `None` instead of waiting when another
    /// cycle is still in flight.
    pub async fn try_run_cycle(&self, on_progress: &(dyn Fn() + Send + Sync)) -> Option<CycleReport> {
        let Ok(_cycle) = self.cycle_guard.try_lock() else {
            info!("Previous cycle still running, skipping");
            return None;
        };
        Some(self.run_cycle_locked(on_progress).await)
    }

    async fn run_cycle_locked(&self, on_progress: &(dyn Fn() + Send + Sync)) -> CycleReport {
        let fund = &self.config.fund;
        let outcomes = collect_quotes(
            self.quotes.as_ref(),
            &fund.holdings,
            self.config.fetch_concurrency,
            on_progress,
        )
        .await;

        let (details, metrics) = compute_metrics(fund, &outcomes, self.config.failure_policy);
        let diagnostics: Vec<Diagnostic> = details
            .iter()
            .filter_map(|d| {
                d.error.as_ref().map(|message| Diagnostic {
                    code: d.code.clone(),
                    name: d.name.clone(),
                    message: message.clone(),
                })
            })
            .collect();

        let timestamp = Local::now().trunc_subsecs(0);
        self.history
            .lock()
            .await
            .append(timestamp, metrics.fund_change_pct, metrics.real_earnings);

        info!(
            fund_change_pct = metrics.fund_change_pct,
            real_earnings = metrics.real_earnings,
            failed = diagnostics.len(),
            "Cycle complete"
        );
        CycleReport {
            timestamp,
            details,
            metrics,
            diagnostics,
        }
    }

    /// Intraday series for one instrument. Codes outside the holdings are
    /// allowed and use the code as display name.
    pub async fn get_series(&self, code: &str) -> SeriesView {
        let name = self
            .config
            .holding(code)
            .map_or(code, |h| h.name.as_str());
        self.series.get_series(code, name).await
    }

    /// Fresh quote for one instrument, never cached.
    pub async fn quote(&self, code: &str) -> QuoteOutcome {
        fetch_quote_outcome(self.quotes.as_ref(), code).await
    }

    /// History entries, oldest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().await.snapshot()
    }
}
