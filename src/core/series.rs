//! Intraday price series abstractions

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered intraday prices. `times` and `prices` always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntradaySeries {
    times: Vec<String>,
    prices: Vec<f64>,
}

impl IntradaySeries {
    pub fn new(points: Vec<(String, f64)>) -> Self {
        let (times, prices) = points.into_iter().unzip();
        Self { times, prices }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn times(&self) -> &[String] {
        &self.times
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.prices.last().copied()
    }

    /// Centred simple moving average. Each output point is labelled with the
    /// time of the middle sample of its window (the earlier one of the two
    /// for even windows), so the result has `len - window + 1` points, or
    /// none if the series is shorter than `window`.
    pub fn moving_average(&self, window: usize) -> IntradaySeries {
        if window == 0 || self.prices.len() < window {
            return IntradaySeries::empty();
        }
        let points = self
            .prices
            .windows(window)
            .zip(self.times.iter().skip(Self::centre_offset(window)))
            .map(|(w, time)| (time.clone(), w.iter().sum::<f64>() / window as f64))
            .collect();
        IntradaySeries::new(points)
    }

    /// Index in the full series of the first point of `moving_average(window)`.
    pub fn centre_offset(window: usize) -> usize {
        window.saturating_sub(1) / 2
    }
}

/// What the series cache hands to the presentation layer.
#[derive(Debug, Clone)]
pub struct SeriesView {
    pub series: Arc<IntradaySeries>,
    /// Set when `series` is a previously cached payload served because a
    /// refresh failed.
    pub stale: bool,
    pub diagnostic: Option<String>,
}

#[async_trait]
pub trait SeriesProvider: Send + Sync {
    async fn fetch_series(&self, code: &str, display_name: &str) -> Result<IntradaySeries>;
}

#[async_trait]
impl<T: SeriesProvider + ?Sized> SeriesProvider for Arc<T> {
    async fn fetch_series(&self, code: &str, display_name: &str) -> Result<IntradaySeries> {
        (**self).fetch_series(code, display_name).await
    }
}
