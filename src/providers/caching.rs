use crate::core::cache::TimedCache;
use crate::core::config::SeriesFallback;
use crate::core::series::{IntradaySeries, SeriesProvider, SeriesView};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Time-to-live cache in front of a `SeriesProvider`, one entry per code.
///
/// A fresh entry is returned as the same `Arc` without touching the network.
/// Otherwise the inner provider is called once and a successful payload
/// replaces the entry. A failed refresh leaves the cache untouched.
pub struct SeriesCache<T: SeriesProvider> {
    inner: T,
    cache: TimedCache<String, Arc<IntradaySeries>>,
    freshness: Duration,
    fallback: SeriesFallback,
}

impl<T: SeriesProvider> SeriesCache<T> {
    pub fn new(inner: T, freshness: Duration, fallback: SeriesFallback) -> Self {
        Self {
            inner,
            cache: TimedCache::new(),
            freshness,
            fallback,
        }
    }

    pub async fn get_series(&self, code: &str, display_name: &str) -> SeriesView {
        let key = code.to_string();
        if let Some(series) = self.cache.get_fresh(&key, self.freshness).await {
            debug!("Cache hit for series: {}", code);
            return SeriesView {
                series,
                stale: false,
                diagnostic: None,
            };
        }

        debug!("Cache miss for series: {}", code);
        match self.inner.fetch_series(code, display_name).await {
            Ok(series) => {
                let series = Arc::new(series);
                self.cache.put(key, Arc::clone(&series)).await;
                SeriesView {
                    series,
                    stale: false,
                    diagnostic: None,
                }
            }
            Err(e) => {
                let diagnostic = format!("{e:#}");
                warn!(code = %code, name = %display_name, error = %diagnostic, "Series fetch failed");
                let last_good = match self.fallback {
                    SeriesFallback::LastKnownGood => self.cache.get_any(&key).await,
                    SeriesFallback::Empty => None,
                };
                SeriesView {
                    stale: last_good.is_some(),
                    series: last_good.unwrap_or_else(|| Arc::new(IntradaySeries::empty())),
                    diagnostic: Some(diagnostic),
                }
            }
        }
    }
}
