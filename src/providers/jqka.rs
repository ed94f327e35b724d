use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::util::{http_client, join_url};
use crate::core::config::SeriesProviderConfig;
use crate::core::series::{IntradaySeries, SeriesProvider};

/// Intraday minute series from data.10jqka.com.cn.
pub struct JqkaSeriesProvider {
    base_url: String,
    interval: String,
    period: String,
    client: reqwest::Client,
}

impl JqkaSeriesProvider {
    pub fn new(config: &SeriesProviderConfig) -> Result<Self> {
        Ok(JqkaSeriesProvider {
            base_url: config.base_url.clone(),
            interval: config.interval.clone(),
            period: config.period.clone(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[derive(Deserialize, Debug)]
struct SeriesResponse {
    data: Option<Vec<Vec<Value>>>,
}

fn parse_point(record: &[Value]) -> Result<(String, f64)> {
    let stamp = record
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Series record has no timestamp"))?;
    // "2024-05-17 09:31" -> "09:31"
    let time = stamp
        .split_once(' ')
        .map(|(_, time)| time)
        .ok_or_else(|| anyhow!("Timestamp '{}' has no time component", stamp))?;

    let price = match record.get(1) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Series record at {} has no valid price", stamp))?;

    Ok((time.to_string(), price))
}

/// Parses the JSON payload into an ordered series. A payload without a
/// `data` list, or with an empty one, is an error.
pub fn parse_series(payload: &str) -> Result<IntradaySeries> {
    let response: SeriesResponse =
        serde_json::from_str(payload).context("Failed to parse series JSON")?;
    let records = response
        .data
        .filter(|records| !records.is_empty())
        .ok_or_else(|| anyhow!("Series response contains no data"))?;

    let points = records
        .iter()
        .map(|record| parse_point(record))
        .collect::<Result<Vec<_>>>()?;
    Ok(IntradaySeries::new(points))
}

#[async_trait]
impl SeriesProvider for JqkaSeriesProvider {
    #[instrument(name = "JqkaSeriesFetch", skip(self), fields(code = %code))]
    async fn fetch_series(&self, code: &str, display_name: &str) -> Result<IntradaySeries> {
        let url = join_url(
            &self.base_url,
            &format!(
                "chart/hs/time/hs_klines/{}/{}/{}/",
                code, self.interval, self.period
            ),
        );
        // Parsing percent-encodes the stock name so the header stays ASCII
        let referer = reqwest::Url::parse(&format!(
            "https://www.10jqka.com.cn/stockpage/hs_{code}/{display_name}/"
        ))
        .with_context(|| format!("Invalid referer for code: {code}"))?
        .to_string();
        debug!("Requesting intraday series from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, referer)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for code: {}", e, code))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for code: {}",
                response.status(),
                code
            ));
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read series response for code: {code}"))?;

        let series =
            parse_series(&text).with_context(|| format!("Malformed series for code: {code}"))?;
        debug!(points = series.len(), "Parsed intraday series");
        Ok(series)
    }
}
