use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::util::{http_client, join_url};
use crate::core::config::QuoteProviderConfig;
use crate::core::quote::{QuoteProvider, QuoteSnapshot};

const MIN_FIELDS: usize = 40;
const FIELD_LAST_PRICE: usize = 3;
const FIELD_PREVIOUS_CLOSE: usize = 4;
const FIELD_OPEN: usize = 5;
const FIELD_CHANGE_PCT: usize = 32;
const FIELD_HIGH: usize = 33;
const FIELD_LOW: usize = 34;

const REFERER: &str = "https://www.10jqka.com.cn/";

/// Real-time quotes from the `~`-separated text endpoint at qt.gtimg.cn.
pub struct TencentQuoteProvider {
    base_url: String,
    symbol_prefix: String,
    client: reqwest::Client,
}

impl TencentQuoteProvider {
    pub fn new(config: &QuoteProviderConfig) -> Result<Self> {
        Ok(TencentQuoteProvider {
            base_url: config.base_url.clone(),
            symbol_prefix: config.symbol_prefix.clone(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

fn parse_field(fields: &[&str], index: usize, name: &str) -> Result<f64> {
    let raw = fields[index].trim();
    raw.parse::<f64>()
        .with_context(|| format!("Invalid {name} '{raw}' at field {index}"))
}

/// Parses one quote line. The change field is a percentage and is returned
/// as a fraction.
pub fn parse_quote(payload: &str) -> Result<QuoteSnapshot> {
    let fields: Vec<&str> = payload.split('~').collect();
    if fields.len() < MIN_FIELDS {
        return Err(anyhow!(
            "Quote payload has {} fields, expected at least {}",
            fields.len(),
            MIN_FIELDS
        ));
    }

    Ok(QuoteSnapshot {
        last_price: parse_field(&fields, FIELD_LAST_PRICE, "last price")?,
        change: parse_field(&fields, FIELD_CHANGE_PCT, "change")? / 100.0,
        open: parse_field(&fields, FIELD_OPEN, "open")?,
        high: parse_field(&fields, FIELD_HIGH, "high")?,
        low: parse_field(&fields, FIELD_LOW, "low")?,
        previous_close: parse_field(&fields, FIELD_PREVIOUS_CLOSE, "previous close")?,
    })
}

#[async_trait]
impl QuoteProvider for TencentQuoteProvider {
    #[instrument(name = "TencentQuoteFetch", skip(self), fields(code = %code))]
    async fn fetch_quote(&self, code: &str) -> Result<QuoteSnapshot> {
        let url = join_url(&self.base_url, &format!("q={}{}", self.symbol_prefix, code));
        debug!("Requesting quote from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, REFERER)
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
            .with_context(|| format!("Failed to read quote response for code: {code}"))?;
        debug!(bytes = text.len(), "Received quote response");

        parse_quote(&text).with_context(|| format!("Malformed quote for code: {code}"))
    }
}
