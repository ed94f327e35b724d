use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

/// Safety margin subtracted from the refresh interval to get the series
/// freshness window.
const SERIES_FRESHNESS_MARGIN: Duration = Duration::from_secs(5);

/// One day.
const MAX_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Slack for float error when comparing the summed weights with the ratio.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Holding {
    /// Exchange instrument code, e.g. `688619`.
    pub code: String,
    pub name: String,
    /// Fraction of the fund's total portfolio, e.g. `0.1021`.
    pub weight: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FundConfig {
    pub name: String,
    pub principal: f64,
    #[serde(default)]
    pub base_hold_earnings: f64,
    /// Sum of the weights covered by `holdings` out of the full portfolio.
    pub total_weight_ratio: f64,
    pub holdings: Vec<Holding>,
}

/// What to do with a holding whose quote could not be fetched.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Count the holding as unchanged for the cycle. Understates the aggregate
    /// when the holding actually moved.
    #[default]
    TreatAsFlat,
    /// Drop the holding from both the weighted sum and the total weight ratio.
    Exclude,
}

/// What the series cache returns when a refresh fails.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeriesFallback {
    #[default]
    LastKnownGood,
    Empty,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QuoteProviderConfig {
    pub base_url: String,
    #[serde(default = "default_symbol_prefix")]
    pub symbol_prefix: String,
    #[serde(default = "default_quote_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SeriesProviderConfig {
    pub base_url: String,
    #[serde(default = "default_series_interval")]
    pub interval: String,
    #[serde(default = "default_series_period")]
    pub period: String,
    #[serde(default = "default_series_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_quote_provider")]
    pub quote: QuoteProviderConfig,
    #[serde(default = "default_series_provider")]
    pub series: SeriesProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            quote: default_quote_provider(),
            series: default_series_provider(),
        }
    }
}

fn default_symbol_prefix() -> String {
    "s_".to_string()
}

fn default_quote_timeout() -> u64 {
    8
}

fn default_series_interval() -> String {
    "1min".to_string()
}

fn default_series_period() -> String {
    "今日".to_string()
}

fn default_series_timeout() -> u64 {
    10
}

fn default_quote_provider() -> QuoteProviderConfig {
    QuoteProviderConfig {
        base_url: "http://qt.gtimg.cn".to_string(),
        symbol_prefix: default_symbol_prefix(),
        timeout_secs: default_quote_timeout(),
    }
}

fn default_series_provider() -> SeriesProviderConfig {
    SeriesProviderConfig {
        base_url: "https://data.10jqka.com.cn".to_string(),
        interval: default_series_interval(),
        period: default_series_period(),
        timeout_secs: default_series_timeout(),
    }
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_history_capacity() -> usize {
    50
}

fn default_fetch_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub fund: FundConfig,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub series_fallback: SeriesFallback,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "fundwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Reads, parses and validates the configuration. An invalid fund
    /// definition is an error here so that no refresh cycle ever runs with it.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fund = &self.fund;
        if fund.holdings.is_empty() {
            bail!("Fund '{}' has no holdings", fund.name);
        }
        if !fund.total_weight_ratio.is_finite() || fund.total_weight_ratio <= 0.0 {
            bail!(
                "total_weight_ratio must be positive, got {}",
                fund.total_weight_ratio
            );
        }
        if !fund.principal.is_finite() || !fund.base_hold_earnings.is_finite() {
            bail!("principal and base_hold_earnings must be finite numbers");
        }
        for holding in &fund.holdings {
            if holding.code.trim().is_empty() {
                bail!("Holding '{}' has an empty code", holding.name);
            }
            if !(holding.weight > 0.0 && holding.weight <= 1.0) {
                bail!(
                    "Weight of holding {} must be in (0, 1], got {}",
                    holding.code,
                    holding.weight
                );
            }
        }
        let weight_sum: f64 = fund.holdings.iter().map(|h| h.weight).sum();
        if weight_sum > fund.total_weight_ratio + WEIGHT_SUM_TOLERANCE {
            bail!(
                "Holding weights add up to {}, more than total_weight_ratio {}",
                weight_sum,
                fund.total_weight_ratio
            );
        }
        if self.refresh_interval_secs == 0
            || self.refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS
        {
            bail!(
                "refresh_interval_secs must be between 1 and {}, got {}",
                MAX_REFRESH_INTERVAL_SECS,
                self.refresh_interval_secs
            );
        }
        if self.history_capacity == 0 {
            bail!("history_capacity must be at least 1");
        }
        if self.fetch_concurrency == 0 {
            bail!("fetch_concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Maximum age of a cached intraday series before it is fetched again.
    pub fn series_freshness(&self) -> Duration {
        self.refresh_interval()
            .saturating_sub(SERIES_FRESHNESS_MARGIN)
    }

    pub fn holding(&self, code: &str) -> Option<&Holding> {
        self.fund.holdings.iter().find(|h| h.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
fund:
  name: "Fund A"
  principal: 16000
  base_hold_earnings: -435.84
  total_weight_ratio: 0.6829
  holdings:
    - code: "688619"
      name: "合合信息"
      weight: 0.1021
    - code: "688258"
      name: "卓易信息"
      weight: 0.0980
"#;

    #[test]
    fn test_config_deserialization() {
        let config: AppConfig = serde_yaml::from_str(MINIMAL).expect("Failed to deserialize");
        assert_eq!(config.fund.name, "Fund A");
        assert_eq!(config.fund.principal, 16000.0);
        assert_eq!(config.fund.base_hold_earnings, -435.84);
        assert_eq!(config.fund.holdings.len(), 2);
        assert_eq!(config.fund.holdings[0].code, "688619");
        assert_eq!(config.fund.holdings[1].weight, 0.0980);

        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.failure_policy, FailurePolicy::TreatAsFlat);
        assert_eq!(config.series_fallback, SeriesFallback::LastKnownGood);
        assert_eq!(config.providers.quote.base_url, "http://qt.gtimg.cn");
        assert_eq!(config.providers.quote.symbol_prefix, "s_");
        assert_eq!(config.providers.quote.timeout_secs, 8);
        assert_eq!(config.providers.series.timeout_secs, 10);
        assert_eq!(config.providers.series.interval, "1min");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_with_overrides() {
        let yaml = format!(
            "{MINIMAL}
refresh_interval_secs: 60
failure_policy: exclude
series_fallback: empty
fetch_concurrency: 4
providers:
  quote:
    base_url: \"http://example.com/quote\"
  series:
    base_url: \"http://example.com/series\"
    timeout_secs: 3
"
        );
        let config: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Exclude);
        assert_eq!(config.series_fallback, SeriesFallback::Empty);
        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.providers.quote.base_url, "http://example.com/quote");
        assert_eq!(config.providers.quote.timeout_secs, 8);
        assert_eq!(config.providers.series.timeout_secs, 3);
        assert_eq!(config.series_freshness(), Duration::from_secs(55));
    }

    #[test]
    fn test_series_freshness_saturates() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.series_freshness(), Duration::from_secs(25));
        config.refresh_interval_secs = 3;
        assert_eq!(config.series_freshness(), Duration::ZERO);
    }

    #[test]
    fn test_zero_total_weight_ratio_is_rejected() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.fund.total_weight_ratio = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("total_weight_ratio must be positive"));

        config.fund.total_weight_ratio = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_holdings_are_rejected() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.fund.holdings.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("has no holdings"));
    }

    #[test]
    fn test_weight_out_of_range_is_rejected() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.fund.holdings[0].weight = 1.5;
        assert!(config.validate().is_err());
        config.fund.holdings[0].weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_interval_bounds() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.refresh_interval_secs = 0;
        assert!(config.validate().is_err());
        config.refresh_interval_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_interval_secs must be between 1 and 86400"));
        config.refresh_interval_secs = 86400;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weights_above_total_ratio_are_rejected() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.fund.total_weight_ratio = 0.10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than total_weight_ratio"));

        // Weights that sum to the ratio up to float error are fine
        config.fund.total_weight_ratio = 0.1021 + 0.0980;
        assert!(config.validate().is_ok());
        config.fund.total_weight_ratio = 0.2001;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_path_validates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let broken = MINIMAL.replace("0.6829", "0");
        fs::write(file.path(), broken).unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        assert!(format!("{err:#}").contains("total_weight_ratio must be positive"));
    }

    #[test]
    fn test_holding_lookup() {
        let config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.holding("688258").map(|h| h.name.as_str()), Some("卓易信息"));
        assert!(config.holding("000001").is_none());
    }
}
