use std::env;

use url::Url;

use crate::{constants, model};

/// Provider credential. Placeholder values count as missing.
#[derive(Clone, PartialEq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for empty keys and the stand-in values left in sample configs.
    pub fn is_placeholder(&self) -> bool {
        let key = self.0.trim();
        if key.is_empty() {
            return true;
        }
        let lower = key.to_ascii_lowercase();
        lower.starts_with("your_")
            || lower.starts_with("your-")
            || matches!(lower.as_str(), "changeme" | "<api-key>" | "<apikey>" | "xxx")
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_placeholder() {
            write!(f, "ApiKey(<placeholder>)")
        } else {
            write!(f, "ApiKey(****)")
        }
    }
}

/// Settings for the chart fetcher.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<ApiKey>,
    pub base_url: Url,
    pub max_attempts: u32,
    /// Treat a 2xx answer without a time series as final instead of retrying it.
    pub fail_fast_on_missing_series: bool,
}

impl ProviderConfig {
    pub fn new(api_key: Option<ApiKey>, base_url: Url) -> Self {
        Self {
            api_key,
            base_url,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            fail_fast_on_missing_series: false,
        }
    }

    /// Returns the key when it is usable for a request.
    pub fn usable_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref().filter(|key| !key.is_placeholder())
    }
}

/// Settings for the fundamentals source used by the screener.
#[derive(Debug, Clone)]
pub struct FinnhubConfig {
    pub api_key: Option<ApiKey>,
    pub base_url: Url,
}

impl FinnhubConfig {
    pub fn new(api_key: Option<ApiKey>, base_url: Url) -> Self {
        Self { api_key, base_url }
    }

    pub fn usable_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref().filter(|key| !key.is_placeholder())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub finnhub: FinnhubConfig,
    pub sqlite_file: String,
}

impl Config {
    /// Reads configuration from the process environment (and `.env`, once loaded).
    pub fn from_env() -> model::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> model::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = url_var(&lookup, "ALPHAVANTAGE_BASE_URL", constants::DEFAULT_BASE_URL)?;

        let mut provider = ProviderConfig::new(lookup("ALPHAVANTAGE_API_KEY").map(ApiKey::new), base_url);

        if let Some(attempts) = lookup("CHART_MAX_ATTEMPTS") {
            provider.max_attempts = attempts
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    model::AppError::InvalidConfig(format!(
                        "CHART_MAX_ATTEMPTS must be a positive integer, got '{attempts}'"
                    ))
                })?;
        }

        if let Some(flag) = lookup("CHART_FAIL_FAST_MISSING_SERIES") {
            provider.fail_fast_on_missing_series =
                parse_flag(&flag).ok_or_else(|| {
                    model::AppError::InvalidConfig(format!(
                        "CHART_FAIL_FAST_MISSING_SERIES must be true or false, got '{flag}'"
                    ))
                })?;
        }

        let finnhub = FinnhubConfig::new(
            lookup("FINANCIAL_API_KEY").map(ApiKey::new),
            url_var(&lookup, "FINNHUB_BASE_URL", constants::FINNHUB_BASE_URL)?,
        );

        let sqlite_file = lookup("sqlite_file")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| constants::DEFAULT_SQLITE_FILE.to_string());

        Ok(Self {
            provider,
            finnhub,
            sqlite_file,
        })
    }
}

fn url_var<F>(lookup: &F, name: &str, default: &str) -> model::Result<Url>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    Url::parse(value.trim()).map_err(|e| model::AppError::InvalidConfig(format!("{name}: {e}")))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
