use chrono::{Days, NaiveDate};
use serde::{Deserialize, de::DeserializeOwned};
use std::{sync::Arc, time::Duration};

use crate::chart::backoff::{Pause, TokioPause};
use crate::config::FinnhubConfig;
use crate::constants;
use crate::http::client::{self, ReqwestTransport, Transport};

#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: Option<Metric>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    #[serde(rename = "peTTM", default)]
    pe_ttm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Filing {
    #[serde(default)]
    form: Option<String>,
}

// The filings endpoint answers with a bare list; older answers wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FilingsResponse {
    List(Vec<Filing>),
    Wrapped {
        #[serde(default)]
        filings: Vec<Filing>,
    },
}

impl FilingsResponse {
    fn into_filings(self) -> Vec<Filing> {
        match self {
            FilingsResponse::List(filings) => filings,
            FilingsResponse::Wrapped { filings } => filings,
        }
    }
}

/// Fundamentals for the screener: trailing P/E and recent SEC filings.
///
/// Every lookup answers `None` when no usable key is configured or the
/// provider keeps failing; callers fall back to placeholder values.
pub struct FinnhubClient {
    config: FinnhubConfig,
    transport: Arc<dyn Transport>,
    pause: Arc<dyn Pause>,
}

impl FinnhubClient {
    pub fn new(config: FinnhubConfig) -> Self {
        Self::with_parts(config, Arc::new(ReqwestTransport::default()), Arc::new(TokioPause))
    }

    pub fn with_parts(
        config: FinnhubConfig,
        transport: Arc<dyn Transport>,
        pause: Arc<dyn Pause>,
    ) -> Self {
        Self {
            config,
            transport,
            pause,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.usable_key().is_some()
    }

    /// Trailing twelve month P/E. Zero and missing values count as unknown.
    pub async fn pe_ratio(&self, symbol: &str) -> Option<f64> {
        let response = self
            .fetch::<MetricResponse>("/stock/metric", symbol, &[("metric", "all")])
            .await?;
        let pe = response
            .metric
            .and_then(|m| m.pe_ttm)
            .filter(|pe| pe.is_finite() && *pe != 0.0)?;
        log::info!("Fetched P/E for {}: {:.1}", symbol, pe);
        Some(pe)
    }

    /// Number of 10-K and 10-Q filings in the lookback window ending `today`.
    pub async fn sec_filing_count(&self, symbol: &str, today: NaiveDate) -> Option<u32> {
        let from = today.checked_sub_days(Days::new(constants::FILINGS_LOOKBACK_DAYS))?;
        let from = from.to_string();
        let to = today.to_string();
        let response = self
            .fetch::<FilingsResponse>(
                "/stock/filings",
                symbol,
                &[("from", from.as_str()), ("to", to.as_str()), ("type", "10-K,10-Q")],
            )
            .await?;

        let count = response
            .into_filings()
            .iter()
            .filter_map(|f| f.form.as_deref())
            .filter(|form| matches!(form.trim().to_uppercase().as_str(), "10-K" | "10-Q"))
            .count() as u32;
        log::info!("Found {} recent SEC filings for {}", count, symbol);
        Some(count)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        symbol: &str,
        extra: &[(&str, &str)],
    ) -> Option<T> {
        let Some(key) = self.config.usable_key() else {
            log::debug!("No Finnhub key, skipping {} for {}", endpoint, symbol);
            return None;
        };

        let mut params = vec![("symbol", symbol), ("token", key.as_str())];
        params.extend_from_slice(extra);
        let path = format!("{}{}", self.config.base_url.as_str().trim_end_matches('/'), endpoint);
        let url = match client::build_url(&path, &params) {
            Ok(url) => url,
            Err(err) => {
                log::warn!("{}", err);
                return None;
            }
        };

        for attempt in 0..constants::FINNHUB_MAX_ATTEMPTS {
            let failure = match self.transport.get(&url).await {
                Ok(raw) if raw.is_success() => {
                    return match serde_json::from_str(&raw.body) {
                        Ok(value) => Some(value),
                        Err(err) => {
                            log::warn!("Unreadable Finnhub answer ({}) for {}: {}", endpoint, symbol, err);
                            None
                        }
                    };
                }
                Ok(raw) => format!("HTTP {}", raw.status),
                Err(err) => err.to_string(),
            };

            if attempt + 1 == constants::FINNHUB_MAX_ATTEMPTS {
                log::warn!(
                    "Finnhub final attempt failed ({}) for {}: {}",
                    endpoint,
                    symbol,
                    failure
                );
            } else {
                self.pause.pause(retry_delay(attempt)).await;
            }
        }
        None
    }
}

// 2s, 3s, 5s, ...
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 + 2u64.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::fetcher::testing::{RecordingPause, ScriptedTransport};
    use crate::config::ApiKey;
    use crate::http::client::{RawResponse, RequestError};
    use std::collections::HashMap;

    fn ok(body: &str) -> Result<RawResponse, RequestError> {
        Ok(RawResponse::new(200, body))
    }

    fn make_client(
        key: Option<&str>,
        transport: ScriptedTransport,
    ) -> (FinnhubClient, Arc<ScriptedTransport>, Arc<RecordingPause>) {
        let config = FinnhubConfig::new(
            key.map(ApiKey::new),
            url::Url::parse("https://finnhub.test/api/v1").unwrap(),
        );
        let transport = Arc::new(transport);
        let pause = Arc::new(RecordingPause::default());
        let client = FinnhubClient::with_parts(config, transport.clone(), pause.clone());
        (client, transport, pause)
    }

    fn query(url: &str) -> HashMap<String, String> {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
    }

    #[tokio::test]
    async fn no_key_makes_no_calls() {
        for key in [None, Some("YOUR_FINNHUB_KEY")] {
            let (client, transport, _) = make_client(key, ScriptedTransport::default());
            assert!(!client.is_enabled());
            assert_eq!(client.pe_ratio("IBM").await, None);
            assert_eq!(client.sec_filing_count("IBM", today()).await, None);
            assert_eq!(transport.call_count(), 0);
        }
    }

    #[tokio::test]
    async fn reads_trailing_pe() {
        let transport = ScriptedTransport::default()
            .script("IBM", vec![ok(r#"{"metric": {"peTTM": 23.4, "beta": 0.7}, "symbol": "IBM"}"#)]);
        let (client, transport, _) = make_client(Some("fh-token"), transport);

        assert_eq!(client.pe_ratio("IBM").await, Some(23.4));

        let calls = transport.calls.lock().unwrap().clone();
        assert!(calls[0].starts_with("https://finnhub.test/api/v1/stock/metric?"));
        let params = query(&calls[0]);
        assert_eq!(params["symbol"], "IBM");
        assert_eq!(params["token"], "fh-token");
        assert_eq!(params["metric"], "all");
    }

    #[tokio::test]
    async fn zero_or_missing_pe_is_unknown() {
        let transport = ScriptedTransport::default().script(
            "IBM",
            vec![
                ok(r#"{"metric": {"peTTM": 0}}"#),
                ok(r#"{"metric": {"peTTM": null}}"#),
                ok(r#"{"metric": {}}"#),
                ok("not json"),
            ],
        );
        let (client, transport, _) = make_client(Some("fh-token"), transport);
        for _ in 0..4 {
            assert_eq!(client.pe_ratio("IBM").await, None);
        }
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn retries_with_growing_pauses() {
        let transport = ScriptedTransport::default().script(
            "MSFT",
            vec![
                Ok(RawResponse::new(429, "slow down")),
                Err(RequestError::Transport("reset".into())),
                ok(r#"{"metric": {"peTTM": 35.0}}"#),
            ],
        );
        let (client, transport, pause) = make_client(Some("fh-token"), transport);

        assert_eq!(client.pe_ratio("MSFT").await, Some(35.0));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(
            *pause.delays.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(3)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let (client, transport, pause) = make_client(Some("fh-token"), ScriptedTransport::default());
        assert_eq!(client.pe_ratio("MSFT").await, None);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(pause.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn counts_annual_and_quarterly_filings() {
        let transport = ScriptedTransport::default().script(
            "AAPL",
            vec![
                ok(r#"[{"form": "10-K"}, {"form": "10-q"}, {"form": "8-K"}, {"form": "10-Q"}, {}]"#),
                ok(r#"{"filings": [{"form": "10-Q"}]}"#),
            ],
        );
        let (client, transport, _) = make_client(Some("fh-token"), transport);

        assert_eq!(client.sec_filing_count("AAPL", today()).await, Some(3));
        assert_eq!(client.sec_filing_count("AAPL", today()).await, Some(1));

        let calls = transport.calls.lock().unwrap().clone();
        assert!(calls[0].starts_with("https://finnhub.test/api/v1/stock/filings?"));
        let params = query(&calls[0]);
        assert_eq!(params["from"], "2024-01-31");
        assert_eq!(params["to"], "2024-04-30");
        assert_eq!(params["type"], "10-K,10-Q");
    }
}
