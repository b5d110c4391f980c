use std::sync::Arc;
use tokio::sync::mpsc;

use super::backoff::{Backoff, Pause, TokioPause};
use super::model::{ChartError, ChartRequest, ChartResult};
use super::response::{self, SeriesError};
use crate::config::ProviderConfig;
use crate::constants;
use crate::http::client::{self, ReqwestTransport, Transport};

/// Fetches daily closes for one symbol, retrying transient failures with backoff.
pub struct ChartFetcher {
    config: ProviderConfig,
    transport: Arc<dyn Transport>,
    pause: Arc<dyn Pause>,
    backoff: Backoff,
}

impl ChartFetcher {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_parts(config, Arc::new(ReqwestTransport::default()), Arc::new(TokioPause))
    }

    pub fn with_parts(
        config: ProviderConfig,
        transport: Arc<dyn Transport>,
        pause: Arc<dyn Pause>,
    ) -> Self {
        Self {
            config,
            transport,
            pause,
            backoff: Backoff::default(),
        }
    }

    /// Starts a request in the background and returns its state updates in order.
    ///
    /// The request runs to completion even if the receiver is dropped.
    pub fn fetch_chart(self: &Arc<Self>, symbol: &str) -> mpsc::UnboundedReceiver<ChartResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        let request = ChartRequest::new(symbol);
        let fetcher = Arc::clone(self);
        tokio::spawn(async move {
            fetcher
                .run(&request, |update| {
                    // A closed receiver only means nobody is watching anymore.
                    let _ = tx.send(update);
                })
                .await;
        });
        rx
    }

    /// Runs one request, passing every state to `emit`, and returns the final one.
    ///
    /// Emits `Loading`, then an `Error` after each failed attempt, then either
    /// `Success` or a terminal `Error`.
    pub async fn run<F>(&self, request: &ChartRequest, mut emit: F) -> ChartResult
    where
        F: FnMut(ChartResult),
    {
        let symbol = request.symbol.as_str();
        emit(ChartResult::loading(symbol));

        let finish = |error: ChartError, emit: &mut F| {
            let result = ChartResult::failed(symbol, error);
            emit(result.clone());
            result
        };

        let Some(key) = self.config.usable_key() else {
            log::error!("No usable API key, not requesting chart for {}", symbol);
            return finish(
                ChartError::Configuration(
                    "API key is missing or still a placeholder; set ALPHAVANTAGE_API_KEY".into(),
                ),
                &mut emit,
            );
        };

        if symbol.is_empty() {
            return finish(ChartError::EmptySymbol, &mut emit);
        }

        let url = match client::build_url(
            self.config.base_url.as_str(),
            &[
                ("function", constants::TIME_SERIES_FUNCTION),
                ("symbol", symbol),
                ("outputsize", constants::OUTPUT_SIZE),
                ("apikey", key.as_str()),
            ],
        ) {
            Ok(url) => url,
            Err(err) => return finish(ChartError::Configuration(err.to_string()), &mut emit),
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let outcome = match self.transport.get(&url).await {
                Ok(raw) => response::parse_daily_series(&raw),
                Err(err) => Err(SeriesError::Transport(err.to_string())),
            };

            let failure = match outcome {
                Ok(points) => {
                    log::info!("Fetched {} daily closes for {}", points.len(), symbol);
                    let result = ChartResult::success(symbol, points);
                    emit(result.clone());
                    return result;
                }
                Err(SeriesError::MissingSeries) if self.config.fail_fast_on_missing_series => {
                    log::warn!("No time series for {}, not retrying", symbol);
                    return finish(ChartError::MissingSeries(symbol.to_string()), &mut emit);
                }
                Err(err) => err.to_string(),
            };

            attempt += 1;
            log::warn!(
                "Chart fetch for {} failed (attempt {}/{}): {}",
                symbol,
                attempt,
                max_attempts,
                failure
            );
            emit(ChartResult::failed(
                symbol,
                ChartError::TransientFetch {
                    attempt,
                    message: failure.clone(),
                },
            ));

            if attempt >= max_attempts {
                log::error!("Giving up on chart for {} after {} attempts", symbol, attempt);
                return finish(
                    ChartError::ExhaustedRetries {
                        attempts: attempt,
                        last: failure,
                    },
                    &mut emit,
                );
            }

            let delay = self.backoff.delay(attempt);
            log::debug!("Retrying {} in {:.1}s", symbol, delay.as_secs_f64());
            self.pause.pause(delay).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingPause, ScriptedTransport, series_body};
    use super::*;
    use crate::chart::model::{ChartState, PricePoint};
    use crate::config::ApiKey;
    use crate::http::client::{RawResponse, RequestError};

    fn config(key: Option<&str>) -> ProviderConfig {
        ProviderConfig::new(
            key.map(ApiKey::new),
            url::Url::parse("https://provider.test/query").unwrap(),
        )
    }

    fn make_fetcher(
        config: ProviderConfig,
        transport: ScriptedTransport,
    ) -> (ChartFetcher, Arc<ScriptedTransport>, Arc<RecordingPause>) {
        let transport = Arc::new(transport);
        let pause = Arc::new(RecordingPause::default());
        let fetcher = ChartFetcher::with_parts(config, transport.clone(), pause.clone());
        (fetcher, transport, pause)
    }

    async fn collect(fetcher: &ChartFetcher, symbol: &str) -> (Vec<ChartResult>, ChartResult) {
        let mut updates = Vec::new();
        let last = fetcher
            .run(&ChartRequest::new(symbol), |u| updates.push(u))
            .await;
        (updates, last)
    }

    #[tokio::test]
    async fn missing_or_placeholder_key_makes_no_calls() {
        for key in [None, Some(""), Some("YOUR_API_KEY")] {
            let (fetcher, transport, _) = make_fetcher(config(key), ScriptedTransport::default());
            let (updates, last) = collect(&fetcher, "IBM").await;
            assert_eq!(transport.call_count(), 0);
            assert_eq!(updates.len(), 2);
            assert_eq!(updates[0].state, ChartState::Loading);
            assert!(matches!(last.error, Some(ChartError::Configuration(_))));
            assert!(last.is_final());
        }
    }

    #[tokio::test]
    async fn empty_symbol_makes_no_calls() {
        let (fetcher, transport, _) = make_fetcher(config(Some("KEY123")), ScriptedTransport::default());
        let (_, last) = collect(&fetcher, "   ").await;
        assert_eq!(transport.call_count(), 0);
        assert_eq!(last.error, Some(ChartError::EmptySymbol));
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_empty_symbol() {
        let (fetcher, transport, _) = make_fetcher(config(None), ScriptedTransport::default());
        let (_, last) = collect(&fetcher, "").await;
        assert_eq!(transport.call_count(), 0);
        assert!(matches!(last.error, Some(ChartError::Configuration(_))));
    }

    #[tokio::test]
    async fn request_carries_symbol_and_key() {
        let body = series_body(&[("2024-01-02", 99.0)]);
        let transport = ScriptedTransport::default().script("IBM", vec![Ok(RawResponse::new(200, body))]);
        let (fetcher, transport, _) = make_fetcher(config(Some("KEY123")), transport);
        collect(&fetcher, "ibm").await;
        let calls = transport.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["https://provider.test/query?function=TIME_SERIES_DAILY_ADJUSTED&symbol=IBM&outputsize=full&apikey=KEY123".to_string()]
        );
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        for failures in 0..5usize {
            let mut answers: Vec<Result<RawResponse, RequestError>> = Vec::new();
            for i in 0..failures {
                answers.push(match i % 3 {
                    0 => Ok(RawResponse::new(503, "busy")),
                    1 => Ok(RawResponse::new(200, r#"{"Note": "rate limited"}"#)),
                    _ => Err(RequestError::Transport("connection reset".into())),
                });
            }
            let body = series_body(&[("2024-01-03", 100.5), ("2024-01-02", 99.0)]);
            answers.push(Ok(RawResponse::new(200, body)));

            let transport = ScriptedTransport::default().script("AAPL", answers);
            let (fetcher, transport, pause) = make_fetcher(config(Some("KEY123")), transport);
            let (updates, last) = collect(&fetcher, "AAPL").await;

            assert_eq!(transport.call_count(), failures + 1);
            // Loading, then one state per attempt.
            assert_eq!(updates.len(), failures + 2);
            assert_eq!(updates[0].state, ChartState::Loading);
            for (i, update) in updates[1..=failures].iter().enumerate() {
                assert_eq!(update.state, ChartState::Error);
                assert!(matches!(
                    update.error,
                    Some(ChartError::TransientFetch { attempt, .. }) if attempt as usize == i + 1
                ));
            }
            assert_eq!(last.state, ChartState::Success);
            assert_eq!(updates.last(), Some(&last));
            assert_eq!(last.points[0].date, "2024-01-02");

            let delays = pause.delays.lock().unwrap().clone();
            assert_eq!(delays.len(), failures);
            for (i, delay) in delays.iter().enumerate() {
                let floor = 1000 * 2u64.pow(i as u32 + 1);
                let ms = delay.as_millis() as u64;
                assert!(ms >= floor && ms < floor + 1000, "delay {i} was {ms}ms");
            }
            assert!(delays.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[tokio::test]
    async fn gives_up_after_five_failures() {
        let answers = (0..8).map(|_| Ok(RawResponse::new(500, "boom"))).collect();
        let transport = ScriptedTransport::default().script("TSLA", answers);
        let (fetcher, transport, pause) = make_fetcher(config(Some("KEY123")), transport);
        let (updates, last) = collect(&fetcher, "TSLA").await;

        assert_eq!(transport.call_count(), 5);
        assert_eq!(pause.delays.lock().unwrap().len(), 4);
        // Loading, five attempt failures, then the final error.
        assert_eq!(updates.len(), 7);
        assert_eq!(
            last.error,
            Some(ChartError::ExhaustedRetries {
                attempts: 5,
                last: "HTTP 500: boom".into()
            })
        );
        assert!(last.is_final());
        assert!(updates[..6].iter().all(|u| !u.is_final()));
    }

    #[tokio::test]
    async fn missing_series_is_retried_by_default() {
        let answers = (0..5)
            .map(|_| Ok(RawResponse::new(200, r#"{"Meta Data": {}}"#)))
            .collect();
        let transport = ScriptedTransport::default().script("NOPE", answers);
        let (fetcher, transport, _) = make_fetcher(config(Some("KEY123")), transport);
        let (_, last) = collect(&fetcher, "NOPE").await;
        assert_eq!(transport.call_count(), 5);
        assert!(matches!(last.error, Some(ChartError::ExhaustedRetries { .. })));
    }

    #[tokio::test]
    async fn missing_series_can_fail_fast() {
        let mut cfg = config(Some("KEY123"));
        cfg.fail_fast_on_missing_series = true;
        let transport = ScriptedTransport::default()
            .script("NOPE", vec![Ok(RawResponse::new(200, r#"{"Meta Data": {}}"#))]);
        let (fetcher, transport, pause) = make_fetcher(cfg, transport);
        let (_, last) = collect(&fetcher, "NOPE").await;
        assert_eq!(transport.call_count(), 1);
        assert!(pause.delays.lock().unwrap().is_empty());
        assert_eq!(last.error, Some(ChartError::MissingSeries("NOPE".into())));
    }

    #[tokio::test]
    async fn honours_configured_attempt_limit() {
        let mut cfg = config(Some("KEY123"));
        cfg.max_attempts = 2;
        let (fetcher, transport, _) = make_fetcher(cfg, ScriptedTransport::default());
        let (_, last) = collect(&fetcher, "MSFT").await;
        assert_eq!(transport.call_count(), 2);
        assert!(matches!(
            last.error,
            Some(ChartError::ExhaustedRetries { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn repeated_requests_parse_identically() {
        let body = series_body(&[("2024-01-03", 100.5), ("2024-01-02", 99.0)]);
        let transport = ScriptedTransport::default().script(
            "IBM",
            vec![
                Ok(RawResponse::new(200, body.clone())),
                Ok(RawResponse::new(200, body)),
            ],
        );
        let (fetcher, _, _) = make_fetcher(config(Some("KEY123")), transport);
        let (_, first) = collect(&fetcher, "IBM").await;
        let (_, second) = collect(&fetcher, "IBM").await;
        assert_eq!(first.points, second.points);
        assert_eq!(
            first.points,
            vec![
                PricePoint {
                    date: "2024-01-02".into(),
                    close: 99.0
                },
                PricePoint {
                    date: "2024-01-03".into(),
                    close: 100.5
                },
            ]
        );
    }

    #[tokio::test]
    async fn fetch_chart_streams_states_in_order() {
        let body = series_body(&[("2024-01-02", 99.0)]);
        let transport = ScriptedTransport::default().script(
            "IBM",
            vec![
                Ok(RawResponse::new(429, "slow down")),
                Ok(RawResponse::new(200, body)),
            ],
        );
        let (fetcher, _, _) = make_fetcher(config(Some("KEY123")), transport);
        let fetcher = Arc::new(fetcher);

        let mut rx = fetcher.fetch_chart("IBM");
        let mut states = Vec::new();
        while let Some(update) = rx.recv().await {
            states.push(update.state);
        }
        assert_eq!(
            states,
            vec![ChartState::Loading, ChartState::Error, ChartState::Success]
        );
    }
}
