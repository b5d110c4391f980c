use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use super::model::PricePoint;
use crate::http::client::RawResponse;

#[derive(Deserialize, Debug)]
pub struct DailyAdjustedResponse {
    #[serde(rename = "Time Series (Daily)")]
    pub series: Option<BTreeMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    pub error_message: Option<String>,
    #[serde(rename = "Note")]
    pub note: Option<String>,
    #[serde(rename = "Information")]
    pub information: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DailyBar {
    #[serde(rename = "5. adjusted close")]
    pub adjusted_close: Option<Value>,
    #[serde(rename = "4. close")]
    pub close: Option<Value>,
}

impl DailyBar {
    // Adjusted close first, plain close otherwise. Anything unreadable is NaN.
    fn close_price(&self) -> f64 {
        self.adjusted_close
            .as_ref()
            .or(self.close.as_ref())
            .map(number_or_nan)
            .unwrap_or(f64::NAN)
    }
}

fn number_or_nan(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Why a provider answer did not yield a series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("{0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Response has no \"Time Series (Daily)\" field")]
    MissingSeries,
}

/// Turns a raw provider answer into date-ascending closes.
pub fn parse_daily_series(raw: &RawResponse) -> Result<Vec<PricePoint>, SeriesError> {
    if !raw.is_success() {
        return Err(SeriesError::Status {
            status: raw.status,
            body: preview(&raw.body),
        });
    }

    let resp: DailyAdjustedResponse =
        serde_json::from_str(&raw.body).map_err(|e| SeriesError::Malformed(e.to_string()))?;

    check_markers(&resp)?;

    let series = resp.series.ok_or(SeriesError::MissingSeries)?;

    // BTreeMap keys are unique and ISO dates sort chronologically as strings.
    Ok(series
        .into_iter()
        .map(|(date, bar)| PricePoint {
            close: bar.close_price(),
            date,
        })
        .collect())
}

// Checks the provider-level error and rate-limit fields.
fn check_markers(resp: &DailyAdjustedResponse) -> Result<(), SeriesError> {
    match (&resp.error_message, &resp.note, &resp.information) {
        (Some(msg), _, _) | (None, Some(msg), _) | (None, None, Some(msg)) => {
            Err(SeriesError::Provider(msg.clone()))
        }
        (None, None, None) => Ok(()),
    }
}

fn preview(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> RawResponse {
        RawResponse::new(200, body)
    }

    #[test]
    fn sorts_dates_ascending() {
        let body = r#"{
            "Meta Data": {"2. Symbol": "IBM"},
            "Time Series (Daily)": {
                "2024-01-03": {"4. close": "101.00", "5. adjusted close": "100.5"},
                "2024-01-02": {"4. close": "99.50", "5. adjusted close": "99.0"}
            }
        }"#;
        let points = parse_daily_series(&ok(body)).unwrap();
        assert_eq!(
            points,
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

    #[test]
    fn falls_back_to_close_and_accepts_numbers() {
        let body = r#"{"Time Series (Daily)": {"2024-02-01": {"4. close": 187.25}}}"#;
        let points = parse_daily_series(&ok(body)).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 187.25);
    }

    #[test]
    fn non_numeric_close_becomes_nan() {
        let body = r#"{"Time Series (Daily)": {
            "2024-02-01": {"5. adjusted close": "n/a"},
            "2024-02-02": {"1. open": "10.0"}
        }}"#;
        let points = parse_daily_series(&ok(body)).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.close.is_nan()));
    }

    #[test]
    fn duplicate_dates_keep_one_row() {
        let body = r#"{"Time Series (Daily)": {
            "2024-02-01": {"4. close": "1.0"},
            "2024-02-01": {"4. close": "2.0"}
        }}"#;
        let points = parse_daily_series(&ok(body)).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn provider_markers_are_errors() {
        let rate_limited = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        assert!(matches!(
            parse_daily_series(&ok(rate_limited)),
            Err(SeriesError::Provider(msg)) if msg.starts_with("Thank you")
        ));

        let invalid = r#"{"Error Message": "Invalid API call."}"#;
        assert_eq!(
            parse_daily_series(&ok(invalid)),
            Err(SeriesError::Provider("Invalid API call.".into()))
        );

        let info = r#"{"Information": "premium endpoint"}"#;
        assert!(matches!(parse_daily_series(&ok(info)), Err(SeriesError::Provider(_))));
    }

    #[test]
    fn missing_series_is_reported() {
        assert_eq!(
            parse_daily_series(&ok(r#"{"Meta Data": {}}"#)),
            Err(SeriesError::MissingSeries)
        );
    }

    #[test]
    fn bad_status_and_bad_json() {
        let err = parse_daily_series(&RawResponse::new(503, "upstream down")).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503: upstream down");
        assert!(matches!(
            parse_daily_series(&ok("<html>")),
            Err(SeriesError::Malformed(_))
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let err = parse_daily_series(&RawResponse::new(500, body)).unwrap_err();
        assert!(err.to_string().ends_with("... (truncated)"));
    }
}
