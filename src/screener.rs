use chrono::{NaiveDate, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rusqlite::Connection;

use crate::{
    constants,
    finnhub::FinnhubClient,
    model::{self, RankedRecord, StockMetrics},
    store, symbols,
};

/// Metrics for a symbol when no real data source is wired in.
///
/// Sentiment, P/E and volume surge are drawn from the same ranges the
/// dashboard was designed around; SEC filings count as zero.
pub fn placeholder_metrics<R: Rng>(rng: &mut R) -> StockMetrics {
    StockMetrics {
        pe: round_to(rng.gen_range(15.0..80.0), 1),
        sentiment: rng.gen_range(0.4..0.95),
        volume_surge: round_to(rng.gen_range(1.0..5.0), 1),
        sec_filings: 0,
    }
}

/// Placeholder metrics with P/E and filing count replaced by Finnhub's
/// answers where it gives them.
pub async fn fundamentals<R: Rng>(
    client: &FinnhubClient,
    symbol: &str,
    today: NaiveDate,
    rng: &mut R,
) -> StockMetrics {
    let mut metrics = placeholder_metrics(rng);
    if let Some(pe) = client.pe_ratio(symbol).await {
        metrics.pe = pe;
    }
    metrics.sec_filings = client.sec_filing_count(symbol, today).await.unwrap_or(0);
    metrics
}

/// Weighted score before noise is added.
pub fn base_score(metrics: &StockMetrics) -> f64 {
    let pe = metrics.pe;
    let pe_score = if pe > 10.0 && pe <= 30.0 {
        4.0
    } else if pe > 30.0 && pe <= 50.0 {
        3.0
    } else if pe > 50.0 && pe <= 70.0 {
        1.5
    } else {
        0.5
    };
    let sentiment_score = metrics.sentiment * 3.0;
    let volume_score = (metrics.volume_surge / 2.5).min(2.0);
    let filing_score = (metrics.sec_filings as f64 * 0.25).min(1.0);

    pe_score + sentiment_score + volume_score + filing_score
}

/// Base score plus a little noise so equal metrics do not always rank the same.
pub fn score<R: Rng>(metrics: &StockMetrics, rng: &mut R) -> f64 {
    round_to(base_score(metrics) + rng.gen_range(-0.1..0.1), 3)
}

/// Sorts by score descending, keeping input order for ties, and keeps `top`.
pub fn rank(mut records: Vec<RankedRecord>, top: usize) -> Vec<RankedRecord> {
    records.sort_by(|a, b| b.score.total_cmp(&a.score));
    records.truncate(top);
    records
}

/// Symbols to screen: the given file, else the stored symbol list, else the fallback list.
pub fn candidate_symbols(
    conn: &Connection,
    symbols_file_path: Option<&str>,
) -> model::Result<Vec<String>> {
    if let Some(path) = symbols_file_path {
        let symbols = symbols::clean_symbols(symbols::read_symbols_from_file(path)?);
        if !symbols.is_empty() {
            return Ok(symbols);
        }
        log::warn!("No usable symbols left in {} after cleanup", path);
    }

    let stored = store::symbols::get_symbols(conn)?;
    if !stored.is_empty() {
        log::info!("Loaded {} symbols from the store", stored.len());
        return Ok(stored);
    }

    log::warn!("No stored symbols, using the built-in list");
    Ok(constants::FALLBACK_SYMBOLS.iter().map(|s| s.to_string()).collect())
}

/// Scores every candidate, keeps the best `top`, and replaces the board with them.
pub async fn screen_and_save(
    conn: &mut Connection,
    client: &FinnhubClient,
    symbols_file_path: Option<&str>,
    top: usize,
) -> model::Result<Vec<RankedRecord>> {
    let symbols = candidate_symbols(conn, symbols_file_path)?;
    log::info!("Starting analysis on {} candidate stocks", symbols.len());
    if !client.is_enabled() {
        log::warn!("FINANCIAL_API_KEY not set, using placeholder P/E and no filings");
    }

    let mut rng = StdRng::from_entropy();
    let now = Utc::now();
    let today = now.date_naive();
    let mut scored = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let metrics = fundamentals(client, &symbol, today, &mut rng).await;
        scored.push(RankedRecord {
            pe: metrics.pe,
            sentiment: metrics.sentiment,
            volume_surge: metrics.volume_surge,
            score: score(&metrics, &mut rng),
            timestamp: now,
            symbol,
        });
    }

    let top_stocks = rank(scored, top);
    if let Some(best) = top_stocks.first() {
        log::info!(
            "Top {} stocks identified. Highest score: {:.3}",
            top_stocks.len(),
            best.score
        );
    }

    store::ranked::replace_all(conn, &top_stocks)?;
    Ok(top_stocks)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
