use chrono::Utc;
use rusqlite::Connection;
use std::{sync::Arc, time::Duration};

use crate::chart::backoff::{Pause, TokioPause};
use crate::constants;
use crate::http::client::{self, ReqwestTransport, Transport};
use crate::model::{self, ImportStats, ImportStatus};
use crate::{store, symbols};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    /// NASDAQ Trader `|`-delimited directory.
    Pipe,
    Csv,
}

impl ListingFormat {
    pub fn parse(self, text: &str) -> model::Result<Vec<String>> {
        match self {
            ListingFormat::Pipe => Ok(symbols::parse_pipe_listing(text)),
            ListingFormat::Csv => symbols::parse_csv_listing(text),
        }
    }
}

/// A public symbol list, reachable at any of `urls` (tried in order).
#[derive(Debug)]
pub struct ListingSource {
    pub name: &'static str,
    pub format: ListingFormat,
    pub urls: &'static [&'static str],
}

pub static LISTING_SOURCES: [ListingSource; 12] = [
    ListingSource {
        name: "nasdaq",
        format: ListingFormat::Pipe,
        urls: &[
            "http://ftp.nasdaqtrader.com/dynamic/SymbolDirectory/nasdaqlisted.txt",
            "https://ftp.nasdaqtrader.com/dynamic/SymbolDirectory/nasdaqlisted.txt",
        ],
    },
    ListingSource {
        name: "other",
        format: ListingFormat::Pipe,
        urls: &[
            "http://ftp.nasdaqtrader.com/dynamic/SymbolDirectory/otherlisted.txt",
            "https://ftp.nasdaqtrader.com/dynamic/SymbolDirectory/otherlisted.txt",
        ],
    },
    ListingSource {
        name: "nasdaq-csv",
        format: ListingFormat::Csv,
        urls: &["https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/nasdaq.csv"],
    },
    ListingSource {
        name: "nyse-csv",
        format: ListingFormat::Csv,
        urls: &["https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/nyse.csv"],
    },
    ListingSource {
        name: "otc",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/codebox/otc-markets-symbols/master/otc_symbols.csv",
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/otc.csv",
        ],
    },
    ListingSource {
        name: "sp500",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/sp500.csv",
            "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/master/data/constituents.csv",
        ],
    },
    ListingSource {
        name: "sp400",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/sp400.csv",
            "https://raw.githubusercontent.com/angeloashmore/sandp400/master/data/sandp400.csv",
        ],
    },
    ListingSource {
        name: "sp600",
        format: ListingFormat::Csv,
        urls: &["https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/sp600.csv"],
    },
    ListingSource {
        name: "djia",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/djia.csv",
            "https://raw.githubusercontent.com/datasets/dow-jones-industrial-average/master/data/djia.csv",
        ],
    },
    ListingSource {
        name: "russell1000",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/r1000.csv",
            "https://raw.githubusercontent.com/alexander-ponomaroff/russell-index-data/main/russell1000.csv",
        ],
    },
    ListingSource {
        name: "russell2000",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/r2000.csv",
            "https://raw.githubusercontent.com/alexander-ponomaroff/russell-index-data/main/russell2000.csv",
        ],
    },
    ListingSource {
        name: "russell3000",
        format: ListingFormat::Csv,
        urls: &[
            "https://raw.githubusercontent.com/shadmansaleh/us-indices/main/data/r3000.csv",
            "https://raw.githubusercontent.com/alexander-ponomaroff/russell-index-data/main/russell3000.csv",
        ],
    },
];

/// Looks sources up by name; no names means every source.
pub fn select_sources(names: &[String]) -> model::Result<Vec<&'static ListingSource>> {
    if names.is_empty() {
        return Ok(LISTING_SOURCES.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            let name = name.trim();
            LISTING_SOURCES
                .iter()
                .find(|source| source.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| model::AppError::UnknownSource(name.to_string()))
        })
        .collect()
}

/// Symbols gathered from remote sources, plus the sources that gave nothing.
#[derive(Debug, Default)]
pub struct SourcesReport {
    pub symbols: Vec<String>,
    pub failed: Vec<&'static str>,
}

#[derive(Debug, PartialEq)]
pub struct ImportSummary {
    pub fetched: usize,
    pub filtered: usize,
    pub written: usize,
    pub failed_sources: Vec<&'static str>,
}

/// Downloads listing files, retrying each URL before moving to the next one.
pub struct ListingFetcher {
    transport: Arc<dyn Transport>,
    pause: Arc<dyn Pause>,
}

impl Default for ListingFetcher {
    fn default() -> Self {
        Self::with_parts(Arc::new(ReqwestTransport::default()), Arc::new(TokioPause))
    }
}

impl ListingFetcher {
    pub fn with_parts(transport: Arc<dyn Transport>, pause: Arc<dyn Pause>) -> Self {
        Self { transport, pause }
    }

    async fn get_text(&self, url: &str) -> Option<String> {
        let parsed = match client::build_url(url, &[]) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("{}", err);
                return None;
            }
        };

        let attempts = constants::LISTING_RETRY_ATTEMPTS;
        for attempt in 1..=attempts {
            let failure = match self.transport.get(&parsed).await {
                Ok(raw) if raw.is_success() => return Some(raw.body),
                Ok(raw) => format!("HTTP {}", raw.status),
                Err(err) => err.to_string(),
            };
            log::warn!("[{}/{}] GET {} failed: {}", attempt, attempts, url, failure);
            if attempt < attempts {
                self.pause
                    .pause(Duration::from_secs(constants::LISTING_RETRY_DELAY_SECS))
                    .await;
            }
        }
        log::error!("All attempts failed for {}", url);
        None
    }

    /// Symbols from the first URL that answers with a parseable body.
    pub async fn fetch_first_working<P>(&self, urls: &[&str], parser: P) -> Vec<String>
    where
        P: Fn(&str) -> model::Result<Vec<String>>,
    {
        for url in urls {
            let Some(text) = self.get_text(url).await else {
                continue;
            };
            if text.trim().is_empty() {
                log::warn!("Empty listing from {}", url);
                continue;
            }
            match parser(&text) {
                Ok(symbols) => {
                    log::info!("{} symbols from {}", symbols.len(), url);
                    return symbols;
                }
                Err(err) => log::warn!("Parser failed for {}: {}", url, err),
            }
        }
        Vec::new()
    }

    pub async fn fetch_sources(&self, sources: &[&ListingSource]) -> SourcesReport {
        let mut report = SourcesReport::default();
        for source in sources {
            log::info!("Fetching {} listing", source.name);
            let symbols = self
                .fetch_first_working(source.urls, |text| source.format.parse(text))
                .await;
            if symbols.is_empty() {
                report.failed.push(source.name);
            }
            report.symbols.extend(symbols);
        }
        report
    }
}

/// Collects symbols from local files and remote sources, stores the cleaned
/// list, and logs the run to `import_stats` whether it succeeds or not.
pub async fn import_symbols(
    conn: &mut Connection,
    fetcher: &ListingFetcher,
    listing_files: &[String],
    sources: &[&ListingSource],
) -> model::Result<ImportSummary> {
    let mut collected = Vec::new();
    let outcome = collect_and_store(conn, fetcher, listing_files, sources, &mut collected).await;

    let stats = match &outcome {
        Ok(summary) => ImportStats {
            run_at: Utc::now(),
            fetched_count: summary.fetched,
            filtered_count: summary.filtered,
            status: ImportStatus::Success,
            error: None,
        },
        Err(err) => ImportStats {
            run_at: Utc::now(),
            fetched_count: collected.len(),
            filtered_count: 0,
            status: ImportStatus::Failure,
            error: Some(err.to_string()),
        },
    };
    if let Err(err) = store::import_stats::insert(conn, &stats) {
        log::error!("Failed to write import stats: {}", err);
    }
    outcome
}

async fn collect_and_store(
    conn: &mut Connection,
    fetcher: &ListingFetcher,
    listing_files: &[String],
    sources: &[&ListingSource],
    collected: &mut Vec<String>,
) -> model::Result<ImportSummary> {
    for path in listing_files {
        let raw = symbols::read_listing_file(path)?;
        log::info!("{}: {} symbols", path, raw.len());
        collected.extend(raw);
    }

    let report = fetcher.fetch_sources(sources).await;
    if !report.failed.is_empty() {
        log::warn!("No symbols from: {}", report.failed.join(", "));
    }
    collected.extend(report.symbols);

    let clean = symbols::clean_symbols(collected.iter());
    log::info!("Raw collected: {}, after cleanup: {}", collected.len(), clean.len());
    let written = store::symbols::upsert_symbols(conn, &clean, constants::IMPORT_SOURCE)?;

    Ok(ImportSummary {
        fetched: collected.len(),
        filtered: clean.len(),
        written,
        failed_sources: report.failed,
    })
}
