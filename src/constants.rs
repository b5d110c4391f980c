// Provider endpoint used when ALPHAVANTAGE_BASE_URL is not set.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_SQLITE_FILE: &str = "screener.db";

pub const TIME_SERIES_FUNCTION: &str = "TIME_SERIES_DAILY_ADJUSTED";
// Multi-year history rather than the last 100 sessions.
pub const OUTPUT_SIZE: &str = "full";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const BACKOFF_BASE_MS: u64 = 1000;
pub const BACKOFF_MAX_JITTER_MS: u64 = 1000;

pub const HTTP_TIMEOUT_SECS: u64 = 20;
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const FINNHUB_MAX_ATTEMPTS: u32 = 3;
// Window for counting 10-K and 10-Q filings.
pub const FILINGS_LOOKBACK_DAYS: u64 = 90;

pub const LISTING_RETRY_ATTEMPTS: u32 = 3;
pub const LISTING_RETRY_DELAY_SECS: u64 = 2;
// Recorded as the source of every imported symbol.
pub const IMPORT_SOURCE: &str = "hybrid-import";

pub const TOP_STOCKS: usize = 20;
pub const MAX_SYMBOL_LEN: usize = 12;

pub const FUND_KEYWORDS: [&str; 6] = ["ETF", "ETN", "FUND", "TRUST", "INDEX", "EXCHANGE TRADED"];

// Used by the screener when neither the store nor a file supplies symbols.
pub const FALLBACK_SYMBOLS: [&str; 30] = [
    "MSFT", "AAPL", "GOOGL", "NVDA", "TSLA", "AMZN", "JPM", "V", "MA", "WMT", "JNJ", "XOM", "UNH",
    "PG", "HD", "DIS", "NFLX", "ADBE", "CRM", "INTC", "SBUX", "COST", "CSCO", "PYPL", "ZM", "LUV",
    "DAL", "UAL", "AAL", "F",
];
