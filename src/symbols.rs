use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{constants, model};

/// Reads one symbol per line, skipping blank lines.
pub fn read_symbols_from_file(symbols_file_path: &str) -> model::Result<Vec<String>> {
    // Validate symbols file path
    let path = Path::new(symbols_file_path);
    if !path.exists() {
        return Err(model::AppError::FileNotFound(symbols_file_path.into()));
    }

    let file = OpenOptions::new().read(true).open(path)?;

    let mut symbols = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|_e| model::AppError::CouldNotReadLine(i + 1))?;
        let symbol = line.trim();
        if symbol.is_empty() {
            log::warn!("line {} is empty", i + 1);
            continue;
        }
        symbols.push(symbol.to_string());
    }

    if symbols.is_empty() {
        return Err(model::AppError::EmptySymbolFile(symbols_file_path.into()));
    }
    Ok(symbols)
}

/// Reads a listing file, pipe-delimited (NASDAQ Trader) or CSV.
pub fn read_listing_file(listing_file_path: &str) -> model::Result<Vec<String>> {
    let path = Path::new(listing_file_path);
    if !path.exists() {
        return Err(model::AppError::FileNotFound(listing_file_path.into()));
    }
    let text = fs::read_to_string(path)?;
    let is_pipe = text.lines().next().is_some_and(|header| header.contains('|'));
    if is_pipe {
        Ok(parse_pipe_listing(&text))
    } else {
        parse_csv_listing(&text)
    }
}

/// Parses the `nasdaqlisted.txt` / `otherlisted.txt` format.
pub fn parse_pipe_listing(text: &str) -> Vec<String> {
    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let header: Vec<&str> = header.split('|').map(str::trim).collect();
    let idx = ["Symbol", "ACT Symbol", "NASDAQ Symbol", "CQS Symbol"]
        .iter()
        .find_map(|candidate| header.iter().position(|h| h == candidate))
        .unwrap_or(0);

    lines
        .filter(|line| {
            !line.is_empty() && !line.starts_with("File Creation") && !line.starts_with("NASDAQ")
        })
        .filter_map(|line| line.split('|').nth(idx))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty() && s != "SYMBOL")
        .collect()
}

/// Parses a CSV listing with a header row.
pub fn parse_csv_listing(text: &str) -> model::Result<Vec<String>> {
    const COLUMNS: [&str; 5] = ["Symbol", "symbol", "Ticker", "ticker", "code"];

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let candidates: Vec<usize> = COLUMNS
        .iter()
        .filter_map(|c| headers.iter().position(|h| h.trim() == *c))
        .collect();

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = candidates
            .iter()
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
        {
            out.push(value.to_uppercase());
        }
    }
    Ok(out)
}

/// True for symbols that look like funds rather than operating companies.
pub fn looks_like_fund(symbol: &str) -> bool {
    let upper = symbol.to_uppercase();
    constants::FUND_KEYWORDS.iter().any(|k| upper.contains(k))
}

/// Normalizes, filters and dedupes symbols, keeping first-seen order.
pub fn clean_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty() && s.len() <= constants::MAX_SYMBOL_LEN)
        .filter(|s| !looks_like_fund(s))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
