use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of the ranked board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRecord {
    pub symbol: String,
    pub pe: f64,
    pub sentiment: f64,
    pub volume_surge: f64,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Inputs to the screener score for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct StockMetrics {
    pub pe: f64,
    pub sentiment: f64,
    pub volume_surge: f64,
    pub sec_filings: u32,
}

/// Outcome of one symbol import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Success,
    Failure,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Success => "success",
            ImportStatus::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(ImportStatus::Success),
            "failure" => Some(ImportStatus::Failure),
            _ => None,
        }
    }
}

/// One row of the import log.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStats {
    pub run_at: DateTime<Utc>,
    pub fetched_count: usize,
    pub filtered_count: usize,
    pub status: ImportStatus,
    pub error: Option<String>,
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not read line {0}")]
    CouldNotReadLine(usize),
    #[error("No symbols in file: {0}")]
    EmptySymbolFile(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown listing source: {0}")]
    UnknownSource(String),
}
