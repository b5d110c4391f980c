use thiserror::Error;

/// A request for one symbol's daily history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub symbol: String,
}

impl ChartRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
        }
    }
}

/// One trading day's close.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    /// ISO `YYYY-MM-DD`, as keyed by the provider.
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartState {
    Loading,
    Success,
    Error,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Symbol must not be empty")]
    EmptySymbol,
    #[error("Attempt {attempt} failed: {message}")]
    TransientFetch { attempt: u32, message: String },
    #[error("Failed to load chart after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: String },
    #[error("No daily time series for symbol: {0}")]
    MissingSeries(String),
}

impl ChartError {
    /// Whether this error ends the request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChartError::TransientFetch { .. })
    }
}

/// What the display shows for a chart request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartResult {
    pub symbol: String,
    pub points: Vec<PricePoint>,
    pub state: ChartState,
    pub error: Option<ChartError>,
}

impl ChartResult {
    pub fn loading(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            points: Vec::new(),
            state: ChartState::Loading,
            error: None,
        }
    }

    pub fn success(symbol: &str, points: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.to_string(),
            points,
            state: ChartState::Success,
            error: None,
        }
    }

    pub fn failed(symbol: &str, error: ChartError) -> Self {
        Self {
            symbol: symbol.to_string(),
            points: Vec::new(),
            state: ChartState::Error,
            error: Some(error),
        }
    }

    /// Message suitable for showing to the user.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// No further updates follow this one for the same request.
    pub fn is_final(&self) -> bool {
        match self.state {
            ChartState::Loading => false,
            ChartState::Success => true,
            ChartState::Error => self.error.as_ref().is_some_and(ChartError::is_terminal),
        }
    }

    pub fn closes(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.points.iter().map(|p| (p.date.as_str(), p.close))
    }
}
