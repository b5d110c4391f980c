//! On-demand daily price history for the chart view.
//!
//! [`fetcher::ChartFetcher`] talks to the provider and retries transient
//! failures; [`slot::ChartController`] keeps only the newest request's
//! states on display.

pub mod backoff;
pub mod fetcher;
pub mod model;
pub mod response;
pub mod slot;

pub use fetcher::ChartFetcher;
pub use model::{ChartResult, ChartState};
pub use slot::ChartController;
