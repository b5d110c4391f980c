use std::sync::Arc;
use tokio::sync::mpsc;

use super::fetcher::ChartFetcher;
use super::model::{ChartRequest, ChartResult};

/// A state update tagged with the request that produced it.
#[derive(Debug, Clone)]
pub struct ChartUpdate {
    pub seq: u64,
    pub result: ChartResult,
}

/// The single "current chart" shown to the user.
///
/// Every request gets a sequence number from [`ChartSlot::begin`]; updates
/// carrying any other number are dropped, so a slow superseded request can
/// never overwrite the chart of a newer one.
#[derive(Debug, Default)]
pub struct ChartSlot {
    latest: u64,
    current: Option<ChartResult>,
}

impl ChartSlot {
    pub fn begin(&mut self, request: &ChartRequest) -> u64 {
        self.latest += 1;
        self.current = Some(ChartResult::loading(&request.symbol));
        self.latest
    }

    /// Applies `update` if it belongs to the latest request.
    pub fn apply(&mut self, update: ChartUpdate) -> bool {
        if update.seq != self.latest {
            log::debug!(
                "Dropping stale update for {} (request {}, current {})",
                update.result.symbol,
                update.seq,
                self.latest
            );
            return false;
        }
        self.current = Some(update.result);
        true
    }

    pub fn current(&self) -> Option<&ChartResult> {
        self.current.as_ref()
    }
}

/// Issues chart requests and routes their updates into a [`ChartSlot`].
///
/// Only the per-request forwarders hold strong senders, so the update stream
/// ends once every request has stopped, finished or not.
pub struct ChartController {
    fetcher: Arc<ChartFetcher>,
    slot: ChartSlot,
    tx: mpsc::WeakUnboundedSender<ChartUpdate>,
    rx: mpsc::UnboundedReceiver<ChartUpdate>,
}

impl ChartController {
    pub fn new(fetcher: Arc<ChartFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            slot: ChartSlot::default(),
            tx: tx.downgrade(),
            rx,
        }
    }

    // Everything left in a closed channel belongs to superseded requests.
    fn sender(&mut self) -> mpsc::UnboundedSender<ChartUpdate> {
        if let Some(tx) = self.tx.upgrade() {
            return tx;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = tx.downgrade();
        self.rx = rx;
        tx
    }

    /// Starts a request for `symbol`, superseding whatever is in flight.
    ///
    /// Superseded requests keep running; only their effect on the slot is dropped.
    pub fn request(&mut self, symbol: &str) -> u64 {
        let tx = self.sender();
        let seq = self.slot.begin(&ChartRequest::new(symbol));
        let mut updates = self.fetcher.fetch_chart(symbol);
        tokio::spawn(async move {
            while let Some(result) = updates.recv().await {
                if tx.send(ChartUpdate { seq, result }).is_err() {
                    break;
                }
            }
        });
        seq
    }

    /// Waits for the next update from any request and applies it.
    pub async fn next_update(&mut self) -> Option<(ChartUpdate, bool)> {
        let update = self.rx.recv().await?;
        let applied = self.slot.apply(update.clone());
        if applied {
            if let Some(message) = update.result.error_message() {
                log::warn!("{}: {}", update.result.symbol, message);
            }
        }
        Some((update, applied))
    }

    /// Applies updates until the latest request has reached a final state, or
    /// until no request is left running. `None` if nothing was requested.
    pub async fn settle(&mut self) -> Option<&ChartResult> {
        while !self.slot.current().is_some_and(ChartResult::is_final) {
            if self.next_update().await.is_none() {
                break;
            }
        }
        self.slot.current()
    }
}
