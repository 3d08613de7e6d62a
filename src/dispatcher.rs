//! Light state dispatcher
//!
//! Every controller pushes its [`LightStateChange`]s into one bounded queue.
//! A single consumer drains it in arrival order, asks the output rate limiter
//! for a permit and, if granted, writes the state to the bridge. Denied
//! requests are dropped; failed writes are logged and skipped.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bridge::{LightBridge, LightId, LightState};
use crate::rate_limit::RateLimiter;

/// A desired state for one light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightStateChange {
    pub light_id: LightId,
    pub state: LightState,
}

impl LightStateChange {
    /// Power `light_id` on at chromaticity (x, y)
    pub fn xy(light_id: LightId, x: f32, y: f32) -> Self {
        Self {
            light_id,
            state: LightState::xy(x, y),
        }
    }
}

/// The dispatcher's queue has been closed
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Light dispatcher is no longer running")]
pub struct DispatchClosed;

/// What happened to one dequeued request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    RateLimited,
    Failed,
}

/// Counters reported when the dispatch loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub rate_limited: u64,
    pub failed: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::RateLimited => self.rate_limited += 1,
            DispatchOutcome::Failed => self.failed += 1,
        }
    }
}

/// Sending side of the dispatch queue, cloned into every controller
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<LightStateChange>,
}

impl DispatcherHandle {
    /// Enqueue a request, waiting while the queue is full
    pub async fn submit(&self, change: LightStateChange) -> Result<(), DispatchClosed> {
        self.tx.send(change).await.map_err(|_| DispatchClosed)
    }
}

/// Receiving side of the dispatch queue plus the output rate limiter
#[derive(Debug)]
pub struct Dispatcher {
    rx: mpsc::Receiver<LightStateChange>,
    limiter: RateLimiter,
}

impl Dispatcher {
    /// Create the queue with room for `capacity` pending requests
    pub fn new(capacity: usize, limiter: RateLimiter) -> (DispatcherHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (DispatcherHandle { tx }, Self { rx, limiter })
    }

    /// Gate and send a single request
    pub async fn process(
        &mut self,
        change: LightStateChange,
        bridge: &dyn LightBridge,
    ) -> DispatchOutcome {
        if !self.limiter.allow() {
            debug!("Rate limited state change for light {}", change.light_id);
            return DispatchOutcome::RateLimited;
        }

        debug!("Received state change: {:?}", change);
        match bridge.set_light_state(change.light_id, &change.state).await {
            Ok(updates) => {
                debug!("Hue bridge response: {:?}", updates);
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!("Failed to set light {} state: {}", change.light_id, e);
                DispatchOutcome::Failed
            }
        }
    }

    /// Drain the queue until every [`DispatcherHandle`] is dropped
    pub async fn run(mut self, bridge: Arc<dyn LightBridge>) -> DispatchStats {
        info!("Light dispatcher started for bridge at {}", bridge.host());

        let mut stats = DispatchStats::default();
        while let Some(change) = self.rx.recv().await {
            let outcome = self.process(change, bridge.as_ref()).await;
            stats.record(outcome);
        }

        info!(
            "Light dispatcher stopped (sent: {}, rate limited: {}, failed: {})",
            stats.sent, stats.rate_limited, stats.failed
        );
        stats
    }

    /// Pop a queued request without waiting
    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<LightStateChange> {
        self.rx.try_recv().ok()
    }
}
