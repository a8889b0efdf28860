use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::adapters::time_source::TimeSource;
use crate::domain::clock::ClockEstimate;
use crate::error::DriftError;

/// Default period between automatic re-synchronizations.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(60);
/// Shortest period accepted by [`ClockTracker::spawn_periodic`].
pub const MIN_RESYNC_INTERVAL: Duration = Duration::from_millis(1);

/// Take one sample from `source` and reduce it to an estimate.
#[instrument(skip(source))]
pub async fn estimate_offset<S: TimeSource>(source: &S) -> Result<ClockEstimate, DriftError> {
    source.sample().await?.into_estimate()
}

/// Holds the latest clock estimate and keeps it fresh.
///
/// Failures never reach the caller: the previous estimate (or none) stays in
/// place and the error is logged. Overlapping re-syncs are not coalesced, the
/// last one to finish wins.
#[derive(Clone, Debug)]
pub struct ClockTracker {
    tx: Arc<watch::Sender<Option<ClockEstimate>>>,
}

impl Default for ClockTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<ClockEstimate> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ClockEstimate>> {
        self.tx.subscribe()
    }

    /// Re-synchronize once. Returns whether the estimate was updated.
    pub async fn resync<S: TimeSource>(&self, source: &S) -> bool {
        match estimate_offset(source).await {
            Ok(estimate) => {
                info!(
                    offset_ms = estimate.offset_ms,
                    uncertainty_ms = estimate.uncertainty_ms,
                    "clock estimate updated"
                );
                self.tx.send_replace(Some(estimate));
                true
            }
            Err(e) => {
                warn!(error = %e, "clock resync failed, keeping previous estimate");
                false
            }
        }
    }

    /// Re-sync immediately and then every `interval` until `cancel` fires.
    ///
    /// Intervals shorter than [`MIN_RESYNC_INTERVAL`] are raised to it.
    pub fn spawn_periodic<S>(
        &self,
        source: Arc<S>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        S: TimeSource + 'static,
    {
        let tracker = self.clone();
        let interval = interval.max(MIN_RESYNC_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        tracker.resync(source.as_ref()).await;
                    }
                }
            }
        })
    }
}
