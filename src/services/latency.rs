use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::adapters::probe_client::Measure;
use crate::domain::latency::{ProbeResult, ProbeStatus, ProbeTarget};

/// Number of targets probed concurrently.
pub const BATCH_SIZE: usize = 10;
/// Independent trials per target; the fastest success is kept.
pub const TRIALS: usize = 2;

/// Results of the current run, readable while the run progresses.
///
/// Entries are kept by position, so targets sharing an id are still counted
/// separately. Lookups by id resolve to the first match.
#[derive(Clone, Debug, Default)]
pub struct ProbeBoard {
    inner: Arc<RwLock<Vec<(ProbeTarget, ProbeResult)>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoardCounts {
    pub pending: usize,
    pub testing: usize,
    pub done: usize,
    pub error: usize,
}

impl BoardCounts {
    pub fn total(&self) -> usize {
        self.pending + self.testing + self.done + self.error
    }

    pub fn settled(&self) -> usize {
        self.done + self.error
    }
}

impl ProbeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board with `targets`, all pending.
    pub fn reset(&self, targets: &[ProbeTarget]) {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *entries = targets
            .iter()
            .map(|t| (t.clone(), ProbeResult::Pending))
            .collect();
    }

    pub fn set(&self, id: &str, result: ProbeResult) {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, slot)) = entries.iter_mut().find(|(t, _)| t.id == id) {
            *slot = result;
        }
    }

    /// Update the entry at `index` in run order. Out of range is ignored.
    pub fn set_at(&self, index: usize, result: ProbeResult) {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, slot)) = entries.get_mut(index) {
            *slot = result;
        }
    }

    pub fn get(&self, id: &str) -> Option<ProbeResult> {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().find(|(t, _)| t.id == id).map(|(_, r)| *r)
    }

    /// Targets and their current result, in run order.
    pub fn snapshot(&self) -> Vec<(ProbeTarget, ProbeResult)> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn counts(&self) -> BoardCounts {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BoardCounts::default();
        for (_, res) in entries.iter() {
            match res.status() {
                ProbeStatus::Pending => counts.pending += 1,
                ProbeStatus::Testing => counts.testing += 1,
                ProbeStatus::Done => counts.done += 1,
                ProbeStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}

/// Outcome of one latency run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub targets: usize,
    pub batches_total: usize,
    pub batches_run: usize,
    pub done: usize,
    pub errors: usize,
    /// Cancellation was observed at a batch boundary.
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

pub fn batch_count(targets: usize, batch_size: usize) -> usize {
    targets.div_ceil(batch_size.max(1))
}

/// Measure one target with [`TRIALS`] concurrent trials.
///
/// Keeping the minimum only damps first-connection overhead; it is an
/// approximation, not a benchmark.
pub async fn probe_target<M: Measure>(target: &ProbeTarget, measurer: &M) -> ProbeResult {
    let trials = join_all((0..TRIALS).map(|_| measurer.measure(target))).await;
    let latencies: Vec<Option<u32>> = trials
        .into_iter()
        .map(|t| match t {
            Ok(ms) => Some(ms),
            Err(e) => {
                debug!(id = %target.id, error = %e, "trial failed");
                None
            }
        })
        .collect();
    ProbeResult::from_trials(&latencies)
}

/// Probe `targets` in sequential batches of `batch_size`.
///
/// Targets inside a batch run concurrently; the next batch starts once the
/// whole batch settled. `cancel` is only polled between batches, in-flight
/// trials finish or time out on their own. Per target failures end up as
/// [`ProbeResult::Error`] and never abort the run.
#[instrument(skip_all, fields(targets = targets.len(), batch_size = batch_size))]
pub async fn run_batched<M: Measure>(
    targets: &[ProbeTarget],
    measurer: &M,
    board: &ProbeBoard,
    cancel: &CancellationToken,
    batch_size: usize,
) -> RunSummary {
    let batch_size = batch_size.max(1);
    let batches_total = batch_count(targets.len(), batch_size);
    let start = Instant::now();
    board.reset(targets);

    let mut batches_run = 0;
    let mut cancelled = false;
    for (idx, batch) in targets.chunks(batch_size).enumerate() {
        let first = idx * batch_size;
        if cancel.is_cancelled() {
            info!(batch = idx + 1, batches_total, "run cancelled");
            cancelled = true;
            break;
        }
        info!(batch = idx + 1, batches_total, size = batch.len(), "starting batch");
        for i in first..first + batch.len() {
            board.set_at(i, ProbeResult::Testing);
        }
        join_all(batch.iter().enumerate().map(|(i, t)| async move {
            let res = probe_target(t, measurer).await;
            board.set_at(first + i, res);
        }))
        .await;
        batches_run += 1;
    }

    let counts = board.counts();
    let summary = RunSummary {
        targets: targets.len(),
        batches_total,
        batches_run,
        done: counts.done,
        errors: counts.error,
        cancelled,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(?summary, "run finished");
    summary
}

/// Run [`run_batched`] on its own task, sharing `board` with the caller.
pub fn spawn_run<M>(
    targets: Vec<ProbeTarget>,
    measurer: Arc<M>,
    board: ProbeBoard,
    cancel: CancellationToken,
    batch_size: usize,
) -> JoinHandle<RunSummary>
where
    M: Measure + Send + 'static,
{
    tokio::spawn(async move {
        run_batched(&targets, measurer.as_ref(), &board, &cancel, batch_size).await
    })
}
