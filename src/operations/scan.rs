//! Bulk market synchronization
//!
//! A complete sweep of every market on every branch: enumerate ids page
//! by page, chunk them into small fetch batches, and run the batches
//! through a fixed-size worker pool. The sweep is best-effort - a failed
//! batch is recorded and never retried, and it does not stop sibling
//! batches. Callers needing completeness re-run the sweep.

use crate::domain::{BranchId, MarketId};
use crate::error::{CoreError, Result};
use crate::infrastructure::rpc::ChainRpc;
use crate::operations::indexer::MarketIndexer;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How many markets one fetch batch carries. Kept small and independent
/// of the listing page size: pagination bounds the *listing* round-trips,
/// batching bounds the size of each *fetch* call.
const DEFAULT_BATCH_SIZE: usize = 5;

/// How many ids one listing page returns at most
const DEFAULT_PAGE_SIZE: u64 = 2000;

/// Worker pool size. Deliberately low - the upstream node degrades under
/// heavy parallel load.
const DEFAULT_CONCURRENCY: usize = 10;

/// A progress label is attached to every Nth batch of a branch
const LABEL_EVERY_N_BATCHES: usize = 25;

/// Tunables for one sweep
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Global cap on records fetched across all branches; `None` means
    /// unbounded
    pub limit: Option<u64>,
    pub batch_size: usize,
    pub page_size: u64,
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            limit: None,
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// One unit of work: an ordered slice of ids on one branch
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub id: Uuid,
    pub branch: BranchId,
    pub ids: Vec<MarketId>,
    /// Optional human-readable progress label, logged by the worker that
    /// picks the job up
    pub label: Option<String>,
}

impl ScanJob {
    fn new(branch: BranchId, ids: Vec<MarketId>, label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            branch,
            ids,
            label,
        }
    }
}

/// A sync job that did not complete cleanly
#[derive(Debug)]
pub struct JobFailure {
    pub job_id: Uuid,
    pub branch: BranchId,
    pub label: Option<String>,
    pub error: CoreError,
}

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Records handed to the worker pool (the session progress counter)
    pub records_enqueued: u64,
    /// Records that actually landed in the index
    pub records_indexed: u64,
    pub jobs_submitted: u64,
    pub failures: Vec<JobFailure>,
}

impl ScanSummary {
    /// The first failure observed, if any
    pub fn first_error(&self) -> Option<&CoreError> {
        self.failures.first().map(|f| &f.error)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bounded-concurrency sweep engine
pub struct MarketScanner {
    rpc: Arc<dyn ChainRpc>,
    indexer: Arc<MarketIndexer>,
    options: ScanOptions,
}

impl MarketScanner {
    pub fn new(rpc: Arc<dyn ChainRpc>, indexer: Arc<MarketIndexer>, options: ScanOptions) -> Self {
        Self {
            rpc,
            indexer,
            options,
        }
    }

    /// Run one complete sweep. Returns once the worker pool has drained
    /// every submitted job. Enumeration errors abort submission but the
    /// already-queued jobs still run to completion.
    pub async fn run(&self) -> Result<ScanSummary> {
        let (tx, rx) = async_channel::unbounded::<ScanJob>();

        let workers: Vec<_> = (0..self.options.concurrency.max(1))
            .map(|n| {
                let rx = rx.clone();
                let rpc = self.rpc.clone();
                let indexer = self.indexer.clone();
                tokio::spawn(worker_loop(n, rx, rpc, indexer))
            })
            .collect();
        drop(rx);

        let submission = self.submit_jobs(&tx).await;
        // close the queue so the workers drain and exit
        drop(tx);

        let mut summary = ScanSummary::default();
        for joined in futures::future::join_all(workers).await {
            match joined {
                Ok((indexed, failures)) => {
                    summary.records_indexed += indexed;
                    summary.failures.extend(failures);
                }
                Err(e) => error!("scan worker panicked: {e}"),
            }
        }

        let (enqueued, submitted) = submission?;
        summary.records_enqueued = enqueued;
        summary.jobs_submitted = submitted;

        info!(
            enqueued = summary.records_enqueued,
            indexed = summary.records_indexed,
            failed_jobs = summary.failures.len(),
            "done loading markets"
        );
        Ok(summary)
    }

    /// Enumerate branches, paginate their id listings, chunk into jobs,
    /// and push them onto the queue until the global cap is hit
    async fn submit_jobs(&self, tx: &async_channel::Sender<ScanJob>) -> Result<(u64, u64)> {
        let branches = self.rpc.list_branches().await?;
        info!("loading markets from {} branches", branches.len());

        let mut enqueued: u64 = 0;
        let mut submitted: u64 = 0;

        'branches: for branch in branches {
            if self.remaining(enqueued) == Some(0) {
                break;
            }

            let ids = self.list_branch_ids(&branch).await?;
            let branch_total = ids.len() as u64;
            // how much of this branch the cap still lets us take
            let effective_total = match self.remaining(enqueued) {
                Some(r) => branch_total.min(r),
                None => branch_total,
            };

            for (batch_index, chunk) in ids.chunks(self.options.batch_size.max(1)).enumerate() {
                let take = match self.remaining(enqueued) {
                    Some(0) => break 'branches,
                    Some(r) => chunk.len().min(r as usize),
                    None => chunk.len(),
                };

                let label = if batch_index == 0 {
                    Some(format!(
                        "loading {effective_total} markets from branch {branch}"
                    ))
                } else if batch_index % LABEL_EVERY_N_BATCHES == 0 {
                    let done = (batch_index * self.options.batch_size) as f64;
                    Some(format!(
                        "{:.2}% complete",
                        done / effective_total as f64 * 100.0
                    ))
                } else {
                    None
                };

                let job = ScanJob::new(branch.clone(), chunk[..take].to_vec(), label);
                enqueued += take as u64;
                submitted += 1;
                if tx.send(job).await.is_err() {
                    return Err(CoreError::UpstreamUnavailable(
                        "scan worker pool stopped accepting jobs".to_string(),
                    ));
                }
            }
        }

        Ok((enqueued, submitted))
    }

    /// Concatenate all listing pages of one branch
    async fn list_branch_ids(&self, branch: &BranchId) -> Result<Vec<MarketId>> {
        let total = self.rpc.count_markets(branch).await?;
        let mut ids = Vec::with_capacity(total as usize);
        let mut offset = 0;
        while offset < total {
            let limit = self.options.page_size.min(total - offset);
            let page = self.rpc.list_market_ids(branch, offset, limit).await?;
            if page.is_empty() {
                // upstream returned fewer ids than it counted; stop
                // paginating instead of spinning
                break;
            }
            offset += page.len() as u64;
            ids.extend(page);
        }
        Ok(ids)
    }

    fn remaining(&self, enqueued: u64) -> Option<u64> {
        self.options.limit.map(|l| l.saturating_sub(enqueued))
    }
}

/// One worker: pull jobs until the queue closes
async fn worker_loop(
    worker_id: usize,
    rx: async_channel::Receiver<ScanJob>,
    rpc: Arc<dyn ChainRpc>,
    indexer: Arc<MarketIndexer>,
) -> (u64, Vec<JobFailure>) {
    let mut indexed: u64 = 0;
    let mut failures = Vec::new();

    while let Ok(job) = rx.recv().await {
        if let Some(label) = &job.label {
            info!("{label}");
        }
        let (job_indexed, job_error) = process_job(&*rpc, &indexer, &job).await;
        indexed += job_indexed;
        if let Some(error) = job_error {
            warn!(worker = worker_id, job = %job.id, branch = %job.branch, "sync job failed: {error}");
            failures.push(JobFailure {
                job_id: job.id,
                branch: job.branch,
                label: job.label,
                error,
            });
        }
    }

    (indexed, failures)
}

/// Fetch one batch and index every record in it. A batch-level fetch
/// failure fails the whole job; a single bad record fails the job but
/// the rest of the batch is still attempted.
async fn process_job(
    rpc: &dyn ChainRpc,
    indexer: &MarketIndexer,
    job: &ScanJob,
) -> (u64, Option<CoreError>) {
    let infos = match rpc.market_info_batch(&job.ids).await {
        Ok(infos) => infos,
        Err(source) => {
            return (
                0,
                Some(CoreError::BatchFetch {
                    job: job.id.to_string(),
                    source,
                }),
            )
        }
    };

    let mut indexed: u64 = 0;
    let mut first_error: Option<CoreError> = None;

    for id in &job.ids {
        let result = match infos.get(id) {
            Some(info) => indexer.index_market(id.as_str(), info).await.map(|_| ()),
            None => Err(CoreError::RecordMapping {
                id: id.to_string(),
                reason: "no market info returned for id".to_string(),
            }),
        };
        match result {
            Ok(()) => indexed += 1,
            Err(error) => {
                warn!(market = %id, "failed to index market in batch: {error}");
                first_error.get_or_insert(error);
            }
        }
    }

    (indexed, first_error)
}
