//! Background AI refinement of stored guidance.
//!
//! Requests hand jobs to a bounded queue and return immediately. A single
//! dispatcher task feeds a `JoinSet` that never runs more than `workers` model
//! calls at once. When the queue is full new jobs are dropped and the entry
//! keeps its canned guidance.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::db::EntryStore;
use crate::services::llm::{GuidanceModel, GuidanceRequest};
use crate::services::notifier::UpdateNotifier;

#[derive(Debug, Clone)]
pub struct RefinementJob {
    pub entry_id: i64,
    pub request: GuidanceRequest,
}

/// Cheap, cloneable intake side of the pool.
#[derive(Clone)]
pub struct RefinementHandle {
    tx: mpsc::Sender<RefinementJob>,
}

impl RefinementHandle {
    /// Queue a job without waiting. Returns `false` when it was dropped.
    pub fn dispatch(&self, job: RefinementJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(entry_id = job.entry_id, "Refinement queue full, keeping canned guidance");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(entry_id = job.entry_id, "Refinement pool shut down, keeping canned guidance");
                false
            }
        }
    }
}

pub struct RefinementPool {
    handle: RefinementHandle,
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
}

impl RefinementPool {
    pub fn start(
        store: Arc<dyn EntryStore>,
        model: Arc<dyn GuidanceModel>,
        notifier: UpdateNotifier,
        workers: usize,
        queue: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let cancel = CancellationToken::new();
        let worker = Arc::new(Worker {
            store,
            model,
            notifier,
        });

        tracing::info!(
            model = worker.model.name(),
            workers,
            queue,
            "Refinement pool started"
        );

        let dispatcher = tokio::spawn(dispatch_loop(rx, worker, workers.max(1), cancel.clone()));

        Self {
            handle: RefinementHandle { tx },
            cancel,
            dispatcher,
        }
    }

    pub fn handle(&self) -> RefinementHandle {
        self.handle.clone()
    }

    /// Stop accepting jobs, finish the queued and in-flight ones, then return.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "Refinement dispatcher panicked");
        }
        tracing::info!("Refinement pool stopped");
    }
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<RefinementJob>,
    worker: Arc<Worker>,
    workers: usize,
    cancel: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(result) = tasks.join_next() => log_join(result),
            job = rx.recv() => match job {
                Some(job) => spawn_job(&mut tasks, &permits, &worker, job).await,
                None => break,
            },
        }
    }

    rx.close();
    while let Some(job) = rx.recv().await {
        spawn_job(&mut tasks, &permits, &worker, job).await;
    }
    while let Some(result) = tasks.join_next().await {
        log_join(result);
    }
}

async fn spawn_job(
    tasks: &mut JoinSet<()>,
    permits: &Arc<Semaphore>,
    worker: &Arc<Worker>,
    job: RefinementJob,
) {
    // The semaphore is never closed.
    let Ok(permit) = permits.clone().acquire_owned().await else {
        return;
    };
    let worker = worker.clone();
    tasks.spawn(async move {
        worker.run(job).await;
        drop(permit);
    });
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Refinement task panicked");
    }
}

struct Worker {
    store: Arc<dyn EntryStore>,
    model: Arc<dyn GuidanceModel>,
    notifier: UpdateNotifier,
}

impl Worker {
    /// Never fails: every error is logged and the entry keeps what it has.
    async fn run(&self, job: RefinementJob) {
        let entry_id = job.entry_id;
        match self.refine(&job).await {
            Ok(true) => {
                tracing::info!(entry_id, model = self.model.name(), "Guidance refined");
                self.notifier.notify(entry_id);
            }
            Ok(false) => {
                tracing::warn!(entry_id, "Entry missing, discarding refined guidance");
            }
            Err(e) => {
                tracing::warn!(entry_id, error = %e, "AI refinement failed, keeping canned guidance");
            }
        }
    }

    async fn refine(&self, job: &RefinementJob) -> anyhow::Result<bool> {
        if self.store.get(job.entry_id).await?.is_none() {
            return Ok(false);
        }

        let text = self.model.refine(&job.request).await?;
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("model returned empty guidance");
        }

        Ok(self.store.update_guidance(job.entry_id, text).await?)
    }
}
