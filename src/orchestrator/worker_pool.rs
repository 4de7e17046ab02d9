//! Concurrent download pool.
//!
//! N workers share one task queue seeded with every dataset. Each worker owns
//! an exclusive session; results land in shared, mutex-guarded collections.
//! Shutdown is sentinel-based: once every task has been acknowledged, one
//! sentinel per worker is enqueued and each worker exits on its first
//! sentinel. A worker that cannot open its session logs and exits instead of
//! crashing the run; if every worker dies this way the pool aborts rather
//! than waiting forever on tasks nobody will take.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::models::{DownloadTask, RunResults};
use crate::orchestrator::task_queue::TaskQueue;
use crate::workflow::DownloadDriver;

/// How long a worker waits on an empty queue before re-checking.
const POP_TIMEOUT: Duration = Duration::from_secs(2);

enum QueueItem {
    Task(DownloadTask),
    Shutdown,
}

/// What the pool produced. `aborted` is set when every worker died before
/// the queue drained; the partial results are still valid.
pub struct PoolRun {
    pub results: RunResults,
    pub aborted: Option<anyhow::Error>,
}

/// Runs `tasks` through `worker_count` concurrent sessions.
pub async fn run_pool(
    driver: Arc<dyn DownloadDriver>,
    tasks: Vec<DownloadTask>,
    worker_count: usize,
    delay_between_downloads: Duration,
) -> PoolRun {
    let queue = Arc::new(TaskQueue::new());
    for task in tasks {
        queue.push(QueueItem::Task(task));
    }

    let results = Arc::new(Mutex::new(RunResults::default()));
    let active_workers = Arc::new(AtomicUsize::new(worker_count));
    let all_dead = Arc::new(Notify::new());

    let mut handles = Vec::with_capacity(worker_count);
    for worker_id in 1..=worker_count {
        handles.push(tokio::spawn(worker_loop(
            worker_id,
            Arc::clone(&driver),
            Arc::clone(&queue),
            Arc::clone(&results),
            Arc::clone(&active_workers),
            Arc::clone(&all_dead),
            delay_between_downloads,
        )));
    }

    // Wait for the queue to drain, unless every worker has already died.
    let aborted = tokio::select! {
        _ = queue.join() => None,
        _ = wait_all_dead(&active_workers, &all_dead) => {
            error!("💥 All {} workers died before the queue drained", worker_count);
            Some(anyhow!(
                "all {} workers failed; {} tasks were never processed",
                worker_count,
                queue.unfinished()
            ))
        }
    };

    // One sentinel per worker; surviving workers exit on their first one.
    for _ in 0..worker_count {
        queue.push(QueueItem::Shutdown);
    }

    for (i, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!("💥 Worker {} task panicked: {}", i + 1, e);
        }
    }

    let results = match Arc::try_unwrap(results) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
        Err(arc) => arc.lock().unwrap_or_else(|e| e.into_inner()).clone(),
    };

    PoolRun { results, aborted }
}

async fn wait_all_dead(active_workers: &AtomicUsize, all_dead: &Notify) {
    loop {
        if active_workers.load(Ordering::SeqCst) == 0 {
            return;
        }
        let notified = all_dead.notified();
        if active_workers.load(Ordering::SeqCst) == 0 {
            return;
        }
        notified.await;
    }
}

async fn worker_loop(
    worker_id: usize,
    driver: Arc<dyn DownloadDriver>,
    queue: Arc<TaskQueue<QueueItem>>,
    results: Arc<Mutex<RunResults>>,
    active_workers: Arc<AtomicUsize>,
    all_dead: Arc<Notify>,
    delay: Duration,
) {
    let mut session = match driver.open_session(worker_id).await {
        Ok(session) => session,
        Err(e) => {
            error!("💥 Worker {} failed to start: {:#}", worker_id, e);
            if active_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
                all_dead.notify_waiters();
            }
            return;
        }
    };

    loop {
        let item = match queue.pop_timeout(POP_TIMEOUT).await {
            Some(item) => item,
            None => continue,
        };
        match item {
            QueueItem::Task(task) => {
                let result = session.download(&task).await;
                {
                    let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
                    results.push(result);
                }
                // Politeness delay toward the portal.
                tokio::time::sleep(delay).await;
                queue.task_done();
            }
            QueueItem::Shutdown => {
                queue.task_done();
                break;
            }
        }
    }

    session.close().await;
    if active_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
        all_dead.notify_waiters();
    }
    debug!("Worker {} finished", worker_id);
}

/// Logs the pool banner before the run starts.
pub fn log_pool_start(total: usize, worker_count: usize) {
    let estimate_secs = (total as f64 * 12.0 / worker_count.max(1) as f64).ceil() as u64;
    info!(
        "⚙️ Downloading {} datasets with {} workers (~{} min estimated)",
        total,
        worker_count,
        (estimate_secs + 59) / 60
    );
}
