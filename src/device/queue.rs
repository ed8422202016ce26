/* src/device/queue.rs */

use super::error::DeviceError;
use log::{error, info, warn};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

pub const DEFAULT_CAPACITY: usize = 9;

type Task = Box<dyn FnOnce() -> Result<(), DeviceError> + Send + 'static>;

/// A unit of configuration work captured now and run at the next drain.
pub struct Job {
    label: String,
    task: Task,
}

impl Job {
    pub fn new<F>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Result<(), DeviceError> + Send + 'static,
    {
        Job {
            label: label.into(),
            task: Box::new(task),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Accepted; carries the queue length after the push.
    Queued(usize),
    /// Queue was full, the job was dropped.
    Discarded(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainSchedule {
    Scheduled { pending: usize },
    /// Joined a drain that is still waiting on its delay.
    Coalesced { pending: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub executed: usize,
    pub failed: usize,
}

struct PendingDrain {
    handle: JoinHandle<DrainReport>,
    started: Arc<AtomicBool>,
    quota: Arc<AtomicUsize>,
}

/// Bounded FIFO of deferred jobs. Enqueue never blocks and drops on full;
/// jobs only run when a drain is triggered.
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    capacity: usize,
    discarded: AtomicU64,
    pending: Mutex<Option<PendingDrain>>,
    // Serializes drain episodes so FIFO order holds across them.
    drain_lock: tokio::sync::Mutex<()>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        JobQueue {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            discarded: AtomicU64::new(0),
            pending: Mutex::new(None),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs dropped because the queue was full.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn labels(&self) -> Vec<String> {
        self.lock_jobs().iter().map(|j| j.label.clone()).collect()
    }

    pub fn enqueue(&self, job: Job) -> Enqueued {
        let mut jobs = self.lock_jobs();
        if jobs.len() >= self.capacity {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Job '{}' discarded, buffer full: {} ({} discarded so far)",
                job.label,
                jobs.len(),
                self.discarded()
            );
            return Enqueued::Discarded(jobs.len());
        }
        jobs.push_back(job);
        info!("Job queued, queue length: {}", jobs.len());
        Enqueued::Queued(jobs.len())
    }

    /// Schedules a one-shot drain after `delay`. Only jobs queued at trigger
    /// time are part of it; later ones wait for the next trigger.
    /// Must be called from within a Tokio runtime.
    pub fn schedule_drain(self: &Arc<Self>, delay: Duration) -> DrainSchedule {
        let mut pending = self.lock_pending();
        let snapshot = self.len();

        if let Some(p) = pending.as_ref() {
            if !p.started.load(Ordering::SeqCst) && !p.handle.is_finished() {
                p.quota.fetch_max(snapshot, Ordering::SeqCst);
                info!("Drain already pending, extended to {} job(s)", snapshot);
                return DrainSchedule::Coalesced { pending: snapshot };
            }
        }

        let started = Arc::new(AtomicBool::new(false));
        let quota = Arc::new(AtomicUsize::new(snapshot));
        let queue = Arc::clone(self);
        let task_started = Arc::clone(&started);
        let task_quota = Arc::clone(&quota);

        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            let _guard = queue.drain_lock.lock().await;
            // Marking the drain started and taking its batch happen under one
            // lock, so a later trigger never counts jobs this drain owns.
            let batch = {
                let _pending = queue.lock_pending();
                task_started.store(true, Ordering::SeqCst);
                queue.take_front(task_quota.load(Ordering::SeqCst))
            };
            run_batch(batch).await
        });

        *pending = Some(PendingDrain {
            handle,
            started,
            quota,
        });
        info!("Scheduled job queue len: {} {:?}", snapshot, self.labels());
        DrainSchedule::Scheduled { pending: snapshot }
    }

    /// Aborts a drain still waiting on its delay. Returns whether one was cancelled.
    pub fn cancel_pending_drain(&self) -> bool {
        let mut pending = self.lock_pending();
        match pending.take() {
            Some(p) if !p.started.load(Ordering::SeqCst) && !p.handle.is_finished() => {
                p.handle.abort();
                info!("Pending drain cancelled");
                true
            }
            other => {
                *pending = other;
                false
            }
        }
    }

    fn take_front(&self, count: usize) -> Vec<Job> {
        let mut jobs = self.lock_jobs();
        let n = count.min(jobs.len());
        jobs.drain(..n).collect()
    }

    fn lock_jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingDrain>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn run_batch(batch: Vec<Job>) -> DrainReport {
    let mut report = DrainReport::default();
    if batch.is_empty() {
        info!("Drain found no queued jobs");
        return report;
    }
    info!("Draining {} job(s)", batch.len());

    for job in batch {
        let label = job.label;
        let task = job.task;
        report.executed += 1;
        match tokio::task::spawn_blocking(task).await {
            Ok(Ok(())) => info!("Job '{}' done", label),
            Ok(Err(e)) => {
                report.failed += 1;
                error!("Job '{}' failed: {}", label, e);
            }
            Err(e) => {
                report.failed += 1;
                error!("Job '{}' aborted: {}", label, e);
            }
        }
    }
    info!(
        "Drain finished: {} executed, {} failed",
        report.executed, report.failed
    );
    report
}
