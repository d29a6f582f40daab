//! Priority job pool
//!
//! A fixed set of OS worker threads draining one priority queue. Every bus
//! listener and service handler runs here, so callers never execute user
//! callbacks on their own thread.

mod job;
mod queue;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub use job::{Job, JobPriority, RunningJob};
use queue::{Shared, Task};

/// Invoked when the queue grows past the busy limit
///
/// Arguments are the worker count, the jobs currently running, and the
/// number of jobs waiting.
pub type BusyCallback = Arc<dyn Fn(usize, &[RunningJob], usize) + Send + Sync>;

/// Errors returned by the job pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("job pool is not running")]
    NotRunning,

    #[error("job pool has no workers to remove")]
    NoWorkers,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct PoolControl {
    running: bool,
    worker_count: usize,
    busy_warning_limit: usize,
    workers: Vec<JoinHandle<()>>,
    next_worker_id: usize,
}

/// Pool of worker threads consuming prioritised jobs
pub struct JobPool {
    shared: Arc<Shared>,
    control: Mutex<PoolControl>,
    busy_callback: Option<BusyCallback>,
}

impl JobPool {
    /// Start a pool with `worker_count` workers
    pub fn new(worker_count: usize) -> Result<Self, PoolError> {
        Self::build(worker_count, None)
    }

    /// Start a pool that reports queue build-up through `callback`
    pub fn with_busy_callback(
        worker_count: usize,
        callback: BusyCallback,
    ) -> Result<Self, PoolError> {
        Self::build(worker_count, Some(callback))
    }

    fn build(worker_count: usize, busy_callback: Option<BusyCallback>) -> Result<Self, PoolError> {
        let pool = Self {
            shared: Arc::new(Shared::default()),
            control: Mutex::new(PoolControl {
                running: true,
                worker_count: 0,
                busy_warning_limit: 0,
                workers: Vec::with_capacity(worker_count),
                next_worker_id: 0,
            }),
            busy_callback,
        };

        {
            let mut control = pool.control.lock();
            for _ in 0..worker_count {
                pool.spawn_worker(&mut control)?;
            }
        }

        info!(workers = worker_count, "Job pool started");
        Ok(pool)
    }

    /// Queue a job
    ///
    /// Lower priority values run first; equal priorities run in submission
    /// order.
    pub fn add_job(&self, priority: impl Into<u32>, job: Job) -> Result<(), PoolError> {
        let priority = priority.into();

        let busy = {
            let mut control = self.control.lock();
            if !control.running {
                return Err(PoolError::NotRunning);
            }

            let depth = self.shared.push(priority, Task::Run(job));

            if depth > control.busy_warning_limit && control.busy_warning_limit > 0 {
                control.busy_warning_limit *= 2;
                Some((control.worker_count, depth))
            } else {
                None
            }
        };

        if let Some((workers, pending)) = busy {
            match &self.busy_callback {
                Some(callback) => callback(workers, &self.shared.current_jobs(), pending),
                None => warn!(workers, pending, "Job pool is falling behind"),
            }
        }

        Ok(())
    }

    /// Add one worker thread
    pub fn add_worker(&self) -> Result<(), PoolError> {
        let mut control = self.control.lock();
        if !control.running {
            return Err(PoolError::NotRunning);
        }
        self.spawn_worker(&mut control)
    }

    /// Ask one worker to exit once it reaches the front of the queue
    pub fn remove_worker(&self) -> Result<(), PoolError> {
        let mut control = self.control.lock();
        if !control.running {
            return Err(PoolError::NotRunning);
        }
        if control.worker_count == 0 {
            return Err(PoolError::NoWorkers);
        }

        control.worker_count -= 1;
        control.busy_warning_limit = control.worker_count * 3;
        self.shared.push(0, Task::Quit);

        debug!(workers = control.worker_count, "Removing worker");
        Ok(())
    }

    /// Block until every queued and running job has finished
    ///
    /// Jobs queued by running jobs are waited for too.
    pub fn block_till_done(&self) {
        self.shared.wait_drained();
    }

    /// Drain the queue then shut every worker down
    ///
    /// Calling it again is a no-op.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        if !self.is_running() {
            return;
        }

        self.block_till_done();

        let workers = {
            let mut control = self.control.lock();
            if !control.running {
                return;
            }
            control.running = false;
            for _ in 0..control.worker_count {
                // sorts after any job still in flight
                self.shared.push(u32::MAX, Task::Quit);
            }
            control.worker_count = 0;
            std::mem::take(&mut control.workers)
        };

        self.block_till_done();

        for handle in workers {
            if handle.join().is_err() {
                error!("Worker thread panicked outside a job");
            }
        }

        info!("Job pool stopped");
    }

    pub fn is_running(&self) -> bool {
        self.control.lock().running
    }

    pub fn worker_count(&self) -> usize {
        self.control.lock().worker_count
    }

    /// Jobs waiting in the queue, not counting running ones
    pub fn pending_jobs(&self) -> usize {
        self.shared.pending()
    }

    pub fn current_jobs(&self) -> Vec<RunningJob> {
        self.shared.current_jobs()
    }

    fn spawn_worker(&self, control: &mut PoolControl) -> Result<(), PoolError> {
        let worker_id = control.next_worker_id;
        let shared = Arc::clone(&self.shared);

        let handle = thread::Builder::new()
            .name(format!("job-worker-{worker_id}"))
            .spawn(move || worker_loop(worker_id, shared))?;

        control.next_worker_id += 1;
        control.worker_count += 1;
        control.busy_warning_limit = control.worker_count * 3;
        control.workers.push(handle);
        Ok(())
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        let mut control = self.control.lock();
        if !control.running {
            return;
        }
        control.running = false;
        for _ in 0..control.worker_count {
            self.shared.push(u32::MAX, Task::Quit);
        }
        control.worker_count = 0;
    }
}

impl std::fmt::Debug for JobPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let control = self.control.lock();
        f.debug_struct("JobPool")
            .field("running", &control.running)
            .field("worker_count", &control.worker_count)
            .field("pending", &self.shared.pending())
            .finish()
    }
}

fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    debug!(worker_id, "Worker started");

    loop {
        let item = shared.pop();
        let job = match item.task {
            Task::Quit => {
                shared.task_done();
                break;
            }
            Task::Run(job) => job,
        };

        let (description, run) = job.into_parts();
        shared.job_started(
            item.seq,
            RunningJob {
                started: Utc::now(),
                description: description.clone(),
            },
        );

        if catch_unwind(AssertUnwindSafe(run)).is_err() {
            error!(worker_id, job = %description, "Job panicked");
        }

        shared.job_finished(item.seq);
        shared.task_done();
    }

    debug!(worker_id, "Worker stopped");
}
