//! Shared work queue between the pool handle and its workers

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};

use crate::job::{Job, RunningJob};

pub(crate) enum Task {
    Run(Job),
    Quit,
}

/// Heap entry ordered by `(priority, seq)`, smallest first
pub(crate) struct QueueItem {
    pub priority: u32,
    pub seq: u64,
    pub task: Task,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    // BinaryHeap is a max-heap, so compare reversed
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub(crate) struct WorkQueue {
    heap: BinaryHeap<QueueItem>,
    /// Queued plus running; zero means drained
    unfinished: usize,
    next_seq: u64,
}

#[derive(Default)]
pub(crate) struct Shared {
    queue: Mutex<WorkQueue>,
    job_ready: Condvar,
    drained: Condvar,
    current_jobs: Mutex<Vec<(u64, RunningJob)>>,
}

impl Shared {
    /// Enqueue and return the queue depth afterwards
    pub fn push(&self, priority: u32, task: Task) -> usize {
        let mut queue = self.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(QueueItem {
            priority,
            seq,
            task,
        });
        queue.unfinished += 1;
        let depth = queue.heap.len();
        drop(queue);

        self.job_ready.notify_one();
        depth
    }

    /// Block until an item is available
    pub fn pop(&self) -> QueueItem {
        let mut queue = self.queue.lock();
        loop {
            if let Some(item) = queue.heap.pop() {
                return item;
            }
            self.job_ready.wait(&mut queue);
        }
    }

    pub fn task_done(&self) {
        let mut queue = self.queue.lock();
        queue.unfinished = queue.unfinished.saturating_sub(1);
        if queue.unfinished == 0 {
            self.drained.notify_all();
        }
    }

    pub fn wait_drained(&self) {
        let mut queue = self.queue.lock();
        while queue.unfinished > 0 {
            self.drained.wait(&mut queue);
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().heap.len()
    }

    pub fn job_started(&self, seq: u64, job: RunningJob) {
        self.current_jobs.lock().push((seq, job));
    }

    pub fn job_finished(&self, seq: u64) {
        self.current_jobs.lock().retain(|(id, _)| *id != seq);
    }

    pub fn current_jobs(&self) -> Vec<RunningJob> {
        self.current_jobs
            .lock()
            .iter()
            .map(|(_, job)| job.clone())
            .collect()
    }
}
