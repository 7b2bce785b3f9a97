//! Sharded serial executor for state-machine mutations
//!
//! Tasks with the same key run in FIFO submission order on one worker;
//! different keys may run concurrently. Tasks may block on storage I/O.
//! Shard queues are bounded; submitters block when a shard is full.

use driftfs_common::{ApplyQueueConfig, LatencyRecorder};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{info, warn};

struct Task {
    run: Box<dyn FnOnce() + Send>,
    submitted: Instant,
}

struct Shard {
    tasks: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    not_full: Condvar,
    depth: usize,
}

impl Shard {
    fn new(depth: usize) -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            depth,
        }
    }
}

pub struct ApplyQueue {
    shards: Vec<Arc<Shard>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    /// Submit-to-dequeue latency across all shards
    wait_latency: Arc<LatencyRecorder>,
}

impl ApplyQueue {
    /// Create the queue and spawn one worker thread per shard.
    #[must_use]
    pub fn start(cfg: &ApplyQueueConfig) -> Self {
        let shard_count = cfg.shard_count.max(1);
        let running = Arc::new(AtomicBool::new(true));
        let wait_latency = Arc::new(LatencyRecorder::new());
        let shards: Vec<Arc<Shard>> = (0..shard_count)
            .map(|_| Arc::new(Shard::new(cfg.queue_depth.max(1))))
            .collect();
        let mut workers = Vec::with_capacity(shard_count);
        for (i, shard) in shards.iter().enumerate() {
            let shard = Arc::clone(shard);
            let running = Arc::clone(&running);
            let wait_latency = Arc::clone(&wait_latency);
            let handle = std::thread::Builder::new()
                .name(format!("apply-{i}"))
                .spawn(move || worker_loop(&shard, &running, &wait_latency))
                .expect("spawn apply worker");
            workers.push(handle);
        }
        info!(shards = shard_count, "apply queue started");
        Self {
            shards,
            workers: Mutex::new(workers),
            running,
            wait_latency,
        }
    }

    /// Submit a task under `hash`. Tasks sharing `hash % shard_count`
    /// execute in submission order.
    pub fn push(&self, hash: u64, run: impl FnOnce() + Send + 'static) {
        let task = Task {
            run: Box::new(run),
            submitted: Instant::now(),
        };
        if !self.running.load(Ordering::Acquire) {
            // Late submission during shutdown: run on the caller so the
            // task's completion closure still fires exactly once.
            warn!("apply queue stopped, running task inline");
            (task.run)();
            return;
        }
        let shard = &self.shards[(hash % self.shards.len() as u64) as usize];
        let mut tasks = shard.tasks.lock();
        while tasks.len() >= shard.depth && self.running.load(Ordering::Acquire) {
            shard.not_full.wait(&mut tasks);
        }
        tasks.push_back(task);
        shard.not_empty.notify_one();
    }

    /// Stop accepting work, drain the remaining tasks, and join the workers.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        for shard in &self.shards {
            let _guard = shard.tasks.lock();
            shard.not_empty.notify_all();
            shard.not_full.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        info!("apply queue stopped");
    }

    /// Submit-to-dequeue latency stats
    #[must_use]
    pub fn wait_latency(&self) -> &LatencyRecorder {
        &self.wait_latency
    }
}

impl Drop for ApplyQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shard: &Shard, running: &AtomicBool, wait_latency: &LatencyRecorder) {
    loop {
        let task = {
            let mut tasks = shard.tasks.lock();
            loop {
                if let Some(task) = tasks.pop_front() {
                    shard.not_full.notify_one();
                    break Some(task);
                }
                if !running.load(Ordering::Acquire) {
                    break None;
                }
                shard.not_empty.wait(&mut tasks);
            }
        };
        match task {
            Some(task) => {
                wait_latency.record(task.submitted.elapsed().as_micros() as u64);
                (task.run)();
            }
            None => return,
        }
    }
}
