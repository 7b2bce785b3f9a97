//! Background write-back uploader
//!
//! A single loop thread drains the pending queue every period and fans each
//! batch out to the object-store client. Success callbacks remove the staged
//! file; failed attempts re-submit the same context, so an accepted write is
//! retried until the store takes it. Shutdown is "finish pending, then stop
//! accepting": `stop` waits for the queue to drain before interrupting the
//! loop.

use crate::client::{ContextKind, ObjectClient, PutObjectContext, UploadCallback};
use crate::metrics::CacheMetrics;
use crate::queue::PendingQueue;
use crate::store::StagingStore;
use driftfs_common::naming::belongs_to_inode;
use driftfs_common::{Error, Result, Sleeper, SyncBarrier, WriteCacheConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct WriteBackUploader {
    staging: Arc<StagingStore>,
    queue: Arc<PendingQueue>,
    client: Arc<dyn ObjectClient>,
    metrics: Arc<CacheMetrics>,
    period: Duration,
    running: AtomicBool,
    sleeper: Sleeper,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBackUploader {
    #[must_use]
    pub fn new(
        cfg: &WriteCacheConfig,
        staging: Arc<StagingStore>,
        client: Arc<dyn ObjectClient>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            staging,
            queue: Arc::new(PendingQueue::new()),
            client,
            metrics,
            period: Duration::from_millis(cfg.upload_period_ms),
            running: AtomicBool::new(false),
            sleeper: Sleeper::new(),
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Queue a staged object name for upload.
    /// The staged write must already be durable on disk.
    pub fn enqueue(&self, name: String) {
        self.queue.push(name);
    }

    /// Spawn the loop thread. Errors when the uploader is already running.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("write-back uploader already running");
            return Err(Error::AlreadyRunning);
        }
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("wb-uploader".to_string())
            .spawn(move || this.upload_loop())
            .map_err(|e| Error::internal(format!("spawn uploader thread: {e}")))?;
        *self.handle.lock() = Some(handle);
        info!("write-back uploader started");
        Ok(())
    }

    /// Drain the pending queue, then stop the loop thread and join it.
    /// Errors only when the uploader was not running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::Acquire) {
            warn!("write-back uploader not running");
            return Err(Error::NotRunning);
        }
        self.queue.wait_empty(self.period);
        self.running.store(false, Ordering::Release);
        self.sleeper.interrupt();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("write-back uploader thread panicked");
            }
        }
        info!("write-back uploader stopped");
        Ok(())
    }

    fn upload_loop(&self) {
        info!("write-back upload loop running");
        let mut last_batch: Option<Arc<SyncBarrier>> = None;
        while self.sleeper.wait_for(self.period) {
            if !self.running.load(Ordering::Acquire) {
                info!("write-back upload loop exiting");
                return;
            }
            let batch = self.queue.drain_all();
            if batch.is_empty() {
                self.queue.notify_if_empty();
                continue;
            }
            debug!(count = batch.len(), "upload batch drained");
            let barrier = Arc::new(SyncBarrier::new(batch.len()));
            for name in &batch {
                if let Err(e) = self.upload_one(name, Some(Arc::clone(&barrier))) {
                    warn!(name, error = %e, "upload submit failed");
                }
            }
            last_batch = Some(barrier);
        }
        // Interrupted: let the final in-flight batch settle before exiting.
        if let Some(barrier) = last_batch {
            barrier.wait();
        }
    }

    /// Read one staged object and hand it to the client.
    /// The success callback removes the staged file and signals the barrier;
    /// a failed attempt re-submits the same context.
    fn upload_one(&self, name: &str, barrier: Option<Arc<SyncBarrier>>) -> Result<()> {
        let buffer = match self.staging.read(name) {
            Ok(buf) => buf,
            Err(e) => {
                self.metrics.record_read_error();
                if let Some(b) = &barrier {
                    b.fail();
                }
                warn!(name, error = %e, "read staged file failed");
                return Err(e);
            }
        };
        let staging = Arc::clone(&self.staging);
        let client = Arc::clone(&self.client);
        let metrics = Arc::clone(&self.metrics);
        let callback: UploadCallback = Arc::new(move |ctx: Box<PutObjectContext>| {
            if ctx.ret_code < 0 {
                warn!(key = %ctx.key, ret = ctx.ret_code, "upload attempt failed, re-submitting");
                metrics.record_retry();
                client.upload_async(ctx);
                return;
            }
            metrics.record_upload(
                ctx.buffer.len() as u64,
                ctx.start.elapsed().as_micros() as u64,
            );
            match staging.remove(&ctx.key) {
                Ok(()) => metrics.record_remove(),
                Err(e) if e.is_not_found() => {}
                Err(e) => error!(key = %ctx.key, error = %e, "remove staged file after upload failed"),
            }
            debug!(key = %ctx.key, "upload complete, staged file removed");
            if let Some(b) = &barrier {
                b.done();
            }
        });
        let ctx = PutObjectContext::new(name.to_string(), buffer, ContextKind::S3, callback);
        self.client.upload_async(ctx);
        Ok(())
    }

    /// Synchronous fence for one inode: drain and upload every queued name
    /// of the inode, then poll the staging directory until no file of the
    /// inode remains, absorbing files staged by concurrent writers.
    pub fn upload_by_inode(&self, inode: u64) -> Result<()> {
        if !self.staging.is_valid() {
            error!(inode, "cache write dir is gone, cannot fence");
            return Err(Error::CacheDirInvalid("write cache".to_string()));
        }
        let depth = self.staging.prefix_depth();
        loop {
            let batch = self
                .queue
                .drain_matching(|name| belongs_to_inode(name, inode, depth));
            if batch.is_empty() {
                break;
            }
            debug!(inode, count = batch.len(), "fence batch");
            let barrier = Arc::new(SyncBarrier::new(batch.len()));
            for name in &batch {
                let _ = self.upload_one(name, Some(Arc::clone(&barrier)));
            }
            if !barrier.wait() {
                return Err(Error::upload_failed(format!(
                    "fence batch for inode {inode} failed"
                )));
            }
        }
        while self.has_staged_inode(inode)? {
            debug!(inode, "staged files of inode still on disk, waiting");
            self.sleeper.wait_for(self.period);
        }
        Ok(())
    }

    /// Whether any staged file of `inode` is still on disk
    pub fn has_staged_inode(&self, inode: u64) -> Result<bool> {
        let depth = self.staging.prefix_depth();
        let names = self.staging.list_all()?;
        Ok(names.iter().any(|n| belongs_to_inode(n, inode, depth)))
    }

    /// The staging directory holds no files at all
    pub fn is_cache_clean(&self) -> Result<bool> {
        if !self.staging.is_valid() {
            return Ok(true);
        }
        Ok(self.staging.list_all()?.is_empty())
    }

    /// Upload every staged file and wait for all of them, then remove the
    /// uploaded files. Names whose local read fails are left staged for the
    /// periodic loop; only successfully submitted names are removed.
    pub fn upload_all(&self) -> Result<()> {
        info!("upload of all staged write files start");
        let names = self.staging.list_all()?;
        if names.is_empty() {
            return Ok(());
        }
        let latch = Arc::new(SyncBarrier::new(names.len()));
        let mut submitted = Vec::with_capacity(names.len());
        for name in &names {
            let buffer = match self.staging.read(name) {
                Ok(buf) => buf,
                Err(e) => {
                    warn!(name, error = %e, "read staged file failed, leaving for retry");
                    self.metrics.record_read_error();
                    latch.fail();
                    continue;
                }
            };
            let client = Arc::clone(&self.client);
            let metrics = Arc::clone(&self.metrics);
            let latch_cb = Arc::clone(&latch);
            let callback: UploadCallback = Arc::new(move |ctx: Box<PutObjectContext>| {
                if ctx.ret_code < 0 {
                    warn!(key = %ctx.key, ret = ctx.ret_code, "upload attempt failed, re-submitting");
                    metrics.record_retry();
                    client.upload_async(ctx);
                    return;
                }
                metrics.record_upload(
                    ctx.buffer.len() as u64,
                    ctx.start.elapsed().as_micros() as u64,
                );
                latch_cb.done();
            });
            let ctx = PutObjectContext::new(name.clone(), buffer, ContextKind::S3, callback);
            submitted.push(name.clone());
            self.client.upload_async(ctx);
        }
        if !latch.wait() {
            warn!("some staged files could not be read; the periodic loop will retry them");
        }
        // The periodic-loop callback may already have removed a name that
        // was queued twice, so tolerate not-found here.
        for name in &submitted {
            match self.staging.remove(name) {
                Ok(()) => self.metrics.record_remove(),
                Err(e) if e.is_not_found() => {}
                Err(e) => error!(name, error = %e, "remove uploaded file failed"),
            }
        }
        info!(count = submitted.len(), "upload of all staged write files end");
        Ok(())
    }
}
