//! Object-store client contract
//!
//! The client owns its worker pool and invokes the context's callback once
//! per attempt. The callback may re-submit the same context for another
//! attempt; the body buffer lives exclusively inside the context from
//! creation until the context is dropped after the terminal attempt.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// What kind of backend the upload targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    S3,
    DiskCache,
}

/// Invoked by the client once per upload attempt with `ret_code` filled in
pub type UploadCallback = Arc<dyn Fn(Box<PutObjectContext>) + Send + Sync>;

/// Per-object upload state handed to the client
pub struct PutObjectContext {
    /// Object key in the remote store
    pub key: String,
    /// Object body, exclusively owned by this context
    pub buffer: Bytes,
    /// Result of the last attempt; >= 0 means success
    pub ret_code: i32,
    pub kind: ContextKind,
    /// Start of the first attempt, for latency metrics
    pub start: Instant,
    pub callback: UploadCallback,
}

impl PutObjectContext {
    #[must_use]
    pub fn new(key: String, buffer: Bytes, kind: ContextKind, callback: UploadCallback) -> Box<Self> {
        Box::new(Self {
            key,
            buffer,
            ret_code: 0,
            kind,
            start: Instant::now(),
            callback,
        })
    }

    /// Run the attempt callback, consuming the context.
    /// Clients call this after setting `ret_code`.
    pub fn run_callback(self: Box<Self>) {
        let callback = Arc::clone(&self.callback);
        (callback.as_ref())(self);
    }
}

/// Asynchronous object-store client
pub trait ObjectClient: Send + Sync {
    /// Submit one upload. The client must eventually invoke the context's
    /// callback with `ret_code` set to the attempt's result.
    fn upload_async(&self, ctx: Box<PutObjectContext>);
}
