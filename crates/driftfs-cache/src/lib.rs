//! driftfs write-back disk cache
//!
//! Client writes are first persisted as files in a cache directory and
//! enqueued for upload; a background loop drains the queue and hands each
//! staged object to the object-store client. On a successful upload the
//! staged file is removed and its residency entry is demoted to the
//! eviction-candidate end. Callers can fence on an inode
//! ([`WriteBackUploader::upload_by_inode`]), flush everything
//! ([`WriteBackUploader::upload_all`]), or drain-and-stop
//! ([`WriteBackUploader::stop`]).

pub mod client;
pub mod metrics;
pub mod queue;
pub mod residency;
pub mod store;
pub mod uploader;

pub use client::{ContextKind, ObjectClient, PutObjectContext, UploadCallback};
pub use metrics::CacheMetrics;
pub use queue::PendingQueue;
pub use residency::ResidencyIndex;
pub use store::StagingStore;
pub use uploader::WriteBackUploader;
