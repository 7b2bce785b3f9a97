//! Per-RPC operator envelope and its state-machine transitions
//!
//! A [`MetaOperator`] carries one typed request, a scratch response, the
//! RPC completion closure, and the node it runs on. `propose` decides the
//! path: redirect when this replica is not the leader, fast-apply under a
//! fresh lease for read-only variants, or encode-and-propose through the
//! replicated log. Completion is exactly-once by construction: dropping
//! the operator fires the done closure with the response it holds, so
//! every terminating path (redirect, failure, apply, streaming) completes
//! the RPC exactly once.

use crate::codec;
use crate::metrics::now_us;
use crate::node::{CopysetNode, LogTask};
use crate::stream::{self, RpcController};
use driftfs_proto::*;
use prost::Message;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

macro_rules! operators {
    ($(($variant:ident, $tag:literal, $req:ty, $resp:ty)),+ $(,)?) => {
        /// Operator variant; the discriminant doubles as the log-entry tag
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum OperatorType {
            $($variant = $tag),+
        }

        /// Number of operator variants
        pub const OPERATOR_TYPE_COUNT: usize = 0 $(+ { let _ = $tag; 1 })+;

        impl OperatorType {
            #[must_use]
            pub fn from_u32(v: u32) -> Option<Self> {
                match v {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }

            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        /// Typed request envelope
        #[derive(Clone, Debug, PartialEq)]
        pub enum MetaRequest {
            $($variant($req)),+
        }

        impl MetaRequest {
            #[must_use]
            pub fn op_type(&self) -> OperatorType {
                match self {
                    $(Self::$variant(_) => OperatorType::$variant),+
                }
            }

            pub(crate) fn encode_body(&self) -> Vec<u8> {
                match self {
                    $(Self::$variant(req) => req.encode_to_vec()),+
                }
            }

            pub(crate) fn decode_body(
                op: OperatorType,
                data: &[u8],
            ) -> std::result::Result<Self, prost::DecodeError> {
                match op {
                    $(OperatorType::$variant => Ok(Self::$variant(<$req>::decode(data)?))),+
                }
            }
        }

        /// Typed response envelope
        #[derive(Clone, Debug, PartialEq)]
        pub enum MetaResponse {
            $($variant($resp)),+
        }

        impl MetaResponse {
            /// Default-constructed response for the given variant
            #[must_use]
            pub fn scratch(op: OperatorType) -> Self {
                match op {
                    $(OperatorType::$variant => Self::$variant(<$resp>::default())),+
                }
            }

            #[must_use]
            pub fn status(&self) -> MetaStatusCode {
                match self {
                    $(Self::$variant(resp) => MetaStatusCode::try_from(resp.status_code)
                        .unwrap_or(MetaStatusCode::UnknownError)),+
                }
            }

            pub fn set_status(&mut self, code: MetaStatusCode) {
                match self {
                    $(Self::$variant(resp) => resp.status_code = code as i32),+
                }
            }

            #[must_use]
            pub fn applied_index(&self) -> u64 {
                match self {
                    $(Self::$variant(resp) => resp.applied_index),+
                }
            }

            pub fn set_applied_index(&mut self, index: u64) {
                match self {
                    $(Self::$variant(resp) => resp.applied_index = index),+
                }
            }
        }
    };
}

operators! {
    (GetDentry, 0, GetDentryRequest, GetDentryResponse),
    (ListDentry, 1, ListDentryRequest, ListDentryResponse),
    (CreateDentry, 2, CreateDentryRequest, CreateDentryResponse),
    (DeleteDentry, 3, DeleteDentryRequest, DeleteDentryResponse),
    (GetInode, 4, GetInodeRequest, GetInodeResponse),
    (BatchGetInodeAttr, 5, BatchGetInodeAttrRequest, BatchGetInodeAttrResponse),
    (BatchGetXAttr, 6, BatchGetXAttrRequest, BatchGetXAttrResponse),
    (CreateInode, 7, CreateInodeRequest, CreateInodeResponse),
    (UpdateInode, 8, UpdateInodeRequest, UpdateInodeResponse),
    (DeleteInode, 9, DeleteInodeRequest, DeleteInodeResponse),
    (CreateRootInode, 10, CreateRootInodeRequest, CreateRootInodeResponse),
    (CreateManageInode, 11, CreateManageInodeRequest, CreateManageInodeResponse),
    (CreatePartition, 12, CreatePartitionRequest, CreatePartitionResponse),
    (DeletePartition, 13, DeletePartitionRequest, DeletePartitionResponse),
    (PrepareRenameTx, 14, PrepareRenameTxRequest, PrepareRenameTxResponse),
    (GetOrModifyS3ChunkInfo, 15, GetOrModifyS3ChunkInfoRequest, GetOrModifyS3ChunkInfoResponse),
    (GetVolumeExtent, 16, GetVolumeExtentRequest, GetVolumeExtentResponse),
    (UpdateVolumeExtent, 17, UpdateVolumeExtentRequest, UpdateVolumeExtentResponse),
    (UpdateDeallocatableBlockGroup, 18, UpdateDeallocatableBlockGroupRequest, UpdateDeallocatableBlockGroupResponse),
}

impl OperatorType {
    /// Read-only variants may serve from the current state machine when the
    /// leader lease is fresh, without producing a log entry.
    #[must_use]
    pub fn can_bypass_propose(self) -> bool {
        matches!(
            self,
            Self::GetDentry
                | Self::ListDentry
                | Self::GetInode
                | Self::BatchGetInodeAttr
                | Self::BatchGetXAttr
                | Self::GetVolumeExtent
        )
    }

    /// Read-only variants mutate nothing; replaying them is a no-op and
    /// applying them never advances the applied index.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        self.can_bypass_propose()
    }
}

impl MetaRequest {
    /// Required-field check run before a request is written to the log
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::CreatePartition(req) if req.partition.is_none() => {
                Err("CreatePartition without an embedded partition".to_string())
            }
            Self::CreateDentry(req) if req.dentry.is_none() => {
                Err("CreateDentry without a dentry".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Apply-queue shard key. The partition id of the target for every
    /// variant; `CreatePartition` reads it from the embedded partition.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        match self {
            Self::GetDentry(req) => u64::from(req.partition_id),
            Self::ListDentry(req) => u64::from(req.partition_id),
            Self::CreateDentry(req) => u64::from(req.partition_id),
            Self::DeleteDentry(req) => u64::from(req.partition_id),
            Self::GetInode(req) => u64::from(req.partition_id),
            Self::BatchGetInodeAttr(req) => u64::from(req.partition_id),
            Self::BatchGetXAttr(req) => u64::from(req.partition_id),
            Self::CreateInode(req) => u64::from(req.partition_id),
            Self::UpdateInode(req) => u64::from(req.partition_id),
            Self::DeleteInode(req) => u64::from(req.partition_id),
            Self::CreateRootInode(req) => u64::from(req.partition_id),
            Self::CreateManageInode(req) => u64::from(req.partition_id),
            Self::CreatePartition(req) => req
                .partition
                .as_ref()
                .map(|p| u64::from(p.partition_id))
                .unwrap_or(0),
            Self::DeletePartition(req) => u64::from(req.partition_id),
            Self::PrepareRenameTx(req) => u64::from(req.partition_id),
            Self::GetOrModifyS3ChunkInfo(req) => u64::from(req.partition_id),
            Self::GetVolumeExtent(req) => u64::from(req.partition_id),
            Self::UpdateVolumeExtent(req) => u64::from(req.partition_id),
            Self::UpdateDeallocatableBlockGroup(req) => u64::from(req.partition_id),
        }
    }
}

/// RPC completion closure; receives the final response exactly once
pub type DoneClosure = Box<dyn FnOnce(MetaResponse) + Send>;

/// Envelope for one metadata RPC
pub struct MetaOperator {
    node: Arc<dyn CopysetNode>,
    request: MetaRequest,
    response: MetaResponse,
    done: Option<DoneClosure>,
    controller: Option<Box<dyn RpcController>>,
}

impl Drop for MetaOperator {
    fn drop(&mut self) {
        self.complete();
    }
}

impl MetaOperator {
    /// Operator for a live RPC
    #[must_use]
    pub fn new(
        node: Arc<dyn CopysetNode>,
        request: MetaRequest,
        controller: Option<Box<dyn RpcController>>,
        done: DoneClosure,
    ) -> Box<Self> {
        let response = MetaResponse::scratch(request.op_type());
        Box::new(Self {
            node,
            request,
            response,
            done: Some(done),
            controller,
        })
    }

    /// Operator replaying a decoded log entry; there is no RPC to complete
    #[must_use]
    pub fn for_replay(node: Arc<dyn CopysetNode>, request: MetaRequest) -> Self {
        let response = MetaResponse::scratch(request.op_type());
        Self {
            node,
            request,
            response,
            done: None,
            controller: None,
        }
    }

    #[must_use]
    pub fn op_type(&self) -> OperatorType {
        self.request.op_type()
    }

    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.request.hash_code()
    }

    /// Fire the done closure now with the response built so far
    fn complete(&mut self) {
        if let Some(done) = self.done.take() {
            let response = std::mem::replace(
                &mut self.response,
                MetaResponse::scratch(self.request.op_type()),
            );
            done(response);
        }
    }

    /// Entry point on the RPC thread: choose redirect, lease fast path, or
    /// propose-through-log.
    pub fn propose(self: Box<Self>) {
        if !self.node.is_leader_term() {
            self.redirect();
            return;
        }

        if self.op_type().can_bypass_propose() {
            let lease = self.node.leader_lease_status();

            // local read: serve from the current state machine
            if lease.is_leader() {
                self.fast_apply_task();
                return;
            }

            // stale lease holder, the client must find the new leader
            if lease.is_expired() {
                self.redirect();
                return;
            }

            // lease not ready or disabled: fall through to a log read
        }

        self.propose_task();
    }

    /// Mark the response redirected; the drop fires the completion
    pub fn redirect(mut self: Box<Self>) {
        self.response.set_status(MetaStatusCode::Redirected);
    }

    /// Mark the response failed with `code`
    pub fn on_failed(mut self: Box<Self>, code: MetaStatusCode) {
        self.response.set_status(code);
    }

    /// Queue the apply under this operator's shard at the currently
    /// applied index.
    fn fast_apply_task(self: Box<Self>) {
        let node = Arc::clone(&self.node);
        let hash = self.hash_code();
        let index = node.applied_index();
        let start_us = now_us();
        let push_timer = Instant::now();
        node.apply_queue()
            .push(hash, move || self.on_apply(index, start_us, true));
        node.metrics()
            .record_fast_apply_push(push_timer.elapsed().as_micros() as u64);
    }

    /// Encode the request and hand it to the replication engine. The
    /// task's completion forwards back here: commit queues the apply,
    /// failure runs the failure path.
    fn propose_task(self: Box<Self>) {
        let entry = match codec::encode(&self.request) {
            Ok(entry) => entry,
            Err(e) => {
                error!(op = self.op_type().name(), error = %e, "log entry encode failed");
                self.on_failed(MetaStatusCode::UnknownError);
                return;
            }
        };
        let node = Arc::clone(&self.node);
        let expected_term = node.leader_term();
        let task = LogTask {
            data: entry,
            expected_term,
            done: Box::new(move |result| match result {
                Ok(index) => {
                    let queue_node = Arc::clone(&self.node);
                    let hash = self.hash_code();
                    let start_us = now_us();
                    queue_node
                        .apply_queue()
                        .push(hash, move || self.on_apply(index, start_us, false));
                }
                Err(code) => {
                    debug!(code = ?code, "proposed task failed");
                    self.on_failed(code);
                }
            }),
        };
        node.propose(task);
    }

    /// Apply on the shard worker once the entry is committed, or
    /// immediately for the lease fast path (`via_fast_path`).
    pub fn on_apply(self: Box<Self>, index: u64, start_us: u64, via_fast_path: bool) {
        match self.op_type() {
            OperatorType::GetOrModifyS3ChunkInfo => self.apply_chunk_info(index, start_us),
            OperatorType::GetVolumeExtent => self.apply_volume_extent(index, start_us),
            _ => self.apply_plain(index, start_us, via_fast_path),
        }
    }

    fn apply_plain(mut self: Box<Self>, index: u64, start_us: u64, via_fast_path: bool) {
        let op = self.op_type();
        let node = Arc::clone(&self.node);
        let begin_us = now_us();
        node.metrics()
            .record_queue_wait(op, begin_us.saturating_sub(start_us));

        let status = dispatch_apply(node.meta_store(), &self.request, &mut self.response);
        node.metrics()
            .record_execute(op, now_us().saturating_sub(begin_us));

        if status == MetaStatusCode::Ok {
            // A read on the lease fast path applies at the index the node
            // already reports; a read that went through the log advances
            // the applied index like any other committed entry.
            if !op.is_read_only() || !via_fast_path {
                node.update_applied_index(index);
            }
            self.response
                .set_applied_index(index.max(node.applied_index()));
            node.metrics()
                .record_complete(op, now_us().saturating_sub(start_us), true);
        } else {
            node.metrics()
                .record_complete(op, now_us().saturating_sub(start_us), false);
        }
    }

    /// Chunk-info apply: mutate, then optionally accept a stream and push
    /// the result set after the RPC completes.
    fn apply_chunk_info(mut self: Box<Self>, index: u64, start_us: u64) {
        let op = OperatorType::GetOrModifyS3ChunkInfo;
        let node = Arc::clone(&self.node);
        let mut iterator = None;

        let (status, wants_stream) = match (&self.request, &mut self.response) {
            (
                MetaRequest::GetOrModifyS3ChunkInfo(req),
                MetaResponse::GetOrModifyS3ChunkInfo(resp),
            ) => {
                let status = node
                    .meta_store()
                    .get_or_modify_s3_chunk_info(req, resp, &mut iterator);
                (status, req.return_s3_chunk_info_map && req.support_streaming)
            }
            _ => (MetaStatusCode::UnknownError, false),
        };

        if status == MetaStatusCode::Ok {
            node.update_applied_index(index);
            self.response
                .set_applied_index(index.max(node.applied_index()));
            node.metrics()
                .record_complete(op, now_us().saturating_sub(start_us), true);
        } else {
            node.metrics()
                .record_complete(op, now_us().saturating_sub(start_us), false);
        }

        if status != MetaStatusCode::Ok || !wants_stream {
            return;
        }

        let connection = self
            .controller
            .as_deref()
            .and_then(|cntl| node.meta_store().stream_server().accept(cntl));
        let Some(connection) = connection else {
            error!("accept stream connection failed in server side");
            self.response.set_status(MetaStatusCode::RpcStreamError);
            return;
        };

        // the client gets the RPC response before records start flowing
        self.complete();
        if let Some(iterator) = iterator {
            if let Err(e) = stream::send_chunk_info_records(connection.as_ref(), iterator) {
                error!(error = %e, "sending chunk info by stream failed");
            }
        }
    }

    /// Volume-extent apply: in streaming mode the slices are swapped out of
    /// the response, the RPC completes with empty slices, and the stream
    /// delivers them.
    fn apply_volume_extent(mut self: Box<Self>, index: u64, start_us: u64) {
        let op = OperatorType::GetVolumeExtent;
        let node = Arc::clone(&self.node);

        let (status, streaming) = match (&self.request, &mut self.response) {
            (MetaRequest::GetVolumeExtent(req), MetaResponse::GetVolumeExtent(resp)) => {
                (node.meta_store().get_volume_extent(req, resp), req.streaming)
            }
            _ => (MetaStatusCode::UnknownError, false),
        };
        node.metrics().record_complete(
            op,
            now_us().saturating_sub(start_us),
            status == MetaStatusCode::Ok,
        );

        if status != MetaStatusCode::Ok {
            return;
        }
        self.response.set_applied_index(index);
        if !streaming {
            return;
        }

        let extents = match &mut self.response {
            MetaResponse::GetVolumeExtent(resp) => std::mem::take(&mut resp.slices),
            _ => Vec::new(),
        };

        let connection = self
            .controller
            .as_deref()
            .and_then(|cntl| node.meta_store().stream_server().accept(cntl));
        let Some(connection) = connection else {
            error!("accept streaming connection failed");
            self.response.set_status(MetaStatusCode::RpcStreamError);
            return;
        };

        // run done before streaming; the client sees empty slices in the
        // response and receives them on the stream
        self.complete();
        if let Err(e) = stream::send_volume_extents(connection.as_ref(), extents) {
            error!(error = %e, "send volume extents by stream failed");
        }
    }

    /// Replay one logged mutation during catch-up. Read-only variants do
    /// nothing; chunk-info replay materializes side effects only.
    pub fn on_apply_from_log(mut self, start_us: u64) {
        let op = self.request.op_type();
        if op.is_read_only() {
            return;
        }
        let node = Arc::clone(&self.node);
        let status = match &self.request {
            MetaRequest::GetOrModifyS3ChunkInfo(req) => {
                let mut replay_req = req.clone();
                replay_req.return_s3_chunk_info_map = false;
                let mut response = GetOrModifyS3ChunkInfoResponse::default();
                let mut iterator = None;
                node.meta_store().get_or_modify_s3_chunk_info(
                    &replay_req,
                    &mut response,
                    &mut iterator,
                )
            }
            _ => dispatch_apply(node.meta_store(), &self.request, &mut self.response),
        };
        node.metrics().record_from_log(
            op,
            now_us().saturating_sub(start_us),
            status == MetaStatusCode::Ok,
        );
    }
}

/// Replay driver: decode a committed log entry and apply it.
pub fn apply_log_entry(
    node: &Arc<dyn CopysetNode>,
    data: &[u8],
    start_us: u64,
) -> driftfs_common::Result<()> {
    let (_, request) = codec::decode(data)?;
    MetaOperator::for_replay(Arc::clone(node), request).on_apply_from_log(start_us);
    Ok(())
}

/// Route a request/response pair to the metastore method of its variant.
fn dispatch_apply(
    store: &dyn crate::metastore::MetaStore,
    request: &MetaRequest,
    response: &mut MetaResponse,
) -> MetaStatusCode {
    use MetaRequest as Req;
    use MetaResponse as Resp;
    match (request, response) {
        (Req::GetDentry(req), Resp::GetDentry(resp)) => store.get_dentry(req, resp),
        (Req::ListDentry(req), Resp::ListDentry(resp)) => store.list_dentry(req, resp),
        (Req::CreateDentry(req), Resp::CreateDentry(resp)) => store.create_dentry(req, resp),
        (Req::DeleteDentry(req), Resp::DeleteDentry(resp)) => store.delete_dentry(req, resp),
        (Req::GetInode(req), Resp::GetInode(resp)) => store.get_inode(req, resp),
        (Req::BatchGetInodeAttr(req), Resp::BatchGetInodeAttr(resp)) => {
            store.batch_get_inode_attr(req, resp)
        }
        (Req::BatchGetXAttr(req), Resp::BatchGetXAttr(resp)) => store.batch_get_xattr(req, resp),
        (Req::CreateInode(req), Resp::CreateInode(resp)) => store.create_inode(req, resp),
        (Req::UpdateInode(req), Resp::UpdateInode(resp)) => store.update_inode(req, resp),
        (Req::DeleteInode(req), Resp::DeleteInode(resp)) => store.delete_inode(req, resp),
        (Req::CreateRootInode(req), Resp::CreateRootInode(resp)) => {
            store.create_root_inode(req, resp)
        }
        (Req::CreateManageInode(req), Resp::CreateManageInode(resp)) => {
            store.create_manage_inode(req, resp)
        }
        (Req::CreatePartition(req), Resp::CreatePartition(resp)) => {
            store.create_partition(req, resp)
        }
        (Req::DeletePartition(req), Resp::DeletePartition(resp)) => {
            store.delete_partition(req, resp)
        }
        (Req::PrepareRenameTx(req), Resp::PrepareRenameTx(resp)) => {
            store.prepare_rename_tx(req, resp)
        }
        (Req::GetOrModifyS3ChunkInfo(req), Resp::GetOrModifyS3ChunkInfo(resp)) => {
            let mut iterator = None;
            store.get_or_modify_s3_chunk_info(req, resp, &mut iterator)
        }
        (Req::GetVolumeExtent(req), Resp::GetVolumeExtent(resp)) => {
            store.get_volume_extent(req, resp)
        }
        (Req::UpdateVolumeExtent(req), Resp::UpdateVolumeExtent(resp)) => {
            store.update_volume_extent(req, resp)
        }
        (Req::UpdateDeallocatableBlockGroup(req), Resp::UpdateDeallocatableBlockGroup(resp)) => {
            store.update_deallocatable_block_group(req, resp)
        }
        _ => {
            error!("request and response variants disagree");
            MetaStatusCode::UnknownError
        }
    }
}
