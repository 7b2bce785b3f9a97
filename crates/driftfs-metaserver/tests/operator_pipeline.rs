//! End-to-end operator pipeline scenarios against in-memory collaborators

use bytes::Bytes;
use driftfs_metaserver::{
    apply_log_entry, codec, ApplyQueue, ChunkInfoIterator, CopysetNode, LeaseStatus, LogTask,
    MetaOperator, MetaRequest, MetaResponse, MetaStore, OperatorMetrics, OperatorType,
    RpcController, StreamConnection, StreamServer,
};
use driftfs_proto::*;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

// ── Stream doubles ────────────────────────────────────────────────────────────

/// Shared event journal: "done" when the RPC completes, "record" per stream write
type Events = Arc<Mutex<Vec<&'static str>>>;

struct RecordingConnection {
    events: Events,
    records: Mutex<Vec<Bytes>>,
}

impl StreamConnection for RecordingConnection {
    fn write(&self, record: Bytes) -> driftfs_common::Result<()> {
        self.events.lock().push("record");
        self.records.lock().push(record);
        Ok(())
    }
}

struct FakeStreamServer {
    accepting: AtomicBool,
    events: Events,
    last_connection: Mutex<Option<Arc<RecordingConnection>>>,
}

impl FakeStreamServer {
    fn new(events: Events) -> Self {
        Self {
            accepting: AtomicBool::new(true),
            events,
            last_connection: Mutex::new(None),
        }
    }
}

impl StreamServer for FakeStreamServer {
    fn accept(&self, _controller: &dyn RpcController) -> Option<Arc<dyn StreamConnection>> {
        if !self.accepting.load(Ordering::SeqCst) {
            return None;
        }
        let connection = Arc::new(RecordingConnection {
            events: Arc::clone(&self.events),
            records: Mutex::new(Vec::new()),
        });
        *self.last_connection.lock() = Some(Arc::clone(&connection));
        Some(connection)
    }
}

struct FakeController;

impl RpcController for FakeController {}

// ── Metastore double ──────────────────────────────────────────────────────────

struct MemMetaStore {
    dentries: Mutex<HashMap<(u64, String), Dentry>>,
    inodes: Mutex<HashMap<u64, Inode>>,
    xattrs: Mutex<HashMap<u64, HashMap<String, String>>>,
    partitions: Mutex<HashMap<u32, PartitionInfo>>,
    extents: Mutex<HashMap<u64, Vec<VolumeExtentSlice>>>,
    chunks: Mutex<HashMap<u64, BTreeMap<u64, S3ChunkInfoList>>>,
    next_inode: AtomicU64,
    streams: FakeStreamServer,
}

impl MemMetaStore {
    fn new(events: Events) -> Self {
        Self {
            dentries: Mutex::new(HashMap::new()),
            inodes: Mutex::new(HashMap::new()),
            xattrs: Mutex::new(HashMap::new()),
            partitions: Mutex::new(HashMap::new()),
            extents: Mutex::new(HashMap::new()),
            chunks: Mutex::new(HashMap::new()),
            next_inode: AtomicU64::new(100),
            streams: FakeStreamServer::new(events),
        }
    }

    fn seed_inode(&self, inode_id: u64) {
        self.inodes.lock().insert(
            inode_id,
            Inode {
                fs_id: 1,
                inode_id,
                length: 0,
                nlink: 1,
                mode: 0o644,
                ..Default::default()
            },
        );
    }

}

impl MetaStore for MemMetaStore {
    fn get_dentry(
        &self,
        request: &GetDentryRequest,
        response: &mut GetDentryResponse,
    ) -> MetaStatusCode {
        let key = (request.parent_inode_id, request.name.clone());
        match self.dentries.lock().get(&key) {
            Some(dentry) => {
                response.dentry = Some(dentry.clone());
                response.status_code = MetaStatusCode::Ok as i32;
                MetaStatusCode::Ok
            }
            None => {
                response.status_code = MetaStatusCode::NotFound as i32;
                MetaStatusCode::NotFound
            }
        }
    }

    fn list_dentry(
        &self,
        request: &ListDentryRequest,
        response: &mut ListDentryResponse,
    ) -> MetaStatusCode {
        let mut found: Vec<Dentry> = self
            .dentries
            .lock()
            .values()
            .filter(|d| d.parent_inode_id == request.dir_inode_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        if request.count > 0 {
            found.truncate(request.count as usize);
        }
        response.dentrys = found;
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn create_dentry(
        &self,
        request: &CreateDentryRequest,
        response: &mut CreateDentryResponse,
    ) -> MetaStatusCode {
        let Some(dentry) = request.dentry.clone() else {
            response.status_code = MetaStatusCode::ParamError as i32;
            return MetaStatusCode::ParamError;
        };
        let key = (dentry.parent_inode_id, dentry.name.clone());
        let mut dentries = self.dentries.lock();
        if dentries.contains_key(&key) {
            response.status_code = MetaStatusCode::Exist as i32;
            return MetaStatusCode::Exist;
        }
        dentries.insert(key, dentry);
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn delete_dentry(
        &self,
        request: &DeleteDentryRequest,
        response: &mut DeleteDentryResponse,
    ) -> MetaStatusCode {
        let key = (request.parent_inode_id, request.name.clone());
        let code = if self.dentries.lock().remove(&key).is_some() {
            MetaStatusCode::Ok
        } else {
            MetaStatusCode::NotFound
        };
        response.status_code = code as i32;
        code
    }

    fn get_inode(
        &self,
        request: &GetInodeRequest,
        response: &mut GetInodeResponse,
    ) -> MetaStatusCode {
        match self.inodes.lock().get(&request.inode_id) {
            Some(inode) => {
                response.inode = Some(inode.clone());
                response.status_code = MetaStatusCode::Ok as i32;
                MetaStatusCode::Ok
            }
            None => {
                response.status_code = MetaStatusCode::NotFound as i32;
                MetaStatusCode::NotFound
            }
        }
    }

    fn batch_get_inode_attr(
        &self,
        request: &BatchGetInodeAttrRequest,
        response: &mut BatchGetInodeAttrResponse,
    ) -> MetaStatusCode {
        let inodes = self.inodes.lock();
        for inode_id in &request.inode_ids {
            let Some(inode) = inodes.get(inode_id) else {
                response.status_code = MetaStatusCode::NotFound as i32;
                return MetaStatusCode::NotFound;
            };
            response.attrs.push(InodeAttr {
                fs_id: inode.fs_id,
                inode_id: inode.inode_id,
                length: inode.length,
                mtime: inode.mtime,
                uid: inode.uid,
                gid: inode.gid,
                mode: inode.mode,
                nlink: inode.nlink,
            });
        }
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn batch_get_xattr(
        &self,
        request: &BatchGetXAttrRequest,
        response: &mut BatchGetXAttrResponse,
    ) -> MetaStatusCode {
        let inodes = self.inodes.lock();
        let xattrs = self.xattrs.lock();
        for inode_id in &request.inode_ids {
            if !inodes.contains_key(inode_id) {
                response.status_code = MetaStatusCode::NotFound as i32;
                return MetaStatusCode::NotFound;
            }
            response.xattrs.push(XAttr {
                fs_id: request.fs_id,
                inode_id: *inode_id,
                xattrs: xattrs.get(inode_id).cloned().unwrap_or_default(),
            });
        }
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn create_inode(
        &self,
        request: &CreateInodeRequest,
        response: &mut CreateInodeResponse,
    ) -> MetaStatusCode {
        let inode_id = self.next_inode.fetch_add(1, Ordering::SeqCst);
        let inode = Inode {
            fs_id: request.fs_id,
            inode_id,
            length: request.length,
            uid: request.uid,
            gid: request.gid,
            mode: request.mode,
            inode_type: request.inode_type,
            rdev: request.rdev,
            nlink: 1,
            ..Default::default()
        };
        self.inodes.lock().insert(inode_id, inode.clone());
        response.inode = Some(inode);
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn update_inode(
        &self,
        request: &UpdateInodeRequest,
        response: &mut UpdateInodeResponse,
    ) -> MetaStatusCode {
        let mut inodes = self.inodes.lock();
        let Some(inode) = inodes.get_mut(&request.inode_id) else {
            response.status_code = MetaStatusCode::NotFound as i32;
            return MetaStatusCode::NotFound;
        };
        if let Some(length) = request.length {
            inode.length = length;
        }
        if let Some(mtime) = request.mtime {
            inode.mtime = mtime;
        }
        if let Some(atime) = request.atime {
            inode.atime = atime;
        }
        if let Some(nlink) = request.nlink {
            inode.nlink = nlink;
        }
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn delete_inode(
        &self,
        request: &DeleteInodeRequest,
        response: &mut DeleteInodeResponse,
    ) -> MetaStatusCode {
        let code = if self.inodes.lock().remove(&request.inode_id).is_some() {
            MetaStatusCode::Ok
        } else {
            MetaStatusCode::NotFound
        };
        response.status_code = code as i32;
        code
    }

    fn create_root_inode(
        &self,
        request: &CreateRootInodeRequest,
        response: &mut CreateRootInodeResponse,
    ) -> MetaStatusCode {
        let mut inodes = self.inodes.lock();
        if inodes.contains_key(&1) {
            response.status_code = MetaStatusCode::Exist as i32;
            return MetaStatusCode::Exist;
        }
        inodes.insert(
            1,
            Inode {
                fs_id: request.fs_id,
                inode_id: 1,
                uid: request.uid,
                gid: request.gid,
                mode: request.mode,
                nlink: 2,
                ..Default::default()
            },
        );
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn create_manage_inode(
        &self,
        request: &CreateManageInodeRequest,
        response: &mut CreateManageInodeResponse,
    ) -> MetaStatusCode {
        let inode_id = self.next_inode.fetch_add(1, Ordering::SeqCst);
        let inode = Inode {
            fs_id: request.fs_id,
            inode_id,
            uid: request.uid,
            gid: request.gid,
            mode: request.mode,
            inode_type: request.manage_type,
            nlink: 1,
            ..Default::default()
        };
        self.inodes.lock().insert(inode_id, inode.clone());
        response.inode = Some(inode);
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn create_partition(
        &self,
        request: &CreatePartitionRequest,
        response: &mut CreatePartitionResponse,
    ) -> MetaStatusCode {
        let Some(partition) = request.partition.clone() else {
            response.status_code = MetaStatusCode::ParamError as i32;
            return MetaStatusCode::ParamError;
        };
        let mut partitions = self.partitions.lock();
        if partitions.contains_key(&partition.partition_id) {
            response.status_code = MetaStatusCode::Exist as i32;
            return MetaStatusCode::Exist;
        }
        partitions.insert(partition.partition_id, partition);
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn delete_partition(
        &self,
        request: &DeletePartitionRequest,
        response: &mut DeletePartitionResponse,
    ) -> MetaStatusCode {
        let code = if self.partitions.lock().remove(&request.partition_id).is_some() {
            MetaStatusCode::Ok
        } else {
            MetaStatusCode::PartitionNotFound
        };
        response.status_code = code as i32;
        code
    }

    fn prepare_rename_tx(
        &self,
        request: &PrepareRenameTxRequest,
        response: &mut PrepareRenameTxResponse,
    ) -> MetaStatusCode {
        let mut dentries = self.dentries.lock();
        for dentry in &request.dentrys {
            dentries.insert(
                (dentry.parent_inode_id, dentry.name.clone()),
                dentry.clone(),
            );
        }
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn get_or_modify_s3_chunk_info(
        &self,
        request: &GetOrModifyS3ChunkInfoRequest,
        response: &mut GetOrModifyS3ChunkInfoResponse,
        iterator: &mut Option<ChunkInfoIterator>,
    ) -> MetaStatusCode {
        let mut chunks = self.chunks.lock();
        let by_index = chunks.entry(request.inode_id).or_default();
        for (chunk_index, list) in &request.s3_chunk_info_add {
            by_index
                .entry(*chunk_index)
                .or_default()
                .s3_chunks
                .extend(list.s3_chunks.iter().cloned());
        }
        if request.return_s3_chunk_info_map {
            let snapshot: Vec<(u64, S3ChunkInfoList)> = by_index
                .iter()
                .map(|(index, list)| (*index, list.clone()))
                .collect();
            if request.support_streaming {
                *iterator = Some(Box::new(snapshot.into_iter()));
            } else {
                response.s3_chunk_info_map = snapshot.into_iter().collect();
            }
        }
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn get_volume_extent(
        &self,
        request: &GetVolumeExtentRequest,
        response: &mut GetVolumeExtentResponse,
    ) -> MetaStatusCode {
        match self.extents.lock().get(&request.inode_id) {
            Some(slices) => {
                response.slices = slices.clone();
                response.status_code = MetaStatusCode::Ok as i32;
                MetaStatusCode::Ok
            }
            None => {
                response.status_code = MetaStatusCode::NotFound as i32;
                MetaStatusCode::NotFound
            }
        }
    }

    fn update_volume_extent(
        &self,
        request: &UpdateVolumeExtentRequest,
        response: &mut UpdateVolumeExtentResponse,
    ) -> MetaStatusCode {
        self.extents
            .lock()
            .insert(request.inode_id, request.extents.clone());
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn update_deallocatable_block_group(
        &self,
        _request: &UpdateDeallocatableBlockGroupRequest,
        response: &mut UpdateDeallocatableBlockGroupResponse,
    ) -> MetaStatusCode {
        response.status_code = MetaStatusCode::Ok as i32;
        MetaStatusCode::Ok
    }

    fn stream_server(&self) -> &dyn StreamServer {
        &self.streams
    }
}

// ── Consensus node double ─────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum ProposeMode {
    /// Commit immediately at the next log index
    Commit,
    /// Fail the task with the given status
    Fail(MetaStatusCode),
}

struct FakeNode {
    leader: AtomicBool,
    term: AtomicI64,
    lease: Mutex<LeaseStatus>,
    applied: AtomicU64,
    next_log_index: AtomicU64,
    propose_mode: Mutex<ProposeMode>,
    proposed_terms: Mutex<Vec<i64>>,
    queue: ApplyQueue,
    store: MemMetaStore,
    metrics: OperatorMetrics,
}

impl FakeNode {
    fn new(events: Events) -> Arc<Self> {
        Arc::new(Self {
            leader: AtomicBool::new(true),
            term: AtomicI64::new(3),
            lease: Mutex::new(LeaseStatus::Leader),
            applied: AtomicU64::new(0),
            next_log_index: AtomicU64::new(1),
            propose_mode: Mutex::new(ProposeMode::Commit),
            proposed_terms: Mutex::new(Vec::new()),
            queue: ApplyQueue::start(&driftfs_common::ApplyQueueConfig::default()),
            store: MemMetaStore::new(events),
            metrics: OperatorMetrics::new(),
        })
    }

    fn proposed_count(&self) -> usize {
        self.proposed_terms.lock().len()
    }
}

impl CopysetNode for FakeNode {
    fn is_leader_term(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn leader_term(&self) -> i64 {
        self.term.load(Ordering::SeqCst)
    }

    fn leader_lease_status(&self) -> LeaseStatus {
        *self.lease.lock()
    }

    fn propose(&self, task: LogTask) {
        self.proposed_terms.lock().push(task.expected_term);
        match *self.propose_mode.lock() {
            ProposeMode::Commit => {
                let index = self.next_log_index.fetch_add(1, Ordering::SeqCst);
                (task.done)(Ok(index));
            }
            ProposeMode::Fail(code) => (task.done)(Err(code)),
        }
    }

    fn applied_index(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    fn update_applied_index(&self, index: u64) {
        self.applied.fetch_max(index, Ordering::SeqCst);
    }

    fn apply_queue(&self) -> &ApplyQueue {
        &self.queue
    }

    fn meta_store(&self) -> &dyn MetaStore {
        &self.store
    }

    fn metrics(&self) -> &OperatorMetrics {
        &self.metrics
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

/// Run one operator through `propose` and wait for its completion.
/// Returns the response and how many times the done closure fired.
fn run_operator(
    node: &Arc<FakeNode>,
    request: MetaRequest,
    controller: Option<Box<dyn RpcController>>,
    events: &Events,
) -> (MetaResponse, u32) {
    let (tx, rx) = mpsc::channel();
    let fired = Arc::new(AtomicU32::new(0));
    let fired_in_done = Arc::clone(&fired);
    let events_in_done = Arc::clone(events);
    let node_dyn: Arc<dyn CopysetNode> = node.clone();
    let operator = MetaOperator::new(
        node_dyn,
        request,
        controller,
        Box::new(move |response| {
            fired_in_done.fetch_add(1, Ordering::SeqCst);
            events_in_done.lock().push("done");
            tx.send(response).unwrap();
        }),
    );
    operator.propose();
    let response = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("operator never completed");
    (response, fired.load(Ordering::SeqCst))
}

fn wait_for_events(events: &Events, at_least: usize) {
    for _ in 0..500 {
        if events.lock().len() >= at_least {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("expected {at_least} events, saw {:?}", events.lock());
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn lease_leader_fast_path_skips_the_log() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    node.applied.store(5, Ordering::SeqCst);
    node.store.seed_inode(42);

    let request = MetaRequest::GetInode(GetInodeRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 42,
    });
    let (response, fired) = run_operator(&node, request, None, &events);

    assert_eq!(fired, 1);
    assert_eq!(node.proposed_count(), 0);
    assert_eq!(response.status(), MetaStatusCode::Ok);
    assert_eq!(response.applied_index(), 5);
    // the read never advanced the node's applied index
    assert_eq!(node.applied_index(), 5);
    let MetaResponse::GetInode(inner) = &response else {
        panic!("wrong response variant");
    };
    assert_eq!(inner.inode.as_ref().map(|i| i.inode_id), Some(42));
    assert_eq!(node.metrics.completes_ok(OperatorType::GetInode), 1);
    assert_eq!(node.metrics.queue_wait_samples(OperatorType::GetInode), 1);
}

#[test]
fn stale_leader_redirects_without_metastore_call() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    node.leader.store(false, Ordering::SeqCst);

    let request = MetaRequest::CreateInode(CreateInodeRequest {
        partition_id: 1,
        fs_id: 1,
        mode: 0o644,
        ..Default::default()
    });
    let (response, fired) = run_operator(&node, request, None, &events);

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::Redirected);
    assert_eq!(node.proposed_count(), 0);
    assert!(node.store.inodes.lock().is_empty());
}

#[test]
fn expired_lease_redirects_reads() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    *node.lease.lock() = LeaseStatus::Expired;
    node.store.seed_inode(42);

    let request = MetaRequest::GetInode(GetInodeRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 42,
    });
    let (response, _) = run_operator(&node, request, None, &events);

    assert_eq!(response.status(), MetaStatusCode::Redirected);
    assert_eq!(node.proposed_count(), 0);
}

#[test]
fn lease_not_ready_reads_through_the_log() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    *node.lease.lock() = LeaseStatus::NotReady;
    node.store.seed_inode(7);

    let request = MetaRequest::GetInode(GetInodeRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 7,
    });
    let (response, _) = run_operator(&node, request, None, &events);

    assert_eq!(response.status(), MetaStatusCode::Ok);
    assert_eq!(node.proposed_count(), 1);
    // a read committed through the log advances the applied index like
    // any other entry, unlike the lease fast path
    assert_eq!(node.applied_index(), 1);
    assert_eq!(response.applied_index(), 1);
}

#[test]
fn encode_failure_fails_fast_with_unknown_error() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));

    let request = MetaRequest::CreatePartition(CreatePartitionRequest { partition: None });
    let (response, fired) = run_operator(&node, request, None, &events);

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::UnknownError);
    assert_eq!(node.proposed_count(), 0);
}

#[test]
fn committed_mutation_advances_applied_index() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    node.applied.store(6, Ordering::SeqCst);
    node.next_log_index.store(7, Ordering::SeqCst);

    let request = MetaRequest::CreateInode(CreateInodeRequest {
        partition_id: 3,
        fs_id: 1,
        mode: 0o600,
        ..Default::default()
    });
    let (response, _) = run_operator(&node, request, None, &events);

    assert_eq!(response.status(), MetaStatusCode::Ok);
    assert_eq!(node.proposed_count(), 1);
    assert_eq!(node.proposed_terms.lock()[0], 3);
    assert_eq!(node.applied_index(), 7);
    assert!(response.applied_index() >= 7);
    assert_eq!(node.store.inodes.lock().len(), 1);
    assert_eq!(node.metrics.completes_ok(OperatorType::CreateInode), 1);
}

#[test]
fn failed_proposal_runs_the_failure_path() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    *node.propose_mode.lock() = ProposeMode::Fail(MetaStatusCode::Redirected);

    let request = MetaRequest::DeleteInode(DeleteInodeRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 9,
    });
    let (response, fired) = run_operator(&node, request, None, &events);

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::Redirected);
    assert!(node.store.inodes.lock().is_empty());
}

#[test]
fn metastore_failure_propagates_its_status() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));

    // deleting an absent inode surfaces the store's NotFound
    let request = MetaRequest::DeleteInode(DeleteInodeRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 404,
    });
    let (response, _) = run_operator(&node, request, None, &events);

    assert_eq!(response.status(), MetaStatusCode::NotFound);
    assert_eq!(node.metrics.completes_err(OperatorType::DeleteInode), 1);
    // failed applies do not advance the applied index
    assert_eq!(node.applied_index(), 0);
}

#[test]
fn replay_reproduces_logged_mutation() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    let node_dyn: Arc<dyn CopysetNode> = node.clone();

    let request = MetaRequest::CreateDentry(CreateDentryRequest {
        partition_id: 2,
        dentry: Some(Dentry {
            fs_id: 1,
            inode_id: 50,
            parent_inode_id: 1,
            name: "replayed".to_string(),
            txid: 0,
            flag: 0,
        }),
    });
    let entry = codec::encode(&request).unwrap();
    apply_log_entry(&node_dyn, &entry, 0).unwrap();

    assert!(node
        .store
        .dentries
        .lock()
        .contains_key(&(1, "replayed".to_string())));
    assert_eq!(node.metrics.from_log_ok(OperatorType::CreateDentry), 1);
}

#[test]
fn replay_of_read_only_entry_is_a_noop() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    let node_dyn: Arc<dyn CopysetNode> = node.clone();

    let request = MetaRequest::GetInode(GetInodeRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 1,
    });
    let entry = codec::encode(&request).unwrap();
    apply_log_entry(&node_dyn, &entry, 0).unwrap();

    assert_eq!(node.metrics.from_log_ok(OperatorType::GetInode), 0);
    assert_eq!(node.metrics.from_log_err(OperatorType::GetInode), 0);
}

#[test]
fn chunk_info_replay_skips_result_map() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    let node_dyn: Arc<dyn CopysetNode> = node.clone();

    let mut request = GetOrModifyS3ChunkInfoRequest {
        partition_id: 4,
        fs_id: 1,
        inode_id: 77,
        return_s3_chunk_info_map: true,
        support_streaming: true,
        ..Default::default()
    };
    request.s3_chunk_info_add.insert(
        0,
        S3ChunkInfoList {
            s3_chunks: vec![S3ChunkInfo {
                chunk_id: 5,
                len: 4096,
                size: 4096,
                ..Default::default()
            }],
        },
    );
    let entry = codec::encode(&MetaRequest::GetOrModifyS3ChunkInfo(request)).unwrap();
    apply_log_entry(&node_dyn, &entry, 0).unwrap();

    // the side effect landed, nothing streamed
    assert!(node.store.chunks.lock().contains_key(&77));
    assert_eq!(
        node.metrics
            .from_log_ok(OperatorType::GetOrModifyS3ChunkInfo),
        1
    );
    assert!(events.lock().is_empty());
}

#[test]
fn chunk_info_streams_after_rpc_completes() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));

    let mut request = GetOrModifyS3ChunkInfoRequest {
        partition_id: 4,
        fs_id: 1,
        inode_id: 88,
        return_s3_chunk_info_map: true,
        support_streaming: true,
        ..Default::default()
    };
    request.s3_chunk_info_add.insert(
        2,
        S3ChunkInfoList {
            s3_chunks: vec![S3ChunkInfo {
                chunk_id: 11,
                len: 1024,
                size: 1024,
                ..Default::default()
            }],
        },
    );
    let (response, fired) = run_operator(
        &node,
        MetaRequest::GetOrModifyS3ChunkInfo(request),
        Some(Box::new(FakeController)),
        &events,
    );

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::Ok);
    let MetaResponse::GetOrModifyS3ChunkInfo(inner) = &response else {
        panic!("wrong response variant");
    };
    // streaming mode: the map travels on the stream, not in the response
    assert!(inner.s3_chunk_info_map.is_empty());

    wait_for_events(&events, 2);
    let seen = events.lock().clone();
    assert_eq!(seen[0], "done");
    assert!(seen[1..].iter().all(|e| *e == "record"));

    let connection = node.store.streams.last_connection.lock().clone().unwrap();
    let records = connection.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0][..8], 2u64.to_be_bytes().as_slice());
}

#[test]
fn chunk_info_stream_accept_failure_sets_stream_error() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    node.store.streams.accepting.store(false, Ordering::SeqCst);

    let mut request = GetOrModifyS3ChunkInfoRequest {
        partition_id: 4,
        fs_id: 1,
        inode_id: 88,
        return_s3_chunk_info_map: true,
        support_streaming: true,
        ..Default::default()
    };
    request
        .s3_chunk_info_add
        .insert(0, S3ChunkInfoList::default());
    let (response, fired) = run_operator(
        &node,
        MetaRequest::GetOrModifyS3ChunkInfo(request),
        Some(Box::new(FakeController)),
        &events,
    );

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::RpcStreamError);
}

#[test]
fn volume_extent_streaming_empties_the_response() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    let slice = VolumeExtentSlice {
        offset: 0,
        extents: vec![VolumeExtent {
            fs_offset: 0,
            volume_offset: 8192,
            length: 4096,
            is_used: true,
        }],
    };
    node.store.extents.lock().insert(42, vec![slice.clone()]);

    let request = MetaRequest::GetVolumeExtent(GetVolumeExtentRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 42,
        streaming: true,
    });
    let (response, fired) =
        run_operator(&node, request, Some(Box::new(FakeController)), &events);

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::Ok);
    let MetaResponse::GetVolumeExtent(inner) = &response else {
        panic!("wrong response variant");
    };
    assert!(inner.slices.is_empty());

    wait_for_events(&events, 2);
    let seen = events.lock().clone();
    assert_eq!(seen[0], "done");
    assert_eq!(seen[1], "record");

    let connection = node.store.streams.last_connection.lock().clone().unwrap();
    let records = connection.records.lock();
    let decoded = <VolumeExtentSlice as prost::Message>::decode(records[0].as_ref()).unwrap();
    assert_eq!(decoded, slice);
}

#[test]
fn volume_extent_without_streaming_keeps_slices_inline() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    node.store.extents.lock().insert(
        9,
        vec![VolumeExtentSlice {
            offset: 0,
            extents: Vec::new(),
        }],
    );

    let request = MetaRequest::GetVolumeExtent(GetVolumeExtentRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 9,
        streaming: false,
    });
    let (response, _) = run_operator(&node, request, None, &events);

    let MetaResponse::GetVolumeExtent(inner) = &response else {
        panic!("wrong response variant");
    };
    assert_eq!(inner.slices.len(), 1);
}

#[test]
fn volume_extent_stream_accept_failure_sets_stream_error() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));
    node.store.streams.accepting.store(false, Ordering::SeqCst);
    node.store
        .extents
        .lock()
        .insert(42, vec![VolumeExtentSlice::default()]);

    let request = MetaRequest::GetVolumeExtent(GetVolumeExtentRequest {
        partition_id: 1,
        fs_id: 1,
        inode_id: 42,
        streaming: true,
    });
    let (response, fired) =
        run_operator(&node, request, Some(Box::new(FakeController)), &events);

    assert_eq!(fired, 1);
    assert_eq!(response.status(), MetaStatusCode::RpcStreamError);
}

#[test]
fn same_partition_mutations_apply_in_order() {
    let events = events();
    let node = FakeNode::new(Arc::clone(&events));

    for i in 0..20u64 {
        let request = MetaRequest::CreateDentry(CreateDentryRequest {
            partition_id: 6,
            dentry: Some(Dentry {
                fs_id: 1,
                inode_id: 100 + i,
                parent_inode_id: 1,
                name: format!("entry-{i:02}"),
                txid: 0,
                flag: 0,
            }),
        });
        let (response, _) = run_operator(&node, request, None, &events);
        assert_eq!(response.status(), MetaStatusCode::Ok);
    }

    assert_eq!(node.store.dentries.lock().len(), 20);
    // applied index advanced once per committed mutation
    assert_eq!(node.applied_index(), 20);
}
