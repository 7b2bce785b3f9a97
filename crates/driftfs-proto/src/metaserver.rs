//! Metaserver request/response messages and embedded entities

use std::collections::HashMap;

/// Status code carried by every metaserver response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
pub enum MetaStatusCode {
    Ok = 0,
    UnknownError = 1,
    ParamError = 2,
    NotFound = 3,
    Exist = 4,
    PartitionNotFound = 5,
    StorageError = 6,
    Redirected = 7,
    RpcStreamError = 8,
}

// ── Embedded entities ─────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct Dentry {
    #[prost(uint32, tag = "1")]
    pub fs_id: u32,
    #[prost(uint64, tag = "2")]
    pub inode_id: u64,
    #[prost(uint64, tag = "3")]
    pub parent_inode_id: u64,
    #[prost(string, tag = "4")]
    pub name: String,
    #[prost(uint64, tag = "5")]
    pub txid: u64,
    #[prost(uint32, tag = "6")]
    pub flag: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Inode {
    #[prost(uint32, tag = "1")]
    pub fs_id: u32,
    #[prost(uint64, tag = "2")]
    pub inode_id: u64,
    #[prost(uint64, tag = "3")]
    pub length: u64,
    #[prost(uint64, tag = "4")]
    pub ctime: u64,
    #[prost(uint64, tag = "5")]
    pub mtime: u64,
    #[prost(uint64, tag = "6")]
    pub atime: u64,
    #[prost(uint32, tag = "7")]
    pub uid: u32,
    #[prost(uint32, tag = "8")]
    pub gid: u32,
    #[prost(uint32, tag = "9")]
    pub mode: u32,
    #[prost(uint32, tag = "10")]
    pub nlink: u32,
    #[prost(uint32, tag = "11")]
    pub inode_type: u32,
    #[prost(uint64, tag = "12")]
    pub rdev: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InodeAttr {
    #[prost(uint32, tag = "1")]
    pub fs_id: u32,
    #[prost(uint64, tag = "2")]
    pub inode_id: u64,
    #[prost(uint64, tag = "3")]
    pub length: u64,
    #[prost(uint64, tag = "4")]
    pub mtime: u64,
    #[prost(uint32, tag = "5")]
    pub uid: u32,
    #[prost(uint32, tag = "6")]
    pub gid: u32,
    #[prost(uint32, tag = "7")]
    pub mode: u32,
    #[prost(uint32, tag = "8")]
    pub nlink: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct XAttr {
    #[prost(uint32, tag = "1")]
    pub fs_id: u32,
    #[prost(uint64, tag = "2")]
    pub inode_id: u64,
    #[prost(map = "string, string", tag = "3")]
    pub xattrs: HashMap<String, String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PartitionInfo {
    #[prost(uint32, tag = "1")]
    pub fs_id: u32,
    #[prost(uint32, tag = "2")]
    pub pool_id: u32,
    #[prost(uint32, tag = "3")]
    pub copyset_id: u32,
    #[prost(uint32, tag = "4")]
    pub partition_id: u32,
    #[prost(uint64, tag = "5")]
    pub start: u64,
    #[prost(uint64, tag = "6")]
    pub end: u64,
    #[prost(uint64, tag = "7")]
    pub txid: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct S3ChunkInfo {
    #[prost(uint64, tag = "1")]
    pub chunk_id: u64,
    #[prost(uint64, tag = "2")]
    pub compaction: u64,
    #[prost(uint64, tag = "3")]
    pub offset: u64,
    #[prost(uint64, tag = "4")]
    pub len: u64,
    #[prost(uint64, tag = "5")]
    pub size: u64,
    #[prost(bool, tag = "6")]
    pub zero: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct S3ChunkInfoList {
    #[prost(message, repeated, tag = "1")]
    pub s3_chunks: Vec<S3ChunkInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VolumeExtent {
    #[prost(uint64, tag = "1")]
    pub fs_offset: u64,
    #[prost(uint64, tag = "2")]
    pub volume_offset: u64,
    #[prost(uint64, tag = "3")]
    pub length: u64,
    #[prost(bool, tag = "4")]
    pub is_used: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VolumeExtentSlice {
    #[prost(uint64, tag = "1")]
    pub offset: u64,
    #[prost(message, repeated, tag = "2")]
    pub extents: Vec<VolumeExtent>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeallocatableBlockGroup {
    #[prost(uint64, tag = "1")]
    pub block_group_offset: u64,
    #[prost(uint64, tag = "2")]
    pub deallocatable_size: u64,
}

// ── Dentry operations ─────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetDentryRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub parent_inode_id: u64,
    #[prost(string, tag = "4")]
    pub name: String,
    #[prost(uint64, tag = "5")]
    pub txid: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetDentryResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, optional, tag = "3")]
    pub dentry: Option<Dentry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListDentryRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub dir_inode_id: u64,
    #[prost(string, tag = "4")]
    pub last: String,
    #[prost(uint32, tag = "5")]
    pub count: u32,
    #[prost(bool, tag = "6")]
    pub only_dir: bool,
    #[prost(uint64, tag = "7")]
    pub txid: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListDentryResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, repeated, tag = "3")]
    pub dentrys: Vec<Dentry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateDentryRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(message, optional, tag = "2")]
    pub dentry: Option<Dentry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateDentryResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteDentryRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub parent_inode_id: u64,
    #[prost(string, tag = "4")]
    pub name: String,
    #[prost(uint64, tag = "5")]
    pub txid: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteDentryResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

// ── Inode operations ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetInodeRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub inode_id: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetInodeResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, optional, tag = "3")]
    pub inode: Option<Inode>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchGetInodeAttrRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, repeated, tag = "3")]
    pub inode_ids: Vec<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchGetInodeAttrResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, repeated, tag = "3")]
    pub attrs: Vec<InodeAttr>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchGetXAttrRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, repeated, tag = "3")]
    pub inode_ids: Vec<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchGetXAttrResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, repeated, tag = "3")]
    pub xattrs: Vec<XAttr>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateInodeRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub length: u64,
    #[prost(uint32, tag = "4")]
    pub uid: u32,
    #[prost(uint32, tag = "5")]
    pub gid: u32,
    #[prost(uint32, tag = "6")]
    pub mode: u32,
    #[prost(uint32, tag = "7")]
    pub inode_type: u32,
    #[prost(uint64, tag = "8")]
    pub rdev: u64,
    #[prost(uint64, tag = "9")]
    pub parent_inode_id: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateInodeResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, optional, tag = "3")]
    pub inode: Option<Inode>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateInodeRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub inode_id: u64,
    #[prost(uint64, optional, tag = "4")]
    pub length: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub mtime: Option<u64>,
    #[prost(uint64, optional, tag = "6")]
    pub atime: Option<u64>,
    #[prost(uint32, optional, tag = "7")]
    pub nlink: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateInodeResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteInodeRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub inode_id: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteInodeResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateRootInodeRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint32, tag = "3")]
    pub uid: u32,
    #[prost(uint32, tag = "4")]
    pub gid: u32,
    #[prost(uint32, tag = "5")]
    pub mode: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateRootInodeResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateManageInodeRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint32, tag = "3")]
    pub uid: u32,
    #[prost(uint32, tag = "4")]
    pub gid: u32,
    #[prost(uint32, tag = "5")]
    pub mode: u32,
    #[prost(uint32, tag = "6")]
    pub manage_type: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateManageInodeResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, optional, tag = "3")]
    pub inode: Option<Inode>,
}

// ── Partition operations ──────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreatePartitionRequest {
    #[prost(message, optional, tag = "1")]
    pub partition: Option<PartitionInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreatePartitionResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeletePartitionRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub pool_id: u32,
    #[prost(uint32, tag = "3")]
    pub copyset_id: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeletePartitionResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

// ── Rename transactions ───────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct PrepareRenameTxRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(message, repeated, tag = "2")]
    pub dentrys: Vec<Dentry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PrepareRenameTxResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

// ── Data-location operations ──────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetOrModifyS3ChunkInfoRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub inode_id: u64,
    #[prost(uint64, repeated, tag = "4")]
    pub chunk_indexes: Vec<u64>,
    #[prost(map = "uint64, message", tag = "5")]
    pub s3_chunk_info_add: HashMap<u64, S3ChunkInfoList>,
    #[prost(bool, tag = "6")]
    pub return_s3_chunk_info_map: bool,
    #[prost(bool, tag = "7")]
    pub support_streaming: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetOrModifyS3ChunkInfoResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(map = "uint64, message", tag = "3")]
    pub s3_chunk_info_map: HashMap<u64, S3ChunkInfoList>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetVolumeExtentRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub inode_id: u64,
    #[prost(bool, tag = "4")]
    pub streaming: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetVolumeExtentResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, repeated, tag = "3")]
    pub slices: Vec<VolumeExtentSlice>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateVolumeExtentRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(uint64, tag = "3")]
    pub inode_id: u64,
    #[prost(message, repeated, tag = "4")]
    pub extents: Vec<VolumeExtentSlice>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateVolumeExtentResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateDeallocatableBlockGroupRequest {
    #[prost(uint32, tag = "1")]
    pub partition_id: u32,
    #[prost(uint32, tag = "2")]
    pub fs_id: u32,
    #[prost(message, repeated, tag = "3")]
    pub update: Vec<DeallocatableBlockGroup>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateDeallocatableBlockGroupResponse {
    #[prost(enumeration = "MetaStatusCode", tag = "1")]
    pub status_code: i32,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
}
