//! Metadata store contract
//!
//! Keyed CRUD over dentries, inodes, partitions and data locations. Each
//! method fills the typed response (including its status code) and returns
//! the same code; the operator layer stamps the applied index on success.

use crate::stream::StreamServer;
use driftfs_proto::*;

/// Iterator over `(chunk index, chunk-info list)` records for streaming
pub type ChunkInfoIterator = Box<dyn Iterator<Item = (u64, S3ChunkInfoList)> + Send>;

pub trait MetaStore: Send + Sync {
    fn get_dentry(
        &self,
        request: &GetDentryRequest,
        response: &mut GetDentryResponse,
    ) -> MetaStatusCode;

    fn list_dentry(
        &self,
        request: &ListDentryRequest,
        response: &mut ListDentryResponse,
    ) -> MetaStatusCode;

    fn create_dentry(
        &self,
        request: &CreateDentryRequest,
        response: &mut CreateDentryResponse,
    ) -> MetaStatusCode;

    fn delete_dentry(
        &self,
        request: &DeleteDentryRequest,
        response: &mut DeleteDentryResponse,
    ) -> MetaStatusCode;

    fn get_inode(
        &self,
        request: &GetInodeRequest,
        response: &mut GetInodeResponse,
    ) -> MetaStatusCode;

    fn batch_get_inode_attr(
        &self,
        request: &BatchGetInodeAttrRequest,
        response: &mut BatchGetInodeAttrResponse,
    ) -> MetaStatusCode;

    fn batch_get_xattr(
        &self,
        request: &BatchGetXAttrRequest,
        response: &mut BatchGetXAttrResponse,
    ) -> MetaStatusCode;

    fn create_inode(
        &self,
        request: &CreateInodeRequest,
        response: &mut CreateInodeResponse,
    ) -> MetaStatusCode;

    fn update_inode(
        &self,
        request: &UpdateInodeRequest,
        response: &mut UpdateInodeResponse,
    ) -> MetaStatusCode;

    fn delete_inode(
        &self,
        request: &DeleteInodeRequest,
        response: &mut DeleteInodeResponse,
    ) -> MetaStatusCode;

    fn create_root_inode(
        &self,
        request: &CreateRootInodeRequest,
        response: &mut CreateRootInodeResponse,
    ) -> MetaStatusCode;

    fn create_manage_inode(
        &self,
        request: &CreateManageInodeRequest,
        response: &mut CreateManageInodeResponse,
    ) -> MetaStatusCode;

    fn create_partition(
        &self,
        request: &CreatePartitionRequest,
        response: &mut CreatePartitionResponse,
    ) -> MetaStatusCode;

    fn delete_partition(
        &self,
        request: &DeletePartitionRequest,
        response: &mut DeletePartitionResponse,
    ) -> MetaStatusCode;

    fn prepare_rename_tx(
        &self,
        request: &PrepareRenameTxRequest,
        response: &mut PrepareRenameTxResponse,
    ) -> MetaStatusCode;

    /// Apply the chunk-info modification and, when the request asks for the
    /// map, hand back an iterator for streaming the result set.
    fn get_or_modify_s3_chunk_info(
        &self,
        request: &GetOrModifyS3ChunkInfoRequest,
        response: &mut GetOrModifyS3ChunkInfoResponse,
        iterator: &mut Option<ChunkInfoIterator>,
    ) -> MetaStatusCode;

    fn get_volume_extent(
        &self,
        request: &GetVolumeExtentRequest,
        response: &mut GetVolumeExtentResponse,
    ) -> MetaStatusCode;

    fn update_volume_extent(
        &self,
        request: &UpdateVolumeExtentRequest,
        response: &mut UpdateVolumeExtentResponse,
    ) -> MetaStatusCode;

    fn update_deallocatable_block_group(
        &self,
        request: &UpdateDeallocatableBlockGroupRequest,
        response: &mut UpdateDeallocatableBlockGroupResponse,
    ) -> MetaStatusCode;

    /// Stream transport used by the streaming read operators
    fn stream_server(&self) -> &dyn StreamServer;
}
