//! Streaming responder
//!
//! Result sets too large for one RPC are pushed over a stream connection
//! accepted from the RPC controller. The RPC response is completed first
//! (with the bulk payload swapped out), then records flow on the stream.
//!
//! Record framing: volume extents are one prost-encoded
//! [`VolumeExtentSlice`] per record; chunk-info records are an 8-byte
//! big-endian chunk index followed by the prost-encoded
//! [`S3ChunkInfoList`].

use crate::metastore::ChunkInfoIterator;
use bytes::{BufMut, Bytes, BytesMut};
use driftfs_common::Result;
use driftfs_proto::VolumeExtentSlice;
use prost::Message;
use std::sync::Arc;

/// Opaque handle to the RPC frame a stream can be accepted from
pub trait RpcController: Send {
    /// Peer address for log lines, when the transport knows it
    fn remote_side(&self) -> Option<std::net::SocketAddr> {
        None
    }
}

/// Server side of an accepted stream
pub trait StreamConnection: Send + Sync {
    /// Push one record to the client
    fn write(&self, record: Bytes) -> Result<()>;
}

/// Accepts stream connections out of RPC controllers
pub trait StreamServer: Send + Sync {
    /// Returns `None` when the connection cannot be established
    fn accept(&self, controller: &dyn RpcController) -> Option<Arc<dyn StreamConnection>>;
}

/// Push every volume-extent slice over the stream.
pub fn send_volume_extents(
    connection: &dyn StreamConnection,
    slices: Vec<VolumeExtentSlice>,
) -> Result<()> {
    for slice in slices {
        connection.write(Bytes::from(slice.encode_to_vec()))?;
    }
    Ok(())
}

/// Push every `(chunk index, chunk-info list)` record over the stream.
pub fn send_chunk_info_records(
    connection: &dyn StreamConnection,
    iterator: ChunkInfoIterator,
) -> Result<()> {
    for (chunk_index, list) in iterator {
        let body = list.encode_to_vec();
        let mut record = BytesMut::with_capacity(8 + body.len());
        record.put_u64(chunk_index);
        record.put_slice(&body);
        connection.write(record.freeze())?;
    }
    Ok(())
}
