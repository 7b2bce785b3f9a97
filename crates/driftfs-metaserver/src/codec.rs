//! Replication-log codec
//!
//! A log entry is a 4-byte big-endian operator tag followed by the
//! prost-encoded request body. `decode(encode(request))` recovers the
//! operator type and an equal request, which is what replay depends on.

use crate::operator::{MetaRequest, OperatorType};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use driftfs_common::{Error, Result};

/// Bytes of the operator tag in front of the request body
pub const LOG_HEADER_LEN: usize = 4;

/// Encode a request into a log entry.
/// Fails when the request is missing a required field.
pub fn encode(request: &MetaRequest) -> Result<Bytes> {
    request.validate().map_err(Error::encode_failed)?;
    let body = request.encode_body();
    let mut buf = BytesMut::with_capacity(LOG_HEADER_LEN + body.len());
    buf.put_u32(request.op_type() as u32);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Decode a log entry back into its operator type and request.
pub fn decode(mut data: &[u8]) -> Result<(OperatorType, MetaRequest)> {
    if data.len() < LOG_HEADER_LEN {
        return Err(Error::decode_failed(format!(
            "log entry too short: {} bytes",
            data.len()
        )));
    }
    let tag = data.get_u32();
    let op = OperatorType::from_u32(tag)
        .ok_or_else(|| Error::decode_failed(format!("unknown operator tag {tag}")))?;
    let request =
        MetaRequest::decode_body(op, data).map_err(|e| Error::decode_failed(e.to_string()))?;
    Ok((op, request))
}
