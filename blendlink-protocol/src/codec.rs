//! Message codec for control-socket framing
//!
//! Frames are a 4-byte big-endian length prefix followed by that many
//! bytes of UTF-8 JSON, one document per frame. A frame that fails to
//! parse is consumed in full and skipped, so the stream stays aligned
//! and a malformed document never tears down the connection; only I/O
//! failures and oversized frames are fatal.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::messages::{DocumentError, HostRequest, InstanceResponse};

/// Maximum message size (1 MiB)
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed message: {0}")]
    Document(#[from] DocumentError),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Codec for the host side: encodes [`HostRequest`], decodes
/// [`InstanceResponse`]
#[derive(Debug, Default)]
pub struct HostCodec;

impl HostCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for HostCodec {
    type Item = InstanceResponse;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_skipping_malformed(src, InstanceResponse::from_document)
    }
}

impl Encoder<HostRequest> for HostCodec {
    type Error = CodecError;

    fn encode(&mut self, item: HostRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(&item.to_document(), dst)
    }
}

/// Codec for the instance side: encodes [`InstanceResponse`], decodes
/// [`HostRequest`]
///
/// The production instance peer is the bundled Python connector; this
/// codec mirrors it for tests that emulate a runtime instance.
#[derive(Debug, Default)]
pub struct InstanceCodec;

impl InstanceCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for InstanceCodec {
    type Item = HostRequest;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_skipping_malformed(src, HostRequest::from_document)
    }
}

impl Encoder<InstanceResponse> for InstanceCodec {
    type Error = CodecError;

    fn encode(&mut self, item: InstanceResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(&item.to_document(), dst)
    }
}

/// Decode the next well-formed document, silently consuming malformed
/// frames in between
fn decode_skipping_malformed<T>(
    src: &mut BytesMut,
    from_document: impl Fn(&serde_json::Value) -> Result<T, DocumentError>,
) -> Result<Option<T>, CodecError> {
    loop {
        let Some(frame) = take_frame(src)? else {
            return Ok(None);
        };
        match parse_document(&frame, &from_document) {
            Ok(item) => return Ok(Some(item)),
            Err(e) => {
                warn!("skipping malformed control message: {}", e);
            }
        }
    }
}

/// Consume one complete length-prefixed frame, or `None` if more bytes
/// are needed
fn take_frame(src: &mut BytesMut) -> Result<Option<BytesMut>, CodecError> {
    if src.len() < 4 {
        return Ok(None);
    }

    // Peek at the length without consuming
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    if src.len() < 4 + len {
        src.reserve(4 + len - src.len());
        return Ok(None);
    }

    src.advance(4);
    Ok(Some(src.split_to(len)))
}

fn parse_document<T>(
    frame: &[u8],
    from_document: impl Fn(&serde_json::Value) -> Result<T, DocumentError>,
) -> Result<T, CodecError> {
    let doc: serde_json::Value = serde_json::from_slice(frame)?;
    Ok(from_document(&doc)?)
}

fn put_frame(doc: &serde_json::Value, dst: &mut BytesMut) -> Result<(), CodecError> {
    let data = serde_json::to_vec(doc)?;

    if data.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    dst.reserve(4 + data.len());
    dst.put_u32(data.len() as u32);
    dst.put_slice(&data);
    Ok(())
}
