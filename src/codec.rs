// Frame codec for the stats socket: "<len>\n<json>" or a bare JSON object.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Payload type reported for every encoded frame. The protocol only carries text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Text,
}

/// Encodes `value` as a decimal body length, a newline, then the JSON body.
pub fn encode<T: Serialize>(value: &T) -> Result<(Bytes, PayloadType)> {
    let body = serde_json::to_vec(value)?;
    let header = format!("{}\n", body.len());

    let mut buf = BytesMut::with_capacity(header.len() + body.len());
    buf.put_slice(header.as_bytes());
    buf.put_slice(&body);
    Ok((buf.freeze(), PayloadType::Text))
}

/// Decodes one frame. The length header is not checked against the body:
/// message boundaries come from the websocket, not from the count.
/// A header with no body yields `T::default()`.
pub fn decode<T: DeserializeOwned + Default>(data: &[u8]) -> Result<T> {
    if data.first() == Some(&b'{') {
        return Ok(serde_json::from_slice(data)?);
    }

    let parts: Vec<&[u8]> = data.splitn(2, |&b| b == b'\n').collect();
    if parts.len() != 2 {
        return Err(Error::FrameElements(parts.len()));
    }

    let body = parts[1];
    if body.is_empty() {
        return Ok(T::default());
    }

    Ok(serde_json::from_slice(body)?)
}
