//! Application payload encoding
//!
//! The replication engine only moves opaque bytes. Applications describe how
//! their event type maps to bytes by implementing [`Payload`].

use bytes::Bytes;

use crate::{CadenceError, CadenceResult};

/// Byte encoding of an application event
pub trait Payload: Sized {
    fn encode(&self) -> Bytes;

    fn decode(buf: &[u8]) -> CadenceResult<Self>;
}

impl Payload for Bytes {
    fn encode(&self) -> Bytes {
        self.clone()
    }

    fn decode(buf: &[u8]) -> CadenceResult<Self> {
        Ok(Bytes::copy_from_slice(buf))
    }
}

impl Payload for Vec<u8> {
    fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }

    fn decode(buf: &[u8]) -> CadenceResult<Self> {
        Ok(buf.to_vec())
    }
}

impl Payload for String {
    fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    fn decode(buf: &[u8]) -> CadenceResult<Self> {
        String::from_utf8(buf.to_vec())
            .map_err(|e| CadenceError::InvalidPayload(e.to_string()))
    }
}

impl Payload for i64 {
    fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(&self.to_le_bytes())
    }

    fn decode(buf: &[u8]) -> CadenceResult<Self> {
        let bytes: [u8; 8] = buf.try_into().map_err(|_| {
            CadenceError::InvalidPayload(format!("expected 8 bytes, got {}", buf.len()))
        })?;
        Ok(i64::from_le_bytes(bytes))
    }
}
