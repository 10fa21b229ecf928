//! JSON encoding of protocol messages

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use cadence_core::{CadenceError, CadenceResult};

/// Encode a message as a JSON document
pub fn to_json<T: Serialize>(msg: &T) -> CadenceResult<Bytes> {
    serde_json::to_vec(msg)
        .map(Bytes::from)
        .map_err(|e| CadenceError::Json(e.to_string()))
}

/// Decode a message from a JSON document
pub fn from_json<T: DeserializeOwned>(buf: &[u8]) -> CadenceResult<T> {
    serde_json::from_slice(buf).map_err(|e| CadenceError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Incoming, Outgoing, SeqNo, SiteId};

    #[test]
    fn test_json_messages() {
        let msg = Incoming::Event {
            seqno: SeqNo::new(3),
            site: SiteId::new(8),
            body: Bytes::from_static(b"ab"),
        };
        let json = to_json(&msg).unwrap();
        assert_eq!(from_json::<Incoming>(&json).unwrap(), msg);

        let done: Outgoing = from_json(br#"{"type":"Done"}"#).unwrap();
        assert_eq!(done, Outgoing::Done);
    }

    #[test]
    fn test_json_rejects_unknown_type() {
        let err = from_json::<Outgoing>(br#"{"type":"Ready"}"#).unwrap_err();
        assert!(matches!(err, CadenceError::Json(_)));
    }
}
