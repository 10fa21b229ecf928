//! Encoding selection

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use cadence_core::CadenceResult;

use crate::{from_json, to_json, WireMessage};

/// How messages are turned into frame bodies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Compact binary layout
    #[default]
    Binary,
    /// serde JSON documents
    Json,
}

impl Encoding {
    pub fn encode<M: WireMessage + Serialize>(self, msg: &M) -> CadenceResult<Bytes> {
        match self {
            Encoding::Binary => msg.to_bytes(),
            Encoding::Json => to_json(msg),
        }
    }

    pub fn decode<M: WireMessage + DeserializeOwned>(self, buf: Bytes) -> CadenceResult<M> {
        match self {
            Encoding::Binary => M::decode(buf),
            Encoding::Json => from_json(&buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Incoming, SiteId};

    #[test]
    fn test_both_encodings_agree() {
        let msg = Incoming::Advertisement {
            site: SiteId::new(42),
        };
        for encoding in [Encoding::Binary, Encoding::Json] {
            let bytes = encoding.encode(&msg).unwrap();
            assert_eq!(encoding.decode::<Incoming>(bytes).unwrap(), msg);
        }
        assert!(Encoding::Binary.encode(&msg).unwrap().len() < Encoding::Json.encode(&msg).unwrap().len());
    }
}
