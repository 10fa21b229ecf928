//! Compact binary encoding of protocol messages
//!
//! Layout (all integers little endian):
//! - Advertisement: \[0x01\]\[site:4\]
//! - Ready:         \[0x02\]
//! - Event:         \[0x03\]\[seqno:4\]\[site:4\]\[len:4\]\[body:len\]
//! - Done:          \[0x04\]
//! - Request:       \[0x11\]\[site:4\]\[from:4\]\[count:8\]
//! - Done:          \[0x12\]

use bytes::{BufMut, Bytes, BytesMut};

use cadence_core::{CadenceError, CadenceResult, Incoming, Outgoing, SeqNo, SiteId};

use crate::MessageTag;

/// Largest event body accepted on the wire
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// A message with a binary encoding
pub trait WireMessage: Sized {
    /// Exact size of the encoded message
    fn encoded_len(&self) -> usize;

    /// Append the encoded message to `buf`
    fn encode(&self, buf: &mut BytesMut) -> CadenceResult<()>;

    /// Decode one message occupying the whole of `buf`
    fn decode(buf: Bytes) -> CadenceResult<Self>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> CadenceResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

impl WireMessage for Incoming {
    fn encoded_len(&self) -> usize {
        let tag = tag_of_incoming(self);
        let body = match self {
            Incoming::Event { body, .. } => body.len(),
            _ => 0,
        };
        1 + tag.fixed_size() + body
    }

    fn encode(&self, buf: &mut BytesMut) -> CadenceResult<()> {
        buf.reserve(self.encoded_len());
        buf.put_u8(tag_of_incoming(self).to_byte());
        match self {
            Incoming::Advertisement { site } => {
                buf.put_u32_le(site.get());
            }
            Incoming::Event { seqno, site, body } => {
                if body.len() > MAX_BODY_SIZE {
                    return Err(CadenceError::BodyTooLarge {
                        size: body.len(),
                        max: MAX_BODY_SIZE,
                    });
                }
                buf.put_u32_le(seqno.get());
                buf.put_u32_le(site.get());
                buf.put_u32_le(body.len() as u32);
                buf.put_slice(body);
            }
            Incoming::Ready | Incoming::Done => {}
        }
        Ok(())
    }

    fn decode(buf: Bytes) -> CadenceResult<Self> {
        let tag = read_tag(&buf)?;
        if !tag.is_incoming() {
            return Err(CadenceError::UnknownMessageTag(tag.to_byte()));
        }
        let fixed = check_fixed(&buf, tag)?;

        let msg = match tag {
            MessageTag::Advertisement => Incoming::Advertisement {
                site: SiteId::new(read_u32(fixed, 0)),
            },
            MessageTag::Ready => Incoming::Ready,
            MessageTag::IncomingDone => Incoming::Done,
            MessageTag::Event => {
                let seqno = SeqNo::new(read_u32(fixed, 0));
                let site = SiteId::new(read_u32(fixed, 4));
                let len = read_u32(fixed, 8) as usize;
                if len > MAX_BODY_SIZE {
                    return Err(CadenceError::BodyTooLarge {
                        size: len,
                        max: MAX_BODY_SIZE,
                    });
                }
                let start = 1 + tag.fixed_size();
                if buf.len() != start + len {
                    return Err(length_mismatch(start + len, buf.len()));
                }
                return Ok(Incoming::Event {
                    seqno,
                    site,
                    body: buf.slice(start..),
                });
            }
            MessageTag::Request | MessageTag::OutgoingDone => {
                return Err(CadenceError::UnknownMessageTag(tag.to_byte()))
            }
        };

        expect_exact(&buf, tag)?;
        Ok(msg)
    }
}

impl WireMessage for Outgoing {
    fn encoded_len(&self) -> usize {
        1 + tag_of_outgoing(self).fixed_size()
    }

    fn encode(&self, buf: &mut BytesMut) -> CadenceResult<()> {
        buf.reserve(self.encoded_len());
        buf.put_u8(tag_of_outgoing(self).to_byte());
        if let Outgoing::Request { site, from, count } = self {
            buf.put_u32_le(site.get());
            buf.put_u32_le(from.get());
            buf.put_u64_le(*count);
        }
        Ok(())
    }

    fn decode(buf: Bytes) -> CadenceResult<Self> {
        let tag = read_tag(&buf)?;
        let fixed = check_fixed(&buf, tag)?;
        let msg = match tag {
            MessageTag::Request => {
                let mut count = [0u8; 8];
                count.copy_from_slice(&fixed[8..16]);
                Outgoing::Request {
                    site: SiteId::new(read_u32(fixed, 0)),
                    from: SeqNo::new(read_u32(fixed, 4)),
                    count: u64::from_le_bytes(count),
                }
            }
            MessageTag::OutgoingDone => Outgoing::Done,
            other => return Err(CadenceError::UnknownMessageTag(other.to_byte())),
        };
        expect_exact(&buf, tag)?;
        Ok(msg)
    }
}

fn tag_of_incoming(msg: &Incoming) -> MessageTag {
    match msg {
        Incoming::Advertisement { .. } => MessageTag::Advertisement,
        Incoming::Ready => MessageTag::Ready,
        Incoming::Event { .. } => MessageTag::Event,
        Incoming::Done => MessageTag::IncomingDone,
    }
}

fn tag_of_outgoing(msg: &Outgoing) -> MessageTag {
    match msg {
        Outgoing::Request { .. } => MessageTag::Request,
        Outgoing::Done => MessageTag::OutgoingDone,
    }
}

fn read_tag(buf: &[u8]) -> CadenceResult<MessageTag> {
    let first = *buf.first().ok_or(CadenceError::BufferTooShort {
        expected: 1,
        actual: 0,
    })?;
    MessageTag::from_byte(first).ok_or(CadenceError::UnknownMessageTag(first))
}

/// Returns the fixed part following the tag byte
fn check_fixed(buf: &[u8], tag: MessageTag) -> CadenceResult<&[u8]> {
    let needed = 1 + tag.fixed_size();
    if buf.len() < needed {
        return Err(CadenceError::BufferTooShort {
            expected: needed,
            actual: buf.len(),
        });
    }
    Ok(&buf[1..needed])
}

fn expect_exact(buf: &[u8], tag: MessageTag) -> CadenceResult<()> {
    let needed = 1 + tag.fixed_size();
    if buf.len() != needed {
        return Err(length_mismatch(needed, buf.len()));
    }
    Ok(())
}

fn length_mismatch(expected: usize, actual: usize) -> CadenceError {
    CadenceError::InvalidWireFormat(format!(
        "message length mismatch: expected {}, got {}",
        expected, actual
    ))
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::UNBOUNDED;
    use proptest::prelude::*;

    #[test]
    fn test_event_layout() {
        let msg = Incoming::Event {
            seqno: SeqNo::new(1),
            site: SiteId::new(0x0A0B0C0D),
            body: Bytes::from_static(&[9, 8, 7]),
        };
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(bytes.len(), msg.encoded_len());
        assert_eq!(
            &bytes[..],
            &[0x03, 1, 0, 0, 0, 0x0D, 0x0C, 0x0B, 0x0A, 3, 0, 0, 0, 9, 8, 7]
        );
        assert_eq!(Incoming::decode(bytes).unwrap(), msg);
    }

    #[test]
    fn test_request_roundtrip() {
        let msg = Outgoing::Request {
            site: SiteId::new(77),
            from: SeqNo::new(12),
            count: UNBOUNDED,
        };
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes.len(), 17);
        assert_eq!(Outgoing::decode(bytes).unwrap(), msg);
    }

    #[test]
    fn test_bodiless_messages() {
        assert_eq!(&Incoming::Ready.to_bytes().unwrap()[..], &[0x02]);
        assert_eq!(&Incoming::Done.to_bytes().unwrap()[..], &[0x04]);
        assert_eq!(&Outgoing::Done.to_bytes().unwrap()[..], &[0x12]);
        assert_eq!(
            Outgoing::decode(Bytes::from_static(&[0x12])).unwrap(),
            Outgoing::Done
        );
    }

    #[test]
    fn test_wrong_family_rejected() {
        let request = Outgoing::request_all(SiteId::new(1), SeqNo::MIN)
            .to_bytes()
            .unwrap();
        assert!(matches!(
            Incoming::decode(request),
            Err(CadenceError::UnknownMessageTag(0x11))
        ));

        let ready = Incoming::Ready.to_bytes().unwrap();
        assert!(matches!(
            Outgoing::decode(ready),
            Err(CadenceError::UnknownMessageTag(0x02))
        ));
    }

    #[test]
    fn test_truncated_and_trailing() {
        assert!(matches!(
            Incoming::decode(Bytes::new()),
            Err(CadenceError::BufferTooShort { .. })
        ));
        assert!(matches!(
            Incoming::decode(Bytes::from_static(&[0x01, 1, 2])),
            Err(CadenceError::BufferTooShort { expected: 5, actual: 3 })
        ));
        assert!(matches!(
            Incoming::decode(Bytes::from_static(&[0x02, 0])),
            Err(CadenceError::InvalidWireFormat(_))
        ));

        // Declared body longer than what follows
        let mut buf = BytesMut::new();
        buf.put_u8(0x03);
        buf.put_u32_le(0);
        buf.put_u32_le(1);
        buf.put_u32_le(10);
        buf.put_slice(&[1, 2]);
        assert!(matches!(
            Incoming::decode(buf.freeze()),
            Err(CadenceError::InvalidWireFormat(_))
        ));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            Incoming::decode(Bytes::from_static(&[0x7F])),
            Err(CadenceError::UnknownMessageTag(0x7F))
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Incoming::decode(Bytes::from(bytes.clone()));
            let _ = Outgoing::decode(Bytes::from(bytes));
        }

        #[test]
        fn prop_event_bodies_survive(seqno: u32, site: u32, body in proptest::collection::vec(any::<u8>(), 0..256)) {
            let msg = Incoming::Event {
                seqno: SeqNo::new(seqno),
                site: SiteId::new(site),
                body: Bytes::from(body),
            };
            let bytes = msg.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), msg.encoded_len());
            prop_assert_eq!(Incoming::decode(bytes).unwrap(), msg);
        }
    }
}
