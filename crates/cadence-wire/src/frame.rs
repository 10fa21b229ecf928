//! Length-delimited framing for byte streams
//!
//! Frame = Length (4 bytes, LE) + Body

use bytes::{Buf, BufMut, Bytes, BytesMut};

use cadence_core::{CadenceError, CadenceResult};

/// Frame length prefix size
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum frame body size (leaves room for JSON-encoded event bodies)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Append one frame to `dst`
pub fn write_frame(dst: &mut BytesMut, body: &[u8]) -> CadenceResult<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(CadenceError::InvalidWireFormat(format!(
            "Frame too large: {} > {}",
            body.len(),
            MAX_FRAME_SIZE
        )));
    }
    dst.reserve(FRAME_HEADER_SIZE + body.len());
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Reassembles frames from arbitrarily split reads
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Framer::default()
    }

    /// Feed bytes read from the stream
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Buffer to read into directly
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of buffered bytes not yet returned as frames
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame body, if one is buffered
    pub fn next_frame(&mut self) -> CadenceResult<Option<Bytes>> {
        if self.buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(CadenceError::InvalidWireFormat(format!(
                "Frame too large: {} > {}",
                len, MAX_FRAME_SIZE
            )));
        }

        if self.buf.len() < FRAME_HEADER_SIZE + len {
            return Ok(None);
        }

        self.buf.advance(FRAME_HEADER_SIZE);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireMessage;
    use cadence_core::{Incoming, SeqNo, SiteId};

    #[test]
    fn test_frames_split_across_reads() {
        let first = Incoming::Advertisement {
            site: SiteId::new(3),
        }
        .to_bytes()
        .unwrap();
        let second = Incoming::Event {
            seqno: SeqNo::new(0),
            site: SiteId::new(3),
            body: Bytes::from_static(b"hello"),
        }
        .to_bytes()
        .unwrap();

        let mut wire = BytesMut::new();
        write_frame(&mut wire, &first).unwrap();
        write_frame(&mut wire, &second).unwrap();

        let mut framer = Framer::new();
        let mut frames = Vec::new();
        for chunk in wire.chunks(3) {
            framer.push(chunk);
            while let Some(frame) = framer.next_frame().unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames, vec![first, second]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_partial_header_waits() {
        let mut framer = Framer::new();
        framer.push(&[5, 0]);
        assert!(framer.next_frame().unwrap().is_none());
        framer.push(&[0, 0, 1, 2, 3, 4]);
        assert!(framer.next_frame().unwrap().is_none());
        framer.push(&[5]);
        assert_eq!(
            framer.next_frame().unwrap(),
            Some(Bytes::from_static(&[1, 2, 3, 4, 5]))
        );
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut framer = Framer::new();
        framer.push(&u32::MAX.to_le_bytes());
        assert!(framer.next_frame().is_err());
    }
}
