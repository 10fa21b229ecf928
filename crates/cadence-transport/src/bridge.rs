//! Running a channel over a byte stream
//!
//! Every message becomes one length-prefixed frame. Closing the local
//! channel shuts down the write half of the stream; end of stream on the
//! read half closes the local channel.

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use cadence_core::{CadenceError, CadenceResult};
use cadence_wire::{write_frame, Encoding, Framer, WireMessage};

use crate::{duplex, Channel};

/// Bridge configuration
#[derive(Clone, Copy, Debug)]
pub struct BridgeConfig {
    /// Slots in each direction of the local channel
    pub capacity: usize,
    /// Frame body encoding
    pub encoding: Encoding,
    /// Read buffer growth step
    pub read_chunk: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            capacity: 64,
            encoding: Encoding::Binary,
            read_chunk: 8 * 1024,
        }
    }
}

fn io_error(e: std::io::Error) -> CadenceError {
    CadenceError::TransportError(e.to_string())
}

/// Pump messages between a new channel and `stream`
///
/// Returns the local endpoint and the pump task. The task ends with an
/// error on malformed input or I/O failure, and with `Ok` once both
/// directions are finished.
pub fn bridge<I, O, S>(stream: S, config: BridgeConfig) -> (Channel<I, O>, JoinHandle<CadenceResult<()>>)
where
    I: WireMessage + DeserializeOwned + Send + 'static,
    O: WireMessage + Serialize + Send + 'static,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (local, remote) = duplex::<I, O>(config.capacity);
    let handle = tokio::spawn(pump(stream, remote, config));
    (local, handle)
}

async fn pump<I, O, S>(stream: S, remote: Channel<O, I>, config: BridgeConfig) -> CadenceResult<()>
where
    I: WireMessage + DeserializeOwned + Send + 'static,
    O: WireMessage + Serialize + Send + 'static,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (tx, mut rx) = remote.split();
    let mut framer = Framer::new();
    let mut out = BytesMut::new();
    let mut writing = true;

    loop {
        framer.buffer_mut().reserve(config.read_chunk);

        tokio::select! {
            msg = rx.recv(), if writing => match msg {
                Some(msg) => {
                    let body = config.encoding.encode(&msg)?;
                    out.clear();
                    write_frame(&mut out, &body)?;
                    writer.write_all(&out).await.map_err(io_error)?;
                    writer.flush().await.map_err(io_error)?;
                    tracing::trace!("Bridge sent {} byte frame", body.len());
                }
                None => {
                    writer.shutdown().await.map_err(io_error)?;
                    writing = false;
                }
            },
            read = reader.read_buf(framer.buffer_mut()) => {
                let n = read.map_err(io_error)?;
                while let Some(frame) = framer.next_frame()? {
                    let msg: I = config.encoding.decode(frame)?;
                    if tx.send(msg).await.is_err() {
                        // Local side is gone; nothing left to deliver
                        return Ok(());
                    }
                }
                if n == 0 {
                    if framer.buffered() > 0 {
                        return Err(CadenceError::TransportError(format!(
                            "Stream ended inside a frame ({} bytes pending)",
                            framer.buffered()
                        )));
                    }
                    return Ok(());
                }
            }
        }
    }
}
