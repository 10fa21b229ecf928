//! Duplex message channels

use tokio::sync::mpsc;

use cadence_core::{CadenceError, CadenceResult, Incoming, Outgoing};

/// One end of a bidirectional link: receives `I`, sends `O`
#[derive(Debug)]
pub struct Channel<I, O> {
    tx: mpsc::Sender<O>,
    rx: mpsc::Receiver<I>,
}

/// Endpoint used by the requesting side of a link
pub type OutgoingEndpoint = Channel<Incoming, Outgoing>;

/// Endpoint used by the serving side of a link
pub type IncomingEndpoint = Channel<Outgoing, Incoming>;

impl<I, O> Channel<I, O> {
    pub fn new(tx: mpsc::Sender<O>, rx: mpsc::Receiver<I>) -> Self {
        Channel { tx, rx }
    }

    /// Send a message, waiting for capacity
    pub async fn send(&self, msg: O) -> CadenceResult<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| CadenceError::ChannelClosed)
    }

    /// Next message; `None` once the peer is gone and the queue is drained
    pub async fn recv(&mut self) -> Option<I> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> &mpsc::Sender<O> {
        &self.tx
    }

    /// Has the peer stopped receiving?
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn split(self) -> (mpsc::Sender<O>, mpsc::Receiver<I>) {
        (self.tx, self.rx)
    }

    /// Close both directions
    ///
    /// The peer's sends fail from now on and its receive ends once the
    /// messages already queued have been read.
    pub fn close(self) {
        let (tx, mut rx) = self.split();
        rx.close();
        drop(tx);
    }
}

/// Connected pair of endpoints with `capacity` slots in each direction
pub fn duplex<A, B>(capacity: usize) -> (Channel<A, B>, Channel<B, A>) {
    let (a_tx, a_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, b_rx) = mpsc::channel(capacity.max(1));
    (Channel::new(b_tx, a_rx), Channel::new(a_tx, b_rx))
}

/// Connected endpoints for one link between two replicas
pub fn link(capacity: usize) -> (OutgoingEndpoint, IncomingEndpoint) {
    duplex(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::SiteId;

    #[tokio::test]
    async fn test_duplex_delivers_both_ways() {
        let (mut outgoing, mut incoming) = link(4);
        outgoing.send(Outgoing::Done).await.unwrap();
        incoming
            .send(Incoming::Advertisement {
                site: SiteId::new(7),
            })
            .await
            .unwrap();

        assert_eq!(incoming.recv().await, Some(Outgoing::Done));
        assert_eq!(
            outgoing.recv().await,
            Some(Incoming::Advertisement {
                site: SiteId::new(7)
            })
        );
    }

    #[tokio::test]
    async fn test_close_ends_peer() {
        let (outgoing, mut incoming) = link(4);
        outgoing.send(Outgoing::Done).await.unwrap();
        outgoing.close();

        // Queued messages are still delivered
        assert_eq!(incoming.recv().await, Some(Outgoing::Done));
        assert_eq!(incoming.recv().await, None);
        assert!(incoming.is_closed());
        assert!(matches!(
            incoming.send(Incoming::Ready).await,
            Err(CadenceError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_usable() {
        let (a, mut b) = duplex::<u8, u8>(0);
        a.send(1).await.unwrap();
        assert_eq!(b.recv().await, Some(1));
    }
}
