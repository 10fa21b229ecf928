//! Role drivers
//!
//! Each role runs as its own task. A driver waits on the peer's messages, on
//! send capacity and (for the incoming role) on replica changes. Capacity is
//! reserved before the role is asked for its next message, so a message the
//! role has committed to is never dropped on a full channel.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use cadence_core::CadenceResult;
use cadence_transport::{IncomingEndpoint, OutgoingEndpoint};

use crate::{IncomingRole, OutgoingRole, Replica, RoleStats, SyncStrategy};

/// Drive the outgoing role of one link until it completes
///
/// A protocol violation cancels `cancel`, so the other roles of the link
/// stop as well.
pub async fn run_outgoing<R: Replica + ?Sized>(
    replica: Arc<R>,
    channel: OutgoingEndpoint,
    strategy: SyncStrategy,
    cancel: CancellationToken,
) -> CadenceResult<RoleStats> {
    let (tx, mut rx) = channel.split();
    let mut role = OutgoingRole::new(strategy);
    let mut receiving = true;
    let mut cancelled = false;
    // Nothing to send until something changes
    let mut idle = false;

    while !role.is_terminated() {
        tokio::select! {
            biased;

            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                role.cancel();
                idle = false;
            }
            msg = rx.recv(), if receiving => {
                match msg {
                    Some(msg) => {
                        trace!("outgoing role received {}", msg.kind());
                        if let Err(e) = role.on_message(msg, replica.as_ref()) {
                            warn!("Outgoing role failed: {}", e);
                            cancel.cancel();
                            return Err(e);
                        }
                    }
                    None => {
                        receiving = false;
                        role.on_closed();
                    }
                }
                idle = false;
            }
            permit = tx.reserve(), if !idle => match permit {
                Ok(permit) => match role.poll_send(replica.as_ref()) {
                    Some(msg) => {
                        trace!("outgoing role sent {}", msg.kind());
                        permit.send(msg);
                    }
                    None => idle = true,
                },
                Err(_) => role.abandon(),
            },
            else => role.abandon(),
        }
    }

    Ok(role.stats())
}

/// Drive the incoming role of one link until it completes
pub async fn run_incoming<R: Replica + ?Sized>(
    replica: Arc<R>,
    channel: IncomingEndpoint,
    strategy: SyncStrategy,
    cancel: CancellationToken,
) -> CadenceResult<RoleStats> {
    let (tx, mut rx) = channel.split();
    let mut changes = replica.subscribe();
    let mut role = IncomingRole::new(strategy, replica.as_ref());
    let mut receiving = true;
    let mut watching = true;
    let mut cancelled = false;
    let mut idle = false;

    while !role.is_terminated() {
        tokio::select! {
            biased;

            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                role.cancel();
                idle = false;
            }
            msg = rx.recv(), if receiving => {
                match msg {
                    Some(msg) => {
                        trace!("incoming role received {}", msg.kind());
                        role.on_message(msg);
                    }
                    None => {
                        receiving = false;
                        role.on_closed();
                    }
                }
                idle = false;
            }
            changed = changes.changed(), if watching => {
                match changed {
                    Ok(()) => role.on_replica_changed(replica.as_ref()),
                    Err(_) => watching = false,
                }
                idle = false;
            }
            permit = tx.reserve(), if !idle => match permit {
                Ok(permit) => match role.poll_send(replica.as_ref()) {
                    Some(msg) => {
                        trace!("incoming role sent {}", msg.kind());
                        permit.send(msg);
                    }
                    None => idle = true,
                },
                Err(_) => role.abandon(),
            },
            else => role.abandon(),
        }
    }

    Ok(role.stats())
}
