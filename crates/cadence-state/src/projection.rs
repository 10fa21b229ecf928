//! Projections
//!
//! A projection folds events into a model. Projections work in place: the
//! functional form `forward(model, id, event) -> model'` becomes a mutation
//! of `&mut Model`.

use std::fmt;

use cadence_core::{EventId, Payload};

/// Projection whose events commute
///
/// Applying the same events in any order must give the same model, so the
/// history applies arrivals directly with no reordering.
pub trait OneWayProjection: Send + Sync + 'static {
    type Model: Send + Sync + 'static;
    type Event: Payload + Send + Sync + 'static;

    fn forward(&self, model: &mut Self::Model, id: EventId, event: &Self::Event);
}

/// Projection whose result depends on event order
///
/// `backward` must exactly undo the `forward` call that produced `change`.
/// Receiving a change token that does not match the event is a broken
/// projection; implementations should panic rather than guess.
pub trait TwoWayProjection: Send + Sync + 'static {
    type Model: Send + Sync + 'static;
    type Event: Payload + Send + Sync + 'static;
    type Change: Send + Sync + 'static;

    /// Events commute; skip revert/replay
    const COMMUTATIVE: bool = false;

    fn forward(&self, model: &mut Self::Model, id: EventId, event: &Self::Event) -> Self::Change;

    fn backward(
        &self,
        model: &mut Self::Model,
        id: EventId,
        event: &Self::Event,
        change: Self::Change,
    );

    fn kind(&self) -> ProjectionKind {
        if Self::COMMUTATIVE {
            ProjectionKind::OneWay
        } else {
            ProjectionKind::TwoWay
        }
    }
}

/// Projection kind, for logs and diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    OneWay,
    TwoWay,
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionKind::OneWay => write!(f, "one-way"),
            ProjectionKind::TwoWay => write!(f, "two-way"),
        }
    }
}

/// Runs a one-way projection through the two-way interface
#[derive(Clone, Debug, Default)]
pub struct Commutative<P>(pub P);

impl<P: OneWayProjection> TwoWayProjection for Commutative<P> {
    type Model = P::Model;
    type Event = P::Event;
    type Change = ();

    const COMMUTATIVE: bool = true;

    fn forward(&self, model: &mut Self::Model, id: EventId, event: &Self::Event) {
        self.0.forward(model, id, event);
    }

    // Never invoked: commutative histories do not revert.
    fn backward(&self, _model: &mut Self::Model, _id: EventId, _event: &Self::Event, _change: ()) {}
}
