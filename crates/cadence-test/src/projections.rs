//! Sample projections
//!
//! Two small applications used by the scenarios, the fuzzer and the
//! benches:
//! - [`Counter`]: a commutative sum, run through [`Commutative`]
//! - [`Ledger`]: an account whose withdrawals depend on event order

use bytes::{BufMut, Bytes, BytesMut};

use cadence_core::{CadenceError, CadenceResult, EventId, Payload};
use cadence_state::{Commutative, OneWayProjection, TwoWayProjection};

const TAG_INCREMENT: u8 = 0x01;
const TAG_DECREMENT: u8 = 0x02;
const TAG_DEPOSIT: u8 = 0x11;
const TAG_WITHDRAW: u8 = 0x12;

/// Counter event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Increment(i64),
    Decrement(i64),
}

impl Step {
    pub fn delta(self) -> i64 {
        match self {
            Step::Increment(n) => n,
            Step::Decrement(n) => n.wrapping_neg(),
        }
    }
}

impl Payload for Step {
    fn encode(&self) -> Bytes {
        let (tag, n) = match *self {
            Step::Increment(n) => (TAG_INCREMENT, n),
            Step::Decrement(n) => (TAG_DECREMENT, n),
        };
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u8(tag);
        buf.put_i64_le(n);
        buf.freeze()
    }

    fn decode(buf: &[u8]) -> CadenceResult<Self> {
        let (tag, n) = tagged_word(buf)?;
        match tag {
            TAG_INCREMENT => Ok(Step::Increment(n as i64)),
            TAG_DECREMENT => Ok(Step::Decrement(n as i64)),
            other => Err(CadenceError::InvalidPayload(format!(
                "unknown counter tag 0x{:02x}",
                other
            ))),
        }
    }
}

/// Running total of every [`Step`]
#[derive(Clone, Copy, Debug, Default)]
pub struct Counter;

impl Counter {
    pub fn projection() -> Commutative<Counter> {
        Commutative(Counter)
    }
}

impl OneWayProjection for Counter {
    type Model = i64;
    type Event = Step;

    fn forward(&self, model: &mut i64, _id: EventId, event: &Step) {
        *model = model.wrapping_add(event.delta());
    }
}

/// Ledger event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    Deposit(u64),
    /// Refused when the balance does not cover it
    Withdraw(u64),
}

impl Payload for Entry {
    fn encode(&self) -> Bytes {
        let (tag, amount) = match *self {
            Entry::Deposit(amount) => (TAG_DEPOSIT, amount),
            Entry::Withdraw(amount) => (TAG_WITHDRAW, amount),
        };
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u8(tag);
        buf.put_u64_le(amount);
        buf.freeze()
    }

    fn decode(buf: &[u8]) -> CadenceResult<Self> {
        let (tag, amount) = tagged_word(buf)?;
        match tag {
            TAG_DEPOSIT => Ok(Entry::Deposit(amount)),
            TAG_WITHDRAW => Ok(Entry::Withdraw(amount)),
            other => Err(CadenceError::InvalidPayload(format!(
                "unknown ledger tag 0x{:02x}",
                other
            ))),
        }
    }
}

/// Ledger model
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: u64,
    /// Withdrawals refused so far, in event order
    pub refused: Vec<EventId>,
}

/// Effect of one entry, kept for undo
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Posting {
    Credited(u64),
    Debited(u64),
    Refused,
}

/// Account balance where a withdrawal only succeeds if the events before it
/// in total order leave enough funds
#[derive(Clone, Copy, Debug, Default)]
pub struct Ledger;

impl TwoWayProjection for Ledger {
    type Model = Account;
    type Event = Entry;
    type Change = Posting;

    fn forward(&self, model: &mut Account, id: EventId, event: &Entry) -> Posting {
        match *event {
            Entry::Deposit(amount) => {
                let before = model.balance;
                model.balance = before.saturating_add(amount);
                Posting::Credited(model.balance - before)
            }
            Entry::Withdraw(amount) if amount <= model.balance => {
                model.balance -= amount;
                Posting::Debited(amount)
            }
            Entry::Withdraw(_) => {
                model.refused.push(id);
                Posting::Refused
            }
        }
    }

    fn backward(&self, model: &mut Account, id: EventId, event: &Entry, change: Posting) {
        match (*event, change) {
            (Entry::Deposit(_), Posting::Credited(amount)) => model.balance -= amount,
            (Entry::Withdraw(_), Posting::Debited(amount)) => model.balance += amount,
            (Entry::Withdraw(_), Posting::Refused) => {
                let last = model.refused.pop();
                assert_eq!(last, Some(id), "refusal undone out of order");
            }
            (event, change) => panic!("posting {:?} does not belong to {:?}", change, event),
        }
    }
}

fn tagged_word(buf: &[u8]) -> CadenceResult<(u8, u64)> {
    if buf.len() != 9 {
        return Err(CadenceError::InvalidPayload(format!(
            "expected 9 bytes, got {}",
            buf.len()
        )));
    }
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[1..]);
    Ok((buf[0], u64::from_le_bytes(word)))
}
