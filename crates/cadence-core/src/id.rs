//! Causal identifiers for Cadence
//!
//! A site issues events numbered by its own logical clock. An event is
//! addressed by the pair (sequence number, site), packed into 64 bits so
//! that the numeric order of the packed value is the total causal order:
//! sequence number first, site second.

use std::fmt;
use std::ops::{Add, AddAssign};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Site identity - one replica in the system
///
/// Sites pick their identifier uniformly at random. Two sites colliding is
/// possible in principle and accepted as a risk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(u32);

impl SiteId {
    /// Reserved raw value, used by [`EventId::UNSPECIFIED`].
    pub const RESERVED: u32 = u32::MAX;

    #[inline]
    pub const fn new(id: u32) -> Self {
        SiteId(id)
    }

    /// Draw a fresh identifier from the thread-local generator
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    /// Draw a fresh identifier from the given generator
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let id: u32 = rng.gen();
            if id != Self::RESERVED {
                return SiteId(id);
            }
        }
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// True for the identifier no site may author events under
    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::RESERVED
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        SiteId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Site({:08x})", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Sequence number - per-site logical clock with saturating arithmetic
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNo(u32);

impl SeqNo {
    /// First sequence number a site issues
    pub const MIN: SeqNo = SeqNo(0);
    /// Largest sequence number; arithmetic saturates here
    pub const MAX: SeqNo = SeqNo(u32::MAX);

    #[inline]
    pub const fn new(value: u32) -> Self {
        SeqNo(value)
    }

    /// Build a sequence number from a wider integer, clamping to `MAX`
    #[inline]
    pub fn saturating_from(value: u64) -> Self {
        SeqNo(u32::try_from(value).unwrap_or(u32::MAX))
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Next sequence number (stays at `MAX`)
    #[inline]
    pub const fn inc(self) -> Self {
        SeqNo(self.0.saturating_add(1))
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        SeqNo(u32::from_le_bytes(bytes))
    }
}

impl Add<u32> for SeqNo {
    type Output = SeqNo;

    #[inline]
    fn add(self, rhs: u32) -> SeqNo {
        SeqNo(self.0.saturating_add(rhs))
    }
}

impl AddAssign<u32> for SeqNo {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl From<u32> for SeqNo {
    fn from(value: u32) -> Self {
        SeqNo(value)
    }
}

impl fmt::Debug for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event identity - (sequence number, site) packed into 64 bits
///
/// Format: \[seqno:32\]\[site:32\]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// "No identifier". Sorts after every identifier a real event can carry,
    /// since no site may use [`SiteId::RESERVED`].
    pub const UNSPECIFIED: EventId = EventId(u64::MAX);

    #[inline]
    pub const fn new(seqno: SeqNo, site: SiteId) -> Self {
        EventId(((seqno.0 as u64) << 32) | site.0 as u64)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn seqno(self) -> SeqNo {
        SeqNo((self.0 >> 32) as u32)
    }

    #[inline]
    pub const fn site(self) -> SiteId {
        SiteId(self.0 as u32)
    }

    #[inline]
    pub fn is_specified(self) -> bool {
        self != Self::UNSPECIFIED
    }
}

impl Default for EventId {
    fn default() -> Self {
        EventId::UNSPECIFIED
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_specified() {
            write!(f, "Event({}@{:08x})", self.seqno().0, self.site().0)
        } else {
            write!(f, "Event(unspecified)")
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:08x}", self.seqno().0, self.site().0)
    }
}
