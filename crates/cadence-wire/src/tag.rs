//! Message tags for the Cadence wire protocol
//!
//! Every encoded message starts with one tag byte. Incoming-role messages
//! use the 0x0_ range, outgoing-role messages the 0x1_ range, so a frame
//! decoded with the wrong family is rejected instead of misread.

/// Tag identifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    /// Site advertisement (4 bytes)
    Advertisement = 0x01,
    /// End of initial advertisements (0 bytes)
    Ready = 0x02,
    /// Event delivery (12 bytes + body)
    Event = 0x03,
    /// Incoming role terminates (0 bytes)
    IncomingDone = 0x04,
    /// Event request (16 bytes)
    Request = 0x11,
    /// Outgoing role terminates (0 bytes)
    OutgoingDone = 0x12,
}

impl MessageTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MessageTag::Advertisement),
            0x02 => Some(MessageTag::Ready),
            0x03 => Some(MessageTag::Event),
            0x04 => Some(MessageTag::IncomingDone),
            0x11 => Some(MessageTag::Request),
            0x12 => Some(MessageTag::OutgoingDone),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Is this tag sent by the incoming role?
    #[inline]
    pub fn is_incoming(self) -> bool {
        (self as u8) < 0x10
    }

    /// Size of the fixed part following the tag byte
    pub fn fixed_size(self) -> usize {
        match self {
            MessageTag::Advertisement => 4,
            MessageTag::Event => 12,
            MessageTag::Request => 16,
            MessageTag::Ready | MessageTag::IncomingDone | MessageTag::OutgoingDone => 0,
        }
    }
}
