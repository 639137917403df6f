//! Message envelope handed to [`Channel::message_put`](super::Channel::message_put).
//!
//! A message borrows its payload from the caller.  Transports copy the
//! bytes into storage they own before `message_put` returns, so the caller
//! is free to reuse the buffer immediately afterwards.

/// How many extra times a message is transmitted after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Transmit once, then this many more times.
    Times(u8),
    /// Cycle through the queue until flushed.
    Forever,
}

impl Repeat {
    /// Wire value meaning "forever".
    pub const FOREVER_RAW: u8 = u8::MAX;

    pub const fn from_raw(raw: u8) -> Self {
        if raw == Self::FOREVER_RAW {
            Self::Forever
        } else {
            Self::Times(raw)
        }
    }

    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Times(n) => n,
            Self::Forever => Self::FOREVER_RAW,
        }
    }

    /// Repeat state for the copy that goes back into the queue after one
    /// transmission, or `None` when the message is done.
    pub const fn after_transmit(self) -> Option<Self> {
        match self {
            Self::Forever => Some(Self::Forever),
            Self::Times(0) => None,
            Self::Times(n) => Some(Self::Times(n - 1)),
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Self::Times(0)
    }
}

/// Outgoing payload plus its repeat policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub payload: &'a [u8],
    pub repeat: Repeat,
}

impl<'a> Message<'a> {
    /// A message transmitted exactly once.
    pub const fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            repeat: Repeat::Times(0),
        }
    }

    pub const fn with_repeat(payload: &'a [u8], repeat: Repeat) -> Self {
        Self { payload, repeat }
    }

    /// A beacon that stays in the queue until flushed.
    pub const fn forever(payload: &'a [u8]) -> Self {
        Self::with_repeat(payload, Repeat::Forever)
    }

    pub const fn len(&self) -> usize {
        self.payload.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Split into MTU-sized messages, each inheriting the repeat policy.
    /// A payload that already fits yields itself; an empty payload yields
    /// one empty message.
    pub fn chunks(self, mtu: usize) -> impl Iterator<Item = Message<'a>> {
        let repeat = self.repeat;
        let payload = self.payload;
        let empty = payload.is_empty().then_some(Message::with_repeat(payload, repeat));
        payload
            .chunks(mtu.max(1))
            .map(move |chunk| Message::with_repeat(chunk, repeat))
            .chain(empty)
    }
}
