//! Communication channels — every outgoing transport behind one contract.
//!
//! | Channel               | Send window driven by          | Receive |
//! |-----------------------|--------------------------------|---------|
//! | `AdvertisingChannel`  | radio-notification interrupt   | no      |
//! | `NfcTagChannel`       | external reader polling        | yes     |
//! | `LoopbackChannel`     | `process_*` calls (host sim)   | yes     |
//!
//! Higher-level telemetry code is written against [`Channel`] only, so a
//! transport can be swapped (or several used at once, see [`outbox`])
//! without touching it.

pub mod advdata;
pub mod advertising;
pub mod loopback;
pub mod message;
pub mod ndef;
pub mod nfc;
pub mod outbox;

pub use message::{Message, Repeat};

use crate::error::Result;

/// Event callback.  Callbacks may run in interrupt context: they must
/// return quickly and must not block or allocate.
pub type Callback = fn();

/// The four event callbacks a channel can hold.  Unset entries are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct Callbacks {
    pub on_connect: Option<Callback>,
    pub on_disconnect: Option<Callback>,
    pub on_rx: Option<Callback>,
    pub on_tx: Option<Callback>,
}

impl Callbacks {
    pub const fn none() -> Self {
        Self {
            on_connect: None,
            on_disconnect: None,
            on_rx: None,
            on_tx: None,
        }
    }
}

/// Invoke an optional callback.
pub(crate) fn fire(cb: Option<Callback>) {
    if let Some(cb) = cb {
        cb();
    }
}

/// Uniform contract implemented by every transport.
///
/// Object safe, so heterogeneous transports can be driven through
/// `&mut dyn Channel`.
pub trait Channel {
    /// Bring the transport up.  Fails with `InvalidState` if already up.
    fn init(&mut self) -> Result<()>;

    /// Tear the transport down and reset its state, including callbacks.
    fn uninit(&mut self) -> Result<()>;

    /// Whether data can flow right now.
    fn is_connected(&self) -> bool;

    /// Start or continue transmission without blocking.  Delivery is
    /// reported through the on-tx callback.
    fn process_asynchronous(&mut self) -> Result<()>;

    /// Block until the outstanding transfer completes, or `NotSupported`
    /// when the transport cannot block.
    fn process_synchronous(&mut self) -> Result<()>;

    /// Drop all queued outgoing data.
    fn flush_tx(&mut self) -> Result<()>;

    /// Drop all received data.
    fn flush_rx(&mut self) -> Result<()>;

    /// Queue a message.  The payload is copied before this returns.
    fn message_put(&mut self, msg: &Message<'_>) -> Result<()>;

    /// Dequeue received data into `buf`, returning its length.
    fn message_get(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Largest payload accepted by `message_put`.
    fn mtu(&self) -> usize;

    /// Free transmit slots, for transports that queue messages.  `None`
    /// when the transport holds a single message.
    fn tx_room(&self) -> Option<usize> {
        None
    }

    fn set_on_connect(&mut self, cb: Option<Callback>) -> Result<()>;

    fn set_on_disconnect(&mut self, cb: Option<Callback>) -> Result<()>;

    fn set_on_rx(&mut self, cb: Option<Callback>) -> Result<()>;

    fn set_on_tx(&mut self, cb: Option<Callback>) -> Result<()>;
}
