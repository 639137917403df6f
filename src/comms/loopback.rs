//! In-memory loopback channel.
//!
//! Whatever is put comes back out of `message_get` once processed.  Used
//! on the host to exercise telemetry code end to end, and as the
//! reference for a transport with a receive path.

use crate::comms::{Callback, Callbacks, Channel, Message, fire};
use crate::error::{Error, Result};
use crate::ring_buffer::RingBuffer;

/// Largest message the loopback carries.
pub const LOOPBACK_MTU: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Frame {
    data: [u8; LOOPBACK_MTU],
    len: usize,
}

impl Frame {
    const EMPTY: Self = Self {
        data: [0; LOOPBACK_MTU],
        len: 0,
    };

    fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Loopback with `N` frames of transmit and receive queue each.
pub struct LoopbackChannel<const N: usize> {
    initialized: bool,
    tx: RingBuffer<Frame, N>,
    rx: RingBuffer<Frame, N>,
    callbacks: Callbacks,
}

impl<const N: usize> LoopbackChannel<N> {
    pub const fn new() -> Self {
        Self {
            initialized: false,
            tx: RingBuffer::new_with(Frame::EMPTY),
            rx: RingBuffer::new_with(Frame::EMPTY),
            callbacks: Callbacks::none(),
        }
    }

    pub fn pending_tx(&self) -> usize {
        self.tx.len()
    }

    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    /// Move one frame from tx to rx.  Returns false when nothing moved.
    fn transfer_one(&mut self) -> Result<bool> {
        if self.tx.is_empty() || self.rx.is_full() {
            return Ok(false);
        }
        let frame = self.tx.pop_front()?;
        self.rx.push(frame)?;
        fire(self.callbacks.on_tx);
        fire(self.callbacks.on_rx);
        Ok(true)
    }
}

impl<const N: usize> Default for LoopbackChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Channel for LoopbackChannel<N> {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::InvalidState);
        }
        self.initialized = true;
        fire(self.callbacks.on_connect);
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if self.initialized {
            fire(self.callbacks.on_disconnect);
        }
        *self = Self::new();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.initialized
    }

    /// Transfers a single frame.
    fn process_asynchronous(&mut self) -> Result<()> {
        self.require_init()?;
        self.transfer_one()?;
        Ok(())
    }

    /// Transfers every pending frame, or fails with `NoMemory` when the
    /// receive side fills up first.
    fn process_synchronous(&mut self) -> Result<()> {
        self.require_init()?;
        while self.transfer_one()? {}
        if self.tx.is_empty() {
            Ok(())
        } else {
            Err(Error::NoMemory)
        }
    }

    fn flush_tx(&mut self) -> Result<()> {
        self.tx.clear();
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn message_put(&mut self, msg: &Message<'_>) -> Result<()> {
        self.require_init()?;
        if msg.len() > LOOPBACK_MTU {
            return Err(Error::InvalidLength);
        }
        let mut frame = Frame::EMPTY;
        frame.data[..msg.len()].copy_from_slice(msg.payload);
        frame.len = msg.len();
        self.tx.push(frame)
    }

    fn message_get(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require_init()?;
        let frame = self.rx.peek_at(0).ok_or(Error::NotFound)?;
        if buf.len() < frame.len {
            return Err(Error::InvalidLength);
        }
        let n = frame.len;
        buf[..n].copy_from_slice(frame.as_slice());
        self.rx.pop_front()?;
        Ok(n)
    }

    fn mtu(&self) -> usize {
        LOOPBACK_MTU
    }

    fn tx_room(&self) -> Option<usize> {
        Some(self.tx.capacity() - self.tx.len())
    }

    fn set_on_connect(&mut self, cb: Option<Callback>) -> Result<()> {
        self.callbacks.on_connect = cb;
        Ok(())
    }

    fn set_on_disconnect(&mut self, cb: Option<Callback>) -> Result<()> {
        self.callbacks.on_disconnect = cb;
        Ok(())
    }

    fn set_on_rx(&mut self, cb: Option<Callback>) -> Result<()> {
        self.callbacks.on_rx = cb;
        Ok(())
    }

    fn set_on_tx(&mut self, cb: Option<Callback>) -> Result<()> {
        self.callbacks.on_tx = cb;
        Ok(())
    }
}
