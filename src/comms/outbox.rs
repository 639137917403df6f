//! Sending one message over several channels.
//!
//! Telemetry code builds a payload once and hands it to every active
//! transport.  Payloads larger than a channel's MTU are split with
//! [`Message::chunks`]; chunks are not reassembled by the receiver.

use crate::comms::{Channel, Message};
use crate::error::{Error, ErrorAccumulator, Result};

/// Put `msg` on one channel, split into MTU-sized chunks.  Stops at the
/// first chunk that is refused and returns the number of chunks queued.
///
/// A queueing channel without room for every chunk gets none of them.
/// Chunks already queued are not withdrawn when a later one is refused
/// for another reason.
pub fn put_chunked(channel: &mut dyn Channel, msg: &Message<'_>) -> (usize, Result<()>) {
    let needed = msg.chunks(channel.mtu()).count();
    if let Some(room) = channel.tx_room() {
        if room < needed {
            log::warn!("outbox: {} chunks, room for {}", needed, room);
            return (0, Err(Error::NoMemory));
        }
    }
    let mut queued = 0;
    for chunk in msg.chunks(channel.mtu()) {
        if let Err(e) = channel.message_put(&chunk) {
            log::warn!("outbox: chunk {} refused ({})", queued, e);
            return (queued, Err(e));
        }
        queued += 1;
    }
    (queued, Ok(()))
}

/// Put `msg` on every channel.  Every channel is tried; the first failure
/// is reported.
pub fn broadcast(channels: &mut [&mut dyn Channel], msg: &Message<'_>) -> Result<()> {
    let mut acc = ErrorAccumulator::new();
    for ch in channels.iter_mut() {
        let (_, result) = put_chunked(&mut **ch, msg);
        acc.record(result);
    }
    acc.finish()
}

/// Run `process_asynchronous` on every channel, reporting the first failure.
pub fn process_all(channels: &mut [&mut dyn Channel]) -> Result<()> {
    let mut acc = ErrorAccumulator::new();
    for ch in channels.iter_mut() {
        acc.record(ch.process_asynchronous());
    }
    acc.finish()
}
