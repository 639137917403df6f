//! Port traits — the hexagonal boundary between the transports and the
//! radio / NFC hardware.
//!
//! ```text
//!   Channel (comms) ──▶ Port trait ──▶ Adapter (ESP-IDF GAP, RAM tag, sim)
//! ```
//!
//! The channels are generic over these traits, so the queueing and state
//! logic never touches hardware registers or vendor SDK calls directly and
//! runs unchanged on the host.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ───────────────────────────────────────────────────────────────
// Advertising radio
// ───────────────────────────────────────────────────────────────

/// Advertising PDU type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvType {
    NonConnectableNonScannable,
    NonConnectableScannable,
    ConnectableScannable,
}

/// Unit of the advertising interval register: 0.625 ms.
pub const ADV_INTERVAL_UNIT_US: u32 = 625;

/// Parameters applied when advertising is (re)configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvParams {
    /// Interval in 0.625 ms units.
    pub interval_units: u16,
    pub adv_type: AdvType,
}

impl AdvParams {
    pub fn from_interval_ms(interval_ms: u16, adv_type: AdvType) -> Self {
        let units = u32::from(interval_ms) * 1000 / ADV_INTERVAL_UNIT_US;
        Self {
            interval_units: units.min(u32::from(u16::MAX)) as u16,
            adv_type,
        }
    }
}

/// How long before a radio event the "active" notification fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDistance {
    Us800,
    Us1740,
    Us2680,
}

/// Handler invoked by the radio adapter on every notification edge.
/// `radio_active == false` is the edge after the advertising event.
/// Runs in interrupt context.
pub type RadioNotificationHandler = fn(radio_active: bool);

/// The advertising half of a BLE controller.
///
/// `configure` copies `advertisement` and `scan_response` into buffers the
/// adapter owns; the caller may reuse its slices as soon as it returns.
pub trait AdvertisingRadio {
    /// Arm the radio-notification interrupt.
    fn enable_notifications(
        &mut self,
        distance: NotificationDistance,
        handler: RadioNotificationHandler,
    ) -> Result<()>;

    /// Disarm the radio-notification interrupt.
    fn disable_notifications(&mut self) -> Result<()>;

    /// Set the data transmitted from the next advertising event on.
    /// `params` is `None` while advertising: parameters cannot change then.
    fn configure(
        &mut self,
        advertisement: &[u8],
        scan_response: &[u8],
        params: Option<&AdvParams>,
    ) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Apply an already-quantised transmit power.
    fn set_tx_power(&mut self, dbm: i8) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// NFC type-4 tag emulation
// ───────────────────────────────────────────────────────────────

/// Events raised by the tag emulation library, usually from interrupt
/// context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEvent {
    /// A reader field appeared.
    FieldOn,
    /// The reader field was lost.
    FieldOff,
    /// The reader finished reading the NDEF file.
    NdefRead,
    /// The reader wrote a new NDEF message of the given length.
    NdefUpdated(usize),
}

/// Handler the tag emulation calls for every [`TagEvent`].
pub type TagEventHandler = fn(event: TagEvent);

/// A type-4 tag NDEF file exposed to an external reader.
pub trait TagEmulator {
    /// Prepare the emulation with a zeroed read/write NDEF file and
    /// register the event handler.
    fn setup(&mut self, handler: TagEventHandler) -> Result<()>;

    /// Start sensing the field.
    fn start(&mut self) -> Result<()>;

    /// Stop sensing and release the peripheral.
    fn stop(&mut self) -> Result<()>;

    /// Replace the NDEF file content (NLEN prefix included).
    fn write_file(&mut self, file: &[u8]) -> Result<()>;

    /// Copy the current NDEF file content into `buf`, returning the number
    /// of bytes copied.
    fn read_file(&self, buf: &mut [u8]) -> Result<usize>;

    /// Capacity of the NDEF file in bytes.
    fn file_capacity(&self) -> usize;
}
