//! BLE advertising transport.
//!
//! Outgoing messages are encoded into [`AdvSlot`]s and kept in an
//! [`AdvertisementQueue`].  The queue is drained by the radio-notification
//! interrupt: after every advertising event the oldest slot is popped (and
//! pushed back if it repeats) and the on-tx callback fires.
//!
//! ```text
//!              init            process_asynchronous
//! Uninitialized ───▶ Initialized ─────────────────▶ Advertising
//!       ▲                 │                              │
//!       └──── uninit ─────┴──────────── uninit ──────────┘
//! ```
//!
//! The queue is the only state an interrupt handler touches, so it lives
//! apart from the channel and is usually a `static`:
//!
//! ```ignore
//! static ADV_QUEUE: AdvertisementQueue<8> = AdvertisementQueue::new();
//!
//! fn on_radio(active: bool) {
//!     ADV_QUEUE.on_radio_notification(active);
//! }
//!
//! let mut ch = AdvertisingChannel::new(&ADV_QUEUE, radio, on_radio, &config, address);
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::comms::advdata::{ADV_MTU, AdvSlot, device_name};
use crate::comms::{Callback, Channel, Message, fire};
use crate::config::{ADV_INTERVAL_MAX_MS, ADV_INTERVAL_MIN_MS, MAX_NAME_LEN, TagConfig};
use crate::error::{Error, ErrorAccumulator, Result};
use crate::ports::{
    AdvParams, AdvType, AdvertisingRadio, NotificationDistance, RadioNotificationHandler,
};
use crate::ring_buffer::RingBuffer;

/// Lead time of the radio-notification interrupt.
pub const NOTIFICATION_DISTANCE: NotificationDistance = NotificationDistance::Us800;

/// Transmit power levels supported by the radio, dBm, ascending.
pub const TX_POWER_LEVELS: [i8; 8] = [-40, -20, -16, -12, -8, -4, 0, 4];

/// Round `dbm` up to the nearest supported level.
pub fn quantize_tx_power(dbm: i8) -> Result<i8> {
    TX_POWER_LEVELS
        .iter()
        .copied()
        .find(|&level| dbm <= level)
        .ok_or(Error::InvalidParam)
}

// ── Interrupt-shared queue ───────────────────────────────────

struct QueueState<const N: usize> {
    slots: RingBuffer<AdvSlot, N>,
    on_tx: Option<Callback>,
    /// Number of pops since creation, wrapping.
    drains: u32,
}

/// Advertisement queue shared between main-line code and the
/// radio-notification interrupt.  Every access runs in a critical section.
pub struct AdvertisementQueue<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<QueueState<N>>>,
}

impl<const N: usize> AdvertisementQueue<N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(QueueState {
                slots: RingBuffer::new_with(AdvSlot::EMPTY),
                on_tx: None,
                drains: 0,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut QueueState<N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Push a slot.  Returns whether the queue was empty before.
    pub fn push(&self, slot: AdvSlot) -> Result<bool> {
        self.with(|s| {
            let was_empty = s.slots.is_empty();
            s.slots.push(slot)?;
            Ok(was_empty)
        })
    }

    /// Copy of the oldest slot, the next one to be drained.
    pub fn oldest(&self) -> Option<AdvSlot> {
        self.with(|s| s.slots.peek_at(0).copied())
    }

    pub fn len(&self) -> usize {
        self.with(|s| s.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.with(|s| s.slots.is_full())
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&self) {
        self.with(|s| s.slots.clear());
    }

    pub fn set_on_tx(&self, cb: Option<Callback>) {
        self.with(|s| s.on_tx = cb);
    }

    /// Pops performed so far.  Lets main-line code notice a drain without
    /// being called from the interrupt.
    pub fn drains(&self) -> u32 {
        self.with(|s| s.drains)
    }

    /// Radio-notification handler body.  Call it from the interrupt the
    /// radio adapter arms.
    ///
    /// On the inactive edge the oldest slot is popped and re-pushed when it
    /// repeats, then on-tx fires once.  An empty queue is a no-op: the radio
    /// keeps transmitting the last configured data.
    pub fn on_radio_notification(&self, radio_active: bool) {
        if radio_active {
            return;
        }
        let cb = self.with(|s| {
            let mut slot = s.slots.pop_front().ok()?;
            s.drains = s.drains.wrapping_add(1);
            if let Some(next) = slot.repeat.after_transmit() {
                slot.repeat = next;
                // A slot was just freed.
                let _ = s.slots.push(slot);
            }
            Some(s.on_tx)
        });
        if let Some(cb) = cb {
            fire(cb);
        }
    }
}

impl<const N: usize> Default for AdvertisementQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Channel ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvState {
    Uninitialized,
    Initialized,
    Advertising,
}

#[derive(Debug, Clone)]
struct AdvSettings {
    interval_ms: u16,
    tx_power_dbm: i8,
    adv_type: AdvType,
    manufacturer_id: u16,
    scan_response_uuid: bool,
    name: heapless::String<MAX_NAME_LEN>,
}

/// Advertising transport over a radio `R` and a queue of `N` slots.
pub struct AdvertisingChannel<'q, R: AdvertisingRadio, const N: usize> {
    queue: &'q AdvertisementQueue<N>,
    radio: R,
    handler: RadioNotificationHandler,
    state: AdvState,
    settings: AdvSettings,
    /// Value of `queue.drains()` when the radio data was last set.
    configured_at: u32,
}

impl<'q, R: AdvertisingRadio, const N: usize> AdvertisingChannel<'q, R, N> {
    /// `handler` must forward to `queue.on_radio_notification`.
    /// `address` supplies the serial suffix of the advertised name.
    pub fn new(
        queue: &'q AdvertisementQueue<N>,
        radio: R,
        handler: RadioNotificationHandler,
        config: &TagConfig,
        address: u64,
    ) -> Self {
        Self {
            queue,
            radio,
            handler,
            state: AdvState::Uninitialized,
            settings: AdvSettings {
                interval_ms: config.adv_interval_ms,
                tx_power_dbm: quantize_tx_power(config.adv_tx_power_dbm).unwrap_or(0),
                adv_type: config.adv_type,
                manufacturer_id: config.manufacturer_id,
                scan_response_uuid: config.scan_response_uuid,
                name: device_name(&config.device_name, config.name_include_serial, address),
            },
            configured_at: 0,
        }
    }

    pub fn state(&self) -> AdvState {
        self.state
    }

    /// Slots waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn device_name(&self) -> &str {
        &self.settings.name
    }

    pub fn interval_ms(&self) -> u16 {
        self.settings.interval_ms
    }

    pub fn tx_power_dbm(&self) -> i8 {
        self.settings.tx_power_dbm
    }

    fn params(&self) -> AdvParams {
        AdvParams::from_interval_ms(self.settings.interval_ms, self.settings.adv_type)
    }

    fn require_init(&self) -> Result<()> {
        if self.state == AdvState::Uninitialized {
            Err(Error::InvalidState)
        } else {
            Ok(())
        }
    }

    /// Change the advertising interval.  Takes effect immediately.
    pub fn set_interval(&mut self, interval_ms: u16) -> Result<()> {
        if !(ADV_INTERVAL_MIN_MS..=ADV_INTERVAL_MAX_MS).contains(&interval_ms) {
            return Err(Error::InvalidParam);
        }
        self.settings.interval_ms = interval_ms;
        if self.state == AdvState::Uninitialized {
            return Ok(());
        }
        self.restart()
    }

    /// Set the transmit power, rounded up to a supported level.  Returns
    /// the level applied.
    pub fn set_tx_power(&mut self, dbm: i8) -> Result<i8> {
        let level = quantize_tx_power(dbm)?;
        if self.state != AdvState::Uninitialized {
            self.radio.set_tx_power(level)?;
        }
        self.settings.tx_power_dbm = level;
        Ok(level)
    }

    /// Change the PDU type.  Takes effect immediately.
    pub fn set_type(&mut self, adv_type: AdvType) -> Result<()> {
        self.settings.adv_type = adv_type;
        if self.state == AdvState::Uninitialized {
            return Ok(());
        }
        self.restart()
    }

    /// Company id of the manufacturer-specific field, from the next put on.
    pub fn set_manufacturer_id(&mut self, id: u16) {
        self.settings.manufacturer_id = id;
    }

    /// List the UART service UUID in scan responses, from the next put on.
    pub fn set_scan_response_uuid(&mut self, include: bool) {
        self.settings.scan_response_uuid = include;
    }

    /// Replace the advertised name, from the next put on.
    pub fn set_device_name(&mut self, base: &str, include_serial: bool, address: u64) {
        self.settings.name = device_name(base, include_serial, address);
    }

    /// Stop, reload the oldest slot with the current parameters, and start
    /// again if advertising was active.  Used after a GATT disconnect.
    pub fn restart(&mut self) -> Result<()> {
        self.require_init()?;
        let was_advertising = self.state == AdvState::Advertising;
        let mut acc = ErrorAccumulator::new();
        if was_advertising {
            acc.record(self.radio.stop());
            self.state = AdvState::Initialized;
        }

        let params = self.params();
        let slot = self.queue.oldest().unwrap_or(AdvSlot::EMPTY);
        acc.record(
            self.radio
                .configure(slot.advertisement(), slot.scan_response(), Some(&params)),
        );
        self.configured_at = self.queue.drains();

        if was_advertising && acc.step(self.radio.start()).is_some() {
            self.state = AdvState::Advertising;
        }
        log::debug!(
            "adv: restart interval={}ms type={:?} -> {:?}",
            self.settings.interval_ms,
            self.settings.adv_type,
            self.state
        );
        acc.finish()
    }

    /// Load the oldest slot into the radio if the queue drained since the
    /// last configure.
    fn follow_drain(&mut self) -> Result<()> {
        let drains = self.queue.drains();
        if drains == self.configured_at {
            return Ok(());
        }
        if let Some(slot) = self.queue.oldest() {
            self.radio
                .configure(slot.advertisement(), slot.scan_response(), None)?;
        }
        self.configured_at = drains;
        Ok(())
    }
}

impl<R: AdvertisingRadio, const N: usize> Channel for AdvertisingChannel<'_, R, N> {
    fn init(&mut self) -> Result<()> {
        if self.state != AdvState::Uninitialized {
            return Err(Error::InvalidState);
        }
        self.radio
            .enable_notifications(NOTIFICATION_DISTANCE, self.handler)?;

        let mut acc = ErrorAccumulator::new();
        acc.record(self.radio.set_tx_power(self.settings.tx_power_dbm));
        acc.record(self.radio.configure(&[], &[], Some(&self.params())));
        if let Err(e) = acc.finish() {
            log::warn!("adv: init failed ({})", e);
            if let Err(e) = self.radio.disable_notifications() {
                log::warn!("adv: notification disarm failed ({})", e);
            }
            return Err(e);
        }

        self.queue.clear();
        self.configured_at = self.queue.drains();
        self.state = AdvState::Initialized;
        log::info!(
            "adv: ready as '{}', {} ms, {} dBm",
            self.settings.name,
            self.settings.interval_ms,
            self.settings.tx_power_dbm
        );
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if self.state == AdvState::Uninitialized {
            return Ok(());
        }
        let mut acc = ErrorAccumulator::new();
        if self.state == AdvState::Advertising {
            acc.record(self.radio.stop());
        }
        acc.record(self.radio.disable_notifications());
        self.queue.clear();
        self.queue.set_on_tx(None);
        self.state = AdvState::Uninitialized;
        log::info!("adv: stopped");
        acc.finish()
    }

    fn is_connected(&self) -> bool {
        self.state != AdvState::Uninitialized
    }

    fn process_asynchronous(&mut self) -> Result<()> {
        match self.state {
            AdvState::Uninitialized => Err(Error::InvalidState),
            AdvState::Initialized => {
                self.radio.start()?;
                self.state = AdvState::Advertising;
                log::debug!("adv: started, {} queued", self.queue.len());
                Ok(())
            }
            AdvState::Advertising => self.follow_drain(),
        }
    }

    fn process_synchronous(&mut self) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn flush_tx(&mut self) -> Result<()> {
        self.require_init()?;
        self.queue.clear();
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<()> {
        Ok(())
    }

    fn message_put(&mut self, msg: &Message<'_>) -> Result<()> {
        self.require_init()?;
        if msg.len() > ADV_MTU {
            return Err(Error::InvalidLength);
        }
        let slot = AdvSlot::encode(
            msg.payload,
            msg.repeat,
            self.settings.manufacturer_id,
            &self.settings.name,
            self.settings.scan_response_uuid,
        )?;
        let was_empty = self.queue.push(slot)?;
        log::debug!(
            "adv: queued {:02x?} repeat={:?} ({} pending)",
            msg.payload,
            msg.repeat,
            self.queue.len()
        );

        let advertising = self.state == AdvState::Advertising;
        if was_empty || advertising {
            let params = (!advertising).then(|| self.params());
            self.radio
                .configure(slot.advertisement(), slot.scan_response(), params.as_ref())?;
            self.configured_at = self.queue.drains();
        }
        Ok(())
    }

    fn message_get(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    fn mtu(&self) -> usize {
        ADV_MTU
    }

    fn tx_room(&self) -> Option<usize> {
        Some(self.queue.capacity() - self.queue.len())
    }

    fn set_on_connect(&mut self, _cb: Option<Callback>) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn set_on_disconnect(&mut self, _cb: Option<Callback>) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn set_on_rx(&mut self, _cb: Option<Callback>) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn set_on_tx(&mut self, cb: Option<Callback>) -> Result<()> {
        self.queue.set_on_tx(cb);
        Ok(())
    }
}
