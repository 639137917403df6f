//! NFC type-4 tag transport.
//!
//! Not a queue: the tag exposes one NDEF message built from a fixed record
//! set (firmware version, address, id and one binary record).  Records are
//! edited in shadow buffers and re-encoded into the tag file only while no
//! reader is in the field, so a reader never sees a half-written message.
//!
//! ```text
//!               init               FieldOn
//! Uninitialized ───▶ Idle (field off) ──────▶ FieldPresent
//!       ▲               ▲                         │
//!       │               └──────── FieldOff ───────┘
//!       └── uninit (from any state)
//! ```
//!
//! Tag events arrive in interrupt context and only touch [`NfcShared`].

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::comms::ndef::{self, Record};
use crate::comms::{Callback, Callbacks, Channel, Message, fire};
use crate::error::{Error, ErrorAccumulator, Result};
use crate::ports::{TagEmulator, TagEvent, TagEventHandler};

/// Capacity of each text record buffer.
pub const TEXT_BUFFER_SIZE: usize = 32;
/// Capacity of the binary record buffer.
pub const DATA_BUFFER_SIZE: usize = 128;
/// Size of the type-4 tag NDEF file, NLEN included.
pub const NDEF_FILE_SIZE: usize = 512;

const MAX_RECORDS: usize = 4;

pub const LANG_FW: [u8; 2] = *b"fw";
pub const LANG_ADDRESS: [u8; 2] = *b"ad";
pub const LANG_ID: [u8; 2] = *b"id";

// ── Interrupt-shared state ───────────────────────────────────

/// State reached by the tag event handler.  Usually a `static`.
pub struct NfcShared {
    field_present: AtomicBool,
    rx_pending: AtomicBool,
    /// A reader overwrote the tag while it is not configurable.
    reader_dirty: AtomicBool,
    configurable: AtomicBool,
    callbacks: Mutex<CriticalSectionRawMutex, Cell<Callbacks>>,
}

impl NfcShared {
    pub const fn new() -> Self {
        Self {
            field_present: AtomicBool::new(false),
            rx_pending: AtomicBool::new(false),
            reader_dirty: AtomicBool::new(false),
            configurable: AtomicBool::new(true),
            callbacks: Mutex::new(Cell::new(Callbacks::none())),
        }
    }

    pub fn field_present(&self) -> bool {
        self.field_present.load(Ordering::Acquire)
    }

    fn callbacks(&self) -> Callbacks {
        self.callbacks.lock(Cell::get)
    }

    fn update_callbacks(&self, f: impl FnOnce(&mut Callbacks)) {
        self.callbacks.lock(|cell| {
            let mut cbs = cell.get();
            f(&mut cbs);
            cell.set(cbs);
        });
    }

    fn reset(&self) {
        self.field_present.store(false, Ordering::Release);
        self.rx_pending.store(false, Ordering::Release);
        self.reader_dirty.store(false, Ordering::Release);
        self.update_callbacks(|c| *c = Callbacks::none());
    }

    /// Tag event handler body.  Call it from the handler passed to the
    /// channel.
    pub fn on_tag_event(&self, event: TagEvent) {
        let cbs = self.callbacks();
        match event {
            TagEvent::FieldOn => {
                self.field_present.store(true, Ordering::Release);
                fire(cbs.on_connect);
            }
            TagEvent::FieldOff => {
                self.field_present.store(false, Ordering::Release);
                fire(cbs.on_disconnect);
            }
            TagEvent::NdefRead => fire(cbs.on_tx),
            // Readers zero NLEN before writing, then set the final length.
            TagEvent::NdefUpdated(0) => {}
            TagEvent::NdefUpdated(_) => {
                self.rx_pending.store(true, Ordering::Release);
                if !self.configurable.load(Ordering::Acquire) {
                    self.reader_dirty.store(true, Ordering::Release);
                }
                fire(cbs.on_rx);
            }
        }
    }
}

impl Default for NfcShared {
    fn default() -> Self {
        Self::new()
    }
}

// ── Record buffers ───────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct RecordBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> RecordBuf<N> {
    const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Store `length` bytes of `data`.  `None` with `length == 0` clears.
    fn set(&mut self, data: Option<&[u8]>, length: usize) -> Result<()> {
        let src = match data {
            None if length > 0 => return Err(Error::Null),
            None => &[][..],
            Some(d) => d,
        };
        if length >= N || length > src.len() {
            return Err(Error::InvalidLength);
        }
        self.buf[..length].copy_from_slice(&src[..length]);
        self.len = length;
        Ok(())
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcState {
    Uninitialized,
    Idle,
    FieldPresent,
}

// ── Channel ──────────────────────────────────────────────────

/// Type-4 tag transport over a tag emulation `T`.
pub struct NfcTagChannel<'s, T: TagEmulator> {
    shared: &'s NfcShared,
    tag: T,
    handler: TagEventHandler,
    initialized: bool,
    fw_version: RecordBuf<TEXT_BUFFER_SIZE>,
    address: RecordBuf<TEXT_BUFFER_SIZE>,
    id: RecordBuf<TEXT_BUFFER_SIZE>,
    data: RecordBuf<DATA_BUFFER_SIZE>,
    /// Shadow buffers differ from the tag file.
    dirty: bool,
    file: [u8; NDEF_FILE_SIZE],
    rx: [u8; NDEF_FILE_SIZE],
    rx_len: usize,
}

impl<'s, T: TagEmulator> NfcTagChannel<'s, T> {
    /// `handler` must forward to `shared.on_tag_event`.
    pub fn new(shared: &'s NfcShared, tag: T, handler: TagEventHandler) -> Self {
        Self {
            shared,
            tag,
            handler,
            initialized: false,
            fw_version: RecordBuf::new(),
            address: RecordBuf::new(),
            id: RecordBuf::new(),
            data: RecordBuf::new(),
            dirty: false,
            file: [0; NDEF_FILE_SIZE],
            rx: [0; NDEF_FILE_SIZE],
            rx_len: 0,
        }
    }

    pub fn state(&self) -> NfcState {
        if !self.initialized {
            NfcState::Uninitialized
        } else if self.shared.field_present() {
            NfcState::FieldPresent
        } else {
            NfcState::Idle
        }
    }

    pub fn tag(&self) -> &T {
        &self.tag
    }

    pub fn tag_mut(&mut self) -> &mut T {
        &mut self.tag
    }

    pub fn set_fw_version(&mut self, data: Option<&[u8]>, length: usize) -> Result<()> {
        self.fw_version.set(data, length)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_address(&mut self, data: Option<&[u8]>, length: usize) -> Result<()> {
        self.address.set(data, length)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_id(&mut self, data: Option<&[u8]>, length: usize) -> Result<()> {
        self.id.set(data, length)?;
        self.dirty = true;
        Ok(())
    }

    /// Allow readers to overwrite the tag.  When off, a reader's write is
    /// replaced by our record set at the next opportunity.
    pub fn set_configurable(&mut self, configurable: bool) {
        self.shared
            .configurable
            .store(configurable, Ordering::Release);
    }

    pub fn is_configurable(&self) -> bool {
        self.shared.configurable.load(Ordering::Acquire)
    }

    /// Whether a record change is waiting for the field to go away.
    pub fn pending_rewrite(&self) -> bool {
        self.dirty || self.shared.reader_dirty.load(Ordering::Acquire)
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    /// Copy a reader's write out of the tag file before it can be replaced.
    /// The pending flag survives a failed read, so the tag file is not
    /// rewritten until the data is captured.  A file with a bad NLEN is
    /// dropped.
    fn capture_rx(&mut self) -> Result<()> {
        if !self.shared.rx_pending.load(Ordering::Acquire) {
            return Ok(());
        }
        let n = self.tag.read_file(&mut self.file)?;
        match ndef::file_message(&self.file[..n]) {
            Ok(msg) => {
                self.rx[..msg.len()].copy_from_slice(msg);
                self.rx_len = msg.len();
                log::debug!("nfc: received {} byte NDEF message", self.rx_len);
            }
            Err(e) => log::warn!("nfc: dropping unreadable reader write ({})", e),
        }
        self.shared.rx_pending.store(false, Ordering::Release);
        Ok(())
    }

    /// Encode the record set into the tag file, after capturing any reader
    /// write it would replace.  Refused while a reader is in the field; the
    /// change stays pending.
    fn write_records(&mut self) -> Result<()> {
        self.require_init()?;
        if self.shared.field_present() {
            return Err(Error::InvalidState);
        }
        self.capture_rx()?;
        if !self.pending_rewrite() {
            return Ok(());
        }

        let mut records: heapless::Vec<Record<'_>, MAX_RECORDS> = heapless::Vec::new();
        let texts = [
            (LANG_FW, &self.fw_version),
            (LANG_ADDRESS, &self.address),
            (LANG_ID, &self.id),
        ];
        for (lang, rec) in texts {
            if rec.len > 0 {
                records
                    .push(Record::Text {
                        lang,
                        text: rec.as_slice(),
                    })
                    .map_err(|_| Error::Internal)?;
            }
        }
        if self.data.len > 0 {
            records
                .push(Record::Media {
                    media_type: &[],
                    payload: self.data.as_slice(),
                })
                .map_err(|_| Error::Internal)?;
        }

        let n = ndef::encode_file(&records, &mut self.file)?;
        self.tag.write_file(&self.file[..n])?;
        self.dirty = false;
        self.shared.reader_dirty.store(false, Ordering::Release);
        log::debug!("nfc: tag file rewritten, {} records, {} bytes", records.len(), n);
        Ok(())
    }
}

impl<T: TagEmulator> Channel for NfcTagChannel<'_, T> {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::InvalidState);
        }
        let mut acc = ErrorAccumulator::new();
        if acc.step(self.tag.setup(self.handler)).is_some() {
            acc.record(self.tag.start());
        }
        acc.finish()?;
        self.initialized = true;
        log::info!("nfc: tag emulation started");
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let result = self.tag.stop();
        self.shared.reset();
        self.fw_version.clear();
        self.address.clear();
        self.id.clear();
        self.data.clear();
        self.dirty = false;
        self.rx_len = 0;
        self.initialized = false;
        log::info!("nfc: tag emulation stopped");
        result
    }

    fn is_connected(&self) -> bool {
        self.initialized && self.shared.field_present()
    }

    fn process_asynchronous(&mut self) -> Result<()> {
        self.require_init()?;
        self.capture_rx()?;
        if self.shared.field_present() {
            return Ok(());
        }
        self.write_records()
    }

    fn process_synchronous(&mut self) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn flush_tx(&mut self) -> Result<()> {
        self.require_init()?;
        if self.data.len > 0 {
            self.data.clear();
            self.dirty = true;
        }
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<()> {
        self.require_init()?;
        self.shared.rx_pending.store(false, Ordering::Release);
        self.rx_len = 0;
        Ok(())
    }

    fn message_put(&mut self, msg: &Message<'_>) -> Result<()> {
        self.require_init()?;
        self.data.set(Some(msg.payload), msg.len())?;
        self.dirty = true;
        log::debug!("nfc: binary record {:02x?}", msg.payload);
        self.write_records()
    }

    fn message_get(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require_init()?;
        self.capture_rx()?;
        if self.rx_len == 0 {
            return Err(Error::NotFound);
        }
        if buf.len() < self.rx_len {
            return Err(Error::InvalidLength);
        }
        let n = self.rx_len;
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx_len = 0;
        Ok(n)
    }

    fn mtu(&self) -> usize {
        DATA_BUFFER_SIZE - 1
    }

    fn set_on_connect(&mut self, cb: Option<Callback>) -> Result<()> {
        self.shared.update_callbacks(|c| c.on_connect = cb);
        Ok(())
    }

    fn set_on_disconnect(&mut self, cb: Option<Callback>) -> Result<()> {
        self.shared.update_callbacks(|c| c.on_disconnect = cb);
        Ok(())
    }

    fn set_on_rx(&mut self, cb: Option<Callback>) -> Result<()> {
        self.shared.update_callbacks(|c| c.on_rx = cb);
        Ok(())
    }

    fn set_on_tx(&mut self, cb: Option<Callback>) -> Result<()> {
        self.shared.update_callbacks(|c| c.on_tx = cb);
        Ok(())
    }
}
