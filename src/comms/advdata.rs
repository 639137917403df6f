//! Legacy advertising payload encoding.
//!
//! Every queued message becomes one [`AdvSlot`]: a ready-to-transmit
//! advertisement plus scan response, each at most 31 bytes.
//!
//! ```text
//! advertisement:  ┌─────────────┬──────────────────────────────────────┐
//!                 │ 02 01 04    │ len FF id_lo id_hi  payload…         │
//!                 │ flags AD    │ manufacturer-specific AD             │
//!                 └─────────────┴──────────────────────────────────────┘
//! scan response:  ┌──────────────────────┬───────────────────────────┐
//!                 │ len 09 name…         │ 11 07 uuid128 (optional)  │
//!                 └──────────────────────┴───────────────────────────┘
//! ```

use core::fmt::Write;

use crate::comms::Repeat;
use crate::config::MAX_NAME_LEN;
use crate::error::{Error, Result};

/// Maximum legacy advertising / scan response data length.
pub const ADV_DATA_MAX: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_COMPLETE_UUID128: u8 = 0x07;
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
pub const AD_TYPE_MANUFACTURER: u8 = 0xFF;

/// LE-only device: BR/EDR not supported, not discoverable.
pub const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// Nordic UART service, optionally listed in the scan response.
pub const NUS_UUID: u128 = 0x6E40_0001_B5A3_F393_E0A9_E50E_24DC_CA9E;

const FLAGS_AD_LEN: usize = 3;
const MANUFACTURER_HEADER_LEN: usize = 4;
const UUID128_AD_LEN: usize = 18;

/// Largest message payload that fits in one advertisement.
pub const ADV_MTU: usize = ADV_DATA_MAX - FLAGS_AD_LEN - MANUFACTURER_HEADER_LEN;

// ── AD structure writer ──────────────────────────────────────

/// Appends `len | type | data` structures to a fixed buffer.
struct AdWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> AdWriter<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Write one AD structure whose data is the concatenation of `parts`.
    fn push(&mut self, ad_type: u8, parts: &[&[u8]]) -> Result<()> {
        let data_len: usize = parts.iter().map(|p| p.len()).sum();
        let total = 2 + data_len;
        if total > self.remaining() {
            return Err(Error::InvalidLength);
        }
        self.buf[self.len] = (1 + data_len) as u8;
        self.buf[self.len + 1] = ad_type;
        let mut at = self.len + 2;
        for part in parts {
            self.buf[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        self.len = at;
        Ok(())
    }

    fn finish(self) -> usize {
        self.len
    }
}

// ── Slot ─────────────────────────────────────────────────────

/// One queue element of the advertising transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvSlot {
    advertisement: [u8; ADV_DATA_MAX],
    adv_len: u8,
    scan_response: [u8; ADV_DATA_MAX],
    rsp_len: u8,
    pub repeat: Repeat,
}

impl AdvSlot {
    pub const EMPTY: Self = Self {
        advertisement: [0; ADV_DATA_MAX],
        adv_len: 0,
        scan_response: [0; ADV_DATA_MAX],
        rsp_len: 0,
        repeat: Repeat::Times(0),
    };

    /// Encode `payload` as manufacturer-specific data plus a scan response
    /// carrying `name` and, when `include_uuid`, the UART service UUID.
    pub fn encode(
        payload: &[u8],
        repeat: Repeat,
        manufacturer_id: u16,
        name: &str,
        include_uuid: bool,
    ) -> Result<Self> {
        if payload.len() > ADV_MTU {
            return Err(Error::InvalidLength);
        }
        let mut slot = Self::EMPTY;
        slot.repeat = repeat;

        let mut adv = AdWriter::new(&mut slot.advertisement);
        adv.push(AD_TYPE_FLAGS, &[&[FLAG_BR_EDR_NOT_SUPPORTED]])?;
        adv.push(
            AD_TYPE_MANUFACTURER,
            &[&manufacturer_id.to_le_bytes(), payload],
        )?;
        slot.adv_len = adv.finish() as u8;

        let mut rsp = AdWriter::new(&mut slot.scan_response);
        let uuid_len = if include_uuid { UUID128_AD_LEN } else { 0 };
        let name_room = ADV_DATA_MAX.saturating_sub(uuid_len + 2);
        if !name.is_empty() && name_room > 0 {
            let bytes = name.as_bytes();
            if bytes.len() <= name_room {
                rsp.push(AD_TYPE_COMPLETE_NAME, &[bytes])?;
            } else {
                rsp.push(AD_TYPE_SHORT_NAME, &[&bytes[..name_room]])?;
            }
        }
        if include_uuid {
            rsp.push(AD_TYPE_COMPLETE_UUID128, &[&NUS_UUID.to_le_bytes()])?;
        }
        slot.rsp_len = rsp.finish() as u8;

        Ok(slot)
    }

    pub fn advertisement(&self) -> &[u8] {
        &self.advertisement[..self.adv_len as usize]
    }

    pub fn scan_response(&self) -> &[u8] {
        &self.scan_response[..self.rsp_len as usize]
    }

    /// The raw message payload carried in the manufacturer-specific field.
    pub fn payload(&self) -> &[u8] {
        let start = FLAGS_AD_LEN + MANUFACTURER_HEADER_LEN;
        &self.advertisement[start.min(self.adv_len as usize)..self.adv_len as usize]
    }
}

impl Default for AdvSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

// ── Device name ──────────────────────────────────────────────

/// Build the advertised name: `base` followed, when `include_serial`, by
/// the low 16 bits of the device address as four upper-case hex digits.
/// `base` is truncated so the result fits [`MAX_NAME_LEN`].
pub fn device_name(
    base: &str,
    include_serial: bool,
    address: u64,
) -> heapless::String<MAX_NAME_LEN> {
    const SERIAL_LEN: usize = 4;
    let room = if include_serial {
        MAX_NAME_LEN - SERIAL_LEN
    } else {
        MAX_NAME_LEN
    };
    let mut cut = base.len().min(room);
    while !base.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut name = heapless::String::new();
    // Both writes fit by construction of `cut`.
    let _ = name.push_str(&base[..cut]);
    if include_serial {
        let _ = write!(name, "{:04X}", address & 0xFFFF);
    }
    name
}
