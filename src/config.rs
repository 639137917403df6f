//! Tag configuration parameters
//!
//! All tunable parameters for the advertising transport, the NFC tag and
//! the motion sensors.  Values are persisted as a postcard blob so they can
//! be stored in a flash page and restored at boot.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ports::AdvType;

/// Longest advertised device name (serial suffix included).
pub const MAX_NAME_LEN: usize = 24;

/// Accepted advertising interval range, milliseconds.
pub const ADV_INTERVAL_MIN_MS: u16 = 100;
pub const ADV_INTERVAL_MAX_MS: u16 = 10_000;

/// Highest supported transmit power, dBm.
pub const TX_POWER_MAX_DBM: i8 = 4;

/// Upper bound of an encoded [`TagConfig`].
pub const CONFIG_BLOB_MAX: usize = 64;

/// Core tag configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    // --- Naming ---
    /// Base name advertised in the scan response
    pub device_name: heapless::String<MAX_NAME_LEN>,
    /// Append four hex digits of the device address to the name
    pub name_include_serial: bool,

    // --- Advertising ---
    /// Advertising interval (milliseconds)
    pub adv_interval_ms: u16,
    /// Requested transmit power (dBm), quantised by the transport
    pub adv_tx_power_dbm: i8,
    /// Advertising PDU type
    pub adv_type: AdvType,
    /// Company identifier of the manufacturer-specific data field
    pub manufacturer_id: u16,
    /// Include the UART service UUID in the scan response
    pub scan_response_uuid: bool,

    // --- NFC ---
    /// Allow a reader to overwrite the tag content
    pub nfc_configurable: bool,

    // --- Sensors ---
    /// Accelerometer sample rate (Hz)
    pub accel_samplerate_hz: u8,
    /// Accelerometer full scale (g)
    pub accel_scale_g: u8,
    /// Accelerometer resolution (bits)
    pub accel_resolution_bits: u8,
    /// Magnetometer sample rate (Hz)
    pub mag_samplerate_hz: u8,
}

impl Default for TagConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        // Literal is shorter than MAX_NAME_LEN.
        let _ = device_name.push_str("Tag");
        Self {
            // Naming
            device_name,
            name_include_serial: true,

            // Advertising
            adv_interval_ms: 1000,
            adv_tx_power_dbm: 0,
            adv_type: AdvType::NonConnectableScannable,
            manufacturer_id: 0xFFFF, // SIG "internal / testing" identifier
            scan_response_uuid: false,

            // NFC
            nfc_configurable: true,

            // Sensors
            accel_samplerate_hz: 10,
            accel_scale_g: 2,
            accel_resolution_bits: 10,
            mag_samplerate_hz: 10,
        }
    }
}

impl TagConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(Error::InvalidParam);
        }
        if !(ADV_INTERVAL_MIN_MS..=ADV_INTERVAL_MAX_MS).contains(&self.adv_interval_ms) {
            return Err(Error::InvalidParam);
        }
        if self.adv_tx_power_dbm > TX_POWER_MAX_DBM {
            return Err(Error::InvalidParam);
        }
        if !matches!(self.accel_scale_g, 2 | 4 | 8 | 16) {
            return Err(Error::InvalidParam);
        }
        if !matches!(self.accel_resolution_bits, 8 | 10 | 12) {
            return Err(Error::InvalidParam);
        }
        if self.accel_samplerate_hz == 0 || self.mag_samplerate_hz == 0 {
            return Err(Error::InvalidParam);
        }
        if self.mag_samplerate_hz > 100 {
            return Err(Error::InvalidParam);
        }
        Ok(())
    }

    /// Serialise into `buf`, returning the used prefix.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8]> {
        postcard::to_slice(self, buf).map_err(|_| Error::InvalidLength)
    }

    /// Restore and validate a configuration written by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let config: Self = postcard::from_bytes(bytes).map_err(|e| {
            log::warn!("config: stored blob rejected ({})", e);
            Error::InvalidParam
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = TagConfig::default();
        assert_eq!(c.validate(), Ok(()));
        assert_eq!(c.device_name.as_str(), "Tag");
    }

    #[test]
    fn rejects_interval_out_of_range() {
        let mut c = TagConfig::default();
        c.adv_interval_ms = 99;
        assert_eq!(c.validate(), Err(Error::InvalidParam));
        c.adv_interval_ms = 10_001;
        assert_eq!(c.validate(), Err(Error::InvalidParam));
        c.adv_interval_ms = 10_000;
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn rejects_excess_tx_power() {
        let mut c = TagConfig::default();
        c.adv_tx_power_dbm = 5;
        assert_eq!(c.validate(), Err(Error::InvalidParam));
    }

    #[test]
    fn rejects_unsupported_sensor_settings() {
        let mut c = TagConfig::default();
        c.accel_scale_g = 3;
        assert_eq!(c.validate(), Err(Error::InvalidParam));

        let mut c = TagConfig::default();
        c.accel_resolution_bits = 16;
        assert_eq!(c.validate(), Err(Error::InvalidParam));
    }

    #[test]
    fn serde_roundtrip() {
        let c = TagConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: TagConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let mut c = TagConfig::default();
        c.manufacturer_id = 0x1234;
        c.scan_response_uuid = true;
        let mut buf = [0u8; CONFIG_BLOB_MAX];
        let bytes = c.encode(&mut buf).unwrap();
        let c2 = TagConfig::decode(bytes).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(TagConfig::decode(&[0xFF; 3]).is_err());
    }

    #[test]
    fn encode_into_tiny_buffer_fails() {
        let c = TagConfig::default();
        let mut buf = [0u8; 4];
        assert_eq!(c.encode(&mut buf).map(|b| b.len()), Err(Error::InvalidLength));
    }
}
