//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter   | Implements         | Connects to                          |
//! |-----------|--------------------|--------------------------------------|
//! | `radio`   | AdvertisingRadio   | Bluedroid GAP raw advertising / sim  |
//! | `nfc_tag` | TagEmulator        | In-memory Type 4 NDEF file           |
//!
//! The sensor drivers talk to `embedded_hal` buses directly and need no
//! adapter.

pub mod nfc_tag;
pub mod radio;
