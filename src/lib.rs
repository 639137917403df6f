//! SensorTag firmware library.
//!
//! Outgoing telemetry pipeline (BLE advertising, NFC tag emulation) and
//! motion sensor drivers.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; every other target
//! gets simulated adapters so the logic can be tested on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod comms;
pub mod config;
pub mod error;
pub mod ports;
pub mod ring_buffer;
pub mod sensors;
