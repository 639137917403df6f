//! SensorTag Firmware — Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  BleRadio (AdvertisingRadio)     I2cDriver + FreeRtos delay  │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  AdvertisingChannel ◀── ADV_QUEUE ◀── radio notification     │
//! │  Lis2dh12 · Lis2mdl (Sensor)                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The accelerometer and magnetometer sit on separate I²C controllers so
//! each driver owns its bus.
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::FromValueType;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use sensortag::adapters::radio::BleRadio;
use sensortag::comms::advertising::{AdvertisementQueue, AdvertisingChannel};
use sensortag::comms::{Channel, Message, Repeat, outbox};
use sensortag::config::{CONFIG_BLOB_MAX, TagConfig};
use sensortag::sensors::lis2dh12::Lis2dh12;
use sensortag::sensors::lis2mdl::Lis2mdl;
use sensortag::sensors::{Axis3, Mode, SampleRate, Sensor};

// ── Constants ─────────────────────────────────────────────────

const NVS_NAMESPACE: &str = "sensortag";
const NVS_CONFIG_KEY: &str = "config";

/// Beacon payload advertised between telemetry frames.
const BEACON: &[u8] = b"ST";

/// Telemetry frames are sent this many times before they age out.
const TELEMETRY_REPEATS: u8 = 3;

const LOOP_PERIOD_MS: u32 = 1000;

// ── Radio notification path ──────────────────────────────────

static ADV_QUEUE: AdvertisementQueue<8> = AdvertisementQueue::new();

fn on_radio_notification(active: bool) {
    ADV_QUEUE.on_radio_notification(active);
}

// ── Telemetry frame ───────────────────────────────────────────

/// One sample set, postcard-encoded into the manufacturer data.
#[derive(Debug, Serialize)]
struct TelemetryFrame {
    seq: u16,
    /// Acceleration, mg.
    accel: [i16; 3],
    /// Magnetic field, mG.
    mag: [i16; 3],
}

fn to_i16(v: Axis3) -> [i16; 3] {
    // `as` saturates out-of-range floats.
    [v.x as i16, v.y as i16, v.z as i16]
}

// ── Helpers ───────────────────────────────────────────────────

fn bt_address() -> u64 {
    use esp_idf_svc::sys::*;
    let mut mac = [0u8; 8];
    // SAFETY: esp_read_mac writes six bytes into the buffer.
    let ret = unsafe { esp_read_mac(mac[2..].as_mut_ptr(), esp_mac_type_t_ESP_MAC_BT) };
    if ret != ESP_OK as i32 {
        warn!("BT MAC read failed ({}), using zero address", ret);
        return 0;
    }
    u64::from_be_bytes(mac)
}

fn load_config(nvs: Option<&EspNvs<NvsDefault>>) -> TagConfig {
    let Some(nvs) = nvs else {
        return TagConfig::default();
    };
    let mut buf = [0u8; CONFIG_BLOB_MAX];
    match nvs.get_raw(NVS_CONFIG_KEY, &mut buf) {
        Ok(Some(bytes)) => TagConfig::decode(bytes).unwrap_or_else(|e| {
            warn!("Stored config invalid ({}), using defaults", e);
            TagConfig::default()
        }),
        Ok(None) => {
            info!("No stored config, using defaults");
            TagConfig::default()
        }
        Err(e) => {
            warn!("NVS config read failed ({}), using defaults", e);
            TagConfig::default()
        }
    }
}

fn store_config(nvs: &mut EspNvs<NvsDefault>, config: &TagConfig) {
    let mut buf = [0u8; CONFIG_BLOB_MAX];
    match config.encode(&mut buf) {
        Ok(bytes) => {
            if let Err(e) = nvs.set_raw(NVS_CONFIG_KEY, bytes) {
                warn!("NVS config write failed ({})", e);
            }
        }
        Err(e) => warn!("Config encode failed ({})", e),
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("SensorTag v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match EspDefaultNvsPartition::take()
        .and_then(|part| EspNvs::new(part, NVS_NAMESPACE, true))
    {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = load_config(nvs.as_ref());
    if let Some(nvs) = nvs.as_mut() {
        store_config(nvs, &config);
    }

    // ── 3. Advertising transport ──────────────────────────────
    let mut radio = BleRadio::new();
    if let Err(e) = radio.bring_up() {
        log::error!("BLE bring-up failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    let address = bt_address();
    let mut adv = AdvertisingChannel::new(&ADV_QUEUE, radio, on_radio_notification, &config, address);
    adv.init()?;
    info!("Advertising as '{}'", adv.device_name());

    adv.message_put(&Message::forever(BEACON))?;
    adv.process_asynchronous()?;

    // ── 4. Motion sensors ─────────────────────────────────────
    let i2c_cfg = I2cConfig::new().baudrate(400.kHz().into());
    let accel_bus = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &i2c_cfg,
    )?;
    let mag_bus = I2cDriver::new(
        peripherals.i2c1,
        peripherals.pins.gpio18,
        peripherals.pins.gpio19,
        &i2c_cfg,
    )?;

    let mut accel = Lis2dh12::new(accel_bus, FreeRtos);
    let mut mag = Lis2mdl::new(mag_bus, FreeRtos);

    let accel_ok = accel.init().and_then(|_| accel.configure(&config)).is_ok();
    if !accel_ok {
        warn!("LIS2DH12 unavailable, acceleration reported as zero");
    }
    let mag_ok = mag
        .init()
        .and_then(|_| mag.samplerate_set(SampleRate::Hz(config.mag_samplerate_hz)))
        .is_ok();
    if !mag_ok {
        warn!("LIS2MDL unavailable, field reported as zero");
    }

    info!("System ready. Entering telemetry loop.");

    // ── 5. Telemetry loop ─────────────────────────────────────
    let mut seq: u16 = 0;
    loop {
        let a = if accel_ok {
            accel
                .mode_set(Mode::SingleBlocking)
                .and_then(|_| accel.data_get())
                .unwrap_or_else(|e| {
                    warn!("LIS2DH12 read failed ({})", e);
                    Axis3::default()
                })
        } else {
            Axis3::default()
        };
        let m = if mag_ok {
            mag.mode_set(Mode::SingleBlocking)
                .and_then(|_| mag.data_get())
                .unwrap_or_else(|e| {
                    warn!("LIS2MDL read failed ({})", e);
                    Axis3::default()
                })
        } else {
            Axis3::default()
        };

        let frame = TelemetryFrame {
            seq,
            accel: to_i16(a),
            mag: to_i16(m),
        };
        let mut buf = [0u8; 32];
        match postcard::to_slice(&frame, &mut buf) {
            Ok(bytes) => {
                let msg = Message::with_repeat(bytes, Repeat::Times(TELEMETRY_REPEATS));
                let (_, result) = outbox::put_chunked(&mut adv, &msg);
                if let Err(e) = result {
                    warn!("Telemetry #{} dropped ({})", seq, e);
                }
            }
            Err(e) => warn!("Telemetry encode failed ({})", e),
        }

        if let Err(e) = adv.process_asynchronous() {
            warn!("Advertising process failed ({})", e);
        }
        log::debug!("Telemetry #{}: {:?} ({} queued)", seq, frame, adv.queued());

        seq = seq.wrapping_add(1);
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
