//! BLE advertising radio adapter.
//!
//! Implements [`AdvertisingRadio`] for the advertising transport.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GAP raw advertising data via
//!   `esp_idf_svc::sys`.  ESP32 has no radio-notification interrupt, so an
//!   `esp_timer` running at the advertising interval produces the
//!   active/inactive edge pair after every advertising event.
//! - **all other targets**: a simulation that records every call so the
//!   channel logic can be tested on the host.

use crate::error::{Error, Result};
use crate::ports::{
    AdvParams, AdvertisingRadio, NotificationDistance, RadioNotificationHandler,
};

// ── ESP-IDF static state ─────────────────────────────────────
//
// esp_timer callbacks are C function pointers that cannot capture the
// adapter, so the handler lives in a critical-section cell.

#[cfg(target_os = "espidf")]
use core::cell::Cell;
#[cfg(target_os = "espidf")]
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

#[cfg(target_os = "espidf")]
static NOTIFY_HANDLER: Mutex<CriticalSectionRawMutex, Cell<Option<RadioNotificationHandler>>> =
    Mutex::new(Cell::new(None));

#[cfg(target_os = "espidf")]
unsafe extern "C" fn adv_event_timer_cb(_arg: *mut core::ffi::c_void) {
    if let Some(handler) = NOTIFY_HANDLER.lock(|h| h.get()) {
        handler(true);
        handler(false);
    }
}

#[cfg(target_os = "espidf")]
fn esp_adv_params(params: &AdvParams) -> esp_idf_svc::sys::esp_ble_adv_params_t {
    use crate::ports::AdvType;
    use esp_idf_svc::sys::*;

    let mut p: esp_ble_adv_params_t = unsafe { core::mem::zeroed() };
    p.adv_int_min = params.interval_units;
    p.adv_int_max = params.interval_units;
    p.adv_type = match params.adv_type {
        AdvType::NonConnectableNonScannable => esp_ble_adv_type_t_ADV_TYPE_NONCONN_IND,
        AdvType::NonConnectableScannable => esp_ble_adv_type_t_ADV_TYPE_SCAN_IND,
        AdvType::ConnectableScannable => esp_ble_adv_type_t_ADV_TYPE_IND,
    };
    p.own_addr_type = esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC;
    p.channel_map = esp_ble_adv_channel_t_ADV_CHNL_ALL;
    p.adv_filter_policy = esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY;
    p
}

/// Nearest controller power level at or below `dbm`.
#[cfg(target_os = "espidf")]
fn esp_power_level(dbm: i8) -> esp_idf_svc::sys::esp_power_level_t {
    use esp_idf_svc::sys::*;
    match dbm {
        i8::MIN..=-12 => esp_power_level_t_ESP_PWR_LVL_N12,
        -11..=-9 => esp_power_level_t_ESP_PWR_LVL_N9,
        -8..=-6 => esp_power_level_t_ESP_PWR_LVL_N6,
        -5..=-3 => esp_power_level_t_ESP_PWR_LVL_N3,
        -2..=2 => esp_power_level_t_ESP_PWR_LVL_N0,
        3..=5 => esp_power_level_t_ESP_PWR_LVL_P3,
        6..=8 => esp_power_level_t_ESP_PWR_LVL_P6,
        _ => esp_power_level_t_ESP_PWR_LVL_P9,
    }
}

// ── Simulation records ───────────────────────────────────────

/// One call made on the simulated radio.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    EnableNotifications(NotificationDistance),
    DisableNotifications,
    Configure,
    Start,
    Stop,
    SetTxPower(i8),
}

/// Data handed to the last `configure` call.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRecord {
    pub advertisement: Vec<u8>,
    pub scan_response: Vec<u8>,
    pub params: Option<AdvParams>,
}

// ── BleRadio ─────────────────────────────────────────────────

pub struct BleRadio {
    advertising: bool,
    notifications: bool,
    params: Option<AdvParams>,
    tx_power: i8,
    #[cfg(target_os = "espidf")]
    timer: esp_idf_svc::sys::esp_timer_handle_t,
    #[cfg(not(target_os = "espidf"))]
    handler: Option<RadioNotificationHandler>,
    #[cfg(not(target_os = "espidf"))]
    calls: Vec<RadioCall>,
    #[cfg(not(target_os = "espidf"))]
    configures: Vec<ConfigureRecord>,
    #[cfg(not(target_os = "espidf"))]
    fail_stop: Option<Error>,
    #[cfg(not(target_os = "espidf"))]
    fail_start: Option<Error>,
}

impl BleRadio {
    pub fn new() -> Self {
        Self {
            advertising: false,
            notifications: false,
            params: None,
            tx_power: 0,
            #[cfg(target_os = "espidf")]
            timer: core::ptr::null_mut(),
            #[cfg(not(target_os = "espidf"))]
            handler: None,
            #[cfg(not(target_os = "espidf"))]
            calls: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            configures: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_stop: None,
            #[cfg(not(target_os = "espidf"))]
            fail_start: None,
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications
    }

    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    /// Period of the emulated notification timer, microseconds.
    #[cfg(target_os = "espidf")]
    fn event_period_us(&self) -> u64 {
        let units = self.params.map(|p| p.interval_units).unwrap_or(1600);
        u64::from(units) * u64::from(crate::ports::ADV_INTERVAL_UNIT_US)
    }

    #[cfg(target_os = "espidf")]
    fn start_event_timer(&mut self) -> Result<()> {
        use esp_idf_svc::sys::*;
        if self.timer.is_null() {
            return Ok(());
        }
        // Restarting a running timer fails; stop first and ignore "not running".
        unsafe { esp_timer_stop(self.timer) };
        Error::from_esp(unsafe { esp_timer_start_periodic(self.timer, self.event_period_us()) })
    }

    /// Bring up the BLE controller and the Bluedroid host.  Must run once
    /// before the first GAP call.
    #[cfg(target_os = "espidf")]
    pub fn bring_up(&mut self) -> Result<()> {
        use esp_idf_svc::sys::*;

        unsafe {
            // BLE only; classic BT memory goes back to the heap.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);
            let mut bt_cfg = esp_bt_controller_config_t::default();
            Error::from_esp(esp_bt_controller_init(&mut bt_cfg))?;
            Error::from_esp(esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE))?;
            Error::from_esp(esp_bluedroid_init())?;
            Error::from_esp(esp_bluedroid_enable())?;
        }
        log::info!("radio: BLE stack up");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn bring_up(&mut self) -> Result<()> {
        log::info!("radio(sim): BLE stack up");
        Ok(())
    }
}

impl Default for BleRadio {
    fn default() -> Self {
        Self::new()
    }
}

// ── Hardware path ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl AdvertisingRadio for BleRadio {
    fn enable_notifications(
        &mut self,
        distance: NotificationDistance,
        handler: RadioNotificationHandler,
    ) -> Result<()> {
        use esp_idf_svc::sys::*;

        NOTIFY_HANDLER.lock(|h| h.set(Some(handler)));
        if self.timer.is_null() {
            let args = esp_timer_create_args_t {
                callback: Some(adv_event_timer_cb),
                arg: core::ptr::null_mut(),
                dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                name: c"adv_evt".as_ptr(),
                skip_unhandled_events: true,
            };
            Error::from_esp(unsafe { esp_timer_create(&args, &mut self.timer) })?;
        }
        self.notifications = true;
        log::debug!("radio: notifications armed ({:?} lead)", distance);
        if self.advertising {
            self.start_event_timer()?;
        }
        Ok(())
    }

    fn disable_notifications(&mut self) -> Result<()> {
        use esp_idf_svc::sys::*;

        NOTIFY_HANDLER.lock(|h| h.set(None));
        if !self.timer.is_null() {
            unsafe {
                esp_timer_stop(self.timer);
                Error::from_esp(esp_timer_delete(self.timer))?;
            }
            self.timer = core::ptr::null_mut();
        }
        self.notifications = false;
        Ok(())
    }

    fn configure(
        &mut self,
        advertisement: &[u8],
        scan_response: &[u8],
        params: Option<&AdvParams>,
    ) -> Result<()> {
        use esp_idf_svc::sys::*;

        // Bluedroid copies the raw data before these calls return.
        let mut adv = [0u8; 31];
        let mut rsp = [0u8; 31];
        let adv_len = advertisement.len().min(adv.len());
        let rsp_len = scan_response.len().min(rsp.len());
        adv[..adv_len].copy_from_slice(&advertisement[..adv_len]);
        rsp[..rsp_len].copy_from_slice(&scan_response[..rsp_len]);

        Error::from_esp(unsafe { esp_ble_gap_config_adv_data_raw(adv.as_mut_ptr(), adv_len as u32) })?;
        Error::from_esp(unsafe {
            esp_ble_gap_config_scan_rsp_data_raw(rsp.as_mut_ptr(), rsp_len as u32)
        })?;
        if let Some(p) = params {
            self.params = Some(*p);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        use esp_idf_svc::sys::*;

        let params = self.params.ok_or(Error::InvalidState)?;
        let mut esp_params = esp_adv_params(&params);
        Error::from_esp(unsafe { esp_ble_gap_start_advertising(&mut esp_params) })?;
        self.advertising = true;
        if self.notifications {
            self.start_event_timer()?;
        }
        log::info!("radio: advertising every {} us", self.event_period_us());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        use esp_idf_svc::sys::*;

        if !self.timer.is_null() {
            unsafe { esp_timer_stop(self.timer) };
        }
        Error::from_esp(unsafe { esp_ble_gap_stop_advertising() })?;
        self.advertising = false;
        Ok(())
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<()> {
        use esp_idf_svc::sys::*;

        Error::from_esp(unsafe {
            esp_ble_tx_power_set(esp_ble_power_type_t_ESP_BLE_PWR_TYPE_ADV, esp_power_level(dbm))
        })?;
        self.tx_power = dbm;
        Ok(())
    }
}

// ── Simulation path ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl BleRadio {
    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    pub fn last_configure(&self) -> Option<&ConfigureRecord> {
        self.configures.last()
    }

    pub fn configure_count(&self) -> usize {
        self.configures.len()
    }

    /// Parameters applied by the last `configure` that carried any.
    pub fn params(&self) -> Option<AdvParams> {
        self.params
    }

    pub fn fail_next_stop(&mut self, err: Error) {
        self.fail_stop = Some(err);
    }

    pub fn fail_next_start(&mut self, err: Error) {
        self.fail_start = Some(err);
    }

    /// Simulate one advertising event: the active edge, then the inactive
    /// edge.  Nothing happens unless advertising with notifications armed.
    /// Returns whether the handler ran.
    pub fn advertising_event(&self) -> bool {
        match self.handler {
            Some(handler) if self.advertising && self.notifications => {
                handler(true);
                handler(false);
                true
            }
            _ => false,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl AdvertisingRadio for BleRadio {
    fn enable_notifications(
        &mut self,
        distance: NotificationDistance,
        handler: RadioNotificationHandler,
    ) -> Result<()> {
        self.calls.push(RadioCall::EnableNotifications(distance));
        self.handler = Some(handler);
        self.notifications = true;
        Ok(())
    }

    fn disable_notifications(&mut self) -> Result<()> {
        self.calls.push(RadioCall::DisableNotifications);
        self.handler = None;
        self.notifications = false;
        Ok(())
    }

    fn configure(
        &mut self,
        advertisement: &[u8],
        scan_response: &[u8],
        params: Option<&AdvParams>,
    ) -> Result<()> {
        if advertisement.len() > 31 || scan_response.len() > 31 {
            return Err(Error::InvalidLength);
        }
        self.calls.push(RadioCall::Configure);
        self.configures.push(ConfigureRecord {
            advertisement: advertisement.to_vec(),
            scan_response: scan_response.to_vec(),
            params: params.copied(),
        });
        if let Some(p) = params {
            self.params = Some(*p);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.calls.push(RadioCall::Start);
        if let Some(err) = self.fail_start.take() {
            return Err(err);
        }
        if self.params.is_none() {
            log::warn!("radio(sim): start without parameters");
            return Err(Error::InvalidState);
        }
        self.advertising = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.calls.push(RadioCall::Stop);
        if let Some(err) = self.fail_stop.take() {
            return Err(err);
        }
        self.advertising = false;
        Ok(())
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<()> {
        self.calls.push(RadioCall::SetTxPower(dbm));
        self.tx_power = dbm;
        Ok(())
    }
}
