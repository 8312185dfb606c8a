//! [Radio] implementation on top of the vendor ESP-NOW and scan API.
//!
//! The Wi-Fi driver has to be started in station + SoftAP mode, with the SoftAP advertising
//! [advertisement_ssid](crate::advertisement_ssid), before [EspNowRadio::new] is called. The
//! vendor event loop has to forward the scan-done event to [ESP_NOW_RESOURCES].
use core::ffi::c_int;

use esp_wifi_sys::include::{
    esp_now_add_peer, esp_now_init, esp_now_is_peer_exist, esp_now_peer_info_t,
    esp_now_register_recv_cb, esp_now_register_send_cb, esp_now_send, esp_now_send_status_t,
    esp_wifi_clear_ap_list, esp_wifi_get_mac, esp_wifi_scan_get_ap_num,
    esp_wifi_scan_get_ap_record, esp_wifi_scan_start, wifi_ap_record_t, wifi_interface_t_WIFI_IF_AP,
    wifi_scan_config_t, wifi_scan_type_t_WIFI_SCAN_TYPE_ACTIVE,
};

use crate::{
    AccessPointRecord, EspNowResources, MacAddress, PeerEntry, Radio, RadioError, RadioResult,
    SendStatus, ADDR_LEN, KEY_LEN,
};

/// The resources the vendor callbacks deliver into.
pub static ESP_NOW_RESOURCES: EspNowResources = EspNowResources::new();

const ESP_OK: c_int = 0;
const ESP_ERR_ESPNOW_NOT_INIT: c_int = 0x3065;
const ESP_ERR_ESPNOW_FULL: c_int = 0x3068;
/// Upper bound for the active scan dwell time per channel in milliseconds.
const SCAN_TIME_MAX_MS: u32 = 120;

fn check(code: c_int) -> RadioResult<()> {
    match code {
        ESP_OK => Ok(()),
        ESP_ERR_ESPNOW_NOT_INIT => Err(RadioError::NotStarted),
        ESP_ERR_ESPNOW_FULL => Err(RadioError::PeerListFull),
        code => Err(RadioError::Vendor(code)),
    }
}

#[cfg(recv_info_callback)]
unsafe extern "C" fn recv_cb(
    info: *const esp_wifi_sys::include::esp_now_recv_info_t,
    data: *const u8,
    len: c_int,
) {
    if info.is_null() || data.is_null() || len < 0 {
        return;
    }
    let mut sender = [0u8; ADDR_LEN];
    sender.copy_from_slice(core::slice::from_raw_parts((*info).src_addr, ADDR_LEN));
    ESP_NOW_RESOURCES.on_receive(
        &MacAddress(sender),
        core::slice::from_raw_parts(data, len as usize),
    );
}
#[cfg(not(recv_info_callback))]
unsafe extern "C" fn recv_cb(mac: *const u8, data: *const u8, len: c_int) {
    if mac.is_null() || data.is_null() || len < 0 {
        return;
    }
    let mut sender = [0u8; ADDR_LEN];
    sender.copy_from_slice(core::slice::from_raw_parts(mac, ADDR_LEN));
    ESP_NOW_RESOURCES.on_receive(
        &MacAddress(sender),
        core::slice::from_raw_parts(data, len as usize),
    );
}
unsafe extern "C" fn send_cb(_mac: *const u8, status: esp_now_send_status_t) {
    ESP_NOW_RESOURCES.on_send_complete(if status == 0 {
        SendStatus::Success
    } else {
        SendStatus::Fail
    });
}

/// The ESP-NOW radio of the chip.
pub struct EspNowRadio {
    _private: (),
}
impl EspNowRadio {
    /// Initialize ESP-NOW and register the callbacks.
    pub fn new() -> RadioResult<Self> {
        check(unsafe { esp_now_init() })?;
        check(unsafe { esp_now_register_send_cb(Some(send_cb)) })?;
        check(unsafe { esp_now_register_recv_cb(Some(recv_cb)) })?;
        trace!("ESP-NOW initialized.");
        Ok(Self { _private: () })
    }
}
impl Radio for EspNowRadio {
    fn start_scan(&mut self, channel: u8) -> RadioResult<()> {
        let mut scan_config: wifi_scan_config_t = unsafe { core::mem::zeroed() };
        scan_config.channel = channel;
        scan_config.show_hidden = true;
        scan_config.scan_type = wifi_scan_type_t_WIFI_SCAN_TYPE_ACTIVE;
        scan_config.scan_time.active.max = SCAN_TIME_MAX_MS;
        check(unsafe { esp_wifi_scan_start(&scan_config, false) })
    }
    fn scan_result_count(&mut self) -> RadioResult<usize> {
        let mut available = 0u16;
        check(unsafe { esp_wifi_scan_get_ap_num(&mut available) })?;
        Ok(available as usize)
    }
    fn next_scan_result(&mut self) -> RadioResult<AccessPointRecord> {
        // Every call pops one record off the driver's list.
        let mut raw: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        check(unsafe { esp_wifi_scan_get_ap_record(&mut raw) })?;
        Ok(AccessPointRecord::new(
            &raw.ssid,
            MacAddress(raw.bssid),
            raw.primary,
            raw.rssi,
        ))
    }
    fn clear_scan_results(&mut self) {
        if let Err(err) = check(unsafe { esp_wifi_clear_ap_list() }) {
            warn!("Failed to release the scan results: {:?}", err);
        }
    }
    fn peer_exists(&self, address: &MacAddress) -> bool {
        unsafe { esp_now_is_peer_exist(address.octets().as_ptr()) }
    }
    fn add_peer(&mut self, peer: &PeerEntry) -> RadioResult<()> {
        let mut peer_info: esp_now_peer_info_t = unsafe { core::mem::zeroed() };
        peer_info.peer_addr = peer.address.0;
        peer_info.channel = peer.channel;
        peer_info.ifidx = wifi_interface_t_WIFI_IF_AP;
        if let Some(key) = peer.key {
            peer_info.encrypt = true;
            peer_info.lmk[..KEY_LEN].copy_from_slice(&key);
        }
        check(unsafe { esp_now_add_peer(&peer_info) })
    }
    fn send(&mut self, destination: Option<&MacAddress>, data: &[u8]) -> RadioResult<()> {
        let destination = destination.map_or(core::ptr::null(), |address| address.0.as_ptr());
        check(unsafe { esp_now_send(destination, data.as_ptr(), data.len()) })
    }
    fn hardware_address(&self) -> MacAddress {
        let mut address = [0u8; ADDR_LEN];
        let res = check(unsafe { esp_wifi_get_mac(wifi_interface_t_WIFI_IF_AP, address.as_mut_ptr()) });
        if let Err(err) = res {
            warn!("Failed to read the SoftAP address: {:?}", err);
        }
        MacAddress(address)
    }
}
