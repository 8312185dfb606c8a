//! # `esp-now-netdev`
//! A network device driver, that carries frames over ESP-NOW.
//!
//! ## Overview
//! ESP-NOW is a connectionless protocol, which transports short frames of up to
//! [MAX_PACKET_SIZE] bytes between nodes, that know each others addresses. This crate wraps it
//! into the generic network device contract a network stack expects: [EspNowDevice::send],
//! [EspNowDevice::recv], [EspNowDevice::get], [EspNowDevice::set] and [EspNowDevice::isr].
//!
//! ### Receive (RX)
//! The radio's receive callback runs in interrupt context. It only appends the frame to the ring
//! buffer inside the [EspNowResources] and raises a flag, which wakes the network stack task.
//! That task then calls [EspNowDevice::isr], which reports [NetdevEvent::RxComplete], after which
//! the frame is pulled out with [EspNowDevice::recv]. Inside the ring buffer, each frame is stored
//! as a single length byte, the sender address and the payload.
//!
//! ### Transmit (TX)
//! Transmissions are synchronous. The payload is gathered into an internal buffer, handed to the
//! radio, and the caller waits until the send callback fires, calling [Config::tx_yield] in between.
//! [EspNowDevice::send_async] awaits the callback instead. If it doesn't fire within
//! [Config::tx_timeout], [NetdevError::Timeout] is returned.
//!
//! ### Addressing
//! In [AddressingMode::Unicast], every node runs a SoftAP named after a common prefix and its
//! address. Periodic scans find those access points and register them as peers. Until the first
//! scan completed, the device is not ready and neither sends nor accepts frames. In
//! [AddressingMode::Broadcast], every node uses the same well known address and no scanning
//! happens at all.
//!
//! ## Radio backends
//! The radio is abstracted by the [Radio] trait. With the `esp32` or `esp32s2` feature enabled,
//! an implementation on top of the vendor ESP-NOW API is available.

#![cfg_attr(not(test), no_std)]
pub(crate) mod fmt;

mod config;
mod device;
mod error;
mod frame_buffer;
mod netdev;
mod peer;
mod radio;
mod resources;
mod scan;
mod sync;

#[cfg(test)]
pub(crate) mod testing;

cfg_if::cfg_if! {
    if #[cfg(esp_now_backend)] {
        mod esp_now;
        pub use esp_now::{EspNowRadio, ESP_NOW_RESOURCES};
    }
}

pub use config::*;
pub use device::EspNowDevice;
pub use error::*;
pub use frame_buffer::RECORD_HEADER_LEN;
pub use netdev::*;
pub use peer::{PeerRegistration, SHARED_ADDRESS};
pub use radio::*;
pub use resources::*;
pub use scan::{advertisement_ssid, advertisement_ssid_len, ScanState, ScanSummary, ScanTimer};
pub use sync::{EventFlags, PendingEvents};

/// Maximum payload size of an ESP-NOW frame.
pub const MAX_PACKET_SIZE: usize = 250;

/// A [ScanTimer] for broadcast mode, where no rescans happen.
impl ScanTimer for () {
    fn arm(&mut self, _period: embassy_time::Duration) {}
}
