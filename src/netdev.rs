//! The generic network device contract.
//!
//! These are the types a network stack uses to talk to the device: option keys for
//! [EspNowDevice::get](crate::EspNowDevice::get) and [EspNowDevice::set](crate::EspNowDevice::set),
//! events reported upwards, receive requests and statistics.
use crate::MacAddress;

/// Device type tag of ESP-NOW devices.
pub const DEVICE_TYPE_ESP_NOW: u16 = 7;
/// Protocol tag of a device, that hasn't been bound to a protocol yet.
pub const PROTO_UNDEFINED: u16 = 0;

/// Keys for the option accessors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum NetOpt {
    /// The device type tag as `u16`.
    DeviceType,
    /// The protocol carried over this device as `u16`.
    Proto,
    /// The maximum payload size as `u16`.
    MaxPacketSize,
    /// The length of the hardware address as `u16`.
    AddrLen,
    /// The length of the source address as `u16`.
    SrcLen,
    /// The hardware address.
    Address,
    /// The IPv6 interface identifier derived from the address.
    Ipv6Iid,
    /// A snapshot of the statistics, see [NetStats::to_bytes].
    Stats,
    /// The channel as `u16`.
    Channel,
}

/// Events reported to the network stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetdevEvent {
    /// A frame is ready to be received.
    RxComplete,
    /// A frame was transmitted.
    TxComplete,
}

/// Receiver of [NetdevEvent]s.
///
/// This is only ever called from the task owning the device.
pub trait EventHandler {
    fn on_event(&self, event: NetdevEvent);
}
impl<F: Fn(NetdevEvent)> EventHandler for F {
    fn on_event(&self, event: NetdevEvent) {
        self(event)
    }
}

/// What [EspNowDevice::recv](crate::EspNowDevice::recv) should do with the pending frame.
#[derive(Debug)]
pub enum Recv<'a> {
    /// Return the size of the pending frame and keep it.
    Peek,
    /// Return the size of the pending frame and drop it.
    Discard,
    /// Copy the pending frame into the buffer and remove it.
    ///
    /// The buffer receives the sender address followed by the payload.
    Into(&'a mut [u8]),
}

/// Layer 2 statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetStats {
    pub tx_unicast_count: u32,
    pub tx_mcast_count: u32,
    pub tx_complete: u32,
    pub tx_failed: u32,
    pub tx_bytes: u32,
    pub rx_count: u32,
    pub rx_bytes: u32,
}
impl NetStats {
    pub const ENCODED_LEN: usize = 7 * size_of::<u32>();

    // The counters wrap around, like the byte counters of any other interface.
    pub(crate) fn record_tx(&mut self, unicast: bool, bytes: usize) {
        if unicast {
            self.tx_unicast_count = self.tx_unicast_count.wrapping_add(1);
        } else {
            self.tx_mcast_count = self.tx_mcast_count.wrapping_add(1);
        }
        self.tx_complete = self.tx_complete.wrapping_add(1);
        self.tx_bytes = self.tx_bytes.wrapping_add(bytes as u32);
    }
    pub(crate) fn record_tx_failure(&mut self) {
        self.tx_failed = self.tx_failed.wrapping_add(1);
    }
    pub(crate) fn record_rx(&mut self, bytes: usize) {
        self.rx_count = self.rx_count.wrapping_add(1);
        self.rx_bytes = self.rx_bytes.wrapping_add(bytes as u32);
    }

    /// Encode all counters in declaration order as little endian.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buffer = [0u8; Self::ENCODED_LEN];
        let counters = [
            self.tx_unicast_count,
            self.tx_mcast_count,
            self.tx_complete,
            self.tx_failed,
            self.tx_bytes,
            self.rx_count,
            self.rx_bytes,
        ];
        for (chunk, counter) in buffer.chunks_exact_mut(4).zip(counters) {
            chunk.copy_from_slice(&counter.to_le_bytes());
        }
        buffer
    }
}

/// Derive the modified EUI-64 interface identifier (RFC 4291, section 2.5.1) from the address.
pub fn ipv6_iid(address: &MacAddress) -> [u8; 8] {
    let [a, b, c, d, e, f] = *address.octets();
    // Flip the universal/local bit and put ff:fe in the middle.
    [a ^ 0x02, b, c, 0xff, 0xfe, d, e, f]
}

/// Write a `u16` option value into `buffer`.
pub(crate) fn write_u16(buffer: &mut [u8], value: u16) -> Option<usize> {
    write_bytes(buffer, &value.to_ne_bytes())
}

/// Write `value` into the start of `buffer`, if it fits.
pub(crate) fn write_bytes(buffer: &mut [u8], value: &[u8]) -> Option<usize> {
    let dest = buffer.get_mut(..value.len())?;
    dest.copy_from_slice(value);
    Some(value.len())
}
