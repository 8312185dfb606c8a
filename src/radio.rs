//! The interface to the vendor radio stack.
//!
//! The driver never transmits, scans or encrypts anything on its own. Everything it needs from
//! the radio is expressed by the [Radio] trait, while the radio calls back into the driver through
//! the [EspNowResources](crate::EspNowResources).
use core::fmt;

use macro_bits::serializable_enum;

/// Length of a hardware address.
pub const ADDR_LEN: usize = 6;
/// Length of the local master key used for encrypted peers.
pub const KEY_LEN: usize = 16;
/// Maximum length of an SSID, excluding the NUL terminator.
pub const SSID_MAX_LEN: usize = 32;

/// A hardware address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; ADDR_LEN]);
impl MacAddress {
    /// The all-ones address.
    pub const BROADCAST: Self = Self([0xff; ADDR_LEN]);

    pub const fn new(address: [u8; ADDR_LEN]) -> Self {
        Self(address)
    }
    /// Check if this is the all-ones address.
    pub fn is_broadcast(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0xff)
    }
    pub const fn octets(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }
}
impl From<[u8; ADDR_LEN]> for MacAddress {
    fn from(value: [u8; ADDR_LEN]) -> Self {
        Self(value)
    }
}
impl TryFrom<&[u8]> for MacAddress {
    type Error = core::array::TryFromSliceError;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        value.try_into().map(Self)
    }
}
impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A remote node, that unicast frames can be addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerEntry {
    pub address: MacAddress,
    /// The channel the peer operates on.
    pub channel: u8,
    /// If set, traffic to this peer is encrypted with this key.
    pub key: Option<[u8; KEY_LEN]>,
}

/// An access point found while scanning.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AccessPointRecord {
    ssid: [u8; SSID_MAX_LEN],
    ssid_len: u8,
    /// The BSSID, which for ESP-NOW nodes is the SoftAP address.
    pub bssid: MacAddress,
    /// The primary channel.
    pub channel: u8,
    /// Received signal strength in dBm.
    pub rssi: i8,
}
impl AccessPointRecord {
    pub const EMPTY: Self = Self {
        ssid: [0; SSID_MAX_LEN],
        ssid_len: 0,
        bssid: MacAddress([0; ADDR_LEN]),
        channel: 0,
        rssi: 0,
    };
    /// Create a new record.
    ///
    /// The SSID is cut off at the first NUL byte and at [SSID_MAX_LEN] bytes.
    pub fn new(ssid: &[u8], bssid: MacAddress, channel: u8, rssi: i8) -> Self {
        let ssid_len = ssid
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(ssid.len())
            .min(SSID_MAX_LEN);
        let mut temp = Self {
            ssid_len: ssid_len as u8,
            bssid,
            channel,
            rssi,
            ..Self::EMPTY
        };
        temp.ssid[..ssid_len].copy_from_slice(&ssid[..ssid_len]);
        temp
    }
    /// The raw SSID bytes.
    pub fn ssid(&self) -> &[u8] {
        &self.ssid[..self.ssid_len as usize]
    }
}
impl Default for AccessPointRecord {
    fn default() -> Self {
        Self::EMPTY
    }
}
impl fmt::Debug for AccessPointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPointRecord")
            .field(
                "ssid",
                &core::str::from_utf8(self.ssid()).unwrap_or("<non utf-8>"),
            )
            .field("bssid", &self.bssid)
            .field("channel", &self.channel)
            .field("rssi", &self.rssi)
            .finish()
    }
}

serializable_enum! {
    /// The outcome of a transmission, as reported by the send callback.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub enum SendStatus: u8 {
        #[default]
        Success => 0,
        Fail => 1
    }
}

/// An error reported by the vendor radio stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// The radio isn't started.
    NotStarted,
    /// The peer list is full.
    PeerListFull,
    /// Any other vendor error code.
    Vendor(i32),
}
impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "Radio not started."),
            Self::PeerListFull => write!(f, "Peer list full."),
            Self::Vendor(code) => write!(f, "Vendor error {code}."),
        }
    }
}
impl core::error::Error for RadioError {}
impl From<RadioError> for crate::NetdevError {
    fn from(_: RadioError) -> Self {
        Self::Io
    }
}

pub type RadioResult<T> = Result<T, RadioError>;

/// The capabilities the driver needs from the vendor radio stack.
///
/// Implementations also have to route the radio's receive and send callbacks into
/// [EspNowResources::on_receive](crate::EspNowResources::on_receive) and
/// [EspNowResources::on_send_complete](crate::EspNowResources::on_send_complete), and the
/// scan-done event into [EspNowResources::on_scan_done](crate::EspNowResources::on_scan_done).
pub trait Radio {
    /// Start a non-blocking scan on the specified channel.
    fn start_scan(&mut self, channel: u8) -> RadioResult<()>;
    /// Number of access points found by the last scan.
    fn scan_result_count(&mut self) -> RadioResult<usize>;
    /// Fetch the next access point found by the last scan.
    fn next_scan_result(&mut self) -> RadioResult<AccessPointRecord>;
    /// Release the results of the last scan.
    ///
    /// This is called after every scan evaluation, even if fetching failed.
    fn clear_scan_results(&mut self);
    /// Check if the peer is registered.
    fn peer_exists(&self, address: &MacAddress) -> bool;
    /// Register a peer.
    fn add_peer(&mut self, peer: &PeerEntry) -> RadioResult<()>;
    /// Hand a frame to the radio.
    ///
    /// If `destination` is `None`, the frame is sent to all registered peers. Completion is
    /// reported asynchronously through the send callback.
    fn send(&mut self, destination: Option<&MacAddress>, data: &[u8]) -> RadioResult<()>;
    /// The address of the interface used for ESP-NOW.
    fn hardware_address(&self) -> MacAddress;
}
