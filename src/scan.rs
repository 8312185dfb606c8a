//! Peer discovery.
//!
//! ESP-NOW only delivers unicast frames to registered peers, but the addresses of the other nodes
//! aren't known in advance. Every node therefore runs a SoftAP, whose SSID is the common prefix
//! followed by its address (see [advertisement_ssid]). Scanning for those access points yields the
//! addresses to register.
//!
//! The controller starts out [ScanState::Scanning]. Once the first scan completed, it is
//! [ScanState::Ready] for good, and the rescan timer keeps the peer list up to date.
use embassy_time::Duration;

use crate::{
    peer::{add_peer, PeerRegistration},
    AccessPointRecord, Radio, ADDR_LEN, KEY_LEN, SSID_MAX_LEN,
};

/// The OS timer used for periodic rescans.
///
/// When the timer expires, [EspNowResources::on_scan_timer](crate::EspNowResources::on_scan_timer)
/// has to be called.
pub trait ScanTimer {
    /// (Re)arm the timer to expire once after `period`.
    fn arm(&mut self, period: Duration);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanState {
    #[default]
    Scanning,
    Ready,
}

/// Statistics about one completed scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanSummary {
    /// Access points reported by the radio.
    pub access_points: usize,
    /// Access points matching the prefix.
    pub matching: usize,
    /// Peers, that weren't known before.
    pub added: usize,
}

/// Drives the discovery of peers.
pub struct ScanController {
    state: ScanState,
    channel: u8,
    ssid_prefix: &'static str,
    key: Option<[u8; KEY_LEN]>,
    scan_period: Duration,
}
impl ScanController {
    pub const fn new(
        channel: u8,
        ssid_prefix: &'static str,
        key: Option<[u8; KEY_LEN]>,
        scan_period: Duration,
    ) -> Self {
        Self {
            state: ScanState::Scanning,
            channel,
            ssid_prefix,
            key,
            scan_period,
        }
    }
    pub const fn state(&self) -> ScanState {
        self.state
    }
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, ScanState::Ready)
    }
    /// Request a non-blocking scan from the radio.
    pub fn start<R: Radio>(&self, radio: &mut R) {
        trace!("Starting peer scan on channel {}.", self.channel);
        if let Err(err) = radio.start_scan(self.channel) {
            // The next timer expiry will try again.
            warn!("Failed to start peer scan: {:?}", err);
        }
    }
    /// Check if the SSID belongs to an ESP-NOW node.
    pub fn matches(&self, ssid: &[u8]) -> bool {
        ssid.starts_with(self.ssid_prefix.as_bytes())
    }
    /// Evaluate the results of a finished scan.
    ///
    /// The access points are fetched one by one and every matching one is registered as a peer.
    /// Afterwards the results are released, the controller is ready and the rescan timer is
    /// armed, no matter if fetching the results succeeded.
    pub fn complete<R: Radio, T: ScanTimer>(
        &mut self,
        radio: &mut R,
        timer: &mut T,
    ) -> ScanSummary {
        let mut summary = ScanSummary::default();
        match radio.scan_result_count() {
            Ok(count) => {
                for _ in 0..count {
                    let record = match radio.next_scan_result() {
                        Ok(record) => record,
                        Err(err) => {
                            warn!("Failed to fetch scan result: {:?}", err);
                            break;
                        }
                    };
                    summary.access_points += 1;
                    self.evaluate(radio, &record, &mut summary);
                }
            }
            Err(err) => warn!("Failed to fetch scan results: {:?}", err),
        }
        radio.clear_scan_results();
        debug!(
            "Scan complete. APs: {} Matching: {} New peers: {}",
            summary.access_points,
            summary.matching,
            summary.added
        );
        self.state = ScanState::Ready;
        timer.arm(self.scan_period);
        summary
    }
    fn evaluate<R: Radio>(
        &self,
        radio: &mut R,
        record: &AccessPointRecord,
        summary: &mut ScanSummary,
    ) {
        if !self.matches(record.ssid()) {
            return;
        }
        summary.matching += 1;
        match add_peer(radio, record.bssid, record.channel, self.key) {
            Ok(PeerRegistration::Added) => summary.added += 1,
            Ok(PeerRegistration::AlreadyKnown) => {}
            Err(err) => warn!("Failed to add peer {:?}: {:?}", record.bssid, err),
        }
    }
}

/// Length of an advertisement SSID for the given prefix.
pub const fn advertisement_ssid_len(prefix: &str) -> usize {
    prefix.len() + 2 * ADDR_LEN
}

/// Write the SSID a node with `address` advertises into `buffer`.
///
/// This is the prefix followed by the address in lowercase hex. Returns `None`, if the result
/// doesn't fit into an SSID or into `buffer`.
pub fn advertisement_ssid<'a>(
    prefix: &str,
    address: &crate::MacAddress,
    buffer: &'a mut [u8; SSID_MAX_LEN],
) -> Option<&'a str> {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let len = advertisement_ssid_len(prefix);
    if len > SSID_MAX_LEN {
        return None;
    }
    let (head, tail) = buffer.split_at_mut(prefix.len());
    head.copy_from_slice(prefix.as_bytes());
    for (digits, octet) in tail.chunks_exact_mut(2).zip(address.octets()) {
        digits[0] = HEX[(octet >> 4) as usize];
        digits[1] = HEX[(octet & 0xf) as usize];
    }
    core::str::from_utf8(&buffer[..len]).ok()
}
