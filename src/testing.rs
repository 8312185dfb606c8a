//! Host-side stand-ins for the radio and the OS timer.
use std::vec::Vec;

use embassy_time::Duration;

use crate::{
    scan::ScanTimer, AccessPointRecord, MacAddress, PeerEntry, Radio, RadioError, RadioResult,
    SendStatus,
};

/// A radio, that records everything done to it.
///
/// If `completion` is set, it's called synchronously from [Radio::send], like a send callback
/// firing before the call returns.
#[derive(Default)]
pub struct MockRadio<'a> {
    pub address: MacAddress,
    pub peers: Vec<PeerEntry>,
    pub access_points: Vec<AccessPointRecord>,
    /// Returned when asking for the number of results.
    pub scan_error: Option<RadioError>,
    /// Index of the result, that fails to be fetched.
    pub fetch_error_at: Option<usize>,
    pub scan_cursor: usize,
    pub scan_results_cleared: usize,
    pub scans_started: Vec<u8>,
    pub sent: Vec<(Option<MacAddress>, Vec<u8>)>,
    pub reject_send: Option<RadioError>,
    pub completion: Option<&'a dyn Fn(SendStatus)>,
}
impl Radio for MockRadio<'_> {
    fn start_scan(&mut self, channel: u8) -> RadioResult<()> {
        self.scans_started.push(channel);
        Ok(())
    }
    fn scan_result_count(&mut self) -> RadioResult<usize> {
        match self.scan_error {
            Some(err) => Err(err),
            None => Ok(self.access_points.len()),
        }
    }
    fn next_scan_result(&mut self) -> RadioResult<AccessPointRecord> {
        if self.fetch_error_at == Some(self.scan_cursor) {
            return Err(RadioError::Vendor(-1));
        }
        let record = self
            .access_points
            .get(self.scan_cursor)
            .copied()
            .ok_or(RadioError::Vendor(-1))?;
        self.scan_cursor += 1;
        Ok(record)
    }
    fn clear_scan_results(&mut self) {
        self.scan_cursor = 0;
        self.scan_results_cleared += 1;
    }
    fn peer_exists(&self, address: &MacAddress) -> bool {
        self.peers.iter().any(|peer| peer.address == *address)
    }
    fn add_peer(&mut self, peer: &PeerEntry) -> RadioResult<()> {
        self.peers.push(*peer);
        Ok(())
    }
    fn send(&mut self, destination: Option<&MacAddress>, data: &[u8]) -> RadioResult<()> {
        if let Some(err) = self.reject_send {
            return Err(err);
        }
        self.sent.push((destination.copied(), data.to_vec()));
        if let Some(completion) = self.completion {
            completion(SendStatus::Success);
        }
        Ok(())
    }
    fn hardware_address(&self) -> MacAddress {
        self.address
    }
}

#[derive(Default)]
pub struct MockTimer {
    pub armed: Vec<Duration>,
}
impl ScanTimer for MockTimer {
    fn arm(&mut self, period: Duration) {
        self.armed.push(period);
    }
}
