use embassy_time::Duration;

use crate::KEY_LEN;

/// SSID prefix of nodes advertising themselves for ESP-NOW.
pub const DEFAULT_SSID_PREFIX: &str = "RIOT_ESP_";
/// Default channel used for ESP-NOW and scanning.
pub const DEFAULT_CHANNEL: u8 = 6;

/// How destinations are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressingMode {
    /// Peers are discovered by scanning for their advertisements, before unicast traffic is
    /// possible.
    #[default]
    Unicast,
    /// All nodes share one well known address, which is registered at startup. No discovery is
    /// performed.
    Broadcast,
}

/// Configuration of the ESP-NOW device.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub addressing_mode: AddressingMode,
    /// The channel to operate and scan on.
    pub channel: u8,
    /// If set, all peers are registered for encrypted transport with this key.
    pub key: Option<[u8; KEY_LEN]>,
    /// Interval between two peer scans.
    pub scan_period: Duration,
    /// Access points, whose SSID starts with this, are treated as ESP-NOW nodes.
    pub ssid_prefix: &'static str,
    /// How long to wait for the radio to confirm a transmission.
    pub tx_timeout: Duration,
    /// Called repeatedly by [EspNowDevice::send](crate::EspNowDevice::send), while waiting for
    /// the radio.
    ///
    /// If the send callback is delivered by a task on the same core, this has to yield to it.
    pub tx_yield: fn(),
}
impl Config {
    pub const fn with_addressing_mode(mut self, addressing_mode: AddressingMode) -> Self {
        self.addressing_mode = addressing_mode;
        self
    }
    pub const fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
    pub const fn with_key(mut self, key: [u8; KEY_LEN]) -> Self {
        self.key = Some(key);
        self
    }
    pub const fn with_scan_period(mut self, scan_period: Duration) -> Self {
        self.scan_period = scan_period;
        self
    }
    pub const fn with_ssid_prefix(mut self, ssid_prefix: &'static str) -> Self {
        self.ssid_prefix = ssid_prefix;
        self
    }
    pub const fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.tx_timeout = tx_timeout;
        self
    }
    pub const fn with_tx_yield(mut self, tx_yield: fn()) -> Self {
        self.tx_yield = tx_yield;
        self
    }
    /// Check if peers have to be discovered before traffic can flow.
    pub const fn is_unicast(&self) -> bool {
        matches!(self.addressing_mode, AddressingMode::Unicast)
    }
}
impl Default for Config {
    fn default() -> Self {
        Self {
            addressing_mode: AddressingMode::Unicast,
            channel: DEFAULT_CHANNEL,
            key: None,
            scan_period: Duration::from_secs(10),
            ssid_prefix: DEFAULT_SSID_PREFIX,
            tx_timeout: Duration::from_millis(100),
            tx_yield: core::hint::spin_loop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = Config::default()
            .with_addressing_mode(AddressingMode::Broadcast)
            .with_channel(11)
            .with_key([0x42; KEY_LEN])
            .with_tx_timeout(Duration::from_millis(5));
        assert!(!config.is_unicast());
        assert_eq!(config.channel, 11);
        assert_eq!(config.key, Some([0x42; KEY_LEN]));
        assert_eq!(config.tx_timeout, Duration::from_millis(5));
        assert_eq!(config.ssid_prefix, DEFAULT_SSID_PREFIX);
        assert_eq!(config.scan_period, Duration::from_secs(10));
    }
}
