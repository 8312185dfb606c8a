use embassy_time::{with_timeout, Instant};

use crate::{
    error::{NetdevError, NetdevResult},
    frame_buffer::NoSpace,
    netdev::{
        ipv6_iid, write_bytes, write_u16, EventHandler, NetOpt, NetStats, NetdevEvent, Recv,
        DEVICE_TYPE_ESP_NOW, PROTO_UNDEFINED,
    },
    peer::{add_peer, PeerRegistration, SHARED_ADDRESS},
    scan::{ScanController, ScanState, ScanTimer},
    sync::TxTicket,
    AddressingMode, Config, EspNowResources, MacAddress, Radio, SendStatus, ADDR_LEN,
    MAX_PACKET_SIZE,
};

/// A frame handed to the radio, whose confirmation is outstanding.
struct Transmission {
    ticket: TxTicket,
    destination: Option<MacAddress>,
    length: usize,
}

/// The ESP-NOW network device.
///
/// There is exactly one of these per set of [EspNowResources]. All operations take `&mut self`,
/// so the task owning the device is the only one using it, while the radio callbacks only ever go
/// through the resources.
pub struct EspNowDevice<'res, R: Radio, T: ScanTimer, const RX_BUFFER_SIZE: usize> {
    resources: &'res EspNowResources<RX_BUFFER_SIZE>,
    radio: R,
    scan_timer: T,
    config: Config,
    address: MacAddress,
    proto: u16,
    /// Only present in unicast mode.
    scan: Option<ScanController>,
    tx_buffer: [u8; MAX_PACKET_SIZE],
    #[cfg(feature = "netstats")]
    stats: NetStats,
    event_handler: Option<&'res dyn EventHandler>,
}
impl<'res, R: Radio, T: ScanTimer, const RX_BUFFER_SIZE: usize>
    EspNowDevice<'res, R, T, RX_BUFFER_SIZE>
{
    /// Set up the device.
    ///
    /// In unicast mode, the first peer scan is started right away and the device becomes ready
    /// once it completes. In broadcast mode, the shared address is registered as the only peer
    /// and the device is ready immediately.
    pub fn new(
        resources: &'res EspNowResources<RX_BUFFER_SIZE>,
        mut radio: R,
        scan_timer: T,
        config: Config,
    ) -> NetdevResult<Self> {
        if !(1..=14).contains(&config.channel) {
            return Err(NetdevError::InvalidArgument);
        }
        if !resources.claim() {
            debug!("Resources are already bound to a device.");
            return Err(NetdevError::AlreadyInitialized);
        }
        let address = radio.hardware_address();
        trace!(
            "Initializing ESP-NOW device {:?} in {:?} mode.",
            address,
            config.addressing_mode
        );
        let scan = match config.addressing_mode {
            AddressingMode::Unicast => {
                let scan = ScanController::new(
                    config.channel,
                    config.ssid_prefix,
                    config.key,
                    config.scan_period,
                );
                scan.start(&mut radio);
                Some(scan)
            }
            AddressingMode::Broadcast => {
                let res = add_peer(&mut radio, SHARED_ADDRESS, config.channel, config.key);
                debug!("Registering shared address. Result: {:?}", res);
                resources.set_ready();
                None
            }
        };
        Ok(Self {
            resources,
            radio,
            scan_timer,
            config,
            address,
            proto: PROTO_UNDEFINED,
            scan,
            tx_buffer: [0u8; MAX_PACKET_SIZE],
            #[cfg(feature = "netstats")]
            stats: NetStats::default(),
            event_handler: None,
        })
    }
    /// Set the receiver of [NetdevEvent]s.
    pub fn set_event_handler(&mut self, event_handler: &'res dyn EventHandler) {
        self.event_handler = Some(event_handler);
    }
    fn emit(&self, event: NetdevEvent) {
        if let Some(event_handler) = self.event_handler {
            event_handler.on_event(event);
        }
    }
    /// Reset the statistics.
    pub fn init(&mut self) -> NetdevResult<()> {
        #[cfg(feature = "netstats")]
        {
            self.stats = NetStats::default();
        }
        Ok(())
    }
    /// Check if traffic can flow, which requires the first scan to be complete in unicast mode.
    pub fn is_ready(&self) -> bool {
        self.scan.as_ref().is_none_or(ScanController::is_ready)
    }
    pub fn scan_state(&self) -> ScanState {
        self.scan
            .as_ref()
            .map_or(ScanState::Ready, ScanController::state)
    }
    pub fn address(&self) -> MacAddress {
        self.address
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    #[cfg(feature = "netstats")]
    pub fn stats(&self) -> &NetStats {
        &self.stats
    }
    pub fn resources(&self) -> &'res EspNowResources<RX_BUFFER_SIZE> {
        self.resources
    }
    pub fn radio(&self) -> &R {
        &self.radio
    }
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
    /// Transmit a frame.
    ///
    /// `fragments` starts with the destination address, followed by at least one payload
    /// fragment. The all-ones address means broadcast, any other address is used as the unicast
    /// destination in unicast mode. In broadcast mode, frames always go to the shared address.
    ///
    /// This blocks until the radio confirmed the transmission, or the configured timeout elapsed,
    /// calling [Config::tx_yield] meanwhile. Returns the number of payload bytes sent.
    pub fn send(&mut self, fragments: &[&[u8]]) -> NetdevResult<usize> {
        let transmission = self.submit(fragments)?;
        let confirmed = self.resources.tx_completion().wait_until(
            transmission.ticket,
            Instant::now() + self.config.tx_timeout,
            self.config.tx_yield,
        );
        self.finish(transmission, confirmed)
    }
    /// Transmit a frame, asynchronously waiting for the radio to confirm it.
    ///
    /// See [Self::send] for the meaning of `fragments`.
    pub async fn send_async(&mut self, fragments: &[&[u8]]) -> NetdevResult<usize> {
        let transmission = self.submit(fragments)?;
        let tx_completion = self.resources.tx_completion();
        let confirmed = with_timeout(
            self.config.tx_timeout,
            tx_completion.wait(transmission.ticket),
        )
        .await
        .is_ok();
        if !confirmed {
            tx_completion.expire(transmission.ticket);
        }
        self.finish(transmission, confirmed)
    }
    /// Validate and gather the frame and hand it to the radio.
    fn submit(&mut self, fragments: &[&[u8]]) -> NetdevResult<Transmission> {
        if !self.is_ready() {
            return Err(NetdevError::NotReady);
        }
        let [destination, payload @ ..] = fragments else {
            return Err(NetdevError::InvalidArgument);
        };
        if payload.is_empty() {
            return Err(NetdevError::InvalidArgument);
        }
        let destination =
            MacAddress::try_from(*destination).map_err(|_| NetdevError::InvalidArgument)?;
        let destination = match self.config.addressing_mode {
            AddressingMode::Unicast => (!destination.is_broadcast()).then_some(destination),
            AddressingMode::Broadcast => Some(SHARED_ADDRESS),
        };

        let mut length = 0;
        for fragment in payload {
            let end = length + fragment.len();
            if end > MAX_PACKET_SIZE {
                debug!(
                    "Payload length exceeds maximum ({} > {}).",
                    end,
                    MAX_PACKET_SIZE
                );
                return Err(NetdevError::PayloadTooLarge);
            }
            self.tx_buffer[length..end].copy_from_slice(fragment);
            length = end;
        }
        trace!("Sending {} bytes to {:?}.", length, destination);

        let tx_completion = self.resources.tx_completion();
        let ticket = tx_completion.arm();
        if let Err(err) = self
            .radio
            .send(destination.as_ref(), &self.tx_buffer[..length])
        {
            tx_completion.cancel(ticket);
            debug!("Radio rejected frame: {:?}", err);
            #[cfg(feature = "netstats")]
            self.stats.record_tx_failure();
            return Err(err.into());
        }
        Ok(Transmission {
            ticket,
            destination,
            length,
        })
    }
    fn finish(&mut self, transmission: Transmission, confirmed: bool) -> NetdevResult<usize> {
        if !confirmed {
            warn!("Radio didn't confirm transmission in time.");
            #[cfg(feature = "netstats")]
            self.stats.record_tx_failure();
            return Err(NetdevError::Timeout);
        }
        if self.resources.tx_completion().last_status() == SendStatus::Fail {
            debug!(
                "Transmission to {:?} wasn't acknowledged.",
                transmission.destination
            );
        }
        #[cfg(feature = "netstats")]
        self.stats.record_tx(
            self.config.is_unicast() && transmission.destination.is_some(),
            transmission.length,
        );
        self.emit(NetdevEvent::TxComplete);
        Ok(transmission.length)
    }
    /// Receive a frame.
    ///
    /// With [Recv::Peek] and [Recv::Discard], the size of the pending frame is returned, or zero if
    /// there is none. With [Recv::Into], the sender address and payload of the pending frame are
    /// copied into the buffer and their combined length is returned. If the buffer is too small,
    /// [NetdevError::NoBufferSpace] is returned and the frame stays queued.
    pub fn recv(&mut self, request: Recv<'_>) -> NetdevResult<usize> {
        let res = self.resources.with_rx_buffer(|rx_buffer| {
            if !rx_buffer.is_consistent() {
                return Err(NetdevError::BufferCorrupted);
            }
            match request {
                Recv::Peek => Ok((rx_buffer.pending_size().unwrap_or(0), None)),
                Recv::Discard => Ok((rx_buffer.drop_next().unwrap_or(0), None)),
                Recv::Into(buffer) if buffer.is_empty() => Err(NetdevError::InvalidArgument),
                Recv::Into(buffer) => match rx_buffer.dequeue_into(buffer) {
                    Ok(Some(size)) => {
                        let mut sender = [0u8; ADDR_LEN];
                        sender.copy_from_slice(&buffer[..ADDR_LEN]);
                        Ok((size, Some(MacAddress(sender))))
                    }
                    Ok(None) => Ok((0, None)),
                    Err(NoSpace { required }) => {
                        debug!(
                            "Receive buffer too small ({} < {}).",
                            buffer.len(),
                            required
                        );
                        Err(NetdevError::NoBufferSpace)
                    }
                },
            }
        });
        let (size, sender) = match res {
            Ok(received) => received,
            Err(NetdevError::BufferCorrupted) => {
                error!("Receive buffer bookkeeping is inconsistent.");
                return Err(NetdevError::BufferCorrupted);
            }
            Err(err) => return Err(err),
        };
        let Some(sender) = sender else {
            return Ok(size);
        };
        trace!(
            "Received {} bytes from {:?}.",
            size - ADDR_LEN,
            sender
        );
        if self.config.is_unicast() && self.is_ready() {
            match add_peer(&mut self.radio, sender, self.config.channel, self.config.key) {
                Ok(PeerRegistration::Added) => debug!("Learned peer {:?}.", sender),
                Ok(PeerRegistration::AlreadyKnown) => {}
                Err(err) => warn!("Failed to add peer {:?}: {:?}", sender, err),
            }
        }
        #[cfg(feature = "netstats")]
        self.stats.record_rx(size);
        Ok(size)
    }
    /// Read an option into `value`.
    ///
    /// Returns the number of bytes written.
    pub fn get(&self, opt: NetOpt, value: &mut [u8]) -> NetdevResult<usize> {
        let written = match opt {
            NetOpt::DeviceType => write_u16(value, DEVICE_TYPE_ESP_NOW),
            NetOpt::Proto if value.len() != size_of::<u16>() => None,
            NetOpt::Proto => write_u16(value, self.proto),
            NetOpt::MaxPacketSize => write_u16(value, MAX_PACKET_SIZE as u16),
            NetOpt::AddrLen | NetOpt::SrcLen => write_u16(value, ADDR_LEN as u16),
            NetOpt::Address => write_bytes(value, self.address.octets()),
            NetOpt::Ipv6Iid => write_bytes(value, &ipv6_iid(&self.address)),
            #[cfg(feature = "netstats")]
            NetOpt::Stats => write_bytes(value, &self.stats.to_bytes()),
            #[cfg(not(feature = "netstats"))]
            NetOpt::Stats => {
                debug!("Statistics are disabled.");
                return Err(NetdevError::NotSupported);
            }
            NetOpt::Channel => write_u16(value, self.config.channel as u16),
        };
        written.ok_or(NetdevError::Overflow)
    }
    /// Write an option.
    ///
    /// Returns the number of bytes consumed from `value`.
    pub fn set(&mut self, opt: NetOpt, value: &[u8]) -> NetdevResult<usize> {
        match opt {
            NetOpt::Proto => {
                let proto: [u8; 2] = value.try_into().map_err(|_| NetdevError::Overflow)?;
                self.proto = u16::from_ne_bytes(proto);
                Ok(proto.len())
            }
            NetOpt::Address => {
                let address = value
                    .get(..ADDR_LEN)
                    .and_then(|address| MacAddress::try_from(address).ok())
                    .ok_or(NetdevError::Overflow)?;
                self.address = address;
                Ok(ADDR_LEN)
            }
            NetOpt::DeviceType
            | NetOpt::MaxPacketSize
            | NetOpt::AddrLen
            | NetOpt::SrcLen
            | NetOpt::Ipv6Iid
            | NetOpt::Stats
            | NetOpt::Channel => {
                debug!("{:?} is read only.", opt);
                Err(NetdevError::NotSupported)
            }
        }
    }
    /// Handle one pending event in task context.
    ///
    /// Received frames are reported to the event handler first. After that, finished scans are
    /// evaluated and expired rescan timers start a new scan. Call this repeatedly, until
    /// [EventFlags::pending](crate::EventFlags::pending) is empty.
    pub fn isr(&mut self) {
        if self.resources.take_rx_ready() {
            self.emit(NetdevEvent::RxComplete);
        } else if self.resources.take_scan_done() {
            if let Some(scan) = self.scan.as_mut() {
                scan.complete(&mut self.radio, &mut self.scan_timer);
                self.resources.set_ready();
            }
        } else if self.resources.take_scan_timer() {
            if let Some(scan) = self.scan.as_ref() {
                scan.start(&mut self.radio);
            }
        }
    }
}
impl<R: Radio, T: ScanTimer, const RX_BUFFER_SIZE: usize> Drop
    for EspNowDevice<'_, R, T, RX_BUFFER_SIZE>
{
    fn drop(&mut self) {
        // Stop accepting frames and free the resources for the next device.
        self.resources.release();
    }
}
