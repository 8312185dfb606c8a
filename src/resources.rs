use core::cell::RefCell;

use embassy_sync::blocking_mutex::{self, raw::CriticalSectionRawMutex};
use portable_atomic::{AtomicBool, Ordering};

use crate::{
    frame_buffer::FrameBuffer,
    sync::{EventFlags, PendingEvents, TxCompletion},
    MacAddress, SendStatus,
};

/// Default size of the receive buffer in bytes.
pub const DEFAULT_RX_BUFFER_SIZE: usize = 1500;

const RX_READY: PendingEvents = PendingEvents::new().with_rx_ready(true);
const SCAN_DONE: PendingEvents = PendingEvents::new().with_scan_done(true);
const SCAN_TIMER: PendingEvents = PendingEvents::new().with_scan_timer(true);

/// Everything shared between the radio callbacks and the [EspNowDevice](crate::EspNowDevice).
///
/// The radio callbacks don't carry a context argument, so this is meant to live in a `static`,
/// which the callbacks can reach. It's `const` constructible for that reason. Interrupt context
/// only ever touches the receive buffer, which is guarded by a critical section, and atomics.
pub struct EspNowResources<const RX_BUFFER_SIZE: usize = DEFAULT_RX_BUFFER_SIZE> {
    rx_buffer: blocking_mutex::Mutex<CriticalSectionRawMutex, RefCell<FrameBuffer<RX_BUFFER_SIZE>>>,
    events: EventFlags,
    tx_completion: TxCompletion,
    /// Mirrors the scan state for interrupt context.
    ready: AtomicBool,
    claimed: AtomicBool,
}
impl<const RX_BUFFER_SIZE: usize> EspNowResources<RX_BUFFER_SIZE> {
    pub const fn new() -> Self {
        Self {
            rx_buffer: blocking_mutex::Mutex::new(RefCell::new(FrameBuffer::new())),
            events: EventFlags::new(),
            tx_completion: TxCompletion::new(),
            ready: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }
    /// Bind the resources to a device and reset them.
    ///
    /// Returns `false`, if they're already in use.
    pub(crate) fn claim(&self) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.ready.store(false, Ordering::Release);
        self.with_rx_buffer(|rx_buffer| rx_buffer.clear());
        self.events.reset();
        self.tx_completion.reset();
        true
    }
    pub(crate) fn release(&self) {
        self.ready.store(false, Ordering::Release);
        self.claimed.store(false, Ordering::Release);
    }
    pub(crate) fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
    /// Check if frames are accepted.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
    /// Run `f` with exclusive access to the receive buffer.
    ///
    /// Interrupts are disabled meanwhile, so keep it short.
    pub(crate) fn with_rx_buffer<U>(
        &self,
        f: impl FnOnce(&mut FrameBuffer<RX_BUFFER_SIZE>) -> U,
    ) -> U {
        self.rx_buffer.lock(|rx_buffer| f(&mut rx_buffer.borrow_mut()))
    }
    pub(crate) fn tx_completion(&self) -> &TxCompletion {
        &self.tx_completion
    }
    /// The pending events of the device.
    ///
    /// A network stack task can await [EventFlags::wait] and call
    /// [EspNowDevice::isr](crate::EspNowDevice::isr) afterwards.
    pub fn events(&self) -> &EventFlags {
        &self.events
    }
    pub(crate) fn take_rx_ready(&self) -> bool {
        self.events.take(RX_READY)
    }
    pub(crate) fn take_scan_done(&self) -> bool {
        self.events.take(SCAN_DONE)
    }
    pub(crate) fn take_scan_timer(&self) -> bool {
        self.events.take(SCAN_TIMER)
    }
    /// To be called from the radio's receive callback.
    ///
    /// Frames received before peer discovery finished, or that don't fit into the receive
    /// buffer, are dropped.
    pub fn on_receive(&self, sender: &MacAddress, data: &[u8]) {
        if !self.is_ready() {
            return;
        }
        if self.with_rx_buffer(|rx_buffer| rx_buffer.enqueue(sender, data)) {
            self.events.raise(RX_READY);
        } else {
            trace!("Receive buffer full, dropping frame of {} bytes.", data.len());
        }
    }
    /// To be called from the radio's send callback.
    pub fn on_send_complete(&self, status: SendStatus) {
        self.tx_completion.signal(status);
    }
    /// To be called, when the radio reports, that a scan finished.
    pub fn on_scan_done(&self) {
        self.events.raise(SCAN_DONE);
    }
    /// To be called, when the rescan timer expires.
    pub fn on_scan_timer(&self) {
        self.events.raise(SCAN_TIMER);
    }
}
impl<const RX_BUFFER_SIZE: usize> Default for EspNowResources<RX_BUFFER_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
