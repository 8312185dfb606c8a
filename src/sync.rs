use core::{
    future::{poll_fn, Future},
    task::Poll,
};

use atomic_waker::AtomicWaker;
use bitfield_struct::bitfield;
use embassy_time::Instant;
use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::SendStatus;

/// Conditions raised from interrupt context, which are handled by [EspNowDevice::isr](crate::EspNowDevice::isr).
#[bitfield(u8)]
pub struct PendingEvents {
    /// A frame was put into the receive buffer.
    pub rx_ready: bool,
    /// The radio finished scanning.
    pub scan_done: bool,
    /// The rescan timer expired.
    pub scan_timer: bool,
    #[bits(5)]
    pub __: u8,
}

/// A set of flags, that can be raised from interrupt context and taken from task context.
pub struct EventFlags {
    flags: AtomicU8,
    waker: AtomicWaker,
}
impl EventFlags {
    pub const fn new() -> Self {
        Self {
            flags: AtomicU8::new(0),
            waker: AtomicWaker::new(),
        }
    }
    /// Raise all flags set in `events` and wake the waiting task.
    pub fn raise(&self, events: PendingEvents) {
        self.flags.fetch_or(events.into_bits(), Ordering::Release);
        self.waker.wake();
    }
    /// Clear the flags set in `events`.
    ///
    /// Returns `true`, if any of them was set.
    pub fn take(&self, events: PendingEvents) -> bool {
        let mask = events.into_bits();
        self.flags.fetch_and(!mask, Ordering::AcqRel) & mask != 0
    }
    /// The currently raised flags.
    pub fn pending(&self) -> PendingEvents {
        PendingEvents::from_bits(self.flags.load(Ordering::Acquire))
    }
    /// Drop all raised flags.
    pub fn reset(&self) {
        self.flags.store(0, Ordering::Relaxed);
    }
    /// Asynchronously wait until at least one flag is raised.
    ///
    /// The flags are left untouched, so that [EspNowDevice::isr](crate::EspNowDevice::isr) can
    /// process them.
    pub fn wait(&self) -> impl Future<Output = PendingEvents> + use<'_> {
        poll_fn(|cx| {
            let pending = self.pending();
            if pending.into_bits() != 0 {
                Poll::Ready(pending)
            } else {
                self.waker.register(cx.waker());
                // A flag may have been raised in between.
                let pending = self.pending();
                if pending.into_bits() != 0 {
                    Poll::Ready(pending)
                } else {
                    Poll::Pending
                }
            }
        })
    }
}
impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies one transmission handed to the radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxTicket(u32);

/// Keeps track of the transmissions handed to the radio.
///
/// Both counters only ever grow. The radio reports completions in submission order, so a
/// transmission is complete once `completed` caught up with its ticket. Callbacks of timed out
/// transmissions still arrive later and are accounted to them, not to the next transmission.
pub struct TxCompletion {
    armed: AtomicU32,
    completed: AtomicU32,
    last_status: AtomicU8,
    waker: AtomicWaker,
}
impl TxCompletion {
    pub const fn new() -> Self {
        Self {
            armed: AtomicU32::new(0),
            completed: AtomicU32::new(0),
            last_status: AtomicU8::new(SendStatus::Success.into_bits()),
            waker: AtomicWaker::new(),
        }
    }
    /// Forget about all transmissions.
    pub fn reset(&self) {
        self.armed.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Release);
    }
    /// Register a transmission, before handing it to the radio.
    pub fn arm(&self) -> TxTicket {
        self.last_status
            .store(SendStatus::Success.into_bits(), Ordering::Relaxed);
        TxTicket(self.armed.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
    }
    /// Withdraw a transmission, that the radio didn't accept.
    ///
    /// No callback will arrive for it.
    pub fn cancel(&self, ticket: TxTicket) {
        let _ = self.armed.compare_exchange(
            ticket.0,
            ticket.0.wrapping_sub(1),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
    /// Called from the send callback.
    pub fn signal(&self, status: SendStatus) {
        self.last_status.store(status.into_bits(), Ordering::Relaxed);
        let armed = self.armed.load(Ordering::Acquire);
        // Completions without a pending transmission are ignored.
        let _ = self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |completed| {
                (completed != armed).then(|| completed.wrapping_add(1))
            });
        self.waker.wake();
    }
    /// Number of transmissions, whose callback is still outstanding.
    pub fn in_flight(&self) -> usize {
        self.armed
            .load(Ordering::Acquire)
            .wrapping_sub(self.completed.load(Ordering::Acquire)) as usize
    }
    /// Check if the callback for `ticket` arrived.
    pub fn is_complete(&self, ticket: TxTicket) -> bool {
        self.completed.load(Ordering::Acquire).wrapping_sub(ticket.0) as i32 >= 0
    }
    /// The status reported by the last send callback.
    pub fn last_status(&self) -> SendStatus {
        match self.last_status.load(Ordering::Relaxed) {
            0 => SendStatus::Success,
            _ => SendStatus::Fail,
        }
    }
    /// Give up on `ticket`.
    ///
    /// Its callback is still expected. Callbacks of earlier transmissions, which are outstanding
    /// by now as well, are considered lost, so that a radio dropping a callback can't stall all
    /// following transmissions.
    pub fn expire(&self, ticket: TxTicket) {
        let previous = ticket.0.wrapping_sub(1);
        let _ = self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |completed| {
                (previous.wrapping_sub(completed) as i32 > 0).then_some(previous)
            });
    }
    /// Wait until the callback for `ticket` arrived or `deadline` passed, calling `yield_now`
    /// in between.
    ///
    /// Returns `false` on timeout, after expiring the ticket.
    pub fn wait_until(
        &self,
        ticket: TxTicket,
        deadline: Instant,
        mut yield_now: impl FnMut(),
    ) -> bool {
        while !self.is_complete(ticket) {
            if Instant::now() >= deadline {
                self.expire(ticket);
                return false;
            }
            yield_now();
        }
        true
    }
    /// Asynchronously wait for the callback of `ticket`.
    pub fn wait(&self, ticket: TxTicket) -> impl Future<Output = ()> + use<'_> {
        poll_fn(move |cx| {
            if self.is_complete(ticket) {
                return Poll::Ready(());
            }
            self.waker.register(cx.waker());
            if self.is_complete(ticket) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }
}
impl Default for TxCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Duration;

    #[test]
    fn flags_are_taken_once() {
        let flags = EventFlags::new();
        flags.raise(PendingEvents::new().with_rx_ready(true));
        flags.raise(PendingEvents::new().with_scan_timer(true));
        assert!(flags.take(PendingEvents::new().with_rx_ready(true)));
        assert!(!flags.take(PendingEvents::new().with_rx_ready(true)));
        assert!(flags.pending().scan_timer());
        assert!(!flags.pending().scan_done());
    }

    #[test]
    fn wait_resolves_on_raised_flag() {
        let flags = EventFlags::new();
        assert!(embassy_futures::poll_once(flags.wait()).is_pending());
        flags.raise(PendingEvents::new().with_scan_done(true));
        let pending = embassy_futures::block_on(flags.wait());
        assert!(pending.scan_done());
        // Waiting doesn't consume anything.
        assert!(flags.pending().scan_done());
    }

    #[test]
    fn stray_completion_is_ignored() {
        let completion = TxCompletion::new();
        completion.signal(SendStatus::Success);
        assert_eq!(completion.in_flight(), 0);
        let ticket = completion.arm();
        assert_eq!(completion.in_flight(), 1);
        assert!(!completion.is_complete(ticket));
        completion.signal(SendStatus::Fail);
        assert_eq!(completion.in_flight(), 0);
        assert_eq!(completion.last_status(), SendStatus::Fail);
        assert!(completion.wait_until(ticket, Instant::now(), || {}));
    }

    #[test]
    fn wait_times_out() {
        let completion = TxCompletion::new();
        let ticket = completion.arm();
        let mut yields = 0;
        assert!(!completion.wait_until(
            ticket,
            Instant::now() + Duration::from_millis(2),
            || yields += 1
        ));
        assert!(yields > 0);
        // The callback may still arrive.
        assert_eq!(completion.in_flight(), 1);
    }

    #[test]
    fn late_callback_belongs_to_timed_out_transmission() {
        let completion = TxCompletion::new();
        let first = completion.arm();
        assert!(!completion.wait_until(first, Instant::now(), || {}));

        let second = completion.arm();
        // The callback of the first transmission arrives while waiting for the second.
        completion.signal(SendStatus::Success);
        assert!(!completion.is_complete(second));
        assert!(!completion.wait_until(
            second,
            Instant::now() + Duration::from_millis(2),
            || {}
        ));
        completion.signal(SendStatus::Success);
        assert!(completion.is_complete(second));
        assert_eq!(completion.in_flight(), 0);
    }

    #[test]
    fn lost_callback_doesnt_stall_following_transmissions() {
        let completion = TxCompletion::new();
        let first = completion.arm();
        assert!(!completion.wait_until(first, Instant::now(), || {}));
        // The first callback never arrives.
        let second = completion.arm();
        assert!(!completion.wait_until(second, Instant::now(), || {}));
        assert_eq!(completion.in_flight(), 1);
        completion.signal(SendStatus::Success);
        assert!(completion.is_complete(second));

        let third = completion.arm();
        completion.signal(SendStatus::Success);
        assert!(completion.wait_until(third, Instant::now(), || {}));
    }

    #[test]
    fn cancelled_transmission_expects_no_callback() {
        let completion = TxCompletion::new();
        let ticket = completion.arm();
        completion.cancel(ticket);
        assert_eq!(completion.in_flight(), 0);
        let ticket = completion.arm();
        completion.signal(SendStatus::Success);
        assert!(completion.is_complete(ticket));
    }

    #[test]
    fn async_wait_resolves_on_callback() {
        let completion = TxCompletion::new();
        let ticket = completion.arm();
        assert!(embassy_futures::poll_once(completion.wait(ticket)).is_pending());
        completion.signal(SendStatus::Success);
        embassy_futures::block_on(completion.wait(ticket));
    }
}
