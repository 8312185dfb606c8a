//! The receive ring buffer.
//!
//! Received frames are stored back to back as records of the form
//! `[length: u8][sender: ADDR_LEN bytes][payload: length bytes]`. The length byte only covers
//! the payload, which is fine, since ESP-NOW frames never exceed [MAX_PACKET_SIZE] bytes.
use crate::{MacAddress, ADDR_LEN, MAX_PACKET_SIZE};

/// Size of the record header, consisting of the length byte and the sender address.
pub const RECORD_HEADER_LEN: usize = 1 + ADDR_LEN;

/// The destination buffer is too small for the pending record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoSpace {
    /// Bytes required to hold the record.
    pub required: usize,
}

/// Fixed capacity ring buffer for received frames.
///
/// Producers are interrupt handlers and the consumer is the task owning the device, so the buffer
/// lives behind the receive lock inside [EspNowResources](crate::EspNowResources).
pub struct FrameBuffer<const N: usize> {
    buffer: [u8; N],
    start: usize,
    avail: usize,
}
impl<const N: usize> FrameBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; N],
            start: 0,
            avail: 0,
        }
    }
    pub const fn capacity(&self) -> usize {
        N
    }
    /// Number of bytes currently stored, headers included.
    pub const fn len(&self) -> usize {
        self.avail
    }
    pub const fn is_empty(&self) -> bool {
        self.avail == 0
    }
    pub const fn free(&self) -> usize {
        N - self.avail
    }
    /// Drop everything.
    pub fn clear(&mut self) {
        self.start = 0;
        self.avail = 0;
    }
    fn push(&mut self, data: &[u8]) {
        let end = (self.start + self.avail) % N;
        let first = data.len().min(N - end);
        self.buffer[end..end + first].copy_from_slice(&data[..first]);
        self.buffer[..data.len() - first].copy_from_slice(&data[first..]);
        self.avail += data.len();
    }
    fn copy_out(&self, offset: usize, dest: &mut [u8]) {
        let begin = (self.start + offset) % N;
        let first = dest.len().min(N - begin);
        let rest = dest.len() - first;
        dest[..first].copy_from_slice(&self.buffer[begin..begin + first]);
        dest[first..].copy_from_slice(&self.buffer[..rest]);
    }
    fn advance(&mut self, count: usize) {
        let count = count.min(self.avail);
        self.start = (self.start + count) % N;
        self.avail -= count;
    }
    /// Append a frame.
    ///
    /// Returns `false` and leaves the buffer untouched, if the frame doesn't fit.
    pub fn enqueue(&mut self, sender: &MacAddress, payload: &[u8]) -> bool {
        if payload.len() > MAX_PACKET_SIZE || self.free() < RECORD_HEADER_LEN + payload.len() {
            return false;
        }
        self.push(&[payload.len() as u8]);
        self.push(sender.octets());
        self.push(payload);
        true
    }
    /// Size of the next record without the length byte, i.e. sender address plus payload.
    pub fn pending_size(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.buffer[self.start] as usize + ADDR_LEN)
        }
    }
    /// Check that the stored bytes cover the next record.
    pub fn is_consistent(&self) -> bool {
        match self.pending_size() {
            Some(size) => self.avail > size,
            None => true,
        }
    }
    /// Copy the next record, sender address first, into `dest` and remove it.
    ///
    /// If `dest` is too small, the record stays in the buffer.
    pub fn dequeue_into(&mut self, dest: &mut [u8]) -> Result<Option<usize>, NoSpace> {
        let Some(size) = self.pending_size() else {
            return Ok(None);
        };
        if dest.len() < size {
            return Err(NoSpace { required: size });
        }
        self.copy_out(1, &mut dest[..size]);
        self.advance(1 + size);
        Ok(Some(size))
    }
    /// Remove the next record without copying it.
    ///
    /// Returns the size it had, as reported by [Self::pending_size].
    pub fn drop_next(&mut self) -> Option<usize> {
        let size = self.pending_size()?;
        self.advance(1 + size);
        Some(size)
    }
}
impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
