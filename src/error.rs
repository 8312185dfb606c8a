use core::fmt;

/// Errors returned by the device operations.
///
/// Every variant maps onto a negative errno value through [NetdevError::errno], for glue code
/// that needs the signed return convention of a C network stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetdevError {
    /// Peer discovery hasn't finished yet.
    NotReady,
    /// The call was malformed.
    InvalidArgument,
    /// An option value doesn't fit into the provided buffer, or has the wrong size.
    Overflow,
    /// The receive buffer is smaller than the pending frame.
    NoBufferSpace,
    /// The payload exceeds the maximum frame size.
    PayloadTooLarge,
    /// The radio rejected the operation.
    Io,
    /// The option isn't supported by this device.
    NotSupported,
    /// The radio never reported completion of a transmission.
    Timeout,
    /// The receive ring buffer contradicts its own bookkeeping.
    ///
    /// This is a bug in the driver and never goes away by retrying.
    BufferCorrupted,
    /// The resources are already bound to a device.
    AlreadyInitialized,
}
impl NetdevError {
    /// The negative errno value of this error.
    pub const fn errno(self) -> i32 {
        -(match self {
            Self::NotReady => errno::ENODEV,
            Self::InvalidArgument => errno::EINVAL,
            Self::Overflow => errno::EOVERFLOW,
            Self::NoBufferSpace => errno::ENOBUFS,
            Self::PayloadTooLarge => errno::EBADMSG,
            Self::Io | Self::BufferCorrupted => errno::EIO,
            Self::NotSupported => errno::ENOTSUP,
            Self::Timeout => errno::ETIMEDOUT,
            Self::AlreadyInitialized => errno::EALREADY,
        })
    }
}
impl fmt::Display for NetdevError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotReady => "Peer discovery not finished.",
            Self::InvalidArgument => "Invalid argument.",
            Self::Overflow => "Value doesn't fit into the buffer.",
            Self::NoBufferSpace => "Receive buffer too small for the pending frame.",
            Self::PayloadTooLarge => "Payload exceeds the maximum frame size.",
            Self::Io => "Radio rejected the operation.",
            Self::NotSupported => "Option not supported.",
            Self::Timeout => "Transmission wasn't confirmed in time.",
            Self::BufferCorrupted => "Receive buffer bookkeeping is inconsistent.",
            Self::AlreadyInitialized => "Device already initialized.",
        })
    }
}
impl core::error::Error for NetdevError {}

/// Flatten a result into the signed return convention, where negative values are errors.
pub fn to_errno(result: NetdevResult<usize>) -> i32 {
    match result {
        Ok(len) => len.min(i32::MAX as usize) as i32,
        Err(err) => err.errno(),
    }
}

pub type NetdevResult<T> = Result<T, NetdevError>;

/// Errno values, as used by newlib and the ESP-IDF.
mod errno {
    pub const EIO: i32 = 5;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const EBADMSG: i32 = 77;
    pub const ENOBUFS: i32 = 105;
    pub const ENOTSUP: i32 = 134;
    pub const ETIMEDOUT: i32 = 116;
    pub const EALREADY: i32 = 120;
    pub const EOVERFLOW: i32 = 139;
}
