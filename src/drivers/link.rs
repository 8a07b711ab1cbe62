use crate::error::DynFuture;
use std::io;

/// Control of the transceiver's driver enable input.
pub trait DriverEnable {
    /// true puts the transceiver in transmit mode, false in receive mode
    fn set_driver_enable(&mut self, transmit: bool) -> io::Result<()>;
}

/// Byte channel to a half-duplex bus.
pub trait SerialLink: DriverEnable + Send {
    /// Drop anything already received. Returns the number of bytes dropped,
    /// if known.
    fn discard_input(&mut self) -> DynFuture<'_, io::Result<usize>>;

    /// Write all bytes in one go. Completes when the bytes have been
    /// shifted out on the bus.
    fn write_frame<'a>(&'a mut self, bytes: &'a [u8]) -> DynFuture<'a, io::Result<()>>;

    /// Wait for at least one byte. Returns 0 if the link is closed.
    fn read_some<'a>(&'a mut self, buf: &'a mut [u8]) -> DynFuture<'a, io::Result<usize>>;
}
