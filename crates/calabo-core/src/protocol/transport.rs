//! Byte transport abstraction
//!
//! The controller only needs a raw, half-duplex byte pipe to the device.
//! [`SerialTransport`](super::SerialTransport) provides one over a real serial
//! port, [`DemoGrbl`](crate::demo::DemoGrbl) provides a simulated device.

use std::time::Duration;

use super::ProtocolError;

/// How long DTR is held low when resetting through the default strategy
pub const DTR_RESET_PULSE: Duration = Duration::from_millis(100);

/// A raw byte link to a device
pub trait Transport: Send {
    /// Open the link. Opening an already open link is a no-op.
    fn open(&mut self) -> Result<(), ProtocolError>;

    /// Close the link. Further reads and writes fail with
    /// [`ProtocolError::ConnectionClosed`].
    fn close(&mut self);

    /// Whether the link is currently open
    fn is_open(&self) -> bool;

    /// Number of bytes that can be read without blocking
    fn bytes_to_read(&mut self) -> Result<usize, ProtocolError>;

    /// Read up to `buf.len()` available bytes. Returns 0 when nothing is
    /// buffered.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError>;

    /// Write all bytes to the link
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError>;

    /// Drive the DTR line
    fn set_dtr(&mut self, level: bool) -> Result<(), ProtocolError>;

    /// Power-cycle the device without reopening the link.
    ///
    /// The default pulses DTR low, which reboots Arduino-based boards.
    fn reset(&mut self) -> Result<(), ProtocolError> {
        self.set_dtr(false)?;
        std::thread::sleep(DTR_RESET_PULSE);
        self.set_dtr(true)
    }

    /// Human readable name used in log output
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), ProtocolError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn bytes_to_read(&mut self) -> Result<usize, ProtocolError> {
        (**self).bytes_to_read()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        (**self).read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        (**self).write_all(data)
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), ProtocolError> {
        (**self).set_dtr(level)
    }

    fn reset(&mut self) -> Result<(), ProtocolError> {
        (**self).reset()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
