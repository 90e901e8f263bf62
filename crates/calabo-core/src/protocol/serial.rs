//! Serial port handling
//!
//! Provides low-level serial port access for Grbl communication.

use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use super::{ProtocolError, Transport, DEFAULT_BAUD_RATE};

/// Blocking read timeout handed to the OS driver. Reads are only issued
/// after `bytes_to_read` reports data, so this is rarely reached.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A [`Transport`] over a physical (or pty) serial port
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create a transport for `port_name` (not yet opened)
    pub fn new(port_name: impl Into<String>, baud_rate: Option<u32>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            port: None,
        }
    }

    /// Configured baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, ProtocolError> {
        self.port.as_mut().ok_or(ProtocolError::ConnectionClosed)
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// Open a serial port at the given baud rate
pub fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(name, baud_rate)
        .timeout(PORT_READ_TIMEOUT)
        .open()
        .map_err(map_serial_error)
}

/// Configure a serial port for Grbl: 8N1, no flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(map_serial_error)?;
    port.set_parity(serialport::Parity::None)
        .map_err(map_serial_error)?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(map_serial_error)?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(map_serial_error)?;
    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(ClearBuffer::All).map_err(map_serial_error)
}

fn map_serial_error(e: serialport::Error) -> ProtocolError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => ProtocolError::ConnectionClosed,
        _ => ProtocolError::SerialError(e.to_string()),
    }
}

fn map_io_error(e: std::io::Error) -> ProtocolError {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof | ErrorKind::NotConnected => {
            ProtocolError::ConnectionClosed
        }
        _ => ProtocolError::IoError(e),
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<(), ProtocolError> {
        if self.port.is_some() {
            return Ok(());
        }

        let mut port = open_port(&self.port_name, self.baud_rate)?;
        configure_port(port.as_mut())?;
        clear_buffers(port.as_mut())?;

        tracing::info!(port = %self.port_name, baud = self.baud_rate, "serial port opened");
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!(port = %self.port_name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_to_read(&mut self) -> Result<usize, ProtocolError> {
        let n = self.port()?.bytes_to_read().map_err(map_serial_error)?;
        Ok(n as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(0)
            }
            Err(e) => Err(map_io_error(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let port = self.port()?;
        port.write_all(data).map_err(map_io_error)?;
        port.flush().map_err(map_io_error)
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), ProtocolError> {
        self.port()?
            .write_data_terminal_ready(level)
            .map_err(map_serial_error)
    }

    fn reset(&mut self) -> Result<(), ProtocolError> {
        tracing::debug!(port = %self.port_name, "resetting device via DTR");
        self.set_dtr(false)?;
        std::thread::sleep(super::transport::DTR_RESET_PULSE);
        self.set_dtr(true)?;
        // Drop whatever the board emitted while going down
        clear_buffers(self.port()?.as_mut())
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopened_port_reports_closed() {
        let mut transport = SerialTransport::new("/dev/null-calabo", None);
        assert!(!transport.is_open());
        assert!(matches!(
            transport.bytes_to_read(),
            Err(ProtocolError::ConnectionClosed)
        ));
        assert!(matches!(
            transport.write_all(b"$$\n"),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_default_baud_rate() {
        let transport = SerialTransport::new("/dev/ttyACM0", None);
        assert_eq!(transport.baud_rate(), DEFAULT_BAUD_RATE);
        let transport = SerialTransport::new("/dev/ttyACM0", Some(9600));
        assert_eq!(transport.baud_rate(), 9600);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-calabo", None);
        assert!(transport.open().is_err());
        assert!(!transport.is_open());
    }
}
