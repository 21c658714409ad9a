//! Raw serial line to one peripheral.
//!
//! Opens a character device at 9600 baud, 8 data bits, no parity, one
//! stop bit, no hardware or software flow control, with canonical mode
//! and echo off.  The OS-level read timeout is zero (`VMIN = 0`,
//! `VTIME = 0` equivalent), so [`Transport::read`] returns immediately;
//! all waiting is done by the framing layer's poll budget.
//!
//! The channel is exclusively owned.  Dropping it closes the descriptor,
//! so the type system guarantees it is closed exactly once.

use std::io::{self, Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::config::BAUD_RATE;
use crate::error::{Device, Error};

use super::transport::Transport;

/// An opened, configured serial line.
pub struct SerialChannel {
    device: Device,
    path: String,
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open `path` for `device` and put the line into raw 8N1 mode.
    ///
    /// A missing or busy node is [`Error::DeviceUnavailable`]; a node
    /// that opens but rejects the line settings is
    /// [`Error::Configuration`].
    pub fn open(device: Device, path: &str) -> Result<Self, Error> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|source| match source.kind() {
                serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(_) => {
                    Error::DeviceUnavailable {
                        device,
                        path: path.to_owned(),
                        source,
                    }
                }
                _ => Error::Configuration {
                    device,
                    path: path.to_owned(),
                    source,
                },
            })?;

        let mut channel = Self {
            device,
            path: path.to_owned(),
            port,
        };
        channel.apply_line_settings()?;
        info!("{} opened at {} ({} 8N1 raw)", device, path, BAUD_RATE);
        Ok(channel)
    }

    /// Re-assert every line parameter and flush both directions, the
    /// equivalent of `tcsetattr(TCSAFLUSH)`.  Any failure is fatal.
    fn apply_line_settings(&mut self) -> Result<(), Error> {
        let configure = |port: &mut Box<dyn SerialPort>| -> serialport::Result<()> {
            port.set_baud_rate(BAUD_RATE)?;
            port.set_data_bits(DataBits::Eight)?;
            port.set_parity(Parity::None)?;
            port.set_stop_bits(StopBits::One)?;
            port.set_flow_control(FlowControl::None)?;
            port.set_timeout(Duration::ZERO)?;
            port.clear(ClearBuffer::All)
        };
        configure(&mut self.port).map_err(|source| Error::Configuration {
            device: self.device,
            path: self.path.clone(),
            source,
        })
    }
}

impl Transport for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // Zero OS timeout: "nothing yet" surfaces as one of these.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        debug!("{} at {} closed", self.device, self.path);
    }
}
