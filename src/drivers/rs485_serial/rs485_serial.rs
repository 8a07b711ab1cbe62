use crate::drivers;
use crate::error::DynFuture;
use drivers::driver::{param_or, DriverInfo, OpenError};
use drivers::link::{DriverEnable, SerialLink};
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, DataBits, Parity, SerialPort, SerialStream, StopBits};

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 4800;
// Start bit, 8 data bits and stop bit
const BITS_PER_BYTE: u64 = 10;

#[derive(Debug)]
enum DriverError {
    SerialError(tokio_serial::Error),
    IoError(io::Error),
}

impl Error for DriverError {}

impl From<tokio_serial::Error> for DriverError {
    fn from(err: tokio_serial::Error) -> DriverError {
        DriverError::SerialError(err)
    }
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> DriverError {
        DriverError::IoError(err)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::SerialError(err) => write!(f, "{}", err),
            DriverError::IoError(err) => write!(f, "{}", err),
        }
    }
}

fn to_io_error(err: tokio_serial::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// How the transceiver's driver enable input is wired
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectionMode {
    /// DE follows RTS
    Rts,
    /// DE follows inverted RTS, as on most USB adapters where RTS is active low
    RtsInverted,
    /// The adapter switches direction by itself
    Auto,
}

impl std::str::FromStr for DirectionMode {
    type Err = OpenError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rts" => Ok(DirectionMode::Rts),
            "rts_inverted" => Ok(DirectionMode::RtsInverted),
            "auto" => Ok(DirectionMode::Auto),
            _ => Err(OpenError::ParameterError(
                "direction has invalid value".to_string(),
            )),
        }
    }
}

/// Time needed to shift out `len` bytes
pub fn air_time(len: usize, baud_rate: u32) -> Duration {
    if baud_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(len as u64 * BITS_PER_BYTE * 1_000_000 / u64::from(baud_rate))
}

pub struct Rs485Serial {
    serial: SerialStream,
    baud_rate: u32,
    direction: DirectionMode,
}

impl Rs485Serial {
    fn new(
        port: &str,
        baud_rate: u32,
        parity: Parity,
        direction: DirectionMode,
    ) -> Result<Rs485Serial, DriverError> {
        let builder = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(parity)
            .stop_bits(StopBits::One);
        let serial = SerialStream::open(&builder)?;
        let mut link = Rs485Serial {
            serial,
            baud_rate,
            direction,
        };
        // Start in receive mode
        link.set_driver_enable(false)?;
        debug!(
            "Opened {} at {} baud, direction control {:?}",
            port, baud_rate, direction
        );
        Ok(link)
    }
}

impl DriverEnable for Rs485Serial {
    fn set_driver_enable(&mut self, transmit: bool) -> io::Result<()> {
        let res = match self.direction {
            DirectionMode::Rts => self.serial.write_request_to_send(transmit),
            DirectionMode::RtsInverted => self.serial.write_request_to_send(!transmit),
            DirectionMode::Auto => Ok(()),
        };
        res.map_err(to_io_error)
    }
}

impl SerialLink for Rs485Serial {
    fn discard_input(&mut self) -> DynFuture<'_, io::Result<usize>> {
        Box::pin(async move {
            let pending = self.serial.bytes_to_read().map_err(to_io_error)?;
            self.serial
                .clear(ClearBuffer::Input)
                .map_err(to_io_error)?;
            Ok(pending as usize)
        })
    }

    fn write_frame<'a>(&'a mut self, bytes: &'a [u8]) -> DynFuture<'a, io::Result<()>> {
        Box::pin(async move {
            self.serial.write_all(bytes).await?;
            self.serial.flush().await?;
            // The OS returns as soon as the bytes are queued
            tokio::time::sleep(air_time(bytes.len(), self.baud_rate)).await;
            Ok(())
        })
    }

    fn read_some<'a>(&'a mut self, buf: &'a mut [u8]) -> DynFuture<'a, io::Result<usize>> {
        Box::pin(async move { self.serial.read(buf).await })
    }
}

fn parse_parity(value: Option<&str>) -> Result<Parity, OpenError> {
    match value {
        Some("N" | "n") | None => Ok(Parity::None),
        Some("E" | "e") => Ok(Parity::Even),
        Some("O" | "o") => Ok(Parity::Odd),
        Some(_) => Err(OpenError::ParameterError(
            "parity has invalid value".to_string(),
        )),
    }
}

fn driver_open(params: HashMap<String, String>) -> Result<Box<dyn SerialLink>, OpenError> {
    let port = params
        .get("port")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_PORT);
    let baud_rate = param_or(&params, "baud_rate", DEFAULT_BAUD_RATE)?;
    let parity = parse_parity(params.get("parity").map(|s| s.as_str()))?;
    let direction = param_or(&params, "direction", DirectionMode::Rts)?;
    match Rs485Serial::new(port, baud_rate, parity, direction) {
        Err(e) => Err(OpenError::DriverError(Box::new(e))),
        Ok(d) => Ok(Box::new(d)),
    }
}

pub fn driver_info() -> DriverInfo {
    DriverInfo {
        name: "SERIAL".to_string(),
        description: "RS-485 adapter on a serial port, direction controlled by RTS".to_string(),
        open: driver_open,
    }
}
