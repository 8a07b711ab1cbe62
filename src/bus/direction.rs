//! Switching of the RS-485 transceiver between transmit and receive.
//!
//! Only one driver may be active on a half-duplex bus. The transceiver
//! needs some time after each switch before the line is stable.

use crate::drivers::link::DriverEnable;
use log::debug;
use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

pub const SETTLE_TIME: Duration = Duration::from_millis(10);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusMode {
    Receive,
    Transmit,
}

#[derive(Debug)]
pub enum DirectionError {
    /// The bus was not back in receive mode
    NotSettled,
    Io(io::Error),
}

impl Error for DirectionError {}

impl From<io::Error> for DirectionError {
    fn from(err: io::Error) -> DirectionError {
        DirectionError::Io(err)
    }
}

impl fmt::Display for DirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionError::NotSettled => write!(f, "Bus is not in receive mode"),
            DirectionError::Io(err) => write!(f, "Failed to set bus direction: {}", err),
        }
    }
}

pub struct BusDirectionController {
    settle: Duration,
    mode: BusMode,
}

impl BusDirectionController {
    pub fn new(settle: Duration) -> BusDirectionController {
        BusDirectionController {
            settle,
            mode: BusMode::Receive,
        }
    }

    pub fn mode(&self) -> BusMode {
        self.mode
    }

    pub fn settle_time(&self) -> Duration {
        self.settle
    }

    /// Enable the driver and wait for it to settle
    pub async fn enter_transmit<L>(&mut self, link: &mut L) -> Result<(), DirectionError>
    where
        L: DriverEnable + Send + ?Sized,
    {
        if self.mode != BusMode::Receive {
            return Err(DirectionError::NotSettled);
        }
        debug!("Switching RS-485 to TRANSMIT mode...");
        link.set_driver_enable(true)?;
        self.mode = BusMode::Transmit;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Wait for the last byte to get through the transceiver, then release
    /// the bus
    pub async fn enter_receive<L>(&mut self, link: &mut L) -> Result<(), DirectionError>
    where
        L: DriverEnable + Send + ?Sized,
    {
        tokio::time::sleep(self.settle).await;
        debug!("Switching RS-485 to RECEIVE mode...");
        link.set_driver_enable(false)?;
        self.mode = BusMode::Receive;
        Ok(())
    }

    /// Release the bus after an interrupted transmission. Settles on both
    /// sides of the release so the next `enter_transmit` starts from a
    /// stable receive state.
    pub async fn recover<L>(&mut self, link: &mut L) -> Result<(), DirectionError>
    where
        L: DriverEnable + Send + ?Sized,
    {
        tokio::time::sleep(self.settle).await;
        debug!("Releasing RS-485 bus");
        link.set_driver_enable(false)?;
        self.mode = BusMode::Receive;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

impl Default for BusDirectionController {
    fn default() -> Self {
        Self::new(SETTLE_TIME)
    }
}
