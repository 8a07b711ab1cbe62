//! One request/reply cycle on the half-duplex bus.
//!
//! A transaction drops stale input, drives the frame onto the bus, returns
//! the bus to receive mode and collects whatever arrives within the reply
//! window. Transactions take `&mut Transceiver`, so they can never overlap.

use crate::bus::direction::{BusDirectionController, BusMode, DirectionError, SETTLE_TIME};
use crate::drivers::link::SerialLink;
use crate::frame::command::Command;
use crate::frame::encoder::{encode_hex, format_hex, EncodingError};
use crate::reply::decoder::{decode_reply, ResponseFrame, StatusReply, ValidationError};
use log::{debug, info, trace, warn};
use serde_derive::Serialize;
use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

pub const REPLY_TIMEOUT: Duration = Duration::from_millis(1000);
const READ_CHUNK: usize = 16;

#[derive(Debug, Clone)]
pub struct TransceiverConfig {
    pub settle: Duration,
    pub reply_timeout: Duration,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        TransceiverConfig {
            settle: SETTLE_TIME,
            reply_timeout: REPLY_TIMEOUT,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Transmitting,
    AwaitingResponse,
    Validated,
    EmptyReply,
    Malformed,
}

#[derive(Debug)]
pub enum TransceiverError {
    Encoding(EncodingError),
    Link(io::Error),
    Direction(DirectionError),
}

impl Error for TransceiverError {}

impl From<EncodingError> for TransceiverError {
    fn from(err: EncodingError) -> TransceiverError {
        TransceiverError::Encoding(err)
    }
}

impl From<io::Error> for TransceiverError {
    fn from(err: io::Error) -> TransceiverError {
        TransceiverError::Link(err)
    }
}

impl From<DirectionError> for TransceiverError {
    fn from(err: DirectionError) -> TransceiverError {
        TransceiverError::Direction(err)
    }
}

impl fmt::Display for TransceiverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransceiverError::Encoding(err) => write!(f, "{}", err),
            TransceiverError::Link(err) => write!(f, "Serial link error: {}", err),
            TransceiverError::Direction(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReplyOutcome {
    /// Reply with a status header
    Status(StatusReply),
    /// Nothing arrived. Not an error, the device doesn't answer every frame.
    Empty,
    /// Something arrived but it wasn't a status reply
    Ignored(ValidationError),
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub sent: Vec<u8>,
    pub response: ResponseFrame,
    pub outcome: ReplyOutcome,
    /// Bytes received after the response buffer was full
    pub discarded: usize,
}

impl Transaction {
    /// A completed transaction is always a success, even without a reply
    pub fn success(&self) -> bool {
        true
    }

    pub fn response_bytes(&self) -> &[u8] {
        self.response.as_bytes()
    }

    pub fn status(&self) -> Option<&StatusReply> {
        match &self.outcome {
            ReplyOutcome::Status(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sent: {}", format_hex(&self.sent))?;
        match &self.outcome {
            ReplyOutcome::Status(reply) => write!(f, "{}", reply),
            ReplyOutcome::Empty => write!(f, "No response received."),
            ReplyOutcome::Ignored(_) => write!(
                f,
                "Response {} does not match the expected status response. Ignored.",
                self.response
            ),
        }
    }
}

pub struct Transceiver {
    link: Box<dyn SerialLink>,
    direction: BusDirectionController,
    reply_timeout: Duration,
    state: TransactionState,
}

impl Transceiver {
    pub fn new(link: Box<dyn SerialLink>, config: TransceiverConfig) -> Transceiver {
        Transceiver {
            link,
            direction: BusDirectionController::new(config.settle),
            reply_timeout: config.reply_timeout,
            state: TransactionState::Idle,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn bus_mode(&self) -> BusMode {
        self.direction.mode()
    }

    fn set_state(&mut self, state: TransactionState) {
        trace!("Transaction {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Encode a hex string and send it. Nothing is sent if the string is
    /// malformed.
    pub async fn send_hex(&mut self, hex: &str) -> Result<Transaction, TransceiverError> {
        debug!("Processing hex string: {}", hex);
        let frame = encode_hex(hex)?;
        self.transact(&frame).await
    }

    pub async fn send_command(&mut self, cmd: Command) -> Result<Transaction, TransceiverError> {
        info!("Command: {}", cmd);
        self.transact(cmd.frame()).await
    }

    /// Send a frame and wait out the reply window.
    pub async fn transact(&mut self, frame: &[u8]) -> Result<Transaction, TransceiverError> {
        if self.state != TransactionState::Idle || self.direction.mode() != BusMode::Receive {
            // Only happens if an earlier transaction was dropped half way
            warn!("Previous transaction did not finish, releasing the bus");
            self.direction.recover(&mut *self.link).await?;
            self.set_state(TransactionState::Idle);
        }
        let res = self.run(frame).await;
        if res.is_err() && self.direction.mode() != BusMode::Receive {
            if let Err(e) = self.direction.recover(&mut *self.link).await {
                warn!("Failed to release the bus: {}", e);
            }
        }
        self.set_state(TransactionState::Idle);
        res
    }

    async fn run(&mut self, frame: &[u8]) -> Result<Transaction, TransceiverError> {
        let stale = self.link.discard_input().await?;
        if stale > 0 {
            debug!("Discarded {} stale bytes", stale);
        }

        self.set_state(TransactionState::Transmitting);
        self.direction.enter_transmit(&mut *self.link).await?;
        let written = self.link.write_frame(frame).await;
        // Release the bus even if the write failed
        self.direction.enter_receive(&mut *self.link).await?;
        written?;
        info!("Sent: {}", format_hex(frame));

        self.set_state(TransactionState::AwaitingResponse);
        debug!("Waiting for response...");
        let (response, discarded) = self.collect_reply().await?;
        if discarded > 0 {
            warn!(
                "Response longer than {} bytes, {} bytes discarded",
                response.len(),
                discarded
            );
        }

        let outcome = if response.is_empty() {
            info!("No response received.");
            self.set_state(TransactionState::EmptyReply);
            ReplyOutcome::Empty
        } else {
            info!("Response detected!");
            match decode_reply(&response) {
                Ok(reply) => {
                    info!("{}", reply);
                    self.set_state(TransactionState::Validated);
                    ReplyOutcome::Status(reply)
                }
                Err(e) => {
                    info!("{}. Ignored.", e);
                    self.set_state(TransactionState::Malformed);
                    ReplyOutcome::Ignored(e)
                }
            }
        };
        Ok(Transaction {
            sent: frame.to_vec(),
            response,
            outcome,
            discarded,
        })
    }

    /// Read until the reply window closes. Bytes that don't fit in the
    /// response are still read from the link so that they don't linger.
    async fn collect_reply(&mut self) -> Result<(ResponseFrame, usize), TransceiverError> {
        let deadline = Instant::now() + self.reply_timeout;
        let mut response = ResponseFrame::new();
        let mut discarded = 0;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match timeout_at(deadline, self.link.read_some(&mut buf)).await {
                Err(_) => break,
                Ok(Ok(0)) => {
                    debug!("Link closed");
                    break;
                }
                Ok(Ok(n)) => {
                    for b in &buf[..n] {
                        if !response.push(*b) {
                            discarded += 1;
                        }
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        Ok((response, discarded))
    }
}
