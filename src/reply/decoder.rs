use crate::reply::telemetry;
use heapless::Vec as FixedVec;
use serde_derive::Serialize;
use std::error::Error;
use std::fmt;

pub const RESPONSE_CAPACITY: usize = 10;
pub const STATUS_HEADER: [u8; 3] = [0x12, 0xc3, 0x01];
const CHANNEL_OFFSETS: [usize; 2] = [3, 4];

/// Bytes collected during one reply window. Never holds more than
/// RESPONSE_CAPACITY bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseFrame(FixedVec<u8, RESPONSE_CAPACITY>);

impl ResponseFrame {
    pub fn new() -> ResponseFrame {
        ResponseFrame(FixedVec::new())
    }

    /// Returns false if the frame is full and the byte was not stored.
    pub fn push(&mut self, b: u8) -> bool {
        self.0.push(b).is_ok()
    }

    pub fn is_full(&self) -> bool {
        self.0.is_full()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for ResponseFrame {
    /// Bytes beyond the capacity are dropped
    fn from(bytes: &[u8]) -> Self {
        let mut frame = ResponseFrame::new();
        for b in bytes.iter().take(RESPONSE_CAPACITY) {
            frame.push(*b);
        }
        frame
    }
}

impl fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[ ")?;
        for b in self.as_bytes() {
            write!(f, "{:02X} ", b)?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    TooShort(usize),
    HeaderMismatch([u8; 3]),
}

impl Error for ValidationError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::TooShort(len) => {
                write!(f, "Response too short for a status header ({} bytes)", len)
            }
            ValidationError::HeaderMismatch(h) => write!(
                f,
                "Response header {:02X} {:02X} {:02X} does not match the expected status response",
                h[0], h[1], h[2]
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelReading {
    /// 1 or 2
    pub channel: u8,
    pub raw: u8,
    pub percentage: f32,
    pub voltage: f32,
}

impl ChannelReading {
    pub fn new(channel: u8, raw: u8) -> ChannelReading {
        let percentage = telemetry::percentage(raw);
        ChannelReading {
            channel,
            raw,
            percentage,
            voltage: telemetry::voltage(percentage),
        }
    }
}

impl fmt::Display for ChannelReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel {}: {:.0}% dimming, Voltage: {:.1}V",
            self.channel, self.percentage, self.voltage
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReply {
    pub raw: Vec<u8>,
    /// None if the reply ended before the channel bytes
    pub channels: Option<[ChannelReading; 2]>,
}

impl fmt::Display for StatusReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response Array: [ ")?;
        for b in &self.raw {
            write!(f, "{:02X} ", b)?;
        }
        write!(f, "]")?;
        match &self.channels {
            Some(channels) => {
                for c in channels {
                    write!(f, "\n{}", c)?;
                }
                Ok(())
            }
            None => write!(f, "\nNo channel data in response"),
        }
    }
}

/// Check that the reply is a status response and extract the channel levels.
pub fn decode_reply(frame: &ResponseFrame) -> Result<StatusReply, ValidationError> {
    let bytes = frame.as_bytes();
    if bytes.len() < STATUS_HEADER.len() {
        return Err(ValidationError::TooShort(bytes.len()));
    }
    if bytes[..3] != STATUS_HEADER {
        return Err(ValidationError::HeaderMismatch([bytes[0], bytes[1], bytes[2]]));
    }
    let channels = if bytes.len() > CHANNEL_OFFSETS[1] {
        Some([
            ChannelReading::new(1, bytes[CHANNEL_OFFSETS[0]]),
            ChannelReading::new(2, bytes[CHANNEL_OFFSETS[1]]),
        ])
    } else {
        None
    };
    Ok(StatusReply {
        raw: bytes.to_vec(),
        channels,
    })
}
