//! Periodic status check.

use crate::frame::command::Command;
use crate::transceiver::{Transaction, Transceiver, TransceiverError};
use std::time::Duration;
use tokio::time::Instant;

pub const STATUS_INTERVAL: Duration = Duration::from_millis(15000);

/// When the next status check is due. Before the first tick a check is
/// always due.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl PollSchedule {
    pub fn new(interval: Duration) -> PollSchedule {
        PollSchedule {
            interval,
            last_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_tick {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_tick = Some(now);
    }

    pub fn next_due(&self, now: Instant) -> Instant {
        match self.last_tick {
            None => now,
            Some(last) => last + self.interval,
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(STATUS_INTERVAL)
    }
}

/// Run a status check if one is due. Returns None if it wasn't.
pub async fn poll_status(
    transceiver: &mut Transceiver,
    schedule: &mut PollSchedule,
    now: Instant,
) -> Result<Option<Transaction>, TransceiverError> {
    if !schedule.is_due(now) {
        return Ok(None);
    }
    schedule.mark(now);
    transceiver
        .send_command(Command::StatusCheck)
        .await
        .map(Some)
}
