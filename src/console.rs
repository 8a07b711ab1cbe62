//! Operator console: one digit per line selects a command.

use crate::frame::command::Command;
use crate::poller::{poll_status, PollSchedule};
use crate::transceiver::{Transaction, Transceiver, TransceiverError};
use futures::Stream;
use log::debug;
use std::error::Error;
use std::fmt;
use std::io;
use tokio::time::Instant;
use tokio_stream::StreamExt;

pub const BANNER: &str = "RS-485 HEX Communication Initialized.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    Invalid(String),
}

impl Error for ConsoleError {}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Invalid(_) => write!(f, "Invalid command. Please try again."),
        }
    }
}

pub fn menu() -> String {
    let mut menu = String::from("Enter a command: ");
    for cmd in Command::ALL {
        menu.push_str(&format!("\n{}- {}", cmd.console_code(), cmd.description()));
    }
    menu
}

pub fn parse(line: &str) -> Result<Command, ConsoleError> {
    let input = line.trim();
    let mut chars = input.chars();
    let cmd = match (chars.next(), chars.next()) {
        (Some(c), None) => Command::from_console_code(c),
        _ => None,
    };
    cmd.ok_or_else(|| ConsoleError::Invalid(input.to_string()))
}

/// Something the console loop wants reported to the operator
#[derive(Debug)]
pub enum ConsoleEvent {
    Command(Command, Result<Transaction, TransceiverError>),
    Poll(Result<Transaction, TransceiverError>),
    Invalid(ConsoleError),
}

/// Serve operator commands and the periodic status check. Commands never
/// move the poll schedule. When the input ends only polling continues, so
/// this returns only on an input error.
pub async fn serve<S, F>(
    transceiver: &mut Transceiver,
    schedule: &mut PollSchedule,
    mut input: S,
    mut report: F,
) -> io::Result<()>
where
    S: Stream<Item = io::Result<String>> + Unpin,
    F: FnMut(ConsoleEvent),
{
    let mut input_open = true;
    loop {
        let next_poll = schedule.next_due(Instant::now());
        tokio::select! {
            line = input.next(), if input_open => {
                match line {
                    Some(Ok(line)) => match parse(&line) {
                        Ok(cmd) => {
                            let res = transceiver.send_command(cmd).await;
                            report(ConsoleEvent::Command(cmd, res));
                        }
                        Err(e) => report(ConsoleEvent::Invalid(e)),
                    },
                    Some(Err(e)) => return Err(e),
                    None => {
                        debug!("Console input closed, polling continues");
                        input_open = false;
                    }
                }
            }
            _ = tokio::time::sleep_until(next_poll) => {
                match poll_status(transceiver, schedule, Instant::now()).await {
                    Ok(Some(t)) => report(ConsoleEvent::Poll(Ok(t))),
                    Ok(None) => {}
                    Err(e) => report(ConsoleEvent::Poll(Err(e))),
                }
            }
        }
    }
}
