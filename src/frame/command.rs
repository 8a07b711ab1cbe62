//! Commands understood by the actuator.
//!
//! The last byte of each frame is part of the literal, it is not
//! calculated from the other bytes.

use std::fmt;

pub const FRAME_LEN: usize = 5;

pub const LIGHT_ON: [u8; FRAME_LEN] = [0x12, 0x82, 0x01, 0x22, 0xb7];
pub const LIGHT_OFF: [u8; FRAME_LEN] = [0x12, 0x81, 0x01, 0x22, 0xb6];
pub const FAN_ON: [u8; FRAME_LEN] = [0x12, 0x82, 0x01, 0x25, 0xba];
pub const FAN_OFF: [u8; FRAME_LEN] = [0x12, 0x81, 0x01, 0x25, 0xb9];
pub const STATUS_CHECK: [u8; FRAME_LEN] = [0x12, 0x43, 0x01, 0x56, 0xac];

pub const DEVICE_ADDRESS: u8 = 0x12;
pub const FUNC_ON: u8 = 0x82;
pub const FUNC_OFF: u8 = 0x81;
pub const FUNC_STATUS: u8 = 0x43;
pub const TARGET_LIGHT: u8 = 0x22;
pub const TARGET_FAN: u8 = 0x25;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    LightOn,
    LightOff,
    FanOn,
    FanOff,
    StatusCheck,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::LightOn,
        Command::LightOff,
        Command::FanOn,
        Command::FanOff,
        Command::StatusCheck,
    ];

    pub const fn frame(&self) -> &'static [u8; FRAME_LEN] {
        match self {
            Command::LightOn => &LIGHT_ON,
            Command::LightOff => &LIGHT_OFF,
            Command::FanOn => &FAN_ON,
            Command::FanOff => &FAN_OFF,
            Command::StatusCheck => &STATUS_CHECK,
        }
    }

    pub const fn hex(&self) -> &'static str {
        match self {
            Command::LightOn => "12 82 01 22 B7",
            Command::LightOff => "12 81 01 22 B6",
            Command::FanOn => "12 82 01 25 BA",
            Command::FanOff => "12 81 01 25 B9",
            Command::StatusCheck => "12 43 01 56 AC",
        }
    }

    pub const fn console_code(&self) -> char {
        match self {
            Command::LightOn => '0',
            Command::LightOff => '1',
            Command::FanOn => '2',
            Command::FanOff => '3',
            Command::StatusCheck => '4',
        }
    }

    pub fn from_console_code(code: char) -> Option<Command> {
        Self::ALL.into_iter().find(|c| c.console_code() == code)
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Command::LightOn => "turn on light",
            Command::LightOff => "turn off light",
            Command::FanOn => "turn on fan",
            Command::FanOff => "turn off fan",
            Command::StatusCheck => "check status",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
