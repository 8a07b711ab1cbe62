use crate::frame::command::Command;
use crate::reply::decoder::STATUS_HEADER;
use log::debug;

/// Level reported for a channel that has been switched on
pub const FULL_LEVEL: u8 = 0x64;

/// Model of the light/fan actuator on the other end of the bus
#[derive(Debug, Clone)]
pub struct SimActuator {
    /// Reported as channel 1
    pub light_level: u8,
    /// Reported as channel 2
    pub fan_level: u8,
    /// Echo control frames back. The real device does not always answer.
    pub acknowledge: bool,
}

impl SimActuator {
    pub fn new() -> SimActuator {
        SimActuator {
            light_level: 0,
            fan_level: 0,
            acknowledge: false,
        }
    }

    pub fn status_reply(&self) -> Vec<u8> {
        let mut reply = STATUS_HEADER.to_vec();
        reply.push(self.light_level);
        reply.push(self.fan_level);
        reply
    }

    fn acknowledge(&self, frame: &[u8]) -> Option<Vec<u8>> {
        if self.acknowledge {
            Some(frame.to_vec())
        } else {
            None
        }
    }

    /// Act on a received frame. Returns the reply to send, if any.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        let Some(cmd) = Command::ALL
            .into_iter()
            .find(|c| c.frame().as_slice() == frame)
        else {
            debug!("Simulated actuator ignored unknown frame {:02x?}", frame);
            return None;
        };
        debug!("Simulated actuator: {}", cmd);
        match cmd {
            Command::LightOn => {
                self.light_level = FULL_LEVEL;
                self.acknowledge(frame)
            }
            Command::LightOff => {
                self.light_level = 0;
                self.acknowledge(frame)
            }
            Command::FanOn => {
                self.fan_level = FULL_LEVEL;
                self.acknowledge(frame)
            }
            Command::FanOff => {
                self.fan_level = 0;
                self.acknowledge(frame)
            }
            Command::StatusCheck => Some(self.status_reply()),
        }
    }
}

impl Default for SimActuator {
    fn default() -> Self {
        Self::new()
    }
}
