pub mod error;

pub mod frame {
    pub mod command;
    pub mod encoder;
}

pub mod bus {
    pub mod direction;
}

pub mod reply {
    pub mod decoder;
    pub mod telemetry;
}

pub mod drivers;
pub mod transceiver;
pub mod poller;
pub mod console;
