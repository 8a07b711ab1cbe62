pub mod driver;
pub mod driver_init;
pub mod link;
pub use driver::driver_names;
pub use driver::open;
pub use driver_init::init;

#[cfg(feature = "serial_driver")]
pub mod rs485_serial {
    pub mod rs485_serial;
}

pub mod simulator;
