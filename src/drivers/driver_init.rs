use crate::drivers;
use crate::error::DynResult;
#[cfg(feature = "serial_driver")]
use drivers::rs485_serial::rs485_serial;
use drivers::driver::add_driver;
use drivers::simulator::simulator_link;

pub fn init() -> DynResult<()> {
    #[cfg(feature = "serial_driver")]
    add_driver(rs485_serial::driver_info());
    add_driver(simulator_link::driver_info());
    Ok(())
}
