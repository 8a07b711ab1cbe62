use crate::drivers::link::SerialLink;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug)]
pub enum OpenError {
    NotFound,
    ParameterError(String),
    DriverError(Box<dyn Error + Send + Sync>),
}

impl Error for OpenError {}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::NotFound => write!(f, "Driver not found"),
            OpenError::ParameterError(s) => write!(f, "Invalid parameter: {}", s),
            OpenError::DriverError(e) => write!(f, "Driver error: {}", e),
        }
    }
}

pub type OpenFn = fn(HashMap<String, String>) -> Result<Box<dyn SerialLink>, OpenError>;

pub struct DriverInfo {
    pub name: String,
    pub description: String,
    pub open: OpenFn,
}

lazy_static! {
    static ref DRIVERS: Mutex<Vec<DriverInfo>> = Mutex::new(Vec::new());
}

pub fn add_driver(info: DriverInfo) {
    let mut drivers = DRIVERS.lock().unwrap_or_else(|e| e.into_inner());
    if !drivers
        .iter()
        .any(|d| d.name.eq_ignore_ascii_case(&info.name))
    {
        drivers.push(info);
    }
}

pub fn driver_names() -> Vec<String> {
    let drivers = DRIVERS.lock().unwrap_or_else(|e| e.into_inner());
    drivers
        .iter()
        .map(|d| format!("{}: {}", d.name, d.description))
        .collect()
}

/// Split a device string of the form NAME[:key=value,...]
pub fn parse_device(device: &str) -> Result<(String, HashMap<String, String>), OpenError> {
    let (name, rest) = match device.split_once(':') {
        Some((name, rest)) => (name, rest),
        None => (device, ""),
    };
    let mut params = HashMap::new();
    for param in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = param.split_once('=') else {
            return Err(OpenError::ParameterError(format!(
                "'{}' is not of the form key=value",
                param
            )));
        };
        params.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok((name.trim().to_string(), params))
}

/// Open a link by device string. "default" selects the first registered
/// driver.
pub fn open(device: &str) -> Result<Box<dyn SerialLink>, OpenError> {
    let (name, params) = parse_device(device)?;
    let open_fn = {
        let drivers = DRIVERS.lock().unwrap_or_else(|e| e.into_inner());
        let info = if name.eq_ignore_ascii_case("default") {
            drivers.first()
        } else {
            drivers.iter().find(|d| d.name.eq_ignore_ascii_case(&name))
        };
        match info {
            Some(info) => info.open,
            None => return Err(OpenError::NotFound),
        }
    };
    open_fn(params)
}

/// Parse an optional numeric parameter
pub fn param_or<T>(params: &HashMap<String, String>, key: &str, default: T) -> Result<T, OpenError>
where
    T: std::str::FromStr,
{
    match params.get(key) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| OpenError::ParameterError(format!("{} has invalid value", key))),
    }
}
