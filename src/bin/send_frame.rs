use rs485::drivers::driver::OpenError;
use rs485::transceiver::{Transceiver, TransceiverConfig, TransceiverError};
use rs485_dimmer as rs485;
use tokio::time::Duration;

extern crate clap;
use clap::{value_parser, Arg, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = rs485::drivers::init() {
        eprintln!("Failed to initialize drivers: {}", e);
    }
    let matches = Command::new("send_frame")
        .about("Send an arbitrary frame and print the reply.")
        .arg(
            Arg::new("FRAME")
                .required(true)
                .help("Hex string containing the frame, e.g. \"12 43 01 56 AC\""),
        )
        .arg(
            Arg::new("DEVICE")
                .short('d')
                .long("device")
                .default_value("default")
                .help("Select bus device"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout-ms")
                .value_parser(value_parser!(u64))
                .default_value("1000")
                .help("Length of the reply window"),
        )
        .get_matches();

    let device_name = matches.get_one::<String>("DEVICE").unwrap();
    let frame = matches.get_one::<String>("FRAME").unwrap();
    let timeout = *matches.get_one::<u64>("timeout").unwrap();

    let link = match rs485::drivers::open(device_name) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to open device '{}': {}", device_name, e);
            if let OpenError::NotFound = e {
                eprintln!("Available drivers:");
                for name in rs485::drivers::driver_names() {
                    eprintln!("  {}", name);
                }
            }
            return;
        }
    };
    let config = TransceiverConfig {
        reply_timeout: Duration::from_millis(timeout),
        ..TransceiverConfig::default()
    };
    let mut transceiver = Transceiver::new(link, config);
    match transceiver.send_hex(frame).await {
        Ok(t) => {
            println!("{}", t);
            if t.discarded > 0 {
                println!("{} bytes did not fit in the response", t.discarded);
            }
        }
        Err(TransceiverError::Encoding(e)) => eprintln!("{}", e),
        Err(e) => eprintln!("Transaction failed: {}", e),
    }
}
