use rs485::console::{self, ConsoleEvent};
use rs485::drivers::driver::OpenError;
use rs485::poller::PollSchedule;
use rs485::transceiver::{Transaction, Transceiver, TransceiverConfig, TransceiverError};
use rs485_dimmer as rs485;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Duration;
use tokio_stream::wrappers::LinesStream;

extern crate clap;
use clap::{value_parser, Arg, Command};

fn report(res: Result<Transaction, TransceiverError>, json: bool) {
    match res {
        Ok(t) if json => match serde_json::to_string(&t) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        },
        Ok(t) => println!("{}", t),
        Err(e) => println!("{}", e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = rs485::drivers::init() {
        eprintln!("Failed to initialize drivers: {}", e);
    }
    let matches = Command::new("actuator_console")
        .about("Control the light/fan actuator and poll its status.")
        .arg(
            Arg::new("DEVICE")
                .short('d')
                .long("device")
                .default_value("default")
                .help("Select bus device, e.g. serial:port=/dev/ttyUSB0"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval-ms")
                .value_parser(value_parser!(u64))
                .default_value("15000")
                .help("Time between status checks"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .get_matches();

    let device_name = matches.get_one::<String>("DEVICE").unwrap();
    let interval = *matches.get_one::<u64>("interval").unwrap();
    let json = matches.get_flag("json");
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
    let mut transceiver = Transceiver::new(link, TransceiverConfig::default());
    let mut schedule = PollSchedule::new(Duration::from_millis(interval));

    println!("{}", console::BANNER);
    println!("{}", console::menu());

    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let res = console::serve(&mut transceiver, &mut schedule, lines, |event| match event {
        ConsoleEvent::Command(_, res) | ConsoleEvent::Poll(res) => report(res, json),
        ConsoleEvent::Invalid(e) => println!("{}", e),
    })
    .await;
    if let Err(e) = res {
        eprintln!("Failed to read input: {}", e);
    }
}
