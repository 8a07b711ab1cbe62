use rs485::drivers::driver::OpenError;
use rs485::poller::{poll_status, PollSchedule};
use rs485::transceiver::{Transceiver, TransceiverConfig};
use rs485_dimmer as rs485;
use tokio::time::{Duration, Instant};

extern crate clap;
use clap::{value_parser, Arg, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = rs485::drivers::init() {
        eprintln!("Failed to initialize drivers: {}", e);
    }
    let matches = Command::new("poll_status")
        .about("Periodically read channel levels from the actuator.")
        .arg(
            Arg::new("DEVICE")
                .short('d')
                .long("device")
                .default_value("default")
                .help("Select bus device"),
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
            Arg::new("count")
                .short('n')
                .long("count")
                .value_parser(value_parser!(u64))
                .default_value("0")
                .help("Number of status checks, 0 for no limit"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue)
                .help("Print each result as a JSON line"),
        )
        .get_matches();

    let device_name = matches.get_one::<String>("DEVICE").unwrap();
    let interval = *matches.get_one::<u64>("interval").unwrap();
    let count = *matches.get_one::<u64>("count").unwrap();
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
    let mut done = 0;
    while count == 0 || done < count {
        tokio::time::sleep_until(schedule.next_due(Instant::now())).await;
        match poll_status(&mut transceiver, &mut schedule, Instant::now()).await {
            Ok(Some(t)) => {
                done += 1;
                if json {
                    match serde_json::to_string(&t) {
                        Ok(s) => println!("{}", s),
                        Err(e) => eprintln!("Failed to serialize result: {}", e),
                    }
                } else {
                    println!("{}", t);
                }
            }
            Ok(None) => {}
            Err(e) => {
                done += 1;
                eprintln!("Status check failed: {}", e);
            }
        }
    }
}
