use crate as rs485;
use rs485::bus::direction::{BusMode, SETTLE_TIME};
use rs485::console::{self, ConsoleEvent};
use rs485::drivers::simulator::actuator::{SimActuator, FULL_LEVEL};
use rs485::drivers::simulator::simulator_link::{BusActivity, SimHandle, SimLink};
use rs485::frame::command::Command;
use rs485::poller::{poll_status, PollSchedule};
use rs485::reply::decoder::{ValidationError, RESPONSE_CAPACITY};
use rs485::transceiver::{
    ReplyOutcome, TransactionState, Transceiver, TransceiverConfig, TransceiverError,
    REPLY_TIMEOUT,
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;

fn setup(light: u8, fan: u8) -> (Transceiver, SimHandle) {
    let mut actuator = SimActuator::new();
    actuator.light_level = light;
    actuator.fan_level = fan;
    let (link, handle) = SimLink::new(actuator);
    (
        Transceiver::new(Box::new(link), TransceiverConfig::default()),
        handle,
    )
}

#[tokio::test(start_paused = true)]
async fn status_check() {
    let (mut tr, _sim) = setup(0x32, 0x00);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert!(t.success());
    assert_eq!(t.sent, Command::StatusCheck.frame().to_vec());
    assert_eq!(t.response_bytes(), &[0x12, 0xc3, 0x01, 0x32, 0x00]);
    let [ch1, ch2] = t.status().unwrap().channels.unwrap();
    assert_eq!((ch1.percentage, ch2.percentage), (50.0, 0.0));
    assert!((ch1.voltage - 140.0).abs() < 1e-3);
    assert!((ch2.voltage - 70.0).abs() < 1e-3);
    assert_eq!(tr.state(), TransactionState::Idle);
    assert_eq!(tr.bus_mode(), BusMode::Receive);
}

#[tokio::test(start_paused = true)]
async fn status_from_hex_string() {
    let (mut tr, _sim) = setup(0x64, 0x0a);
    let t = tr.send_hex("12 43 01 56 AC").await.unwrap();
    let [ch1, ch2] = t.status().unwrap().channels.unwrap();
    assert_eq!(ch1.raw, 0x64);
    assert!((ch1.voltage - 210.0).abs() < 1e-3);
    assert_eq!(ch2.percentage, 10.0);
}

#[tokio::test(start_paused = true)]
async fn commands_change_status() {
    let (mut tr, sim) = setup(0, 0);
    let t = tr.send_command(Command::LightOn).await.unwrap();
    // Control frames are not answered
    assert_eq!(t.outcome, ReplyOutcome::Empty);
    tr.send_command(Command::FanOn).await.unwrap();
    tr.send_command(Command::FanOff).await.unwrap();
    assert_eq!(sim.actuator().light_level, FULL_LEVEL);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    let [light, fan] = t.status().unwrap().channels.unwrap();
    assert_eq!(light.percentage, 100.0);
    assert_eq!(fan.percentage, 0.0);
    assert_eq!(sim.frames_heard().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn empty_reply_is_success() {
    let (mut tr, sim) = setup(0x32, 0x32);
    sim.set_silent(true);
    let start = Instant::now();
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert!(t.success());
    assert_eq!(t.outcome, ReplyOutcome::Empty);
    assert!(t.response.is_empty());
    assert!(t.status().is_none());
    // Settle before and after the write, then the full reply window
    assert_eq!(Instant::now() - start, 2 * SETTLE_TIME + REPLY_TIMEOUT);
    assert_eq!(tr.state(), TransactionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn wrong_header_ignored() {
    let (mut tr, sim) = setup(0, 0);
    sim.queue_reply(&[0x12, 0x82, 0x01, 0x32, 0x00]);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert!(t.success());
    assert_eq!(
        t.outcome,
        ReplyOutcome::Ignored(ValidationError::HeaderMismatch([0x12, 0x82, 0x01]))
    );
    assert!(t.status().is_none());

    sim.queue_reply(&[0x12]);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert_eq!(t.outcome, ReplyOutcome::Ignored(ValidationError::TooShort(1)));
}

#[tokio::test(start_paused = true)]
async fn header_without_channels() {
    let (mut tr, sim) = setup(0, 0);
    sim.queue_reply(&[0x12, 0xc3, 0x01, 0x32]);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    let status = t.status().unwrap();
    assert_eq!(status.raw, vec![0x12, 0xc3, 0x01, 0x32]);
    assert!(status.channels.is_none());
}

#[tokio::test(start_paused = true)]
async fn stale_input_dropped() {
    let (mut tr, sim) = setup(0x32, 0);
    sim.inject_stale(&[0xaa, 0xbb, 0xcc]);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert_eq!(t.response_bytes()[0], 0x12);
    assert!(t.status().is_some());
}

#[tokio::test(start_paused = true)]
async fn overlong_reply() {
    let (mut tr, sim) = setup(0, 0);
    let mut reply = vec![0x12, 0xc3, 0x01, 0x32, 0x32];
    reply.extend_from_slice(&[0xee; 9]);
    sim.queue_reply(&reply);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert_eq!(t.response.len(), RESPONSE_CAPACITY);
    assert_eq!(t.discarded, reply.len() - RESPONSE_CAPACITY);
    assert!(t.status().unwrap().channels.is_some());

    // The excess bytes were consumed, nothing is left for the next transaction
    sim.set_silent(true);
    let t = tr.send_command(Command::LightOff).await.unwrap();
    assert_eq!(t.outcome, ReplyOutcome::Empty);
    assert_eq!(t.discarded, 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_hex_not_sent() {
    let (mut tr, sim) = setup(0, 0);
    for bad in ["1 82", "1G", "12 43 01 56 A"] {
        match tr.send_hex(bad).await {
            Err(TransceiverError::Encoding(_)) => {}
            r => panic!("Unexpected result for {:?}: {:?}", bad, r.map(|t| t.outcome)),
        }
    }
    assert!(sim.activity().is_empty());
    assert_eq!(tr.state(), TransactionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_transactions() {
    let (mut tr, sim) = setup(0x10, 0x20);
    tr.send_command(Command::LightOn).await.unwrap();
    tr.send_command(Command::StatusCheck).await.unwrap();
    tr.send_command(Command::FanOff).await.unwrap();

    let activity = sim.activity();
    // enable, frame, release for every transaction
    assert_eq!(activity.len(), 9);
    for chunk in activity.chunks(3) {
        let (on, off) = match chunk {
            [BusActivity::Direction(on), BusActivity::Frame { heard: true, timestamp, .. }, BusActivity::Direction(off)] =>
            {
                assert!(*timestamp >= on.timestamp + SETTLE_TIME);
                assert!(off.timestamp >= *timestamp + SETTLE_TIME);
                (on, off)
            }
            _ => panic!("Unexpected bus activity: {:?}", chunk),
        };
        assert!(on.transmit);
        assert!(!off.transmit);
    }
    let dirs = sim.direction_events();
    for pair in dirs.windows(2) {
        assert_ne!(pair[0].transmit, pair[1].transmit);
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    assert!(!sim.is_transmitting());
}

#[tokio::test(start_paused = true)]
async fn recover_after_dropped_transaction() {
    let (mut tr, sim) = setup(0x32, 0);
    // Give up while the transceiver is still settling in transmit mode
    let res = tokio::time::timeout(
        Duration::from_millis(5),
        tr.send_command(Command::StatusCheck),
    )
    .await;
    assert!(res.is_err());
    assert!(sim.is_transmitting());
    assert_eq!(tr.bus_mode(), BusMode::Transmit);

    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert!(t.status().is_some());
    assert!(!sim.is_transmitting());
    let events = sim.direction_events();
    let dirs: Vec<bool> = events.iter().map(|d| d.transmit).collect();
    assert_eq!(dirs, vec![true, false, true, false]);
    // The bus settles on both sides of the forced release
    assert!(events[1].timestamp - events[0].timestamp >= SETTLE_TIME);
    assert!(events[2].timestamp - events[1].timestamp >= SETTLE_TIME);
}

#[tokio::test(start_paused = true)]
async fn write_failure() {
    let (mut tr, sim) = setup(0x32, 0);
    sim.fail_next_write();
    match tr.send_command(Command::LightOn).await {
        Err(TransceiverError::Link(_)) => {}
        r => panic!("Unexpected result: {:?}", r.map(|t| t.outcome)),
    }
    assert_eq!(tr.state(), TransactionState::Idle);
    assert_eq!(tr.bus_mode(), BusMode::Receive);
    assert!(!sim.is_transmitting());
    assert!(sim.frames_heard().is_empty());
    let dirs: Vec<bool> = sim.direction_events().iter().map(|d| d.transmit).collect();
    assert_eq!(dirs, vec![true, false]);

    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert!(t.status().is_some());
}

#[tokio::test(start_paused = true)]
async fn read_failure_in_reply_window() {
    let (mut tr, sim) = setup(0x32, 0);
    sim.fail_next_read();
    let start = Instant::now();
    match tr.send_command(Command::StatusCheck).await {
        Err(TransceiverError::Link(_)) => {}
        r => panic!("Unexpected result: {:?}", r.map(|t| t.outcome)),
    }
    // Failed when the reply arrived, not at the end of the window
    assert!(Instant::now() - start < 2 * SETTLE_TIME + REPLY_TIMEOUT);
    assert_eq!(tr.state(), TransactionState::Idle);
    assert_eq!(tr.bus_mode(), BusMode::Receive);

    // The unread reply is dropped as stale input
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert_eq!(t.response_bytes(), &[0x12, 0xc3, 0x01, 0x32, 0x00]);
}

#[tokio::test(start_paused = true)]
async fn driver_enable_failure() {
    let (mut tr, sim) = setup(0x32, 0);
    sim.set_enable_fault(true);
    match tr.send_command(Command::StatusCheck).await {
        Err(TransceiverError::Direction(_)) => {}
        r => panic!("Unexpected result: {:?}", r.map(|t| t.outcome)),
    }
    assert_eq!(tr.state(), TransactionState::Idle);
    assert_eq!(tr.bus_mode(), BusMode::Receive);
    assert!(sim.activity().is_empty());

    sim.set_enable_fault(false);
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    assert!(t.status().is_some());
}

#[tokio::test(start_paused = true)]
async fn console_keeps_poll_schedule() {
    let (mut tr, sim) = setup(0x32, 0);
    let mut sched = PollSchedule::default();
    let (tx, rx) = mpsc::channel::<io::Result<String>>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(14000)).await;
        tx.send(Ok("4".to_string())).await.unwrap();
        tx.send(Ok("7".to_string())).await.unwrap();
        // Input closes when the sender is dropped
    });
    let mut polls = 0;
    let mut commands = 0;
    let mut invalid = 0;
    let res = tokio::time::timeout(
        Duration::from_millis(47000),
        console::serve(&mut tr, &mut sched, ReceiverStream::new(rx), |event| {
            match event {
                ConsoleEvent::Poll(res) => {
                    assert!(res.unwrap().status().is_some());
                    polls += 1;
                }
                ConsoleEvent::Command(cmd, res) => {
                    assert_eq!(cmd, Command::StatusCheck);
                    assert!(res.is_ok());
                    commands += 1;
                }
                ConsoleEvent::Invalid(_) => invalid += 1,
            }
        }),
    )
    .await;
    // Still polling after the input closed
    assert!(res.is_err());
    assert_eq!(commands, 1);
    assert_eq!(invalid, 1);
    // Polls start at 0 s, 15 s, 30 s and 45 s. The manual check at 14 s
    // doesn't push them back.
    assert_eq!(polls, 4);
    assert_eq!(sim.frames_heard().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn periodic_poll() {
    let (mut tr, sim) = setup(0x32, 0);
    let mut sched = PollSchedule::default();
    let t = poll_status(&mut tr, &mut sched, Instant::now()).await.unwrap();
    assert!(t.is_some());
    let t = poll_status(&mut tr, &mut sched, Instant::now()).await.unwrap();
    assert!(t.is_none());
    tokio::time::sleep_until(sched.next_due(Instant::now())).await;
    let t = poll_status(&mut tr, &mut sched, Instant::now()).await.unwrap();
    assert!(t.is_some());
    assert_eq!(sim.frames_heard().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn open_from_registry() {
    rs485::drivers::init().unwrap();
    let link = rs485::drivers::open("simulator:light=40,fan=100,reply_delay_ms=50").unwrap();
    let mut tr = Transceiver::new(link, TransceiverConfig::default());
    let t = tr.send_command(Command::StatusCheck).await.unwrap();
    let [light, fan] = t.status().unwrap().channels.unwrap();
    assert_eq!(light.raw, 40);
    assert_eq!(fan.raw, 100);
    assert!(rs485::drivers::open("simulator:light=300").is_err());
}
