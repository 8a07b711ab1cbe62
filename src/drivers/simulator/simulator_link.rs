use crate::drivers::driver::{param_or, DriverInfo, OpenError};
use crate::drivers::link::{DriverEnable, SerialLink};
use crate::drivers::simulator::actuator::SimActuator;
use crate::error::DynFuture;
use futures::future::{self, FutureExt};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(20);

/// One change of the driver enable line
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DirectionEvent {
    pub timestamp: Instant,
    pub transmit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusActivity {
    Direction(DirectionEvent),
    /// Frame written by the host. `heard` is false if the driver was not
    /// enabled when it was written.
    Frame {
        timestamp: Instant,
        bytes: Vec<u8>,
        heard: bool,
    },
}

// Shared by the link and the handle
struct SimCtxt {
    actuator: SimActuator,
    transmit: bool,
    silent: bool,
    reply_delay: Duration,
    activity: Vec<BusActivity>,
    // Replies used instead of the actuator's own, in order
    scripted: VecDeque<Vec<u8>>,
    // Reply generated while the host is still driving the bus
    reply_on_release: Option<Vec<u8>>,
    // Reply on its way, visible to the host at the given time
    in_flight: Option<(Instant, Vec<u8>)>,
    inbound: VecDeque<u8>,
    // Injected faults
    write_fault: bool,
    read_fault: bool,
    enable_fault: bool,
}

impl SimCtxt {
    fn frame_received(&mut self, bytes: &[u8]) {
        let reply = self.actuator.handle_frame(bytes);
        if self.silent {
            return;
        }
        let reply = self.scripted.pop_front().or(reply);
        self.reply_on_release = reply;
    }
}

fn fault(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("simulated {} failure", what))
}

fn lock(ctxt: &Mutex<SimCtxt>) -> MutexGuard<'_, SimCtxt> {
    ctxt.lock().unwrap_or_else(|e| e.into_inner())
}

/// Link to a simulated actuator
pub struct SimLink {
    ctxt: Arc<Mutex<SimCtxt>>,
}

/// Used to inspect and manipulate the simulated bus
#[derive(Clone)]
pub struct SimHandle {
    ctxt: Arc<Mutex<SimCtxt>>,
}

impl SimLink {
    pub fn new(actuator: SimActuator) -> (SimLink, SimHandle) {
        let ctxt = SimCtxt {
            actuator,
            transmit: false,
            silent: false,
            reply_delay: DEFAULT_REPLY_DELAY,
            activity: Vec::new(),
            scripted: VecDeque::new(),
            reply_on_release: None,
            in_flight: None,
            inbound: VecDeque::new(),
            write_fault: false,
            read_fault: false,
            enable_fault: false,
        };
        let ctxt1 = Arc::new(Mutex::new(ctxt));
        let ctxt2 = ctxt1.clone();
        (SimLink { ctxt: ctxt1 }, SimHandle { ctxt: ctxt2 })
    }
}

impl SimHandle {
    /// Use these bytes as the reply to the next frame, whatever it is
    pub fn queue_reply(&self, reply: &[u8]) {
        lock(&self.ctxt).scripted.push_back(reply.to_vec());
    }

    /// Bytes that are waiting in the receive buffer before the next transaction
    pub fn inject_stale(&self, bytes: &[u8]) {
        lock(&self.ctxt).inbound.extend(bytes.iter().copied());
    }

    pub fn set_silent(&self, silent: bool) {
        lock(&self.ctxt).silent = silent;
    }

    pub fn set_reply_delay(&self, delay: Duration) {
        lock(&self.ctxt).reply_delay = delay;
    }

    /// The next write fails without anything reaching the bus
    pub fn fail_next_write(&self) {
        lock(&self.ctxt).write_fault = true;
    }

    /// The next read that has data to deliver fails instead
    pub fn fail_next_read(&self) {
        lock(&self.ctxt).read_fault = true;
    }

    /// Make every change of the driver enable line fail
    pub fn set_enable_fault(&self, broken: bool) {
        lock(&self.ctxt).enable_fault = broken;
    }

    pub fn actuator(&self) -> SimActuator {
        lock(&self.ctxt).actuator.clone()
    }

    pub fn set_actuator(&self, actuator: SimActuator) {
        lock(&self.ctxt).actuator = actuator;
    }

    pub fn activity(&self) -> Vec<BusActivity> {
        lock(&self.ctxt).activity.clone()
    }

    pub fn direction_events(&self) -> Vec<DirectionEvent> {
        lock(&self.ctxt)
            .activity
            .iter()
            .filter_map(|a| match a {
                BusActivity::Direction(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// Frames the actuator actually received
    pub fn frames_heard(&self) -> Vec<Vec<u8>> {
        lock(&self.ctxt)
            .activity
            .iter()
            .filter_map(|a| match a {
                BusActivity::Frame {
                    bytes, heard: true, ..
                } => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_transmitting(&self) -> bool {
        lock(&self.ctxt).transmit
    }
}

impl DriverEnable for SimLink {
    fn set_driver_enable(&mut self, transmit: bool) -> io::Result<()> {
        let mut ctxt = lock(&self.ctxt);
        if ctxt.enable_fault {
            return Err(fault("driver enable"));
        }
        let now = Instant::now();
        ctxt.transmit = transmit;
        ctxt.activity.push(BusActivity::Direction(DirectionEvent {
            timestamp: now,
            transmit,
        }));
        if !transmit {
            if let Some(reply) = ctxt.reply_on_release.take() {
                let at = now + ctxt.reply_delay;
                ctxt.in_flight = Some((at, reply));
            }
        }
        Ok(())
    }
}

impl SerialLink for SimLink {
    fn discard_input(&mut self) -> DynFuture<'_, io::Result<usize>> {
        let mut ctxt = lock(&self.ctxt);
        let n = ctxt.inbound.len();
        ctxt.inbound.clear();
        future::ready(Ok(n)).boxed()
    }

    fn write_frame<'a>(&'a mut self, bytes: &'a [u8]) -> DynFuture<'a, io::Result<()>> {
        let mut ctxt = lock(&self.ctxt);
        if ctxt.write_fault {
            ctxt.write_fault = false;
            return future::ready(Err(fault("write"))).boxed();
        }
        let heard = ctxt.transmit;
        ctxt.activity.push(BusActivity::Frame {
            timestamp: Instant::now(),
            bytes: bytes.to_vec(),
            heard,
        });
        if heard {
            ctxt.frame_received(bytes);
        } else {
            warn!("Frame written while the driver is disabled, nothing sent on the bus");
        }
        future::ready(Ok(())).boxed()
    }

    fn read_some<'a>(&'a mut self, buf: &'a mut [u8]) -> DynFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            loop {
                let wait_until = {
                    let mut ctxt = lock(&self.ctxt);
                    let arrived = matches!(&ctxt.in_flight, Some((at, _)) if *at <= Instant::now());
                    if arrived {
                        if let Some((_, reply)) = ctxt.in_flight.take() {
                            ctxt.inbound.extend(reply);
                        }
                    }
                    if !ctxt.inbound.is_empty() {
                        if ctxt.read_fault {
                            ctxt.read_fault = false;
                            return Err(fault("read"));
                        }
                        let n = buf.len().min(ctxt.inbound.len());
                        for (dst, src) in buf.iter_mut().zip(ctxt.inbound.drain(..n)) {
                            *dst = src;
                        }
                        return Ok(n);
                    }
                    ctxt.in_flight.as_ref().map(|(at, _)| *at)
                };
                match wait_until {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            }
        })
    }
}

fn driver_open(params: HashMap<String, String>) -> Result<Box<dyn SerialLink>, OpenError> {
    let mut actuator = SimActuator::new();
    actuator.light_level = param_or(&params, "light", 0u8)?;
    actuator.fan_level = param_or(&params, "fan", 0u8)?;
    actuator.acknowledge = param_or(&params, "acknowledge", false)?;
    let silent = param_or(&params, "silent", false)?;
    let delay_ms = param_or(
        &params,
        "reply_delay_ms",
        DEFAULT_REPLY_DELAY.as_millis() as u64,
    )?;
    let (link, handle) = SimLink::new(actuator);
    handle.set_silent(silent);
    handle.set_reply_delay(Duration::from_millis(delay_ms));
    debug!("Opened simulated actuator");
    Ok(Box::new(link))
}

pub fn driver_info() -> DriverInfo {
    DriverInfo {
        name: "SIMULATOR".to_string(),
        description: "Simulated light/fan actuator, no hardware needed".to_string(),
        open: driver_open,
    }
}
