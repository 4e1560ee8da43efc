//! Simulated tracker hardware.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::rc::Rc;

use embedded_nal::{nb, UdpClientStack, UdpFullStack};
use fugit::HertzU32;
use pingtrack::hardware::{
    design_parameters::{COMMAND_PORT, HOST_ADDRESS, PING_PERIOD, TICK_HZ},
    from_samples, AdcCode, AdcConfiguration, Clock, Instant, NetworkStack,
    Sample, SampleSource, CHANNELS,
};
use pingtrack::net::data_stream::Header;

/// The simulated sample clock divider, for a 50 kHz sample rate.
pub const DIVIDER: u32 = 1000;
pub const RATE: HertzU32 = HertzU32::from_raw(50_000);
pub const PACKET: usize = 64;

/// Capacity for a 2.1 s acquisition at [RATE].
pub const CAPACITY: usize = 110_000;

/// Arrival of every channel relative to the reference channel, in samples.
pub const DELAYS: [isize; CHANNELS] = [0, 2, -3, 5];

/// [DELAYS] of the secondary channels in nanoseconds at [RATE].
pub const DELAYS_NS: [i32; CHANNELS - 1] = [40_000, -60_000, 100_000];

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Poll,
    Acquire { at: u64, len: usize },
    Sent { to: SocketAddr, data: Vec<u8> },
}

/// Handles to observe and steer the simulation while the tracker owns the hardware.
#[derive(Clone, Default)]
pub struct Harness {
    pub time: Rc<Cell<u64>>,
    pub events: Rc<RefCell<Vec<Event>>>,
    pub inbox: Rc<RefCell<VecDeque<(SocketAddr, Vec<u8>)>>>,
    pub pinging: Rc<Cell<bool>>,
    /// The number of sends still answered with `WouldBlock`.
    pub busy: Rc<Cell<usize>>,
}

impl Harness {
    pub fn new() -> Self {
        let harness = Self::default();
        harness.pinging.set(true);
        harness
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            time: self.time.clone(),
        }
    }

    pub fn stack(&self) -> MockStack {
        MockStack {
            harness: self.clone(),
            sockets: 0,
        }
    }

    /// A pinger whose first ping arrives at `first_ping_ms`.
    pub fn pinger(&self, first_ping_ms: u64) -> Pinger {
        Pinger {
            harness: self.clone(),
            first_ping: first_ping_ms * (TICK_HZ as u64 / 1000),
            fail_after: None,
            acquisitions: 0,
        }
    }

    pub fn command(&self, from: SocketAddr, packet: &[u8]) {
        self.inbox.borrow_mut().push_back((from, packet.to_vec()));
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Datagrams sent to a port, in order.
    pub fn sent_to(&self, port: u16) -> Vec<Vec<u8>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Sent { to, data } if to.port() == port => {
                    Some(data.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// The ports that datagrams were sent to, in order, without repetitions.
    pub fn destinations(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = Vec::new();
        for event in self.events.borrow().iter() {
            if let Event::Sent { to, .. } = event {
                if ports.last() != Some(&to.port()) {
                    ports.push(to.port());
                }
            }
        }
        ports
    }

    /// Stream frames sent to a port.
    pub fn frames(&self, port: u16) -> Vec<(Header, Vec<u8>)> {
        self.sent_to(port)
            .iter()
            .map(|frame| {
                let (header, payload) = Header::parse(frame).unwrap();
                (header, payload.to_vec())
            })
            .collect()
    }
}

pub fn host(port: u16) -> SocketAddr {
    SocketAddr::new(HOST_ADDRESS.into(), port)
}

/// A clock that advances by 1 ms whenever it is read.
pub struct SimClock {
    time: Rc<Cell<u64>>,
}

impl Clock for SimClock {
    fn now(&mut self) -> Instant {
        self.time.set(self.time.get() + TICK_HZ as u64 / 1000);
        Instant::from_ticks(self.time.get())
    }
}

fn burst(n: isize) -> i16 {
    const LEN: isize = 32;
    if !(0..LEN).contains(&n) {
        return 0;
    }
    let x = n as f64;
    let hann = 0.5 - 0.5 * (std::f64::consts::TAU * x / LEN as f64).cos();
    (3000. * hann * (std::f64::consts::TAU * x / 8.).sin()) as i16
}

/// An ADC observing a pinger every [PING_PERIOD]. Acquisitions take real (simulated) time.
pub struct Pinger {
    harness: Harness,
    first_ping: u64,
    pub fail_after: Option<usize>,
    acquisitions: usize,
}

impl SampleSource for Pinger {
    type Error = &'static str;

    fn configuration(&self) -> AdcConfiguration {
        AdcConfiguration {
            clock_divider: DIVIDER,
            samples_per_packet: PACKET,
        }
    }

    fn acquire(&mut self, samples: &mut [Sample]) -> Result<(), Self::Error> {
        self.acquisitions += 1;
        if self.fail_after.is_some_and(|n| self.acquisitions > n) {
            return Err("DMA transfer error");
        }

        let start = self.harness.time.get();
        let end = start + from_samples(samples.len(), RATE).ticks();
        self.harness.events.borrow_mut().push(Event::Acquire {
            at: start,
            len: samples.len(),
        });

        samples.fill([AdcCode::MIDSCALE as i16; CHANNELS]);

        if self.harness.pinging.get() {
            let period = PING_PERIOD.ticks();
            let mut ping = self.first_ping;
            while ping <= end {
                let offset = ping as i128 - start as i128;
                let tick_hz = TICK_HZ as i128;
                let position = (offset * RATE.raw() as i128 + tick_hz / 2)
                    .div_euclid(tick_hz) as isize;

                for (index, sample) in samples.iter_mut().enumerate() {
                    for (channel, value) in sample.iter_mut().enumerate() {
                        let n = index as isize - position - DELAYS[channel];
                        *value += burst(n);
                    }
                }
                ping += period;
            }
        }

        self.harness.time.set(end);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Socket {
    id: usize,
    local: Option<u16>,
    remote: Option<SocketAddr>,
}

#[derive(Debug, PartialEq)]
pub enum MockError {
    NotConnected,
}

/// An in-memory UDP stack.
pub struct MockStack {
    harness: Harness,
    sockets: usize,
}

impl MockStack {
    fn transmit(
        &mut self,
        to: SocketAddr,
        data: &[u8],
    ) -> nb::Result<(), MockError> {
        let busy = self.harness.busy.get();
        if busy > 0 {
            self.harness.busy.set(busy - 1);
            return Err(nb::Error::WouldBlock);
        }

        self.harness.events.borrow_mut().push(Event::Sent {
            to,
            data: data.to_vec(),
        });
        Ok(())
    }
}

impl UdpClientStack for MockStack {
    type UdpSocket = Socket;
    type Error = MockError;

    fn socket(&mut self) -> Result<Socket, MockError> {
        self.sockets += 1;
        Ok(Socket {
            id: self.sockets,
            local: None,
            remote: None,
        })
    }

    fn connect(
        &mut self,
        socket: &mut Socket,
        remote: SocketAddr,
    ) -> Result<(), MockError> {
        socket.remote = Some(remote);
        Ok(())
    }

    fn send(
        &mut self,
        socket: &mut Socket,
        buffer: &[u8],
    ) -> nb::Result<(), MockError> {
        let remote = socket
            .remote
            .ok_or(nb::Error::Other(MockError::NotConnected))?;
        self.transmit(remote, buffer)
    }

    fn receive(
        &mut self,
        socket: &mut Socket,
        buffer: &mut [u8],
    ) -> nb::Result<(usize, SocketAddr), MockError> {
        if socket.local != Some(COMMAND_PORT) {
            return Err(nb::Error::WouldBlock);
        }

        let (from, packet) = self
            .harness
            .inbox
            .borrow_mut()
            .pop_front()
            .ok_or(nb::Error::WouldBlock)?;
        let len = packet.len().min(buffer.len());
        buffer[..len].copy_from_slice(&packet[..len]);
        Ok((len, from))
    }

    fn close(&mut self, _socket: Socket) -> Result<(), MockError> {
        Ok(())
    }
}

impl UdpFullStack for MockStack {
    fn bind(
        &mut self,
        socket: &mut Socket,
        local_port: u16,
    ) -> Result<(), MockError> {
        socket.local = Some(local_port);
        Ok(())
    }

    fn send_to(
        &mut self,
        _socket: &mut Socket,
        remote: SocketAddr,
        buffer: &[u8],
    ) -> nb::Result<(), MockError> {
        self.transmit(remote, buffer)
    }
}

impl NetworkStack for MockStack {
    fn poll(&mut self) -> Result<bool, MockError> {
        self.harness.events.borrow_mut().push(Event::Poll);
        Ok(false)
    }
}
