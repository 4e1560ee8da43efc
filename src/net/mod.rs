//! Tracker network management module
//!
//! # Design
//! The tracker talks to a single host over UDP. Commands are received on a locally bound port
//! and acknowledged to their sender. Silence requests, delay results, correlation curves and raw
//! samples are sent to fixed ports on the host. All network users share one stack, which is
//! owned by the [NetworkProcessor] and lent to each user while it operates.
pub use heapless;
pub use serde;

pub mod command;
pub mod data_stream;
pub mod network_processor;
pub mod silence_request;

use core::net::{IpAddr, SocketAddr};

use embedded_nal::{nb, UdpClientStack, UdpFullStack};

use crate::correlation::{DelayResult, SECONDARY_CHANNELS};
use crate::hardware::{
    design_parameters::{
        DATA_STREAM_PORT, HOST_ADDRESS, RESULT_PORT, SILENCE_REQUEST_PORT,
        XCORR_STREAM_PORT,
    },
    Duration, Instant, NetworkStack, Sample, CHANNELS,
};
use crate::settings::Session;
use crate::Error;
use command::CommandServer;
use data_stream::{DataStream, Format};
use network_processor::NetworkProcessor;
use silence_request::SilenceRequester;

// The number of times a send is retried while the transmit buffer is full.
const SEND_ATTEMPTS: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateState {
    NoChange,
    Updated,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NetworkState {
    SettingsChanged,
    Updated,
    NoChange,
}

fn transmit<N: NetworkStack>(
    stack: &mut N,
    mut send: impl FnMut(&mut N) -> nb::Result<(), N::Error>,
) -> Result<(), Error> {
    for _ in 0..SEND_ATTEMPTS {
        match send(stack) {
            Ok(()) => return Ok(()),
            // Give the interface a chance to drain the transmit buffer.
            Err(nb::Error::WouldBlock) => {
                if let Err(err) = stack.poll() {
                    log::warn!("Network poll failed: {:?}", err);
                }
            }
            Err(nb::Error::Other(err)) => {
                log::error!("UDP send failed: {:?}", err);
                return Err(Error::Network("send failed"));
            }
        }
    }

    log::error!("UDP transmit buffer did not drain");
    Err(Error::Network("transmit buffer full"))
}

/// Send a datagram on a connected socket.
pub(crate) fn send<N: NetworkStack>(
    stack: &mut N,
    socket: &mut N::UdpSocket,
    payload: &[u8],
) -> Result<(), Error> {
    transmit(stack, |stack| stack.send(socket, payload))
}

/// Send a datagram on a bound socket.
pub(crate) fn send_to<N: NetworkStack>(
    stack: &mut N,
    socket: &mut N::UdpSocket,
    remote: SocketAddr,
    payload: &[u8],
) -> Result<(), Error> {
    transmit(stack, |stack| stack.send_to(socket, remote, payload))
}

/// Allocate a socket and connect it to a remote.
pub(crate) fn connect<N: NetworkStack>(
    stack: &mut N,
    remote: SocketAddr,
) -> Result<N::UdpSocket, Error> {
    let mut socket = stack.socket().map_err(|err| {
        log::error!("Socket allocation failed: {:?}", err);
        Error::Network("no socket available")
    })?;

    if let Err(err) = stack.connect(&mut socket, remote) {
        log::error!("Connecting to {} failed: {:?}", remote, err);
        stack.close(socket).ok();
        return Err(Error::Network("connect failed"));
    }

    Ok(socket)
}

/// The tracker's network users.
pub struct NetworkUsers<N: NetworkStack> {
    pub processor: NetworkProcessor<N>,
    commands: CommandServer<N>,
    silence: SilenceRequester<N>,
    data: DataStream<N>,
    correlation: DataStream<N>,
    result: DataStream<N>,
}

impl<N: NetworkStack> NetworkUsers<N> {
    /// Open every socket used by the tracker.
    ///
    /// # Args
    /// * `stack` - The configured network stack.
    pub fn new(mut stack: N) -> Result<Self, Error> {
        let host = |port| SocketAddr::new(IpAddr::V4(HOST_ADDRESS), port);

        let commands = CommandServer::new(&mut stack)?;
        let silence =
            SilenceRequester::new(&mut stack, host(SILENCE_REQUEST_PORT))?;
        let data = DataStream::open(&mut stack, host(DATA_STREAM_PORT))?;
        let correlation =
            DataStream::open(&mut stack, host(XCORR_STREAM_PORT))?;
        let result = DataStream::open(&mut stack, host(RESULT_PORT))?;

        Ok(Self {
            processor: NetworkProcessor::new(stack),
            commands,
            silence,
            data,
            correlation,
            result,
        })
    }

    /// Service the network stack without handling commands.
    pub fn poll(&mut self) -> UpdateState {
        self.processor.update()
    }

    /// Update and process all of the network users state.
    ///
    /// # Args
    /// * `session` - The session that received commands are applied to.
    pub fn update(
        &mut self,
        session: &mut Session,
    ) -> Result<NetworkState, Error> {
        let updated = self.processor.update();

        let state = self.commands.process(self.processor.stack(), session)?;

        Ok(match (state, updated) {
            (NetworkState::SettingsChanged, _) => NetworkState::SettingsChanged,
            (_, UpdateState::Updated) => NetworkState::Updated,
            _ => NetworkState::NoChange,
        })
    }

    /// Ask the thrusters to go quiet.
    pub fn request_silence(
        &mut self,
        now: Instant,
        start: Instant,
        duration: Duration,
    ) -> Result<(), Error> {
        self.silence
            .request(self.processor.stack(), now, start, duration)
    }

    /// Stream samples to the host.
    ///
    /// # Args
    /// * `samples` - The samples to stream.
    /// * `normalized` - Indicates zero-referenced samples rather than raw ADC codes.
    pub fn send_samples(
        &mut self,
        samples: &[Sample],
        normalized: bool,
    ) -> Result<(), Error> {
        let format = if normalized {
            Format::Samples
        } else {
            Format::AdcCodes
        };
        self.data
            .send(self.processor.stack(), format, CHANNELS as u8, samples)
    }

    /// Stream the concatenated correlation curves to the host.
    pub fn send_correlation(&mut self, curve: &[f32]) -> Result<(), Error> {
        self.correlation.send(
            self.processor.stack(),
            Format::Correlation,
            SECONDARY_CHANNELS as u8,
            curve,
        )
    }

    /// Send the delays of one ping to the host.
    pub fn send_result(&mut self, result: &DelayResult) -> Result<(), Error> {
        self.result.send(
            self.processor.stack(),
            Format::Delays,
            SECONDARY_CHANNELS as u8,
            &result.channel_delay_ns,
        )
    }
}
