//! Command reception
//!
//! # Design
//! Commands arrive as text datagrams on the command port. A packet holds
//! comma-separated `key:value` tokens:
//!
//! * `threshold:<u32>` - The ping threshold. Invalidates synchronization.
//! * `filter:<0|1>` - Enable the highpass cascade.
//! * `debug:<0|1>` - Stream raw acquisitions instead of tracking.
//! * `pre_ping_duration_us:<u32>` / `post_ping_duration_us:<u32>` - The ping
//!   window.
//! * `reset` - Reset the device.
//!
//! Unknown keys are ignored, as is everything after the first
//! [MAX_COMMAND_TOKENS] tokens. A packet is parsed completely before any
//! command is applied, so a malformed packet leaves all parameters untouched.
//! Every packet is answered with a JSON [Response] sent back to its origin.
use core::fmt::Write;
use core::net::SocketAddr;
use core::str::FromStr;

use embedded_nal::{nb, UdpClientStack, UdpFullStack};
use heapless::{String, Vec};
use serde::Serialize;

use crate::hardware::design_parameters::{
    COMMAND_BUFFER_SIZE, COMMAND_PORT, MAX_COMMAND_TOKENS,
};
use crate::hardware::{Duration, NetworkStack};
use crate::settings::{Action, Session, Status};

use super::{send_to, NetworkState};

/// A parsed command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    Threshold(u32),
    Filter(bool),
    Debug(bool),
    PrePingDuration(Duration),
    PostPingDuration(Duration),
    Reset,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Packet of {0} bytes is too long")]
    TooLong(usize),
    #[error("Packet is not valid UTF-8")]
    NotText,
    #[error("Token {0} has no `:` separator")]
    MissingSeparator(usize),
    #[error("Invalid value for `{0}`")]
    InvalidValue(&'static str),
}

impl Error {
    /// The response code reported for the error.
    pub fn code(&self) -> u16 {
        match self {
            Error::TooLong(_) => 413,
            _ => 400,
        }
    }
}

fn value<T: FromStr>(key: &'static str, value: &str) -> Result<T, Error> {
    value.parse().map_err(|_| Error::InvalidValue(key))
}

fn flag(key: &'static str, token: &str) -> Result<bool, Error> {
    value::<u32>(key, token).map(|x| x != 0)
}

fn micros(key: &'static str, token: &str) -> Result<Duration, Error> {
    value::<u32>(key, token).map(|us| Duration::micros(u64::from(us)))
}

/// Parse a command packet.
///
/// # Args
/// * `packet` - The received datagram.
///
/// # Returns
/// The recognized commands in packet order.
pub fn parse(
    packet: &[u8],
) -> Result<Vec<Command, MAX_COMMAND_TOKENS>, Error> {
    // One byte of the receive buffer is reserved for a terminator.
    if packet.len() >= COMMAND_BUFFER_SIZE {
        return Err(Error::TooLong(packet.len()));
    }

    let text = core::str::from_utf8(packet).map_err(|_| Error::NotText)?;

    let mut commands = Vec::new();
    let mut tokens = text
        .split(',')
        .map(|token| {
            token.trim_matches(|c: char| c.is_whitespace() || c == '\0')
        })
        .filter(|token| !token.is_empty());

    for (index, token) in tokens.by_ref().take(MAX_COMMAND_TOKENS).enumerate() {
        let (key, raw) = match token.split_once(':') {
            Some((key, raw)) => (key.trim(), raw.trim()),
            None if token == "reset" => (token, ""),
            None => return Err(Error::MissingSeparator(index)),
        };

        let command = match key {
            "threshold" => Command::Threshold(value("threshold", raw)?),
            "filter" => Command::Filter(flag("filter", raw)?),
            "debug" => Command::Debug(flag("debug", raw)?),
            "pre_ping_duration_us" => {
                Command::PrePingDuration(micros("pre_ping_duration_us", raw)?)
            }
            "post_ping_duration_us" => {
                Command::PostPingDuration(micros("post_ping_duration_us", raw)?)
            }
            "reset" => Command::Reset,
            other => {
                log::warn!("Ignoring unknown command `{}`", other);
                continue;
            }
        };

        // Note(unwrap): At most MAX_COMMAND_TOKENS tokens are taken.
        commands.push(command).unwrap();
    }

    let ignored = tokens.count();
    if ignored > 0 {
        log::warn!(
            "Ignoring {} tokens after the first {}",
            ignored,
            MAX_COMMAND_TOKENS
        );
    }

    Ok(commands)
}

/// A command acknowledgement.
#[derive(Serialize, Debug)]
pub struct Response {
    code: u16,
    message: String<64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
}

impl Response {
    pub fn success(status: Status) -> Self {
        let mut message = String::new();
        message.push_str("Ok").ok();
        Self {
            code: 200,
            message,
            status: Some(status),
        }
    }

    pub fn error(error: &Error) -> Self {
        let mut message = String::new();
        // Truncation of the message is acceptable.
        write!(&mut message, "{}", error).ok();
        Self {
            code: error.code(),
            message,
            status: None,
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }
}

/// Receives commands and applies them to the session.
pub struct CommandServer<N: UdpClientStack> {
    socket: N::UdpSocket,
    buffer: [u8; COMMAND_BUFFER_SIZE],
}

impl<N: NetworkStack> CommandServer<N> {
    /// Bind the command port.
    pub fn new(stack: &mut N) -> Result<Self, crate::Error> {
        let mut socket = stack.socket().map_err(|err| {
            log::error!("Command socket allocation failed: {:?}", err);
            crate::Error::Network("no socket for commands")
        })?;

        stack.bind(&mut socket, COMMAND_PORT).map_err(|err| {
            log::error!("Binding port {} failed: {:?}", COMMAND_PORT, err);
            crate::Error::Network("command port unavailable")
        })?;

        log::info!("Listening for commands on port {}", COMMAND_PORT);

        Ok(Self {
            socket,
            buffer: [0; COMMAND_BUFFER_SIZE],
        })
    }

    /// Handle all pending command packets.
    ///
    /// # Returns
    /// [NetworkState::SettingsChanged] if any command was applied. Fails with
    /// [crate::Error::ResetRequested] once a reset command was acknowledged.
    pub fn process(
        &mut self,
        stack: &mut N,
        session: &mut Session,
    ) -> Result<NetworkState, crate::Error> {
        let mut state = NetworkState::NoChange;

        loop {
            let (len, remote) =
                match stack.receive(&mut self.socket, &mut self.buffer) {
                    Ok(received) => received,
                    Err(nb::Error::WouldBlock) => break,
                    Err(nb::Error::Other(err)) => {
                        log::error!("Command reception failed: {:?}", err);
                        return Err(crate::Error::Network(
                            "command reception failed",
                        ));
                    }
                };

            let response = match parse(&self.buffer[..len]) {
                Ok(commands) => {
                    let mut reset = false;
                    for command in commands.iter() {
                        reset |= session.apply(command) == Action::Reset;
                    }
                    if !commands.is_empty() {
                        state = NetworkState::SettingsChanged;
                    }

                    let response = Response::success(session.status());
                    if reset {
                        self.reply(stack, remote, &response)?;
                        return Err(crate::Error::ResetRequested);
                    }
                    response
                }
                Err(err) => {
                    log::warn!(
                        "Dropping command packet from {}: {}",
                        remote,
                        err
                    );
                    Response::error(&err)
                }
            };

            self.reply(stack, remote, &response)?;
        }

        Ok(state)
    }

    fn reply(
        &mut self,
        stack: &mut N,
        remote: SocketAddr,
        response: &Response,
    ) -> Result<(), crate::Error> {
        let mut message = [0u8; 256];
        let len = serde_json_core::to_slice(response, &mut message)
            .map_err(|_| {
                crate::Error::Network("response does not fit the reply buffer")
            })?;

        send_to(stack, &mut self.socket, remote, &message[..len])
    }
}
