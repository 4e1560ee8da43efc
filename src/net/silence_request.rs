//! Thruster silence requests
//!
//! The thruster controller is asked to go quiet around every predicted ping. A request is a fixed
//! 8-byte datagram of two little-endian i32: the milliseconds from now until the quiet period
//! starts (negative if it already started) and the length of the quiet period in milliseconds.
use core::net::SocketAddr;

use embedded_nal::UdpClientStack;

use super::{connect, send};
use crate::hardware::{to_millis, Duration, Instant, NetworkStack};
use crate::Error;

/// The size of a silence request in bytes.
pub const REQUEST_SIZE: usize = 8;

/// Encode a silence request.
///
/// # Args
/// * `now` - The current time.
/// * `start` - The start of the quiet period.
/// * `duration` - The length of the quiet period.
pub fn encode(
    now: Instant,
    start: Instant,
    duration: Duration,
) -> [u8; REQUEST_SIZE] {
    let lead = match start.checked_duration_since(now) {
        Some(lead) => to_millis(lead) as i32,
        None => -(to_millis(now - start) as i32),
    };

    let mut request = [0; REQUEST_SIZE];
    request[..4].copy_from_slice(&lead.to_le_bytes());
    request[4..].copy_from_slice(&(to_millis(duration) as i32).to_le_bytes());
    request
}

pub struct SilenceRequester<N: UdpClientStack> {
    socket: N::UdpSocket,
}

impl<N: NetworkStack> SilenceRequester<N> {
    /// Connect to the thruster controller.
    pub fn new(stack: &mut N, remote: SocketAddr) -> Result<Self, Error> {
        Ok(Self {
            socket: connect(stack, remote)?,
        })
    }

    /// Request a quiet period.
    pub fn request(
        &mut self,
        stack: &mut N,
        now: Instant,
        start: Instant,
        duration: Duration,
    ) -> Result<(), Error> {
        let request = encode(now, start, duration);
        log::debug!("Silence request: {:?}", request);
        send(stack, &mut self.socket, &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(request: [u8; REQUEST_SIZE]) -> (i32, i32) {
        let (lead, duration) = request.split_at(4);
        (
            i32::from_le_bytes(lead.try_into().unwrap()),
            i32::from_le_bytes(duration.try_into().unwrap()),
        )
    }

    #[test]
    fn upcoming_quiet_period() {
        let now = Instant::from_ticks(0) + Duration::millis(1000);
        let request =
            encode(now, now + Duration::millis(1950), Duration::millis(100));
        assert_eq!(decode(request), (1950, 100));
    }

    #[test]
    fn quiet_period_already_started() {
        let now = Instant::from_ticks(0) + Duration::millis(1000);
        let start = Instant::from_ticks(0) + Duration::millis(990);
        let request = encode(now, start, Duration::millis(100));
        assert_eq!(decode(request), (-10, 100));
    }
}
