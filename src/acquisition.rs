//! Ping acquisition state machine
//!
//! # Design
//! Every iteration of the main sequence performs exactly one acquisition and processes it
//! completely before returning:
//!
//! * **Sync**: acquire a window longer than the ping period, locate the ping and remember when
//!   it arrived. Repeats until a ping is found.
//! * **Track**: predict the next ping from the last one, silence the thrusters around it and
//!   acquire a narrow window starting shortly before it. The located ping is correlated and the
//!   delays, the correlation curves and the ping samples are sent to the host. A missed ping
//!   drops back to sync.
//! * **Debug**: acquire a long window and stream the raw ADC codes.
//!
//! The state is derived from the [Session] at the start of every iteration, so commands take
//! effect on the next acquisition.
use crate::conditioning::{sample_count, SampleBuffer, HIGHPASS};
use crate::correlation::{Correlator, DelayResult};
use crate::hardware::{
    design_parameters::{
        DEBUG_DURATION, PING_PERIOD, SILENCE_DURATION, SILENCE_LEAD,
        SYNC_DURATION, TRACK_DURATION,
    },
    elapsed, from_samples, seconds_since_boot, to_micros, Duration, Instant,
    Sample, SampleSource,
};
use crate::ping::{peak_magnitude, truncate};
use crate::settings::{OperatingParameters, Session};
use crate::Error;

/// The state of the acquisition state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Track,
    Debug,
}

/// The result of one iteration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A ping was found while searching.
    Synced { ping: Instant },
    /// No ping was found while searching.
    SyncMissed { peak: u16 },
    /// A ping was tracked and its delays were sent.
    Tracked(DelayResult),
    /// No ping was found in the predicted window.
    TrackLost { peak: u16 },
    /// A ping was found but the delays could not be estimated.
    CorrelationFailed,
    /// Raw samples were streamed.
    Streamed { samples: usize },
}

/// Services used by the state machine while it runs.
pub trait Link {
    /// Get the current time.
    fn now(&mut self) -> Instant;

    /// Return once `deadline` has passed.
    fn wait_until(&mut self, deadline: Instant);

    /// Ask the thrusters to be quiet for `duration` starting at `start`.
    fn request_silence(
        &mut self,
        start: Instant,
        duration: Duration,
    ) -> Result<(), Error>;

    /// Stream samples. `normalized` is false for raw ADC codes.
    fn send_samples(
        &mut self,
        samples: &[Sample],
        normalized: bool,
    ) -> Result<(), Error>;

    /// Stream correlation curves.
    fn send_correlation(&mut self, curve: &[f32]) -> Result<(), Error>;

    /// Send the delays of a ping.
    fn send_result(&mut self, result: &DelayResult) -> Result<(), Error>;
}

/// Predict the arrival of the next ping that can still be acquired.
///
/// # Note
/// A ping can only be acquired if the acquisition, which starts [SILENCE_LEAD] before the ping,
/// has not started yet.
///
/// # Args
/// * `previous` - The arrival of a past ping.
/// * `now` - The current time.
pub fn predict_next_ping(previous: Instant, now: Instant) -> Instant {
    let mut next = previous + PING_PERIOD;
    while now > next - SILENCE_LEAD {
        next = next + PING_PERIOD;
    }
    next
}

/// Acquisition and processing of pings.
pub struct Acquisition<'a, S> {
    source: S,
    buffer: SampleBuffer<'a>,
    correlator: Correlator<'a>,
    previous_ping: Option<Instant>,
    sync_attempts: u32,
}

impl<'a, S: SampleSource> Acquisition<'a, S> {
    /// Construct the state machine.
    ///
    /// # Args
    /// * `source` - The ADC sample source.
    /// * `samples` - Storage for the longest acquisition.
    /// * `curve` - Storage for the correlation curves.
    pub fn new(
        source: S,
        samples: &'a mut [Sample],
        curve: &'a mut [f32],
    ) -> Self {
        Self {
            source,
            buffer: SampleBuffer::new(samples),
            correlator: Correlator::new(curve),
            previous_ping: None,
            sync_attempts: 0,
        }
    }

    /// The arrival of the last located ping.
    pub fn previous_ping(&self) -> Option<Instant> {
        self.previous_ping
    }

    /// Acquire and discard one DMA packet.
    ///
    /// # Note
    /// The first conversion after the ADC is configured is invalid.
    pub fn discard_first(&mut self) -> Result<(), Error> {
        let packet = self.source.configuration().samples_per_packet;
        self.buffer.acquire(&mut self.source, packet)?;
        log::debug!("Discarded {} warm-up samples", packet);
        Ok(())
    }

    /// Run one iteration of the state machine.
    ///
    /// # Args
    /// * `session` - The current parameters. Sync state is updated in place.
    /// * `link` - Timekeeping and transmission services.
    pub fn step<L: Link>(
        &mut self,
        session: &mut Session,
        link: &mut L,
    ) -> Result<Outcome, Error> {
        match (session.mode(), self.previous_ping) {
            (Mode::Debug, _) => self.debug(&session.params, link),
            (Mode::Track, Some(previous)) => {
                self.track(session, previous, link)
            }
            _ => self.sync(session, link),
        }
    }

    fn acquire(
        &mut self,
        params: &OperatingParameters,
        duration: Duration,
    ) -> Result<(), Error> {
        let count = sample_count(
            duration,
            params.sampling_frequency(),
            params.samples_per_packet,
            self.buffer.capacity(),
        );
        self.buffer.acquire(&mut self.source, count)
    }

    fn condition<L: Link>(
        &mut self,
        params: &OperatingParameters,
        link: &mut L,
    ) {
        if !params.filter {
            self.buffer.normalize();
            return;
        }

        let start = link.now();
        self.buffer.filter(&HIGHPASS);
        log::debug!(
            "Filtered {} samples in {} us",
            self.buffer.len(),
            to_micros(elapsed(start, link.now()))
        );
    }

    fn sync<L: Link>(
        &mut self,
        session: &mut Session,
        link: &mut L,
    ) -> Result<Outcome, Error> {
        let params = session.params;
        let fs = params.sampling_frequency();

        let start = link.now();
        self.acquire(&params, SYNC_DURATION)?;
        self.condition(&params, link);

        let samples = self.buffer.samples();
        let Some(window) = truncate(
            samples,
            params.reference_channel,
            params.ping_threshold,
            params.pre_ping_duration,
            params.post_ping_duration,
            fs,
        ) else {
            self.sync_attempts += 1;
            let peak = peak_magnitude(samples, params.reference_channel);
            log::info!(
                "Sync attempt {}: no ping (peak {}, threshold {})",
                self.sync_attempts,
                peak,
                params.ping_threshold
            );
            return Ok(Outcome::SyncMissed { peak });
        };

        let ping = start + from_samples(window.start, fs);
        log::info!(
            "Synced after {} attempts: ping at {} s",
            self.sync_attempts + 1,
            seconds_since_boot(ping)
        );

        self.previous_ping = Some(ping);
        self.sync_attempts = 0;
        session.synced = true;

        Ok(Outcome::Synced { ping })
    }

    fn track<L: Link>(
        &mut self,
        session: &mut Session,
        previous: Instant,
        link: &mut L,
    ) -> Result<Outcome, Error> {
        let params = session.params;
        let fs = params.sampling_frequency();

        let next = predict_next_ping(previous, link.now());
        let quiet = next - SILENCE_LEAD;
        link.request_silence(quiet, SILENCE_DURATION)?;
        link.wait_until(quiet);

        let start = link.now();
        self.acquire(&params, TRACK_DURATION)?;
        self.condition(&params, link);

        let Some(window) = truncate(
            self.buffer.samples(),
            params.reference_channel,
            params.ping_threshold,
            params.pre_ping_duration,
            params.post_ping_duration,
            fs,
        ) else {
            let peak =
                peak_magnitude(self.buffer.samples(), params.reference_channel);
            log::warn!(
                "Lost ping expected at {} s (peak {})",
                seconds_since_boot(next),
                peak
            );
            session.synced = false;
            return Ok(Outcome::TrackLost { peak });
        };

        self.previous_ping = Some(start + from_samples(window.start, fs));

        let samples = window.samples(self.buffer.samples())?;
        let begin = link.now();
        let result = match self.correlator.correlate(
            samples,
            params.reference_channel,
            params.max_lag,
            fs,
        ) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Delay estimation failed: {}", err);
                return Ok(Outcome::CorrelationFailed);
            }
        };
        log::debug!(
            "Correlated {} samples in {} us",
            samples.len(),
            to_micros(elapsed(begin, link.now()))
        );
        log::info!("Delays: {:?} ns", result.channel_delay_ns);

        link.send_result(&result)?;
        link.send_correlation(self.correlator.curve())?;
        link.send_samples(samples, true)?;

        Ok(Outcome::Tracked(result))
    }

    fn debug<L: Link>(
        &mut self,
        params: &OperatingParameters,
        link: &mut L,
    ) -> Result<Outcome, Error> {
        self.acquire(params, DEBUG_DURATION)?;

        let samples = self.buffer.samples();
        link.send_samples(samples, false)?;

        Ok(Outcome::Streamed {
            samples: samples.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u32) -> Instant {
        Instant::from_ticks(0) + Duration::millis(millis as u64)
    }

    #[test]
    fn prediction_skips_missed_pings() {
        assert_eq!(predict_next_ping(at(1000), at(1500)), at(3000));
        assert_eq!(predict_next_ping(at(1000), at(2950)), at(3000));
        assert_eq!(predict_next_ping(at(1000), at(2951)), at(5000));
        assert_eq!(predict_next_ping(at(1000), at(9000)), at(11000));
    }
}
