//! Inter-channel delay estimation
//!
//! # Design
//! Every secondary channel is correlated against the reference channel over the located ping
//! window. The lag of maximum correlation is the arrival-time difference of the ping between the
//! two hydrophones. The curves of all pairings are retained back to back in a pre-allocated
//! buffer so they can be streamed to the host for inspection.
use dsp::xcorr::{self, curve_len};
use fugit::HertzU32;

use crate::hardware::{to_samples, Duration, Sample, CHANNELS};
use crate::Error;

/// The number of channels that are referred to the reference channel.
pub const SECONDARY_CHANNELS: usize = CHANNELS - 1;

/// Arrival-time differences of one ping.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DelayResult {
    /// The delay of each secondary channel relative to the reference channel in nanoseconds, in
    /// channel order with the reference channel skipped. Positive values indicate that the ping
    /// arrived at the secondary channel later.
    pub channel_delay_ns: [i32; SECONDARY_CHANNELS],

    /// The normalized correlation at each delay.
    pub correlation: [f32; SECONDARY_CHANNELS],
}

/// Convert a lag in samples to nanoseconds.
pub fn lag_to_nanoseconds(lag: isize, sample_rate: HertzU32) -> i32 {
    (lag as i64 * 1_000_000_000 / sample_rate.raw() as i64) as i32
}

/// Iterate over the channels that are correlated against `reference`.
pub fn secondary_channels(reference: usize) -> impl Iterator<Item = usize> {
    (0..CHANNELS).filter(move |&channel| channel != reference)
}

/// Delay estimator with storage for the correlation curves.
pub struct Correlator<'a> {
    curve: &'a mut [f32],
    len: usize,
}

impl<'a> Correlator<'a> {
    /// Construct a correlator.
    ///
    /// # Args
    /// * `curve` - Storage for the correlation curves of all channel pairings.
    pub fn new(curve: &'a mut [f32]) -> Self {
        Self { curve, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.curve.len()
    }

    /// The curves of the last successful estimate, concatenated in channel order.
    pub fn curve(&self) -> &[f32] {
        &self.curve[..self.len]
    }

    /// Estimate the delay of every secondary channel.
    ///
    /// # Args
    /// * `window` - The located ping samples.
    /// * `reference` - The reference channel.
    /// * `max_lag` - The largest delay to search for in either direction.
    /// * `sample_rate` - The sample rate of `window`.
    pub fn correlate(
        &mut self,
        window: &[Sample],
        reference: usize,
        max_lag: Duration,
        sample_rate: HertzU32,
    ) -> Result<DelayResult, Error> {
        self.len = 0;

        let max_lag = to_samples(max_lag, sample_rate);
        let points = curve_len(max_lag);
        let required = points * SECONDARY_CHANNELS;
        if required > self.curve.len() {
            return Err(xcorr::Error::CurveCapacity {
                required,
                capacity: self.curve.len(),
            }
            .into());
        }

        let mut result = DelayResult::default();
        let slots = result
            .channel_delay_ns
            .iter_mut()
            .zip(result.correlation.iter_mut());

        for ((channel, curve), (delay, value)) in secondary_channels(reference)
            .zip(self.curve.chunks_exact_mut(points))
            .zip(slots)
        {
            let peak =
                xcorr::correlate(window, reference, channel, max_lag, curve)?;
            *delay = lag_to_nanoseconds(peak.lag, sample_rate);
            *value = peak.value;
        }

        self.len = required;
        Ok(result)
    }
}
