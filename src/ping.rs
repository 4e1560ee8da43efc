//! Ping location
//!
//! # Design
//! A ping is located by the first sample on the reference channel whose magnitude exceeds the
//! ping threshold. The window used for correlation then extends a configured duration before and
//! after this threshold crossing.
use fugit::HertzU32;

use crate::hardware::{to_samples, Duration, Sample};
use crate::Error;

/// The span of an acquisition that contains a ping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PingWindow {
    /// Index of the first sample of the window.
    pub start: usize,
    /// Index one past the last sample of the window. Always larger than `start`.
    pub end: usize,
    /// Index of the sample that crossed the threshold.
    pub crossing: usize,
}

impl PingWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Get the samples of the window.
    ///
    /// # Args
    /// * `samples` - The acquisition that the window was located in.
    pub fn samples<'a>(
        &self,
        samples: &'a [Sample],
    ) -> Result<&'a [Sample], Error> {
        if self.is_empty() || self.end > samples.len() {
            return Err(Error::EmptyWindow {
                start: self.start,
                end: self.end,
            });
        }

        Ok(&samples[self.start..self.end])
    }
}

/// Locate a ping in conditioned samples.
///
/// # Args
/// * `samples` - The normalized (and optionally filtered) samples to search.
/// * `channel` - The channel to search for the threshold crossing.
/// * `threshold` - The magnitude that must be exceeded.
/// * `pre` - The duration of the window before the crossing.
/// * `post` - The duration of the window after the crossing.
/// * `sample_rate` - The sample rate of `samples`.
///
/// # Returns
/// The window around the first threshold crossing, clamped to the acquisition. `None` if no
/// sample exceeds the threshold, or if the clamped window is empty.
pub fn truncate(
    samples: &[Sample],
    channel: usize,
    threshold: u32,
    pre: Duration,
    post: Duration,
    sample_rate: HertzU32,
) -> Option<PingWindow> {
    let crossing = samples
        .iter()
        .position(|s| s[channel].unsigned_abs() as u32 > threshold)?;

    let start = crossing.saturating_sub(to_samples(pre, sample_rate));
    let end = crossing
        .saturating_add(to_samples(post, sample_rate))
        .min(samples.len());

    let window = PingWindow {
        start,
        end,
        crossing,
    };

    (!window.is_empty()).then_some(window)
}

/// The largest magnitude on a channel.
pub fn peak_magnitude(samples: &[Sample], channel: usize) -> u16 {
    samples
        .iter()
        .map(|s| s[channel].unsigned_abs())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{from_samples, CHANNELS};

    const RATE: HertzU32 = HertzU32::from_raw(5_000_000);

    fn spike(len: usize, at: usize, amplitude: i16) -> Vec<Sample> {
        let mut samples = vec![[0; CHANNELS]; len];
        // A noise floor well below the threshold.
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample = [((i % 7) as i16 - 3) * 100; CHANNELS];
        }
        samples[at] = [amplitude; CHANNELS];
        samples
    }

    #[test]
    fn spike_defines_window() {
        let samples = spike(5000, 2500, 2000);
        let window = truncate(
            &samples,
            0,
            1500,
            from_samples(200, RATE),
            from_samples(300, RATE),
            RATE,
        )
        .unwrap();

        assert_eq!(
            window,
            PingWindow {
                start: 2300,
                end: 2800,
                crossing: 2500
            }
        );
        assert_eq!(window.samples(&samples).unwrap().len(), 500);
    }

    #[test]
    fn negative_excursions_count() {
        let samples = spike(100, 40, -1600);
        let window = truncate(
            &samples,
            0,
            1500,
            from_samples(5, RATE),
            from_samples(5, RATE),
            RATE,
        );
        assert_eq!(window.map(|w| w.crossing), Some(40));
    }

    #[test]
    fn window_is_clamped() {
        let samples = spike(100, 10, 2000);
        let window = truncate(
            &samples,
            0,
            1500,
            from_samples(50, RATE),
            from_samples(500, RATE),
            RATE,
        )
        .unwrap();
        assert_eq!((window.start, window.end), (0, 100));
    }

    #[test]
    fn quiet_window_is_not_located() {
        let samples = spike(5000, 2500, 1500);
        let pre = from_samples(200, RATE);
        assert_eq!(truncate(&samples, 0, 1500, pre, pre, RATE), None);
        assert_eq!(peak_magnitude(&samples, 0), 1500);
    }

    #[test]
    fn degenerate_window_is_not_located() {
        let samples = spike(100, 0, 2000);
        let zero = Duration::from_ticks(0);
        assert_eq!(truncate(&samples, 0, 1500, zero, zero, RATE), None);
    }

    #[test]
    fn only_the_search_channel_matters() {
        let mut samples = spike(100, 50, 0);
        samples[20][1] = 3000;
        let pre = from_samples(5, RATE);
        assert_eq!(truncate(&samples, 0, 1500, pre, pre, RATE), None);
        assert_eq!(
            truncate(&samples, 1, 1500, pre, pre, RATE).map(|w| w.crossing),
            Some(20)
        );
    }

    #[test]
    fn stale_window_is_rejected() {
        let window = PingWindow {
            start: 10,
            end: 20,
            crossing: 12,
        };
        assert_eq!(
            window.samples(&[[0; CHANNELS]; 15]),
            Err(Error::EmptyWindow { start: 10, end: 20 })
        );
    }
}
