//! Cross-correlation time-delay estimation
//!
//! The lag between two channels is estimated as the location of the maximum of their normalized
//! cross-correlation over a symmetric range of lags.
//!
//! # Sign convention
//! The correlation at lag `l` pairs reference sample `i` with channel sample `i + l`. A channel
//! that observes the same waveform `d` samples after the reference therefore peaks at `l = d`.
use num_traits::Float;

use super::{max, min};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(
        "Window of {len} samples is too short for a lag range of +/-{max_lag}"
    )]
    WindowTooShort { len: usize, max_lag: usize },
    #[error(
        "Curve storage of {capacity} points is too small, {required} required"
    )]
    CurveCapacity { required: usize, capacity: usize },
    #[error("Channel {0} does not exist")]
    Channel(usize),
}

/// The location and value of a correlation maximum.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Peak {
    /// The lag at the maximum, in samples.
    pub lag: isize,
    /// The normalized correlation at the maximum, in [-1, 1].
    pub value: f32,
}

/// Number of curve points produced for a lag range of `+/-max_lag`.
pub const fn curve_len(max_lag: usize) -> usize {
    2 * max_lag + 1
}

/// Correlate one channel of a multi-channel window against a reference channel.
///
/// # Args
/// * `window` - The samples to correlate. Must hold at least `2 * max_lag` samples.
/// * `reference` - The index of the reference channel.
/// * `channel` - The index of the channel to correlate against the reference.
/// * `max_lag` - The largest lag magnitude to evaluate, in samples.
/// * `curve` - Storage for the correlation curve. Entry `k` receives the normalized
///   correlation at lag `k - max_lag`. Must hold at least [curve_len] points.
///
/// # Returns
/// The lag of the maximum (signed) correlation. Ties resolve to the smallest lag. If either channel
/// carries no energy, the curve is all zero and the lag is zero.
pub fn correlate<const N: usize>(
    window: &[[i16; N]],
    reference: usize,
    channel: usize,
    max_lag: usize,
    curve: &mut [f32],
) -> Result<Peak, Error> {
    for index in [reference, channel] {
        if index >= N {
            return Err(Error::Channel(index));
        }
    }

    let len = window.len();
    if len < 2 * max_lag || len == 0 {
        return Err(Error::WindowTooShort { len, max_lag });
    }

    let required = curve_len(max_lag);
    if curve.len() < required {
        return Err(Error::CurveCapacity {
            required,
            capacity: curve.len(),
        });
    }

    let energy = |ch: usize| -> f64 {
        window.iter().map(|s| (s[ch] as f64) * (s[ch] as f64)).sum()
    };
    let norm = (energy(reference) * energy(channel)).sqrt();
    if norm <= 0. {
        curve[..required].fill(0.);
        return Ok(Peak { lag: 0, value: 0. });
    }
    let scale = 1. / norm;

    let mut peak = Peak {
        lag: -(max_lag as isize),
        value: f32::NEG_INFINITY,
    };

    for (k, point) in curve[..required].iter_mut().enumerate() {
        let lag = k as isize - max_lag as isize;

        // Reference index range for which `i + lag` stays inside the window.
        let first = max(0, -lag) as usize;
        let last = min(len as isize, len as isize - lag) as usize;

        let sum: f64 = window[first..last]
            .iter()
            .zip(&window[(first as isize + lag) as usize..])
            .map(|(r, c)| (r[reference] as f64) * (c[channel] as f64))
            .sum();

        *point = (sum * scale) as f32;
        if *point > peak.value {
            peak = Peak {
                lag,
                value: *point,
            };
        }
    }

    Ok(peak)
}
