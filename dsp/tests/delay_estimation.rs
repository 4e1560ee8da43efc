use dsp::iir::{Biquad, Cascade};
use dsp::xcorr::{correlate, curve_len};

use std::f64::consts::PI;
use std::vec::Vec;

const FS: f64 = 5e6;
const PING_FREQUENCY: f64 = 30e3;

/// A Hann-windowed tone burst centered at `center` samples.
fn burst(i: isize, center: isize, half_width: isize) -> i16 {
    let t = i - center;
    if t.abs() >= half_width {
        return 0;
    }
    let envelope = 0.5 * (1. + (PI * t as f64 / half_width as f64).cos());
    let tone = (2. * PI * PING_FREQUENCY * t as f64 / FS).sin();
    (2000. * envelope * tone).round() as i16
}

fn window(len: usize, delays: [isize; 4]) -> Vec<[i16; 4]> {
    (0..len as isize)
        .map(|i| delays.map(|d| burst(i, 400 + d, 200)))
        .collect()
}

#[test]
fn recovers_per_channel_delays() {
    let delays = [0, 3, -5, 9];
    let samples = window(800, delays);
    let max_lag = 20;
    let mut curve = vec![0.; curve_len(max_lag)];

    for (channel, delay) in delays.iter().enumerate().skip(1) {
        let peak = correlate(&samples, 0, channel, max_lag, &mut curve)
            .unwrap();
        assert_eq!(peak.lag, *delay, "channel {}", channel);
        assert!(peak.value > 0.99);
    }
}

#[test]
fn reference_need_not_be_channel_zero() {
    let delays = [4, 0, 0, 0];
    let samples = window(800, delays);
    let mut curve = vec![0.; curve_len(10)];

    let peak = correlate(&samples, 1, 0, 10, &mut curve).unwrap();
    assert_eq!(peak.lag, 4);
    let peak = correlate(&samples, 0, 2, 10, &mut curve).unwrap();
    assert_eq!(peak.lag, -4);
}

#[test]
fn highpass_preserves_delays() {
    // Identical conditioning on every channel keeps shifted copies shifted.
    let cascade = Cascade::new([Biquad::new([
        0.906313647059524,
        -1.812627294119048,
        0.906313647059524,
        1.848974099452832,
        -0.860723515924862,
    ])]);

    let delays = [0, -2, 6, 1];
    let mut samples = window(800, delays);
    cascade.filter(&mut samples);

    let mut curve = vec![0.; curve_len(10)];
    for (channel, delay) in delays.iter().enumerate().skip(1) {
        let peak = correlate(&samples, 0, channel, 10, &mut curve).unwrap();
        assert_eq!(peak.lag, *delay);
    }
}
