//! System timekeeping
//!
//! # Design
//! All durations are kept in ticks of the 64-bit global timer, which counts at [TICK_HZ] and
//! does not wrap during the life of the device. Conversions to wall-clock units only happen at
//! the boundaries (commands, logs and the silence request), and conversions to sample counts
//! only happen when sizing acquisitions and ping windows.
use fugit::HertzU32;

use super::design_parameters::TICK_HZ;

/// A point in time, counted in global timer ticks since boot.
pub type Instant = fugit::TimerInstantU64<TICK_HZ>;

/// A span of time, counted in global timer ticks.
pub type Duration = fugit::TimerDurationU64<TICK_HZ>;

/// A monotonic clock.
pub trait Clock {
    /// Get the current time.
    fn now(&mut self) -> Instant;
}

/// Convert a duration to (fractional) seconds.
pub fn to_seconds(duration: Duration) -> f32 {
    duration.ticks() as f32 / TICK_HZ as f32
}

fn round_to(duration: Duration, units_per_second: u64) -> u64 {
    let scaled = duration.ticks() as u128 * units_per_second as u128;
    ((scaled + TICK_HZ as u128 / 2) / TICK_HZ as u128) as u64
}

/// Convert a duration to the nearest whole number of milliseconds.
pub fn to_millis(duration: Duration) -> u64 {
    round_to(duration, 1_000)
}

/// Convert a duration to the nearest whole number of microseconds.
pub fn to_micros(duration: Duration) -> u64 {
    round_to(duration, 1_000_000)
}

/// The time elapsed between two instants, or zero if `to` precedes `from`.
pub fn elapsed(from: Instant, to: Instant) -> Duration {
    to.checked_duration_since(from)
        .unwrap_or(Duration::from_ticks(0))
}

/// Convert an instant to (fractional) seconds since boot.
pub fn seconds_since_boot(instant: Instant) -> f32 {
    to_seconds(instant.duration_since_epoch())
}

/// Convert a duration to the nearest whole number of samples at a sample rate.
pub fn to_samples(duration: Duration, sample_rate: HertzU32) -> usize {
    let scaled = duration.ticks() as u128 * sample_rate.raw() as u128;
    ((scaled + TICK_HZ as u128 / 2) / TICK_HZ as u128) as usize
}

/// Convert a number of samples at a sample rate to a duration.
pub fn from_samples(samples: usize, sample_rate: HertzU32) -> Duration {
    let ticks = samples as u128 * TICK_HZ as u128 / sample_rate.raw() as u128;
    Duration::from_ticks(ticks as u64)
}

/// Spin until a deadline has passed.
///
/// # Args
/// * `clock` - The clock to measure time against.
/// * `deadline` - The instant to wait for.
/// * `idle` - Called on every spin with the current time. Used to keep servicing work that must
///   not stall while waiting.
pub fn wait_until<C: Clock>(
    clock: &mut C,
    deadline: Instant,
    mut idle: impl FnMut(Instant),
) {
    loop {
        let now = clock.now();
        if now >= deadline {
            break;
        }
        idle(now);
    }
}
