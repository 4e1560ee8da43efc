//! Run-time operating parameters
//!
//! # Design
//! The parameters are written only by the command server and read only by the acquisition state
//! machine. Both run on the same thread, and commands are only applied between iterations of the
//! main sequence, so an acquisition never observes a partially updated parameter set.
use fugit::HertzU32;
use serde::Serialize;

use crate::acquisition::Mode;
use crate::hardware::{
    design_parameters::{
        FPGA_CLOCK, INITIAL_PING_THRESHOLD, MAX_LAG, POST_PING_DURATION,
        PRE_PING_DURATION, REFERENCE_CHANNEL,
    },
    to_micros, AdcConfiguration, Duration,
};
use crate::net::command::Command;

/// Parameters consumed by the acquisition state machine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OperatingParameters {
    /// The reference-channel magnitude that must be exceeded to locate a ping.
    pub ping_threshold: u32,

    /// The span of the ping window before the threshold crossing.
    pub pre_ping_duration: Duration,

    /// The span of the ping window after the threshold crossing.
    pub post_ping_duration: Duration,

    /// Apply the highpass cascade to acquisitions.
    pub filter: bool,

    /// The divider from the FPGA clock to the ADC sample clock.
    pub sample_clock_divider: u32,

    /// The number of samples in each DMA transfer.
    pub samples_per_packet: usize,

    /// The largest delay searched between hydrophones.
    pub max_lag: Duration,

    /// The hydrophone that delays are referred to.
    pub reference_channel: usize,
}

impl OperatingParameters {
    /// Construct the startup parameters.
    ///
    /// # Args
    /// * `adc` - The configuration read back from the ADC.
    pub fn new(adc: AdcConfiguration) -> Self {
        Self {
            ping_threshold: INITIAL_PING_THRESHOLD,
            pre_ping_duration: PRE_PING_DURATION,
            post_ping_duration: POST_PING_DURATION,
            filter: false,
            sample_clock_divider: adc.clock_divider,
            samples_per_packet: adc.samples_per_packet,
            max_lag: MAX_LAG,
            reference_channel: REFERENCE_CHANNEL,
        }
    }

    /// The ADC sample rate.
    pub fn sampling_frequency(&self) -> HertzU32 {
        HertzU32::from_raw(
            FPGA_CLOCK.raw() / (2 * self.sample_clock_divider.max(1)),
        )
    }
}

/// Consequence of applying a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Reset,
}

/// Parameter snapshot reported in command acknowledgements.
#[derive(Copy, Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Status {
    pub threshold: u32,
    pub filter: bool,
    pub debug: bool,
    pub synced: bool,
    pub pre_ping_duration_us: u64,
    pub post_ping_duration_us: u64,
    pub sample_rate_hz: u32,
}

/// The mutable state shared between the command server and the acquisition state machine.
#[derive(Copy, Clone, Debug)]
pub struct Session {
    pub params: OperatingParameters,

    /// Stream raw acquisitions instead of tracking.
    pub debug: bool,

    /// The ping period is known and acquisitions are aligned to predicted pings.
    pub synced: bool,
}

impl Session {
    pub fn new(adc: AdcConfiguration) -> Self {
        Self {
            params: OperatingParameters::new(adc),
            debug: false,
            synced: false,
        }
    }

    /// The state of the acquisition state machine for the next iteration.
    pub fn mode(&self) -> Mode {
        if self.debug {
            Mode::Debug
        } else if self.synced {
            Mode::Track
        } else {
            Mode::Sync
        }
    }

    /// Apply a received command.
    pub fn apply(&mut self, command: &Command) -> Action {
        log::debug!("Applying {:?}", command);

        match *command {
            Command::Threshold(threshold) => {
                self.params.ping_threshold = threshold;
                // The old ping may not be distinguishable at the new threshold.
                self.synced = false;
                log::info!("Ping threshold: {}", threshold);
            }
            Command::Filter(enable) => {
                self.params.filter = enable;
                log::info!("Filter: {}", enable);
            }
            Command::Debug(enable) => {
                self.debug = enable;
                log::info!("Debug: {}", enable);
            }
            Command::PrePingDuration(duration) => {
                self.params.pre_ping_duration = duration;
                log::info!("Pre-ping duration: {} us", to_micros(duration));
            }
            Command::PostPingDuration(duration) => {
                self.params.post_ping_duration = duration;
                log::info!("Post-ping duration: {} us", to_micros(duration));
            }
            Command::Reset => return Action::Reset,
        }

        Action::Continue
    }

    pub fn status(&self) -> Status {
        Status {
            threshold: self.params.ping_threshold,
            filter: self.params.filter,
            debug: self.debug,
            synced: self.synced,
            pre_ping_duration_us: to_micros(self.params.pre_ping_duration),
            post_ping_duration_us: to_micros(self.params.post_ping_duration),
            sample_rate_hz: self.params.sampling_frequency().raw(),
        }
    }
}
