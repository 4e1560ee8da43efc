//! Hydrophone-array pinger tracker
//!
//! # Design
//! The tracker samples a multi-channel hydrophone array, locks onto a periodic acoustic ping,
//! captures each subsequent ping in a narrow window, and estimates the arrival-time difference
//! between a reference hydrophone and every other hydrophone. Results, the correlation evidence
//! and the raw ping samples are streamed to a host over UDP.
//!
//! Everything runs cooperatively on a single thread: the [scheduler] interleaves servicing of the
//! network stack with the [acquisition] state machine. Board bring-up supplies the hardware
//! capabilities through the traits in [hardware], allocates
//! [MAX_SAMPLES](hardware::design_parameters::MAX_SAMPLES) samples and
//! [MAX_CORRELATION_POINTS](hardware::design_parameters::MAX_CORRELATION_POINTS) curve points once,
//! and hands everything to [scheduler::Scheduler::new].
#![cfg_attr(not(test), no_std)]

pub mod acquisition;
pub mod conditioning;
pub mod correlation;
pub mod hardware;
pub mod net;
pub mod ping;
pub mod scheduler;
pub mod settings;

/// Failures that abort the main sequence.
///
/// # Note
/// None of these are recoverable in place. The scheduler reports the error once and resets the
/// device, which returns the ADC, DMA engine and network stack to a known state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Sample acquisition failed")]
    Acquisition,
    #[error("Requested {requested} samples but the buffer holds {capacity}")]
    Capacity { requested: usize, capacity: usize },
    #[error("Ping window [{start}, {end}) is empty")]
    EmptyWindow { start: usize, end: usize },
    #[error("Correlation: {0}")]
    Correlation(#[from] dsp::xcorr::Error),
    #[error("Network: {0}")]
    Network(&'static str),
    #[error("Reset requested by command")]
    ResetRequested,
}
