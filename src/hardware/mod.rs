//! Hardware capabilities of the tracker
//!
//! # Design
//! Peripheral drivers (ADC configuration over SPI, the sample DMA engine, the Ethernet MAC) are
//! set up by the board bootstrap. The tracker core only consumes the capabilities below, which
//! keeps it independent of register layouts and allows it to run against simulated hardware.
mod adc;
pub mod design_parameters;
mod system_timer;

pub use adc::*;
pub use design_parameters::CHANNELS;
pub use system_timer::*;

/// Acquisition configuration reported by the ADC.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdcConfiguration {
    /// The divider from the FPGA clock to the ADC sample clock.
    pub clock_divider: u32,

    /// The number of samples moved by each DMA transfer. Acquisitions must be a whole number of
    /// packets.
    pub samples_per_packet: usize,
}

/// DMA-backed multi-channel sample acquisition.
pub trait SampleSource {
    type Error: core::fmt::Debug;

    /// Read the current ADC configuration.
    fn configuration(&self) -> AdcConfiguration;

    /// Acquire consecutive samples.
    ///
    /// # Note
    /// This blocks until `samples` has been completely filled with raw ADC codes.
    ///
    /// # Args
    /// * `samples` - The buffer to fill. Its length is the number of samples to acquire.
    fn acquire(&mut self, samples: &mut [Sample]) -> Result<(), Self::Error>;
}

/// Full device reset.
pub trait SystemReset {
    /// Reset the processor. Never returns.
    fn reset(&mut self) -> !;
}

/// The network interface shared by all network users.
pub trait NetworkStack: embedded_nal::UdpFullStack {
    /// Service the interface. Received frames are moved into their sockets and queued frames are
    /// transmitted.
    ///
    /// # Returns
    /// True if any socket state changed.
    fn poll(&mut self) -> Result<bool, Self::Error>;
}
