//! Cooperative main loop
//!
//! # Design
//! There is no preemption. The scheduler alternates between servicing the network and running
//! one iteration of the acquisition state machine. Received commands are applied only while
//! servicing the network at the start of an iteration. While the state machine waits for a
//! deadline, the network stack keeps being polled so that the peer's buffers do not overflow,
//! but commands stay queued until the iteration completes.
//!
//! Any failure of the main sequence is fatal. It propagates out of [Scheduler::run] and the
//! device is reset from a single place in [Scheduler::run_until_reset].
use core::convert::Infallible;

use crate::acquisition::{Acquisition, Link, Outcome};
use crate::correlation::DelayResult;
use crate::hardware::{
    design_parameters::SAMPLE_CLOCK_DIVIDER, wait_until, Clock, Duration,
    Instant, NetworkStack, Sample, SampleSource, SystemReset,
};
use crate::net::{NetworkState, NetworkUsers};
use crate::settings::Session;
use crate::Error;

/// Timekeeping and network services lent to the state machine for one iteration.
pub struct Services<'a, N: NetworkStack, C> {
    network: &'a mut NetworkUsers<N>,
    clock: &'a mut C,
}

impl<N: NetworkStack, C: Clock> Link for Services<'_, N, C> {
    fn now(&mut self) -> Instant {
        self.clock.now()
    }

    fn wait_until(&mut self, deadline: Instant) {
        let network = &mut *self.network;
        wait_until(&mut *self.clock, deadline, |_| {
            network.poll();
        });
    }

    fn request_silence(
        &mut self,
        start: Instant,
        duration: Duration,
    ) -> Result<(), Error> {
        let now = self.clock.now();
        self.network.request_silence(now, start, duration)
    }

    fn send_samples(
        &mut self,
        samples: &[Sample],
        normalized: bool,
    ) -> Result<(), Error> {
        self.network.send_samples(samples, normalized)
    }

    fn send_correlation(&mut self, curve: &[f32]) -> Result<(), Error> {
        self.network.send_correlation(curve)
    }

    fn send_result(&mut self, result: &DelayResult) -> Result<(), Error> {
        self.network.send_result(result)
    }
}

/// The tracker main loop.
pub struct Scheduler<'a, S, N: NetworkStack, C> {
    session: Session,
    acquisition: Acquisition<'a, S>,
    network: NetworkUsers<N>,
    clock: C,
}

impl<'a, S, N, C> Scheduler<'a, S, N, C>
where
    S: SampleSource,
    N: NetworkStack,
    C: Clock,
{
    /// Set up the tracker.
    ///
    /// # Note
    /// This opens all sockets and discards the first ADC packet.
    ///
    /// # Args
    /// * `source` - The configured ADC sample source.
    /// * `stack` - The configured network stack.
    /// * `clock` - The global timer.
    /// * `samples` - Storage for the longest acquisition.
    /// * `curve` - Storage for the correlation curves.
    pub fn new(
        source: S,
        stack: N,
        clock: C,
        samples: &'a mut [Sample],
        curve: &'a mut [f32],
    ) -> Result<Self, Error> {
        let adc = source.configuration();
        if adc.clock_divider != SAMPLE_CLOCK_DIVIDER {
            log::warn!(
                "ADC clock divider {} differs from the nominal {}",
                adc.clock_divider,
                SAMPLE_CLOCK_DIVIDER
            );
        }

        let session = Session::new(adc);
        log::info!(
            "Sampling at {} Hz, {} samples per packet",
            session.params.sampling_frequency().raw(),
            session.params.samples_per_packet
        );

        let network = NetworkUsers::new(stack)?;

        let mut acquisition = Acquisition::new(source, samples, curve);
        acquisition.discard_first()?;

        Ok(Self {
            session,
            acquisition,
            network,
            clock,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn acquisition(&self) -> &Acquisition<'a, S> {
        &self.acquisition
    }

    /// Service the network, then run one acquisition.
    pub fn iterate(&mut self) -> Result<Outcome, Error> {
        let state = self.network.update(&mut self.session)?;
        if state == NetworkState::SettingsChanged {
            log::info!("Mode: {:?}", self.session.mode());
        }

        let mut services = Services {
            network: &mut self.network,
            clock: &mut self.clock,
        };
        self.acquisition.step(&mut self.session, &mut services)
    }

    /// Run until the main sequence fails.
    pub fn run(&mut self) -> Result<Infallible, Error> {
        loop {
            self.iterate()?;
        }
    }

    /// Run forever, resetting the device on failure.
    pub fn run_until_reset(mut self, reset: &mut impl SystemReset) -> ! {
        match self.run() {
            Err(Error::ResetRequested) => log::info!("Resetting on request"),
            Err(err) => log::error!("Fatal: {}", err),
            Ok(never) => match never {},
        }

        reset.reset()
    }
}
