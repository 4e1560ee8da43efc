use super::saturating_round;

/// Biquad coefficients.
///
/// Contains the feed-forward coefficients (b0, b1, b2) followed by the negated
/// feed-back coefficients (-a1, -a2), all five normalized such that a0 = 1.
pub type Vec5 = [f64; 5];

/// Biquad state.
///
/// The two delay registers of a transposed direct form II section. Both are
/// zero for a filter that has not seen any input yet.
pub type State = [f64; 2];

/// A single second-order IIR section.
///
/// The section computes
/// `y0 = b0*x0 + b1*x1 + b2*x2 - a1*y1 - a2*y2`
/// using the transposed direct form II, which keeps only two state registers
/// and accumulates in `f64`.
///
/// # Coefficients
/// Filter design tools commonly emit second-order sections as rows of
/// `[b0, b1, b2, a0, a1, a2]`. With `a0 = 1`, such a row maps to
/// `ba = [b0, b1, b2, -a1, -a2]`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Biquad {
    pub ba: Vec5,
}

impl Biquad {
    /// A section that passes its input unchanged.
    pub const IDENTITY: Self = Self {
        ba: [1., 0., 0., 0., 0.],
    };

    pub const fn new(ba: Vec5) -> Self {
        Self { ba }
    }

    /// Compute the overall (DC feed-forward) gain.
    pub fn dc_gain(&self) -> f64 {
        let [b0, b1, b2, a1, a2] = self.ba;
        (b0 + b1 + b2) / (1. - a1 - a2)
    }

    /// Feed a new input value into the section, update the state, and return
    /// the new output.
    ///
    /// # Arguments
    /// * `state` - Current section state.
    /// * `x0` - New input.
    pub fn update(&self, state: &mut State, x0: f64) -> f64 {
        let [b0, b1, b2, a1, a2] = self.ba;
        let y0 = b0 * x0 + state[0];
        state[0] = b1 * x0 + a1 * y0 + state[1];
        state[1] = b2 * x0 + a2 * y0;
        y0
    }
}

/// An ordered cascade of `K` biquad sections.
///
/// Sections are applied in the order they are listed. Although the product of
/// the transfer functions commutes, the intermediate rounding does not, so the
/// order is part of the filter definition.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cascade<const K: usize> {
    pub stages: [Biquad; K],
}

impl<const K: usize> Cascade<K> {
    pub const fn new(stages: [Biquad; K]) -> Self {
        Self { stages }
    }

    /// Pass one value through every stage.
    pub fn update(&self, state: &mut [State; K], x0: f64) -> f64 {
        self.stages
            .iter()
            .zip(state.iter_mut())
            .fold(x0, |x, (stage, state)| stage.update(state, x))
    }

    /// Filter every channel of a block of multi-channel samples in place.
    ///
    /// Channels are filtered independently. The state of every stage is reset
    /// to zero for each channel at the start of the call, so consecutive calls
    /// do not influence each other.
    ///
    /// # Args
    /// * `samples` - The samples to filter. Outputs are rounded and saturated to `i16`.
    pub fn filter<const N: usize>(&self, samples: &mut [[i16; N]]) {
        for channel in 0..N {
            let mut state = [[0.; 2]; K];
            for sample in samples.iter_mut() {
                let y = self.update(&mut state, sample[channel] as f64);
                sample[channel] = saturating_round(y);
            }
        }
    }
}
