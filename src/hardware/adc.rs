//! ADC sample representation
//!
//! # Design
//! The ADC streams offset-binary codes for every channel of a conversion. The DMA engine packs
//! one conversion of all channels into a [Sample] in 16-bit words, in channel order. Codes are
//! converted to two's complement, zero-referenced values before any processing.
use super::design_parameters::{ADC_RESOLUTION_BITS, CHANNELS};

/// One simultaneous reading of every hydrophone channel.
///
/// Holds raw [AdcCode]s after acquisition and signed, zero-referenced values after
/// normalization.
pub type Sample = [i16; CHANNELS];

/// A raw ADC conversion result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdcCode(pub u16);

impl AdcCode {
    /// Mask of the valid code bits.
    pub const MASK: u16 = (1 << ADC_RESOLUTION_BITS) - 1;

    /// The code corresponding to zero input.
    pub const MIDSCALE: u16 = 1 << (ADC_RESOLUTION_BITS - 1);
}

impl From<i16> for AdcCode {
    fn from(word: i16) -> Self {
        Self(word as u16)
    }
}

impl From<AdcCode> for i16 {
    /// Convert an offset-binary code to a signed, zero-referenced value.
    fn from(code: AdcCode) -> i16 {
        (code.0 & AdcCode::MASK) as i16 - AdcCode::MIDSCALE as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_binary_conversion() {
        assert_eq!(i16::from(AdcCode(AdcCode::MIDSCALE)), 0);
        assert_eq!(i16::from(AdcCode(0)), -8192);
        assert_eq!(i16::from(AdcCode(AdcCode::MASK)), 8191);
    }

    #[test]
    fn unused_bits_are_ignored() {
        assert_eq!(i16::from(AdcCode(0xC000 | AdcCode::MIDSCALE)), 0);
        assert_eq!(i16::from(AdcCode::from(-1i16)), 8191);
    }
}
