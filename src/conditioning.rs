//! Sample storage and conditioning
//!
//! # Design
//! Samples are acquired into a single pre-allocated buffer sized for the longest acquisition.
//! Each acquisition overwrites the buffer. After acquisition, the raw ADC codes are normalized to
//! zero-referenced values in place and may then be passed through a highpass cascade to remove
//! low-frequency noise below the ping band.
use dsp::iir::{Biquad, Cascade};
use fugit::HertzU32;

use crate::hardware::{to_samples, AdcCode, Duration, Sample, SampleSource};
use crate::Error;

/// The number of sections in the conditioning highpass.
pub const HIGHPASS_SECTIONS: usize = 5;

/// Cascaded highpass applied to every channel when filtering is enabled.
///
/// Sections were designed as second-order sections and are listed in application order, with
/// progressively lower pole radii.
pub const HIGHPASS: Cascade<HIGHPASS_SECTIONS> = Cascade::new([
    Biquad::new([
        0.976572753292004,
        -1.953145506584008,
        0.976572753292004,
        1.998354115074282,
        -0.998926104509836,
    ]),
    Biquad::new([
        0.975206721477597,
        -1.950413442955194,
        0.975206721477597,
        1.995495119158081,
        -0.996193697294377,
    ]),
    Biquad::new([
        0.972451482822301,
        -1.944902965644602,
        0.972451482822301,
        1.989660620860693,
        -0.990750529959661,
    ]),
    Biquad::new([
        0.963669622248601,
        -1.927339244497202,
        0.963669622248601,
        1.970992420143032,
        -0.973473065140308,
    ]),
    Biquad::new([
        0.906313647059524,
        -1.812627294119048,
        0.906313647059524,
        1.848974099452832,
        -0.860723515924862,
    ]),
]);

/// Compute the number of samples to acquire for a duration.
///
/// # Note
/// The DMA engine transfers whole packets, so the count is rounded up to a multiple of the
/// packet size. If the buffer cannot hold that many samples, the count is clamped to the largest
/// whole number of packets that fits.
///
/// # Args
/// * `duration` - The desired acquisition duration.
/// * `sample_rate` - The ADC sample rate.
/// * `samples_per_packet` - The DMA packet size in samples.
/// * `capacity` - The capacity of the sample buffer.
pub fn sample_count(
    duration: Duration,
    sample_rate: HertzU32,
    samples_per_packet: usize,
    capacity: usize,
) -> usize {
    let packet = samples_per_packet.max(1);
    let count = to_samples(duration, sample_rate).div_ceil(packet) * packet;

    if count > capacity {
        capacity - capacity % packet
    } else {
        count
    }
}

/// Pre-allocated storage for one acquisition.
pub struct SampleBuffer<'a> {
    storage: &'a mut [Sample],
    len: usize,
    normalized: bool,
}

impl<'a> SampleBuffer<'a> {
    /// Construct a sample buffer.
    ///
    /// # Args
    /// * `storage` - The backing memory. Its length is the capacity of the buffer.
    pub fn new(storage: &'a mut [Sample]) -> Self {
        Self {
            storage,
            len: 0,
            normalized: false,
        }
    }

    /// The maximum number of samples that can be acquired at once.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The number of samples held from the last acquisition.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indicates that the held samples are zero-referenced.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// The samples of the last acquisition.
    pub fn samples(&self) -> &[Sample] {
        &self.storage[..self.len]
    }

    /// Acquire new samples, replacing the current contents.
    ///
    /// # Args
    /// * `source` - The sample source to acquire from.
    /// * `count` - The number of samples to acquire.
    pub fn acquire<S: SampleSource>(
        &mut self,
        source: &mut S,
        count: usize,
    ) -> Result<(), Error> {
        if count > self.capacity() {
            return Err(Error::Capacity {
                requested: count,
                capacity: self.capacity(),
            });
        }

        // The contents are undefined until the transfer completes.
        self.len = 0;
        self.normalized = false;

        source.acquire(&mut self.storage[..count]).map_err(|err| {
            log::error!("Acquisition of {} samples failed: {:?}", count, err);
            Error::Acquisition
        })?;

        self.len = count;
        Ok(())
    }

    /// Convert raw ADC codes to zero-referenced values in place.
    ///
    /// # Note
    /// Samples that are already normalized are left untouched.
    pub fn normalize(&mut self) {
        if self.normalized {
            return;
        }

        for sample in self.storage[..self.len].iter_mut() {
            for value in sample.iter_mut() {
                *value = AdcCode::from(*value).into();
            }
        }

        self.normalized = true;
    }

    /// Filter every channel through a cascade in place.
    ///
    /// # Note
    /// Raw samples are normalized first. Filter state starts from zero on every call.
    pub fn filter<const K: usize>(&mut self, cascade: &Cascade<K>) {
        self.normalize();
        cascade.filter(&mut self.storage[..self.len]);
    }
}
