//! Tracker data stream capabilities
//!
//! # Design
//! Samples, correlation curves and delay results are streamed to the host over UDP. Every
//! datagram ("frame") carries a header followed by a contiguous run of elements of a single type.
//! A block of elements that does not fit into one frame is split over consecutive frames that
//! share a sequence number, and the host reassembles the block from the element offsets.
//!
//! ## Frame Header
//! The header consists of the following, all in little-endian.
//!
//! * **Magic word 0x7A48** (u16): a constant to identify tracker streaming data.
//! * **Format Code** (u8): the element type of the payload. Refer to [Format].
//! * **Channels** (u8): the number of channels interleaved (samples) or concatenated
//!   (correlation curves, delays) in the block.
//! * **Sequence Number** (u32): the sequence number of the block.
//! * **Offset** (u32): the index of the first payload element within the block.
//! * **Total** (u32): the number of elements in the block.
use core::net::SocketAddr;

use embedded_nal::UdpClientStack;
use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::{connect, send};
use crate::hardware::NetworkStack;
use crate::Error;

// Magic first bytes indicating a UDP frame of streaming data
pub const MAGIC: u16 = 0x7A48;

// The size of the header in bytes.
pub const HEADER_SIZE: usize = 16;

// The size of each frame in bytes.
// Ensure the resulting ethernet frame is within the MTU:
// 1500 MTU - 40 IP6 header - 8 UDP header - 32 VPN - 20 IP4
pub const FRAME_SIZE: usize = 1500 - 40 - 8 - 32 - 20;

/// Specifies the format of streamed data
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Format {
    /// Reserved, unused format specifier.
    Unknown = 0,

    /// Raw offset-binary ADC codes, one i16 per channel and sample, interleaved.
    AdcCodes = 1,

    /// Zero-referenced samples, one i16 per channel and sample, interleaved.
    Samples = 2,

    /// Normalized correlation curves as f32, one curve per secondary channel.
    Correlation = 3,

    /// Delays in nanoseconds as i32, one per secondary channel.
    Delays = 4,
}

/// The header of a stream frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    pub format: Format,
    pub channels: u8,
    pub sequence_number: u32,
    pub offset: u32,
    pub total: u32,
}

impl Header {
    fn write(&self, frame: &mut Vec<u8, FRAME_SIZE>) {
        let format: u8 = self.format.into();
        for field in [
            &MAGIC.to_le_bytes()[..],
            &[format, self.channels][..],
            &self.sequence_number.to_le_bytes()[..],
            &self.offset.to_le_bytes()[..],
            &self.total.to_le_bytes()[..],
        ] {
            // Note(unwrap): The frame is cleared before the header is written and the header is
            // smaller than the frame.
            frame.extend_from_slice(field).unwrap();
        }
    }

    /// Parse the header of a received frame.
    ///
    /// # Returns
    /// The header and the payload, or `None` if the frame is not a stream frame.
    pub fn parse(frame: &[u8]) -> Option<(Self, &[u8])> {
        if frame.len() < HEADER_SIZE {
            return None;
        }

        let (header, payload) = frame.split_at(HEADER_SIZE);
        let word = |i: usize| {
            u32::from_le_bytes([
                header[i],
                header[i + 1],
                header[i + 2],
                header[i + 3],
            ])
        };

        if u16::from_le_bytes([header[0], header[1]]) != MAGIC {
            return None;
        }

        let header = Self {
            format: Format::try_from(header[2]).ok()?,
            channels: header[3],
            sequence_number: word(4),
            offset: word(8),
            total: word(12),
        };

        Some((header, payload))
    }
}

/// A UDP stream of blocks to a fixed remote.
pub struct DataStream<N: UdpClientStack> {
    socket: N::UdpSocket,
    remote: SocketAddr,
    sequence_number: u32,
    frame: Vec<u8, FRAME_SIZE>,
}

impl<N: NetworkStack> DataStream<N> {
    /// Open a stream.
    ///
    /// # Args
    /// * `stack` - The network stack.
    /// * `remote` - The destination to send stream data to.
    pub fn open(stack: &mut N, remote: SocketAddr) -> Result<Self, Error> {
        let socket = connect(stack, remote)?;

        log::info!("Opening stream to {}", remote);

        Ok(Self {
            socket,
            remote,
            sequence_number: 0,
            frame: Vec::new(),
        })
    }

    /// Send a block of elements.
    ///
    /// # Note
    /// The block is transmitted completely before this returns. An empty block is sent as a
    /// single frame without payload.
    ///
    /// # Args
    /// * `stack` - The network stack.
    /// * `format` - The format of the elements.
    /// * `channels` - The number of channels in the block.
    /// * `elements` - The block to send.
    pub fn send<T: bytemuck::Pod>(
        &mut self,
        stack: &mut N,
        format: Format,
        channels: u8,
        elements: &[T],
    ) -> Result<(), Error> {
        let per_frame =
            (FRAME_SIZE - HEADER_SIZE) / core::mem::size_of::<T>().max(1);

        let mut header = Header {
            format,
            channels,
            sequence_number: self.sequence_number,
            offset: 0,
            total: elements.len() as u32,
        };
        self.sequence_number = self.sequence_number.wrapping_add(1);

        let mut offset = 0;
        loop {
            let end = elements.len().min(offset + per_frame);
            let chunk = &elements[offset..end];

            self.frame.clear();
            header.offset = offset as u32;
            header.write(&mut self.frame);
            // Note(unwrap): The chunk is sized to fit the remainder of the frame.
            self.frame
                .extend_from_slice(bytemuck::cast_slice(chunk))
                .unwrap();

            send(stack, &mut self.socket, &self.frame)?;

            offset = end;
            if offset >= elements.len() {
                break;
            }
        }

        log::trace!(
            "Streamed {} elements of {:?} to {}",
            elements.len(),
            format,
            self.remote
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut frame = Vec::new();
        Header {
            format: Format::Samples,
            channels: 4,
            sequence_number: 0x0102_0304,
            offset: 173,
            total: 1500,
        }
        .write(&mut frame);

        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(
            &frame[..8],
            &[0x48, 0x7A, 2, 4, 0x04, 0x03, 0x02, 0x01]
        );

        let (header, payload) = Header::parse(&frame).unwrap();
        assert_eq!(header.offset, 173);
        assert_eq!(header.total, 1500);
        assert!(payload.is_empty());
    }

    #[test]
    fn foreign_frames_are_rejected() {
        assert_eq!(Header::parse(&[0; 8]), None);
        assert_eq!(Header::parse(&[0; HEADER_SIZE]), None);

        let mut frame = [0; HEADER_SIZE];
        frame[..2].copy_from_slice(&MAGIC.to_le_bytes());
        frame[2] = 200;
        assert_eq!(Header::parse(&frame), None);
    }
}
