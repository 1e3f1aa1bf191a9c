//! Wire format for data and acknowledgment packets.
//!
//! Every unit exchanged between the two endpoints is a [`Packet`]: a block of
//! exactly `packet_size` bytes.  This module is responsible for:
//! - Laying out the header and payload inside that block.
//! - Computing and verifying the 16-bit checksum.
//! - Rejecting raw buffers that cannot be a packet at all (wrong size).
//!
//! No I/O happens here.  A checksum mismatch is *not* an error: callers ask
//! [`Packet::verify`] and silently drop what fails.
//!
//! # Wire format
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Payload Len L |   Seq / Ack   |       Checksum (big-endian)   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (L bytes) ...                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Zero padding up to packet_size (checksummed)        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! ACKs reuse the format unchanged: the receiver echoes the accepted data
//! packet and the sender reads the sequence field as the ACK number.

use thiserror::Error;

use crate::config::{RdtConfig, HEADER_LEN};

// Byte offsets of each header field.
const OFF_LEN: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_CHECKSUM: usize = 2;

/// Errors from building a packet or adopting a raw buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("payload of {len} bytes exceeds the {max}-byte maximum")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("sequence number {seq} is outside the {space}-value sequence space")]
    SeqOutOfRange { seq: u8, space: u16 },
    #[error("expected a {expected}-byte packet, got {actual} bytes")]
    SizeMismatch { expected: usize, actual: usize },
}

/// One fixed-size packet, header included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    /// Build a packet carrying `payload` with sequence number `seq`.
    ///
    /// The buffer is zero-filled to `config.packet_size` and the checksum is
    /// computed last, over every byte except the checksum field itself.
    pub fn encode(config: &RdtConfig, seq: u8, payload: &[u8]) -> Result<Self, PacketError> {
        let max = config.max_payload();
        if payload.len() > max {
            return Err(PacketError::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }
        let space = config.seq_space();
        if u16::from(seq) >= space {
            return Err(PacketError::SeqOutOfRange { seq, space });
        }

        let mut bytes = vec![0u8; config.packet_size];
        bytes[OFF_LEN] = payload.len() as u8;
        bytes[OFF_SEQ] = seq;
        bytes[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

        let csum = checksum(&bytes);
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());

        Ok(Self { bytes })
    }

    /// Adopt a raw buffer received from the channel.
    ///
    /// Only the size is checked; content is validated by [`verify`](Self::verify)
    /// and [`payload`](Self::payload) at the endpoint.
    pub fn from_bytes(bytes: Vec<u8>, config: &RdtConfig) -> Result<Self, PacketError> {
        if bytes.len() != config.packet_size {
            return Err(PacketError::SizeMismatch {
                expected: config.packet_size,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Declared payload length (byte 0), not yet range-checked.
    pub fn payload_len(&self) -> usize {
        usize::from(self.bytes[OFF_LEN])
    }

    /// Sequence number, or ACK number on the reverse path (byte 1).
    pub fn seq(&self) -> u8 {
        self.bytes[OFF_SEQ]
    }

    /// Checksum as carried on the wire (bytes 2–3).
    pub fn stored_checksum(&self) -> u16 {
        u16::from_be_bytes([self.bytes[OFF_CHECKSUM], self.bytes[OFF_CHECKSUM + 1]])
    }

    /// `true` when the recomputed checksum matches the stored one.
    pub fn verify(&self) -> bool {
        checksum(&self.bytes) == self.stored_checksum()
    }

    /// Payload bytes, or `None` when the declared length exceeds `max_payload`.
    pub fn payload(&self, max_payload: usize) -> Option<&[u8]> {
        let len = self.payload_len();
        if len > max_payload || HEADER_LEN + len > self.bytes.len() {
            return None;
        }
        Some(&self.bytes[HEADER_LEN..HEADER_LEN + len])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Invert bit `bit` (counted from the MSB of byte 0) in place.
    ///
    /// Used by fault injection to model line noise.
    pub fn flip_bit(&mut self, bit: usize) {
        let idx = bit / 8;
        if let Some(byte) = self.bytes.get_mut(idx) {
            *byte ^= 0x80 >> (bit % 8);
        }
    }
}

/// Compute the packet checksum over a full packet buffer.
///
/// The running sum is seeded with the length and sequence bytes as one
/// big-endian word.  Every word from offset [`HEADER_LEN`] to the end is then
/// added, skipping the checksum field.  After each addition a carry out of bit
/// 15 is folded back in exactly once; the fold is never repeated.  A trailing
/// odd byte is padded with a zero low byte.  The result is the complement of
/// the sum.
pub fn checksum(bytes: &[u8]) -> u16 {
    let byte = |i: usize| u32::from(bytes.get(i).copied().unwrap_or(0));

    let mut sum = fold_once((byte(OFF_LEN) << 8) | byte(OFF_SEQ));
    let mut i = HEADER_LEN;
    while i < bytes.len() {
        sum = fold_once(sum + ((byte(i) << 8) | byte(i + 1)));
        i += 2;
    }
    !(sum as u16)
}

#[inline]
fn fold_once(sum: u32) -> u32 {
    if sum & 0xFFFF_0000 != 0 {
        (sum & 0xFFFF) + 1
    } else {
        sum
    }
}
