//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only the packet numbered `expected_seq` is accepted.
//! - Corrupt, out-of-order, duplicate and malformed packets are **silently
//!   discarded**: no delivery, no ACK, no state change.
//! - An accepted packet is echoed back unmodified as the ACK; its sequence
//!   field doubles as the cumulative ACK number.

use crate::config::{ConfigError, RdtConfig};
use crate::context::{RdtReceiver, ReceiverContext};
use crate::packet::Packet;
use crate::seq::SeqSpace;

/// What [`GbnReceiver::on_packet`] did with an inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Delivered upward and acknowledged.
    Accepted,
    /// Checksum mismatch.
    Corrupt,
    /// Valid, but not the expected sequence number.
    OutOfOrder,
    /// Valid checksum, but the length field exceeds the maximum payload.
    Malformed,
}

/// Event counters for one receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub accepted: u64,
    pub corrupt: u64,
    pub out_of_order: u64,
    pub malformed: u64,
    pub bytes_delivered: u64,
}

/// Go-Back-N receive-side state for one link.
#[derive(Debug)]
pub struct GbnReceiver {
    max_payload: usize,
    space: SeqSpace,

    /// Next sequence number that will be accepted.
    expected_seq: u8,

    stats: ReceiverStats,
}

impl GbnReceiver {
    pub fn new(config: &RdtConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            max_payload: config.max_payload(),
            space: SeqSpace::new(config.seq_space()),
            expected_seq: 0,
            stats: ReceiverStats::default(),
        })
    }

    /// Process an inbound data packet.
    pub fn on_packet(&mut self, ctx: &mut dyn ReceiverContext, packet: Packet) -> Verdict {
        let seq = packet.seq();
        log::trace!(
            "[gbn:recv] ← DATA seq={} expected_seq={}",
            seq,
            self.expected_seq
        );

        if !packet.verify() {
            self.stats.corrupt += 1;
            log::debug!("[gbn:recv] ← DATA seq={} corrupt, dropped", seq);
            return Verdict::Corrupt;
        }
        if seq != self.expected_seq {
            self.stats.out_of_order += 1;
            log::debug!(
                "[gbn:recv] ← DATA seq={} out of order (expected {}), dropped",
                seq,
                self.expected_seq
            );
            return Verdict::OutOfOrder;
        }
        let Some(payload) = packet.payload(self.max_payload) else {
            self.stats.malformed += 1;
            log::debug!(
                "[gbn:recv] ← DATA seq={} length {} out of range, dropped",
                seq,
                packet.payload_len()
            );
            return Verdict::Malformed;
        };

        ctx.deliver(payload);
        self.stats.accepted += 1;
        self.stats.bytes_delivered += payload.len() as u64;

        ctx.send_to_lower(packet);
        self.expected_seq = self.space.next(self.expected_seq);
        log::debug!(
            "[gbn:recv] ← DATA seq={} accepted; → ACK ack={}",
            seq,
            seq
        );
        Verdict::Accepted
    }

    /// Next sequence number that will be accepted.
    pub fn expected_seq(&self) -> u8 {
        self.expected_seq
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

impl RdtReceiver for GbnReceiver {
    fn on_packet(&mut self, ctx: &mut dyn ReceiverContext, packet: Packet) {
        GbnReceiver::on_packet(self, ctx, packet);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
