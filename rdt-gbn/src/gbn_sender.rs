//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] turns application messages into packets and keeps up to
//! `window_size` of them in flight.
//!
//! # Protocol contract
//!
//! - Packets are numbered consecutively modulo `S - 1`; a packet keeps its
//!   number for life and is never re-fragmented.
//! - Packets wait in an unbounded FIFO buffer until the window has room.
//! - ACKs are **cumulative**: an ACK carrying `K` acknowledges every
//!   outstanding packet up to and including `K`.
//! - On timeout **all** packets in the window are retransmitted unchanged,
//!   oldest first (go back N).
//! - The retransmit timer is re-armed after *every* transmission, first sends
//!   and retransmissions alike.  Each new send therefore pushes the deadline
//!   of the whole window back.
//!
//! Per-packet lifecycle:
//!
//! ```text
//!  Buffered ──admit──▶ InWindow ──cumulative ACK──▶ (removed)
//!                       │    ▲
//!                       └────┘ timeout: retransmit, same seq
//! ```

use std::collections::VecDeque;

use crate::config::{ConfigError, RdtConfig};
use crate::context::{RdtSender, SenderContext};
use crate::fragmenter::Fragmenter;
use crate::packet::Packet;
use crate::seq::SeqSpace;

// ---------------------------------------------------------------------------
// GbnEntry
// ---------------------------------------------------------------------------

/// A single in-flight packet occupying one slot in the window.
#[derive(Debug, Clone)]
pub struct GbnEntry {
    /// The encoded packet, kept byte-for-byte for retransmission.
    pub packet: Packet,
    /// Total number of times this packet has been transmitted.
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// AckOutcome / SenderStats
// ---------------------------------------------------------------------------

/// What [`GbnSender::on_ack`] did with an inbound ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Checksum mismatch; dropped.
    Corrupt,
    /// Number outside the sequence space; dropped without touching the
    /// buffer.
    OutOfRange,
    /// Tripped the wrap-around guard; dropped without touching the buffer.
    Ambiguous,
    /// Same value as the last accepted ACK.
    Duplicate,
    /// Further ahead than one window; ignored.
    Stale,
    /// Slid the window by `acked` packets.
    Advanced { acked: usize },
}

/// Event counters for one sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub packets_created: u64,
    /// First transmissions (admissions into the window).
    pub packets_sent: u64,
    pub retransmissions: u64,
    /// Timer expiries that found a non-empty window.
    pub timeouts: u64,
    pub acks_accepted: u64,
    pub acks_ignored: u64,
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state.
///
/// # Sequence-number layout
///
/// ```text
///   last_ack   window            next_seq
///      │ ┌────────────────┐┌─────────┐│
///  ────┼─┤ sent, unacked  ├┤ buffered├┼──────▶ seq space (mod S-1)
///        └────────────────┘└─────────┘
/// ```
#[derive(Debug)]
pub struct GbnSender {
    config: RdtConfig,
    space: SeqSpace,
    fragmenter: Fragmenter,

    /// Sequence number the next created packet will carry.
    next_seq: u8,

    /// Highest cumulatively acknowledged sequence number; `None` until the
    /// first ACK.
    last_ack: Option<u8>,

    /// Created but not yet admitted to the window.
    buffer: VecDeque<Packet>,

    /// Sent but unacknowledged, oldest first.  Never longer than `window_size`.
    window: VecDeque<GbnEntry>,

    stats: SenderStats,
}

impl GbnSender {
    pub fn new(config: RdtConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            space: SeqSpace::new(config.seq_space()),
            fragmenter: Fragmenter::new(&config),
            window: VecDeque::with_capacity(config.window_size),
            config,
            next_seq: 0,
            last_ack: None,
            buffer: VecDeque::new(),
            stats: SenderStats::default(),
        })
    }

    /// Fragment `message` into the buffer, then fill the window.
    ///
    /// Returns the number of packets created.
    pub fn submit(&mut self, ctx: &mut dyn SenderContext, message: &[u8]) -> usize {
        let created = match self
            .fragmenter
            .fragment(message, &mut self.next_seq, &mut self.buffer)
        {
            Ok(n) => n,
            Err(e) => {
                log::error!("[gbn:send] cannot packetize {}-byte message: {e}", message.len());
                0
            }
        };
        self.stats.packets_created += created as u64;
        log::debug!(
            "[gbn:send] ← APP len={} packets={} next_seq={}",
            message.len(),
            created,
            self.next_seq
        );
        self.admit_from_buffer(ctx);
        created
    }

    /// Move buffered packets into the window while it has room.
    ///
    /// Each admitted packet is transmitted and the timer re-armed.  Returns
    /// the number admitted.
    pub fn admit_from_buffer(&mut self, ctx: &mut dyn SenderContext) -> usize {
        let mut admitted = 0;
        while self.window.len() < self.config.window_size {
            let Some(packet) = self.buffer.pop_front() else {
                break;
            };
            log::trace!(
                "[gbn:send] → DATA seq={} len={}",
                packet.seq(),
                packet.payload_len()
            );
            ctx.send_to_lower(packet.clone());
            ctx.start_timer(self.config.timeout);
            self.window.push_back(GbnEntry {
                packet,
                tx_count: 1,
            });
            admitted += 1;
        }
        self.stats.packets_sent += admitted as u64;
        admitted
    }

    /// Process an ACK packet from the receiver.
    pub fn on_ack(&mut self, ctx: &mut dyn SenderContext, packet: &Packet) -> AckOutcome {
        if !packet.verify() {
            self.stats.acks_ignored += 1;
            log::debug!("[gbn:send] ← ACK corrupt, dropped");
            return AckOutcome::Corrupt;
        }

        let ack = packet.seq();
        if u16::from(ack) >= self.space.size() {
            self.stats.acks_ignored += 1;
            log::debug!(
                "[gbn:send] ← ACK ack={} outside sequence space of {}, dropped",
                ack,
                self.space.size()
            );
            return AckOutcome::OutOfRange;
        }
        if self
            .space
            .is_ambiguous_wrap(self.last_ack, ack, self.config.window_size)
        {
            self.stats.acks_ignored += 1;
            log::debug!(
                "[gbn:send] ← ACK ack={} ambiguous against last_ack={:?}",
                ack,
                self.last_ack
            );
            return AckOutcome::Ambiguous;
        }

        let gap = usize::from(self.space.gap(self.last_ack, ack));
        let outcome = if gap == 0 {
            AckOutcome::Duplicate
        } else if gap > self.config.window_size {
            AckOutcome::Stale
        } else {
            // The window is contiguous from last_ack + 1, so the first `gap`
            // entries are exactly those covered by this ACK.
            let acked = gap.min(self.window.len());
            self.window.drain(..acked);
            self.last_ack = Some(ack);
            AckOutcome::Advanced { acked }
        };

        match outcome {
            AckOutcome::Advanced { acked } => {
                self.stats.acks_accepted += 1;
                log::debug!(
                    "[gbn:send] ← ACK ack={} slid={} in_flight={}",
                    ack,
                    acked,
                    self.window.len()
                );
            }
            _ => {
                self.stats.acks_ignored += 1;
                log::debug!("[gbn:send] ← ACK ack={} ignored ({:?})", ack, outcome);
            }
        }

        self.admit_from_buffer(ctx);

        if self.config.stop_timer_when_idle && self.window.is_empty() && ctx.is_timer_set() {
            ctx.stop_timer();
        }
        outcome
    }

    /// Retransmit the whole window, oldest first.
    ///
    /// Returns the number of packets resent; an empty window is a no-op.
    pub fn on_timeout(&mut self, ctx: &mut dyn SenderContext) -> usize {
        if self.window.is_empty() {
            log::trace!("[gbn:send] timeout with empty window");
            return 0;
        }

        let timeout = self.config.timeout;
        for entry in self.window.iter_mut() {
            ctx.send_to_lower(entry.packet.clone());
            ctx.start_timer(timeout);
            entry.tx_count += 1;
        }

        let resent = self.window.len();
        self.stats.timeouts += 1;
        self.stats.retransmissions += resent as u64;
        log::debug!(
            "[gbn:send] timeout, retransmitting {} packet(s) from seq={:?}",
            resent,
            self.window.front().map(|e| e.packet.seq())
        );
        resent
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &RdtConfig {
        &self.config
    }

    pub fn next_seq(&self) -> u8 {
        self.next_seq
    }

    pub fn last_ack(&self) -> Option<u8> {
        self.last_ack
    }

    /// Number of packets awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    /// Number of packets waiting for window space.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_idle(&self) -> bool {
        self.window.is_empty() && self.buffer.is_empty()
    }

    /// Sequence numbers currently in the window, oldest first.
    pub fn window_seqs(&self) -> impl Iterator<Item = u8> + '_ {
        self.window.iter().map(|e| e.packet.seq())
    }

    pub fn window_entries(&self) -> impl Iterator<Item = &GbnEntry> {
        self.window.iter()
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}

impl RdtSender for GbnSender {
    fn submit(&mut self, ctx: &mut dyn SenderContext, message: &[u8]) {
        GbnSender::submit(self, ctx, message);
    }

    fn on_packet(&mut self, ctx: &mut dyn SenderContext, packet: Packet) {
        self.on_ack(ctx, &packet);
    }

    fn on_timeout(&mut self, ctx: &mut dyn SenderContext) {
        GbnSender::on_timeout(self, ctx);
    }

    fn is_idle(&self) -> bool {
        GbnSender::is_idle(self)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
