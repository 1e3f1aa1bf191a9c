//! Protocol constants shared by both endpoints.
//!
//! A single [`RdtConfig`] value is built once, validated, and handed to the
//! codec, the fragmenter, the sender, and the receiver.  Both ends of a link
//! must agree on every field.

use std::time::Duration;

use thiserror::Error;

/// Byte length of the fixed header: length(1) + seq(1) + checksum(2).
pub const HEADER_LEN: usize = 4;

/// Largest payload length the one-byte length field can carry.
const MAX_LEN_FIELD: usize = u8::MAX as usize;

/// Errors raised by [`RdtConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("packet size {0} leaves no room for a payload after the 4-byte header")]
    PacketTooSmall(usize),
    #[error("packet size {0} gives a payload longer than the length field can describe")]
    PacketTooLarge(usize),
    #[error("sequence modulus {0} must be in 3..=257")]
    SeqModulus(u16),
    #[error("window size {window} must be in 1..{space} (sequence space size)")]
    WindowSize { window: usize, space: u16 },
    #[error("retransmit timeout must be non-zero")]
    ZeroTimeout,
}

/// Tunable protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdtConfig {
    /// Fixed on-wire packet size `P` in bytes, header included.
    pub packet_size: usize,
    /// Sequence modulus `S`; usable sequence numbers are `0..=S-2`.
    pub seq_modulus: u16,
    /// Maximum number of unacknowledged packets `W`.
    pub window_size: usize,
    /// Retransmission timeout armed after every transmission.
    pub timeout: Duration,
    /// Cancel the timer when a cumulative ACK drains the window.
    ///
    /// Off by default: the classic behavior never cancels and lets an idle
    /// timer expire harmlessly.
    pub stop_timer_when_idle: bool,
}

impl Default for RdtConfig {
    fn default() -> Self {
        Self {
            packet_size: 64,
            seq_modulus: 128,
            window_size: 15,
            timeout: Duration::from_millis(300),
            stop_timer_when_idle: false,
        }
    }
}

impl RdtConfig {
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_seq_modulus(mut self, seq_modulus: u16) -> Self {
        self.seq_modulus = seq_modulus;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stop_timer_when_idle(mut self, enabled: bool) -> Self {
        self.stop_timer_when_idle = enabled;
        self
    }

    /// Largest payload a single packet carries (`P - 4`).
    pub fn max_payload(&self) -> usize {
        self.packet_size.saturating_sub(HEADER_LEN)
    }

    /// Number of distinct sequence numbers (`S - 1`).
    pub fn seq_space(&self) -> u16 {
        self.seq_modulus.saturating_sub(1)
    }

    /// Check every field against the limits imposed by the wire format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packet_size <= HEADER_LEN {
            return Err(ConfigError::PacketTooSmall(self.packet_size));
        }
        if self.max_payload() > MAX_LEN_FIELD {
            return Err(ConfigError::PacketTooLarge(self.packet_size));
        }
        // Largest sequence number is S-2 and must fit in one byte.
        if self.seq_modulus < 3 || self.seq_modulus > u8::MAX as u16 + 2 {
            return Err(ConfigError::SeqModulus(self.seq_modulus));
        }
        let space = self.seq_space();
        if self.window_size == 0 || self.window_size >= usize::from(space) {
            return Err(ConfigError::WindowSize {
                window: self.window_size,
                space,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
