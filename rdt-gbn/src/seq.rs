//! Cyclic sequence-number arithmetic.
//!
//! Sequence numbers live in `0..size` where `size = S - 1`.  Every addition
//! and subtraction is taken modulo `size`; plain integer comparison is never
//! meaningful across a wrap.

/// Modular arithmetic over a sequence space of `size` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    size: u16,
}

impl SeqSpace {
    /// `size` is the number of distinct sequence numbers (at most 256).
    pub fn new(size: u16) -> Self {
        debug_assert!(size >= 2 && size <= 256, "sequence space {size} out of range");
        Self { size }
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    /// Largest sequence number in the space.
    pub fn max_seq(&self) -> u8 {
        (self.size - 1) as u8
    }

    /// `seq + 1`, wrapping to 0 after [`max_seq`](Self::max_seq).
    #[inline]
    pub fn next(&self, seq: u8) -> u8 {
        ((u16::from(seq) + 1) % self.size) as u8
    }

    /// Non-negative distance from `from` forward to `to`.
    ///
    /// `from == None` stands for "nothing acknowledged yet" and behaves as
    /// `-1`, so the distance to sequence 0 is 1.
    #[inline]
    pub fn gap(&self, from: Option<u8>, to: u8) -> u16 {
        (i32::from(to) - raw(from)).rem_euclid(i32::from(self.size)) as u16
    }

    /// `true` when `ack` sits just behind `last_ack` across the wrap, within
    /// `window` positions of closing the cycle.
    ///
    /// Such an ACK cannot be told apart from a stale one and is dropped
    /// before any window arithmetic happens.
    #[inline]
    pub fn is_ambiguous_wrap(&self, last_ack: Option<u8>, ack: u8, window: usize) -> bool {
        let last = raw(last_ack);
        let ack = i32::from(ack);
        ack > last && last + i32::from(self.size) - ack <= window as i32
    }
}

/// Integer view of an optional sequence number, `-1` for none.
#[inline]
fn raw(seq: Option<u8>) -> i32 {
    seq.map_or(-1, i32::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_at_max() {
        let s = SeqSpace::new(127);
        assert_eq!(s.max_seq(), 126);
        assert_eq!(s.next(0), 1);
        assert_eq!(s.next(125), 126);
        assert_eq!(s.next(126), 0);
    }

    #[test]
    fn full_byte_space() {
        let s = SeqSpace::new(256);
        assert_eq!(s.max_seq(), 255);
        assert_eq!(s.next(255), 0);
        assert_eq!(s.gap(Some(250), 3), 9);
    }

    #[test]
    fn gap_from_sentinel() {
        let s = SeqSpace::new(127);
        assert_eq!(s.gap(None, 0), 1);
        assert_eq!(s.gap(None, 14), 15);
        assert_eq!(s.gap(None, 126), 0);
    }

    #[test]
    fn gap_across_wrap() {
        let s = SeqSpace::new(127);
        assert_eq!(s.gap(Some(120), 3), 10);
        assert_eq!(s.gap(Some(3), 3), 0);
        assert_eq!(s.gap(Some(3), 2), 126);
    }

    #[test]
    fn ambiguous_wrap_guard() {
        let s = SeqSpace::new(127);
        // 2 + 127 - 125 = 4 <= 15: an ACK from just before the wrap.
        assert!(s.is_ambiguous_wrap(Some(2), 125, 15));
        // 2 + 127 - 100 = 29 > 15.
        assert!(!s.is_ambiguous_wrap(Some(2), 100, 15));
        // Not ahead of last_ack at all.
        assert!(!s.is_ambiguous_wrap(Some(120), 3, 15));
        // From the sentinel, 111..=126 trip the guard.
        assert!(s.is_ambiguous_wrap(None, 111, 15));
        assert!(!s.is_ambiguous_wrap(None, 110, 15));
        assert!(!s.is_ambiguous_wrap(None, 0, 15));
    }
}
