//! Splits outbound messages into sequence-numbered packets.

use std::collections::VecDeque;

use crate::config::RdtConfig;
use crate::packet::{Packet, PacketError};
use crate::seq::SeqSpace;

/// Cuts a message into `max_payload`-sized chunks and encodes each one.
#[derive(Debug, Clone)]
pub struct Fragmenter {
    config: RdtConfig,
    space: SeqSpace,
}

impl Fragmenter {
    pub fn new(config: &RdtConfig) -> Self {
        Self {
            config: config.clone(),
            space: SeqSpace::new(config.seq_space()),
        }
    }

    /// Encode `message` into packets appended to `out`.
    ///
    /// Each chunk takes `*next_seq`, which then advances modulo the sequence
    /// space.  Every chunk is full-sized except possibly the last; an empty
    /// message yields nothing.  Returns the number of packets created.
    pub fn fragment(
        &self,
        message: &[u8],
        next_seq: &mut u8,
        out: &mut VecDeque<Packet>,
    ) -> Result<usize, PacketError> {
        let mut created = 0;
        for chunk in message.chunks(self.config.max_payload()) {
            out.push_back(Packet::encode(&self.config, *next_seq, chunk)?);
            *next_seq = self.space.next(*next_seq);
            created += 1;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(message: &[u8], start: u8) -> (Vec<Packet>, u8) {
        let frag = Fragmenter::new(&RdtConfig::default());
        let mut seq = start;
        let mut out = VecDeque::new();
        let n = frag.fragment(message, &mut seq, &mut out).unwrap();
        assert_eq!(n, out.len());
        (out.into_iter().collect(), seq)
    }

    #[test]
    fn two_hundred_bytes_make_four_packets() {
        let msg: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let (pkts, next) = run(&msg, 0);

        let lens: Vec<usize> = pkts.iter().map(Packet::payload_len).collect();
        let seqs: Vec<u8> = pkts.iter().map(Packet::seq).collect();
        assert_eq!(lens, vec![60, 60, 60, 20]);
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert_eq!(next, 4);

        let joined: Vec<u8> = pkts
            .iter()
            .flat_map(|p| p.payload(60).unwrap().to_vec())
            .collect();
        assert_eq!(joined, msg);
        assert!(pkts.iter().all(Packet::verify));
    }

    #[test]
    fn empty_message_makes_nothing() {
        let (pkts, next) = run(b"", 9);
        assert!(pkts.is_empty());
        assert_eq!(next, 9);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let (pkts, next) = run(&[1u8; 120], 0);
        assert_eq!(pkts.len(), 2);
        assert!(pkts.iter().all(|p| p.payload_len() == 60));
        assert_eq!(next, 2);
    }

    #[test]
    fn sequence_wraps_at_end_of_space() {
        let (pkts, next) = run(&[7u8; 150], 125);
        let seqs: Vec<u8> = pkts.iter().map(Packet::seq).collect();
        assert_eq!(seqs, vec![125, 126, 0]);
        assert_eq!(next, 1);
    }
}
