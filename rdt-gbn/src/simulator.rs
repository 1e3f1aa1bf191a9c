//! Deterministic discrete-event network simulator.
//!
//! Real networks drop, corrupt, reorder, and duplicate packets.  To exercise
//! the reliability mechanisms without depending on actual network conditions,
//! [`Simulator`] plays the channel between one [`RdtSender`] and one
//! [`RdtReceiver`] in virtual time, applying a configurable fault model to
//! every packet either side transmits:
//!
//! | Fault            | Description                                       |
//! |------------------|---------------------------------------------------|
//! | Packet loss      | Drop a packet with probability `loss_rate`.       |
//! | Corruption       | Flip one random bit with probability `corrupt_rate`. |
//! | Reordering       | Delay a packet by `reorder_delay`, letting later  |
//! |                  | packets overtake it.                              |
//! | Duplication      | Deliver a packet twice.                           |
//!
//! All randomness comes from a `StdRng` seeded with `seed`, so a failing run
//! replays exactly.  Events at the same instant are processed in the order
//! they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::context::{RdtReceiver, RdtSender, ReceiverContext, SenderContext};
use crate::packet::Packet;
use crate::timer::RetransmitTimer;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulatorError {
    #[error("{name} = {value} is not a probability in [0, 1]")]
    InvalidRate { name: &'static str, value: f64 },
}

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given packet is silently dropped.
    pub loss_rate: f64,
    /// Probability that a packet has one bit flipped in transit.
    pub corrupt_rate: f64,
    /// Probability that a packet is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a packet is held back by `reorder_delay`.
    pub reorder_rate: f64,
    /// One-way propagation delay applied to every packet.
    pub latency: Duration,
    /// Extra delay applied to reordered packets.
    pub reorder_delay: Duration,
    /// Apply the fault model to ACKs as well as data.  When `false` the
    /// receiver-to-sender path only adds `latency`.
    pub ack_faults: bool,
    /// RNG seed.
    pub seed: u64,
    /// Virtual time after which [`Simulator::run`] gives up.
    pub time_limit: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            latency: Duration::from_millis(10),
            reorder_delay: Duration::from_millis(50),
            ack_faults: true,
            seed: 0,
            time_limit: Duration::from_secs(600),
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulatorError> {
        for (name, value) in [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
            ("duplicate_rate", self.duplicate_rate),
            ("reorder_rate", self.reorder_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulatorError::InvalidRate { name, value });
            }
        }
        Ok(())
    }
}

/// What the channel did to the packets it carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub packets_offered: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// Outcome of [`Simulator::run`].
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Concatenation of every scheduled application message.
    pub expected: Vec<u8>,
    /// Concatenation of everything the receiver delivered.
    pub delivered: Vec<u8>,
    /// Virtual time of the last processed event.
    pub finished_at: Duration,
    pub events: u64,
    pub timer_arms: u64,
    pub channel: ChannelStats,
}

impl SimulationReport {
    /// `true` when every byte arrived exactly once and in order.
    pub fn is_exact(&self) -> bool {
        self.delivered == self.expected
    }
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Event {
    /// A message from the application above the sender.
    AppMessage(Vec<u8>),
    /// A data packet arriving at the receiver.
    ToReceiver(Packet),
    /// An ACK arriving at the sender.
    ToSender(Packet),
    /// Wake-up for a timer deadline; stale if the timer was re-armed since.
    TimerCheck,
}

#[derive(Debug)]
struct Scheduled {
    at: Duration,
    order: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: BinaryHeap is a max-heap, we want the earliest event on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

// ---------------------------------------------------------------------------
// Per-callback contexts
// ---------------------------------------------------------------------------

struct SenderSide<'a> {
    now: Duration,
    timer: &'a mut RetransmitTimer<Duration>,
    outbox: &'a mut Vec<Packet>,
}

impl SenderContext for SenderSide<'_> {
    fn now(&self) -> Duration {
        self.now
    }

    fn start_timer(&mut self, timeout: Duration) {
        self.timer.arm(self.now.saturating_add(timeout));
    }

    fn stop_timer(&mut self) {
        self.timer.cancel();
    }

    fn is_timer_set(&self) -> bool {
        self.timer.is_armed()
    }

    fn send_to_lower(&mut self, packet: Packet) {
        self.outbox.push(packet);
    }
}

struct ReceiverSide<'a> {
    now: Duration,
    outbox: &'a mut Vec<Packet>,
    delivered: &'a mut Vec<u8>,
}

impl ReceiverContext for ReceiverSide<'_> {
    fn now(&self) -> Duration {
        self.now
    }

    fn send_to_lower(&mut self, packet: Packet) {
        self.outbox.push(packet);
    }

    fn deliver(&mut self, data: &[u8]) {
        self.delivered.extend_from_slice(data);
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ToReceiver,
    ToSender,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Virtual-time channel connecting one sender to one receiver.
pub struct Simulator<S, R> {
    config: SimulatorConfig,
    sender: S,
    receiver: R,
    rng: StdRng,
    queue: BinaryHeap<Scheduled>,
    next_order: u64,
    now: Duration,
    timer: RetransmitTimer<Duration>,
    pending_messages: usize,
    expected: Vec<u8>,
    delivered: Vec<u8>,
    channel: ChannelStats,
    events: u64,
}

impl<S: RdtSender, R: RdtReceiver> Simulator<S, R> {
    pub fn new(config: SimulatorConfig, sender: S, receiver: R) -> Result<Self, SimulatorError> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            sender,
            receiver,
            queue: BinaryHeap::new(),
            next_order: 0,
            now: Duration::ZERO,
            timer: RetransmitTimer::new(),
            pending_messages: 0,
            expected: Vec::new(),
            delivered: Vec::new(),
            channel: ChannelStats::default(),
            events: 0,
        })
    }

    /// Queue an application message for submission at virtual time `at`.
    pub fn schedule_message(&mut self, at: Duration, message: Vec<u8>) {
        self.expected.extend_from_slice(&message);
        self.pending_messages += 1;
        self.schedule(at, Event::AppMessage(message));
    }

    /// Queue `count` random messages of 1..=`max_len` bytes, one every
    /// `interval`, starting at time zero.
    ///
    /// Submission times that overflow `Duration` saturate to `Duration::MAX`,
    /// which lies past any time limit, so those messages are never sent.
    pub fn schedule_workload(&mut self, count: usize, max_len: usize, interval: Duration) {
        let max_len = max_len.max(1);
        for i in 0..count {
            let len = self.rng.random_range(1..=max_len);
            let message: Vec<u8> = (0..len).map(|_| self.rng.random()).collect();
            let at = u32::try_from(i)
                .ok()
                .and_then(|i| interval.checked_mul(i))
                .unwrap_or(Duration::MAX);
            self.schedule_message(at, message);
        }
    }

    /// Process the next event.  Returns `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some(Scheduled { at, event, .. }) = self.queue.pop() else {
            return false;
        };
        self.now = at;
        self.events += 1;

        match event {
            Event::AppMessage(message) => {
                self.pending_messages -= 1;
                self.dispatch_sender(|s, ctx| s.submit(ctx, &message));
            }
            Event::ToSender(packet) => {
                self.dispatch_sender(|s, ctx| s.on_packet(ctx, packet));
            }
            Event::TimerCheck => {
                if self.timer.fire_if_due(self.now) {
                    log::trace!("[sim] t={:?} timer fired", self.now);
                    self.dispatch_sender(|s, ctx| s.on_timeout(ctx));
                }
            }
            Event::ToReceiver(packet) => self.dispatch_receiver(packet),
        }
        true
    }

    /// `true` once every scheduled message has been submitted and all of its
    /// bytes delivered.
    pub fn is_complete(&self) -> bool {
        self.pending_messages == 0 && self.delivered.len() >= self.expected.len()
    }

    /// Run until delivery completes, the queue drains, or the time limit
    /// passes.
    pub fn run(&mut self) -> SimulationReport {
        while !self.is_complete() {
            match self.queue.peek() {
                Some(next) if next.at <= self.config.time_limit => {}
                _ => break,
            }
            self.step();
        }

        if !self.is_complete() {
            log::warn!(
                "[sim] stopped at t={:?} with {}/{} bytes delivered",
                self.now,
                self.delivered.len(),
                self.expected.len()
            );
        }
        self.report()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            expected: self.expected.clone(),
            delivered: self.delivered.clone(),
            finished_at: self.now,
            events: self.events,
            timer_arms: self.timer.arm_count(),
            channel: self.channel.clone(),
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn delivered(&self) -> &[u8] {
        &self.delivered
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn schedule(&mut self, at: Duration, event: Event) {
        self.queue.push(Scheduled {
            at,
            order: self.next_order,
            event,
        });
        self.next_order += 1;
    }

    fn dispatch_sender<F>(&mut self, f: F)
    where
        F: FnOnce(&mut S, &mut dyn SenderContext),
    {
        let before = self.timer.deadline();
        let mut outbox = Vec::new();
        {
            let mut side = SenderSide {
                now: self.now,
                timer: &mut self.timer,
                outbox: &mut outbox,
            };
            let ctx: &mut dyn SenderContext = &mut side;
            f(&mut self.sender, ctx);
        }

        if let Some(deadline) = self.timer.deadline() {
            if Some(deadline) != before {
                self.schedule(deadline, Event::TimerCheck);
            }
        }
        for packet in outbox {
            self.transmit(packet, Direction::ToReceiver);
        }
    }

    fn dispatch_receiver(&mut self, packet: Packet) {
        let mut outbox = Vec::new();
        {
            let mut side = ReceiverSide {
                now: self.now,
                outbox: &mut outbox,
                delivered: &mut self.delivered,
            };
            self.receiver.on_packet(&mut side, packet);
        }
        for packet in outbox {
            self.transmit(packet, Direction::ToSender);
        }
    }

    /// Push one packet through the fault model.
    fn transmit(&mut self, mut packet: Packet, direction: Direction) {
        self.channel.packets_offered += 1;

        if matches!(direction, Direction::ToSender) && !self.config.ack_faults {
            let at = self.now.saturating_add(self.config.latency);
            self.schedule(at, make_event(direction, packet));
            return;
        }

        if self.rng.random_bool(self.config.loss_rate) {
            self.channel.dropped += 1;
            log::trace!("[sim] t={:?} {:?} seq={} lost", self.now, direction, packet.seq());
            return;
        }
        if !packet.is_empty() && self.rng.random_bool(self.config.corrupt_rate) {
            let bit = self.rng.random_range(0..packet.len() * 8);
            packet.flip_bit(bit);
            self.channel.corrupted += 1;
            log::trace!("[sim] t={:?} {:?} bit {} flipped", self.now, direction, bit);
        }

        let mut delay = self.config.latency;
        if self.rng.random_bool(self.config.reorder_rate) {
            delay += self.config.reorder_delay;
            self.channel.reordered += 1;
        }
        let at = self.now.saturating_add(delay);

        if self.rng.random_bool(self.config.duplicate_rate) {
            self.channel.duplicated += 1;
            self.schedule(at, make_event(direction, packet.clone()));
        }
        self.schedule(at, make_event(direction, packet));
    }
}

fn make_event(direction: Direction, packet: Packet) -> Event {
    match direction {
        Direction::ToReceiver => Event::ToReceiver(packet),
        Direction::ToSender => Event::ToSender(packet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RdtConfig;
    use crate::gbn_receiver::GbnReceiver;
    use crate::gbn_sender::GbnSender;

    fn sim(config: SimulatorConfig) -> Simulator<GbnSender, GbnReceiver> {
        let rdt = RdtConfig::default();
        Simulator::new(
            config,
            GbnSender::new(rdt.clone()).unwrap(),
            GbnReceiver::new(&rdt).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn rates_are_validated() {
        let cfg = SimulatorConfig {
            loss_rate: 1.5,
            ..SimulatorConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(SimulatorError::InvalidRate {
                name: "loss_rate",
                value: 1.5
            })
        );
        let nan = SimulatorConfig {
            corrupt_rate: f64::NAN,
            ..SimulatorConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn earliest_event_pops_first() {
        let mut heap = BinaryHeap::new();
        for (at, order) in [(30, 0), (10, 1), (10, 2), (20, 3)] {
            heap.push(Scheduled {
                at: Duration::from_millis(at),
                order,
                event: Event::TimerCheck,
            });
        }
        let popped: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|s| s.order)).collect();
        assert_eq!(popped, vec![1, 2, 3, 0]);
    }

    #[test]
    fn perfect_channel_delivers_in_one_pass() {
        let mut sim = sim(SimulatorConfig::default());
        sim.schedule_message(Duration::ZERO, (0..200u32).map(|i| i as u8).collect());

        let report = sim.run();
        assert!(report.is_exact());
        assert_eq!(report.channel.dropped, 0);
        assert_eq!(sim.sender().stats().retransmissions, 0);
        assert_eq!(sim.receiver().expected_seq(), 4);
    }

    #[test]
    fn total_loss_never_completes() {
        let mut sim = sim(SimulatorConfig {
            loss_rate: 1.0,
            time_limit: Duration::from_secs(2),
            ..SimulatorConfig::default()
        });
        sim.schedule_message(Duration::ZERO, b"doomed".to_vec());

        let report = sim.run();
        assert!(!report.is_exact());
        assert!(report.delivered.is_empty());
        assert!(sim.sender().stats().timeouts >= 5);
        assert!(report.finished_at <= Duration::from_secs(2));
    }

    #[test]
    fn overflowing_workload_times_saturate() {
        let mut sim = sim(SimulatorConfig::default());
        // The third submission time overflows Duration.
        sim.schedule_workload(3, 10, Duration::from_secs(u64::MAX / 2 + 1));

        let report = sim.run();
        assert!(!report.is_exact());
        assert!(report.expected.starts_with(&report.delivered));
        assert!(!report.delivered.is_empty());
        assert!(report.finished_at <= SimulatorConfig::default().time_limit);
    }

    #[test]
    fn ack_faults_can_be_disabled() {
        let mut sim = sim(SimulatorConfig {
            corrupt_rate: 0.3,
            loss_rate: 0.2,
            ack_faults: false,
            seed: 11,
            ..SimulatorConfig::default()
        });
        sim.schedule_workload(40, 200, Duration::from_millis(5));
        assert!(sim.run().is_exact());

        // Let the last ACKs land.
        while !sim.sender().is_idle() && sim.step() {}

        // Every ACK arrived intact and in order, exactly once.
        assert!(sim.sender().is_idle());
        assert_eq!(sim.sender().stats().acks_ignored, 0);
        assert_eq!(
            sim.sender().stats().acks_accepted,
            sim.receiver().stats().accepted
        );
        assert!(sim.receiver().stats().corrupt > 0);
    }

    #[test]
    fn same_seed_same_run() {
        let faulty = SimulatorConfig {
            loss_rate: 0.2,
            corrupt_rate: 0.1,
            seed: 7,
            ..SimulatorConfig::default()
        };
        let mut a = sim(faulty.clone());
        let mut b = sim(faulty);
        a.schedule_workload(30, 150, Duration::from_millis(5));
        b.schedule_workload(30, 150, Duration::from_millis(5));

        let (ra, rb) = (a.run(), b.run());
        assert_eq!(ra.expected, rb.expected);
        assert_eq!(ra.finished_at, rb.finished_at);
        assert_eq!(ra.channel, rb.channel);
        assert!(ra.is_exact());
    }
}
