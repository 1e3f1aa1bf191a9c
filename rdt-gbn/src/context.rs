//! Callback surface between the protocol endpoints and the channel.
//!
//! The channel (simulator, UDP link, or a test harness) owns time, the timer,
//! and packet delivery.  It hands each endpoint a context object for the
//! duration of one callback; the endpoint reaches the outside world only
//! through that context.
//!
//! ```text
//!   app ──submit──▶ RdtSender ──send_to_lower──▶ channel ──on_packet──▶ RdtReceiver ──deliver──▶ app
//!                      ▲  │                                                   │
//!                      │  └──start_timer / stop_timer                         │
//!                      └────────────────on_packet (ACK)◀── channel ◀──send_to_lower
//! ```
//!
//! Callbacks are invoked strictly one at a time and never block.

use std::time::Duration;

use crate::packet::Packet;

/// Services the channel offers the sending endpoint.
pub trait SenderContext {
    /// Current channel time.  Advisory; the protocol never branches on it.
    fn now(&self) -> Duration;

    /// Arm the single retransmit timer.  Arming while armed replaces the
    /// previous deadline.
    fn start_timer(&mut self, timeout: Duration);

    /// Disarm the retransmit timer.  No-op when not armed.
    fn stop_timer(&mut self);

    fn is_timer_set(&self) -> bool;

    /// Hand a packet to the channel for delivery to the peer.
    fn send_to_lower(&mut self, packet: Packet);
}

/// Services the channel offers the receiving endpoint.
pub trait ReceiverContext {
    fn now(&self) -> Duration;

    /// Hand a packet (an ACK) to the channel for delivery to the peer.
    fn send_to_lower(&mut self, packet: Packet);

    /// Pass in-order payload bytes to the layer above.
    fn deliver(&mut self, data: &[u8]);
}

/// Operations a channel invokes on a sending endpoint.
pub trait RdtSender {
    /// A message from the layer above.
    fn submit(&mut self, ctx: &mut dyn SenderContext, message: &[u8]);

    /// A packet from the peer (an acknowledgment).
    fn on_packet(&mut self, ctx: &mut dyn SenderContext, packet: Packet);

    /// The retransmit timer expired.
    fn on_timeout(&mut self, ctx: &mut dyn SenderContext);

    /// `true` when nothing is buffered or awaiting acknowledgment.
    fn is_idle(&self) -> bool;
}

/// Operations a channel invokes on a receiving endpoint.
pub trait RdtReceiver {
    /// A packet from the peer (data).
    fn on_packet(&mut self, ctx: &mut dyn ReceiverContext, packet: Packet);
}
