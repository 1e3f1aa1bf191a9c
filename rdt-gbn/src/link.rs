//! Go-Back-N endpoints driven over a real UDP socket.
//!
//! # Architecture
//!
//! ```text
//!  Application                                            Application
//!      │ mpsc::Sender<Vec<u8>>                  mpsc::Receiver<Vec<u8>> ▲
//!      ▼                                                                │
//!  run_sender task                                     run_receiver task
//!    ├── GbnSender                                       ├── GbnReceiver
//!    ├── RetransmitTimer<Instant>                        │
//!    └── Socket ──── DATA ─────────────────────────────▶ └── Socket
//!               ◀─── ACK (echo of accepted DATA) ───────
//! ```
//!
//! Each endpoint runs in one task and multiplexes its inputs with
//! `tokio::select!`, so the protocol core still sees one callback at a time.
//! Packets the core hands to the context are queued and flushed to the
//! socket after the callback returns.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::{ConfigError, RdtConfig};
use crate::context::{ReceiverContext, SenderContext};
use crate::gbn_receiver::{GbnReceiver, ReceiverStats};
use crate::gbn_sender::{AckOutcome, GbnSender, SenderStats};
use crate::packet::Packet;
use crate::socket::{Socket, SocketError};
use crate::timer::RetransmitTimer;

const DEFAULT_MAX_RETRIES: u32 = 8;

// ---------------------------------------------------------------------------
// Configuration / errors
// ---------------------------------------------------------------------------

/// Settings for a UDP-backed endpoint.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub rdt: RdtConfig,
    /// Consecutive timeouts without window progress before the sender gives
    /// up.
    pub max_retries: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            rdt: RdtConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl LinkConfig {
    pub fn new(rdt: RdtConfig) -> Self {
        Self {
            rdt,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("peer unresponsive after {0} consecutive timeouts")]
    RetriesExhausted(u32),
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

struct SenderLink {
    started: Instant,
    timer: RetransmitTimer<Instant>,
    outbox: Vec<Packet>,
}

impl SenderContext for SenderLink {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn start_timer(&mut self, timeout: Duration) {
        self.timer.arm(Instant::now() + timeout);
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

struct ReceiverLink {
    started: Instant,
    acks: Vec<Packet>,
    delivered: Vec<u8>,
}

impl ReceiverContext for ReceiverLink {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn send_to_lower(&mut self, packet: Packet) {
        self.acks.push(packet);
    }

    fn deliver(&mut self, data: &[u8]) {
        self.delivered.extend_from_slice(data);
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Send every message received on `app_rx` to `peer`.
///
/// Returns once `app_rx` is closed and every packet has been acknowledged.
pub async fn run_sender(
    socket: Socket,
    peer: SocketAddr,
    config: LinkConfig,
    mut app_rx: mpsc::Receiver<Vec<u8>>,
) -> Result<SenderStats, LinkError> {
    let mut sender = GbnSender::new(config.rdt.clone())?;
    let mut link = SenderLink {
        started: Instant::now(),
        timer: RetransmitTimer::new(),
        outbox: Vec::new(),
    };
    let mut app_open = true;
    let mut retries = 0u32;

    // A disarmed timer sleeps far in the future; the `armed` guard keeps
    // select! from polling it.
    let far_future = Duration::from_secs(365 * 24 * 3600);
    let timer = tokio::time::sleep(far_future);
    tokio::pin!(timer);

    while app_open || !sender.is_idle() {
        let armed = match link.timer.deadline() {
            Some(deadline) => {
                timer.as_mut().reset(deadline);
                true
            }
            None => false,
        };

        tokio::select! {
            maybe_msg = app_rx.recv(), if app_open => match maybe_msg {
                Some(message) => {
                    sender.submit(&mut link, &message);
                }
                None => {
                    app_open = false;
                    log::debug!("[gbn:link] application closed; draining {} packet(s)",
                        sender.in_flight() + sender.buffered());
                }
            },

            result = socket.recv_from() => match result {
                Ok((packet, from)) if from == peer => {
                    if let AckOutcome::Advanced { .. } = sender.on_ack(&mut link, &packet) {
                        retries = 0;
                    }
                }
                Ok((_, from)) => log::debug!("[gbn:link] ignoring datagram from {from}"),
                Err(SocketError::Packet(e)) => log::debug!("[gbn:link] dropping datagram: {e}"),
                Err(e) => return Err(e.into()),
            },

            () = &mut timer, if armed => {
                if link.timer.fire_if_due(Instant::now()) && sender.in_flight() > 0 {
                    retries += 1;
                    if retries > config.max_retries {
                        log::warn!("[gbn:link] giving up on {peer} after {} timeouts", config.max_retries);
                        return Err(LinkError::RetriesExhausted(config.max_retries));
                    }
                    sender.on_timeout(&mut link);
                }
            }
        }

        for packet in link.outbox.drain(..) {
            socket.send_to(&packet, peer).await?;
        }
    }

    log::info!("[gbn:link] sender done: {:?}", sender.stats());
    Ok(sender.stats().clone())
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Accept packets on `socket` and forward delivered bytes to `deliver_tx`.
///
/// ACKs go back to whichever address sent the accepted packet.  Returns once
/// the receiving half of `deliver_tx` is dropped.
pub async fn run_receiver(
    socket: Socket,
    config: RdtConfig,
    deliver_tx: mpsc::Sender<Vec<u8>>,
) -> Result<ReceiverStats, LinkError> {
    let mut receiver = GbnReceiver::new(&config)?;
    let started = Instant::now();

    loop {
        let (packet, from) = tokio::select! {
            () = deliver_tx.closed() => break,
            result = socket.recv_from() => match result {
                Ok(v) => v,
                Err(SocketError::Packet(e)) => {
                    log::debug!("[gbn:link] dropping datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
        };

        let mut link = ReceiverLink {
            started,
            acks: Vec::new(),
            delivered: Vec::new(),
        };
        receiver.on_packet(&mut link, packet);

        for ack in &link.acks {
            socket.send_to(ack, from).await?;
        }
        if !link.delivered.is_empty() && deliver_tx.send(link.delivered).await.is_err() {
            break;
        }
    }

    log::info!("[gbn:link] receiver done: {:?}", receiver.stats());
    Ok(receiver.stats().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_limit() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.max_retries, 8);
        assert_eq!(cfg.rdt.window_size, 15);
        assert_eq!(LinkConfig::new(RdtConfig::default()).with_max_retries(2).max_retries, 2);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_io() {
        let rdt = RdtConfig::default().with_window_size(0);
        let socket = Socket::bind("127.0.0.1:0".parse().unwrap(), &RdtConfig::default())
            .await
            .unwrap();
        let peer = socket.local_addr;
        let (_tx, rx) = mpsc::channel(1);

        let err = run_sender(socket, peer, LinkConfig::new(rdt), rx).await.unwrap_err();
        assert!(matches!(err, LinkError::Config(ConfigError::WindowSize { .. })));
    }
}
