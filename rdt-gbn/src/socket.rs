//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! fixed-size [`crate::packet::Packet`]s instead of raw bytes.  All protocol
//! logic lives elsewhere; this module owns only byte I/O.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::config::RdtConfig;
use crate::packet::{Packet, PacketError};

/// Receive buffer size.  Anything larger than the configured packet size is
/// rejected after the read, so this only needs to exceed it.
const MAX_DATAGRAM: usize = 2_048;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The received datagram is not a packet of the configured size.
    #[error("packet decode error: {0}")]
    Packet(#[from] PacketError),
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, packet-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    config: RdtConfig,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr, config: &RdtConfig) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            config: config.clone(),
        })
    }

    /// Send `packet` as a single UDP datagram to `dest`.
    pub async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(packet.as_bytes(), dest).await?;
        Ok(())
    }

    /// Receive the next datagram as a [`Packet`].
    ///
    /// Returns `(packet, sender_address)`.  A datagram of the wrong size is
    /// returned as `Err(SocketError::Packet)`; the caller decides whether to
    /// keep reading.
    pub async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM.max(self.config.packet_size + 1)];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        let packet = Packet::from_bytes(buf, &self.config)?;
        Ok((packet, addr))
    }
}
