//! `rdt-gbn`: Go-Back-N reliable data transfer over an unreliable datagram
//! channel.
//!
//! # Architecture
//!
//! ```text
//!  message                                              delivered bytes
//!     │                                                        ▲
//!  ┌──▼─────────┐   DATA (fixed-size packets)   ┌──────────────┴┐
//!  │ GbnSender  │──────────────────────────────▶│  GbnReceiver  │
//!  │ (window W) │◀──────────────────────────────│ (expected_seq)│
//!  └──┬─────────┘   ACK (echo of accepted DATA) └───────────────┘
//!     │ start_timer / send_to_lower / deliver
//!  ┌──▼──────────────────────────────────────────────────────────┐
//!  │ Channel: Simulator (virtual time, faults)  or  link (UDP)   │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`config`]: protocol parameters and their validation
//! - [`packet`]: wire format and Internet-style checksum
//! - [`seq`]: sequence-space arithmetic
//! - [`fragmenter`]: message → packet splitting
//! - [`gbn_sender`]: GBN outbound window state machine
//! - [`gbn_receiver`]: GBN inbound in-order acceptance
//! - [`context`]: callback traits between endpoints and channels
//! - [`timer`]: single re-armable retransmit deadline
//! - [`simulator`]: deterministic lossy/reorder network for testing
//! - [`socket`]: async UDP socket abstraction
//! - [`link`]: endpoints driven over a real UDP socket

pub mod config;
pub mod context;
pub mod fragmenter;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod link;
pub mod packet;
pub mod seq;
pub mod simulator;
pub mod socket;
pub mod timer;

pub use config::{ConfigError, RdtConfig};
pub use context::{RdtReceiver, RdtSender, ReceiverContext, SenderContext};
pub use gbn_receiver::GbnReceiver;
pub use gbn_sender::GbnSender;
pub use packet::{Packet, PacketError};
