//! Integration tests for the UDP-backed endpoints.
//!
//! Each test spins up a sender and a receiver talking over the loopback
//! interface.  Both sides are spawned as separate tokio tasks so they can make
//! progress concurrently without blocking each other.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

use rdt_gbn::{
    config::RdtConfig,
    link::{run_receiver, run_sender, LinkConfig, LinkError},
    socket::Socket,
};

/// Bind a socket to an OS-assigned port on loopback.
async fn ephemeral(cfg: &RdtConfig) -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr, cfg).await.expect("bind failed")
}

fn messages(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| (0..(i * 37) % 250 + 1).map(|j| (i + j) as u8).collect())
        .collect()
}

/// Relays datagrams between one sender and `receiver`, dropping the
/// `drop_nth` datagram (1-based) that comes from the sender.
async fn lossy_relay(relay: UdpSocket, receiver: SocketAddr, drop_nth: usize) {
    let mut sender: Option<SocketAddr> = None;
    let mut from_sender = 0;
    let mut buf = [0u8; 2048];
    loop {
        let Ok((n, from)) = relay.recv_from(&mut buf).await else {
            return;
        };
        if from == receiver {
            if let Some(s) = sender {
                let _ = relay.send_to(&buf[..n], s).await;
            }
        } else {
            sender = Some(from);
            from_sender += 1;
            if from_sender == drop_nth {
                continue;
            }
            let _ = relay.send_to(&buf[..n], receiver).await;
        }
    }
}

/// Push `msgs` through a sender aimed at `peer` and collect what the
/// receiver on `rx_sock` delivers.
async fn transfer(
    cfg: RdtConfig,
    tx_sock: Socket,
    peer: SocketAddr,
    rx_sock: Socket,
    msgs: &[Vec<u8>],
) -> (Vec<u8>, rdt_gbn::gbn_sender::SenderStats) {
    let expected_len: usize = msgs.iter().map(Vec::len).sum();

    let (deliver_tx, mut deliver_rx) = mpsc::channel(64);
    let receiver = tokio::spawn(run_receiver(rx_sock, cfg.clone(), deliver_tx));

    let (app_tx, app_rx) = mpsc::channel(64);
    let sender = tokio::spawn(run_sender(tx_sock, peer, LinkConfig::new(cfg), app_rx));

    for m in msgs {
        app_tx.send(m.clone()).await.unwrap();
    }
    drop(app_tx);

    let mut delivered = Vec::new();
    while delivered.len() < expected_len {
        let chunk = deliver_rx.recv().await.expect("receiver ended early");
        delivered.extend(chunk);
    }

    let stats = sender.await.unwrap().expect("sender failed");
    drop(deliver_rx);
    let rstats = receiver.await.unwrap().expect("receiver failed");
    assert_eq!(rstats.bytes_delivered as usize, expected_len);

    (delivered, stats)
}

// ---------------------------------------------------------------------------
// Test 1: clean loopback transfer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_loopback_transfer() {
    let cfg = RdtConfig::default();
    let rx_sock = ephemeral(&cfg).await;
    let rx_addr = rx_sock.local_addr;
    let tx_sock = ephemeral(&cfg).await;

    let msgs = messages(40);
    let expected: Vec<u8> = msgs.concat();

    let (delivered, stats) = timeout(
        Duration::from_secs(10),
        transfer(cfg, tx_sock, rx_addr, rx_sock, &msgs),
    )
    .await
    .expect("transfer timed out");

    assert_eq!(delivered, expected);
    assert_eq!(stats.packets_created, stats.packets_sent);
    assert!(stats.acks_accepted > 0);
}

// ---------------------------------------------------------------------------
// Test 2: a dropped datagram is recovered by retransmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dropped_packet_is_retransmitted() {
    let cfg = RdtConfig::default().with_timeout(Duration::from_millis(50));
    let rx_sock = ephemeral(&cfg).await;
    let rx_addr = rx_sock.local_addr;
    let tx_sock = ephemeral(&cfg).await;

    let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = relay.local_addr().unwrap();
    let relay_task = tokio::spawn(lossy_relay(relay, rx_addr, 3));

    let msgs = messages(10);
    let expected: Vec<u8> = msgs.concat();

    let (delivered, stats) = timeout(
        Duration::from_secs(10),
        transfer(cfg, tx_sock, relay_addr, rx_sock, &msgs),
    )
    .await
    .expect("transfer timed out");
    relay_task.abort();

    assert_eq!(delivered, expected);
    assert!(stats.timeouts >= 1);
    assert!(stats.retransmissions >= 1);
}

// ---------------------------------------------------------------------------
// Test 3: a silent peer exhausts the retry budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_silent_peer_exhausts_retries() {
    let cfg = RdtConfig::default().with_timeout(Duration::from_millis(20));
    let tx_sock = ephemeral(&cfg).await;
    // Bound but never read: every datagram vanishes.
    let black_hole = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer = black_hole.local_addr().unwrap();

    let (app_tx, app_rx) = mpsc::channel(4);
    app_tx.send(b"anyone there?".to_vec()).await.unwrap();
    drop(app_tx);

    let result = timeout(
        Duration::from_secs(5),
        run_sender(tx_sock, peer, LinkConfig::new(cfg).with_max_retries(2), app_rx),
    )
    .await
    .expect("sender hung");

    assert!(matches!(result, Err(LinkError::RetriesExhausted(2))));
}

// ---------------------------------------------------------------------------
// Test 4: receiver shuts down when its consumer goes away
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_stops_when_consumer_drops() {
    let cfg = RdtConfig::default();
    let rx_sock = ephemeral(&cfg).await;

    let (deliver_tx, deliver_rx) = mpsc::channel(1);
    let receiver = tokio::spawn(run_receiver(rx_sock, cfg, deliver_tx));
    drop(deliver_rx);

    let stats = timeout(Duration::from_secs(5), receiver)
        .await
        .expect("receiver hung")
        .unwrap()
        .unwrap();
    assert_eq!(stats.accepted, 0);
}
