//! Entry point for `rdt-gbn`.
//!
//! Parses CLI arguments and dispatches into **simulate**, **send**, or
//! **receive** mode.  All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, signal handling, argument
//! parsing) and stdin/stdout plumbing.

use std::error::Error;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use rdt_gbn::config::RdtConfig;
use rdt_gbn::gbn_receiver::GbnReceiver;
use rdt_gbn::gbn_sender::GbnSender;
use rdt_gbn::link::{self, LinkConfig};
use rdt_gbn::simulator::{Simulator, SimulatorConfig};
use rdt_gbn::socket::Socket;

/// Go-Back-N reliable data transfer over fixed-size packets.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run a sender and receiver against the fault-injecting simulator.
    Simulate(SimulateArgs),
    /// Send stdin to a remote receiver over UDP.
    Send(SendArgs),
    /// Receive over UDP and write the delivered bytes to stdout.
    Receive(ReceiveArgs),
}

/// Protocol parameters; both ends must agree.
#[derive(Args)]
struct ProtocolArgs {
    /// Window size W.
    #[arg(long, default_value_t = 15)]
    window: usize,
    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 300)]
    timeout_ms: u64,
    /// Fixed packet size P, header included.
    #[arg(long, default_value_t = 64)]
    packet_size: usize,
    /// Sequence modulus S.
    #[arg(long, default_value_t = 128)]
    seq_modulus: u16,
    /// Stop the retransmit timer when the window drains.
    #[arg(long)]
    stop_timer_when_idle: bool,
}

impl ProtocolArgs {
    fn to_config(&self) -> RdtConfig {
        RdtConfig::default()
            .with_window_size(self.window)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_packet_size(self.packet_size)
            .with_seq_modulus(self.seq_modulus)
            .with_stop_timer_when_idle(self.stop_timer_when_idle)
    }
}

#[derive(Args)]
struct SimulateArgs {
    #[command(flatten)]
    protocol: ProtocolArgs,
    /// Probability that a packet is dropped.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,
    /// Probability that a packet has one bit flipped.
    #[arg(long, default_value_t = 0.05)]
    corrupt: f64,
    /// Probability that a packet is delivered twice.
    #[arg(long, default_value_t = 0.0)]
    duplicate: f64,
    /// Probability that a packet is delayed past its successors.
    #[arg(long, default_value_t = 0.0)]
    reorder: f64,
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,
    #[arg(long, default_value_t = 50)]
    reorder_delay_ms: u64,
    /// Carry ACKs with latency only, never faulted.
    #[arg(long)]
    lossless_acks: bool,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Number of application messages to submit.
    #[arg(long, default_value_t = 100)]
    messages: usize,
    /// Upper bound on each message's length in bytes.
    #[arg(long, default_value_t = 300)]
    max_len: usize,
    /// Gap between successive submissions in milliseconds.
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,
    /// Simulated seconds before giving up.
    #[arg(long, default_value_t = 600)]
    time_limit_secs: u64,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    protocol: ProtocolArgs,
    /// Remote receiver address (e.g. 127.0.0.1:9000).
    #[arg(short, long)]
    peer: SocketAddr,
    /// Local address to bind.
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,
    /// Bytes of stdin per submitted message.
    #[arg(long, default_value_t = 4096)]
    chunk: usize,
    /// Consecutive timeouts before giving up.
    #[arg(long, default_value_t = 8)]
    max_retries: u32,
}

#[derive(Args)]
struct ReceiveArgs {
    #[command(flatten)]
    protocol: ProtocolArgs,
    /// Local address to bind (e.g. 0.0.0.0:9000).
    #[arg(short, long, default_value = "0.0.0.0:9000")]
    bind: SocketAddr,
    /// Exit after this many bytes have been delivered.
    #[arg(long)]
    expect_bytes: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.mode {
        Mode::Simulate(args) => simulate(args),
        Mode::Send(args) => send(args).await,
        Mode::Receive(args) => receive(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn simulate(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let rdt = args.protocol.to_config();
    let sim_config = SimulatorConfig {
        loss_rate: args.loss,
        corrupt_rate: args.corrupt,
        duplicate_rate: args.duplicate,
        reorder_rate: args.reorder,
        latency: Duration::from_millis(args.latency_ms),
        reorder_delay: Duration::from_millis(args.reorder_delay_ms),
        ack_faults: !args.lossless_acks,
        seed: args.seed,
        time_limit: Duration::from_secs(args.time_limit_secs),
    };
    log::info!("Simulating {} message(s) with {sim_config:?}", args.messages);

    let mut sim = Simulator::new(sim_config, GbnSender::new(rdt.clone())?, GbnReceiver::new(&rdt)?)?;
    sim.schedule_workload(args.messages, args.max_len, Duration::from_millis(args.interval_ms));
    let report = sim.run();

    println!(
        "delivered {}/{} bytes in {:.3}s simulated ({} events)",
        report.delivered.len(),
        report.expected.len(),
        report.finished_at.as_secs_f64(),
        report.events
    );
    println!("sender:   {:?}", sim.sender().stats());
    println!("receiver: {:?}", sim.receiver().stats());
    println!("channel:  {:?}", report.channel);

    if report.is_exact() {
        Ok(())
    } else {
        Err("delivered bytes do not match submitted bytes".into())
    }
}

async fn send(args: SendArgs) -> Result<(), Box<dyn Error>> {
    let rdt = args.protocol.to_config();
    let socket = Socket::bind(args.bind, &rdt).await?;
    log::info!("Sending from {} to {}", socket.local_addr, args.peer);

    let (app_tx, app_rx) = mpsc::channel::<Vec<u8>>(64);
    let config = LinkConfig::new(rdt).with_max_retries(args.max_retries);
    let task = tokio::spawn(link::run_sender(socket, args.peer, config, app_rx));

    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; args.chunk.max(1)];
    loop {
        let n = stdin.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        // The link task only drops its receiver when it has failed.
        if app_tx.send(buf[..n].to_vec()).await.is_err() {
            break;
        }
    }
    drop(app_tx);

    let stats = task.await??;
    log::info!("Send complete: {stats:?}");
    Ok(())
}

async fn receive(args: ReceiveArgs) -> Result<(), Box<dyn Error>> {
    let rdt = args.protocol.to_config();
    let socket = Socket::bind(args.bind, &rdt).await?;
    log::info!("Listening on {}", socket.local_addr);

    let (deliver_tx, mut deliver_rx) = mpsc::channel::<Vec<u8>>(64);
    let task = tokio::spawn(link::run_receiver(socket, rdt, deliver_tx));

    let mut stdout = tokio::io::stdout();
    let mut total = 0u64;
    loop {
        tokio::select! {
            maybe_bytes = deliver_rx.recv() => match maybe_bytes {
                Some(bytes) => {
                    stdout.write_all(&bytes).await?;
                    stdout.flush().await?;
                    total += bytes.len() as u64;
                    if args.expect_bytes.is_some_and(|n| total >= n) {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted after {total} byte(s)");
                break;
            }
        }
    }
    drop(deliver_rx);

    let stats = task.await??;
    log::info!("Receive complete: {stats:?}");
    Ok(())
}
