//! OmniLock CLI
//!
//! Command-line interface for driving an OmniLock session. The BLE radio
//! backend is supplied by the embedding application; this binary runs
//! against the built-in simulated lock.

use std::process;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use omnilock::{Config, LockSession, SimulatedLock};
use tracing_subscriber::{fmt, EnvFilter};

/// OmniLock CLI
#[derive(Parser, Debug)]
#[command(name = "omnilock-cli")]
#[command(about = "CLI for OmniLock BLE electronic locks")]
#[command(version)]
struct Args {
    /// Device identifier
    #[arg(short, long, default_value = "OMNILOCK-SIM")]
    device: String,

    /// PIN to authenticate with
    #[arg(short, long, default_value = "1234")]
    pin: String,

    /// PIN the simulated lock accepts
    #[arg(long, default_value = "1234")]
    device_pin: String,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "10000")]
    connect_timeout_ms: u64,

    /// Per-command response timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lock the device
    Lock,

    /// Unlock the device
    Unlock,

    /// Verify the PIN
    Verify,

    /// Send a keep-alive
    Heartbeat,

    /// Make the lock forget the paired key
    EraseKey,

    /// Print every response while sending periodic heartbeats
    Monitor {
        /// Number of heartbeats to send
        #[arg(short, long, default_value = "5")]
        count: u32,

        /// Interval between heartbeats in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,omnilock=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("OmniLock CLI v{}", omnilock::VERSION);

    let config = Config::builder()
        .pin(&args.pin)
        .connect_timeout_ms(args.connect_timeout_ms)
        .command_timeout_ms(args.timeout_ms)
        .build();

    let device = SimulatedLock::new(&args.device, &args.device_pin);
    let session = LockSession::new(device, config);

    if let Err(e) = session.connect(&args.device, session.config().connect_timeout()) {
        tracing::error!("Failed to connect: {}", e);
        process::exit(1);
    }

    let outcome = match args.command {
        Commands::Lock => session.lock().map(|ok| report("lock", ok)),
        Commands::Unlock => session.unlock().map(|ok| report("unlock", ok)),
        Commands::Verify => session.verify_key().map(|ok| report("verify", ok)),
        Commands::Heartbeat => session.heartbeat().map(|()| report("heartbeat", true)),
        Commands::EraseKey => session.erase_key().map(|()| report("erase-key", true)),
        Commands::Monitor { count, interval_ms } => {
            session.add_observer(|response| {
                println!(
                    "<- cmd=0x{:02X} status={} data={:02X?}",
                    response.command,
                    response.status,
                    &response.data[..]
                );
            });

            let mut result = Ok(());
            for _ in 0..count {
                if let Err(e) = session.heartbeat() {
                    result = Err(e);
                    break;
                }
                thread::sleep(Duration::from_millis(interval_ms));
            }
            result
        }
    };

    session.disconnect();

    if let Err(e) = outcome {
        tracing::error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn report(action: &str, ok: bool) {
    if ok {
        println!("{}: OK", action);
    } else {
        println!("{}: REFUSED", action);
    }
}
