//! Capture bridge daemon.
//!
//! Bridges a HIL testbench's live signal capture to a remote consumer
//! over TCP while the capture keeps running: poll the capture state
//! machine, fetch incremental sample batches, reshape them into
//! per-sample rows, encode as little-endian float32, and stream the
//! bytes in bounded chunks. One capture session, one consumer socket,
//! one run.

use capture_bridge::capture::create_backend;
use capture_bridge::config::AppConfig;
use capture_bridge::error::{Error, Result};
use capture_bridge::session;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `capture-bridge <path>` (positional)
/// - `capture-bridge --config <path>` (flag-based)
/// - `capture-bridge -c <path>` (short flag)
///
/// Defaults to `/etc/capture-bridge.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/capture-bridge.toml".to_string()
}

fn init_logger(config: &AppConfig) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    );
    if config.logging.output == "stdout" {
        builder.target(env_logger::Target::Stdout);
    }
    builder.init();
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = AppConfig::from_file(&config_path)?;
    init_logger(&config);

    log::info!("capture-bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    log::info!(
        "Capture: {} channels, downsampling {}, backend {}",
        config.capture.channels.len(),
        config.capture.downsampling,
        config.backend.kind
    );

    let backend = create_backend(&config)?;

    // Cooperative cancellation: Ctrl-C flips the token, the poll loop
    // notices and takes the normal teardown path
    let cancel = Arc::new(AtomicBool::new(false));
    let c = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        c.store(true, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("Streaming to {}", config.stream.remote_address);
    let mut session = session::bootstrap(&config, backend)?;
    let stats = session.run(&cancel)?;

    if stats.cancelled {
        log::info!("Stopped before the capture finished");
    }
    log::info!("capture-bridge stopped");
    Ok(())
}
