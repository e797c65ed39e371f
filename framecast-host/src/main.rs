//! framecast host — entry point.
//!
//! ```text
//! framecast-host                  Broadcast with defaults
//! framecast-host --config <path>  Load a custom config TOML
//! framecast-host --gen-config     Write default config to stdout
//! ```
//!
//! Captures frames and fans them out to every configured viewer,
//! replaying returned keyboard events on the captured window. The
//! stock build wires a synthetic test-pattern source; real OS screen
//! capture and key injection plug in through the `FrameSource` and
//! `InputInjector` seams.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framecast_core::{BroadcastSession, NullInjector, TestPatternSource, WindowHandle};
use framecast_host::config::HostConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-host", about = "framecast screen broadcast host")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-host.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = HostConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-host v{}", env!("CARGO_PKG_VERSION"));
    info!("target FPS: {}", config.capture.fps);
    info!("viewers: {:?}", config.network.viewers);

    let source = TestPatternSource::new(
        WindowHandle(config.capture.window_handle),
        config.capture.width,
        config.capture.height,
    );
    let mut session = BroadcastSession::new(
        source,
        Arc::new(NullInjector),
        config.to_session_config(),
    );

    let addrs = config.viewer_addrs();
    if addrs.is_empty() {
        error!("no valid viewer addresses configured");
        std::process::exit(1);
    }
    for (host, port) in addrs {
        session.register(&host, port)?;
    }

    // Ctrl-C handler.
    let handle = session.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        handle.stop();
    });

    session.run().await?;

    Ok(())
}
