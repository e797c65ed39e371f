//! framecast viewer — entry point.
//!
//! ```text
//! framecast-viewer                  Listen with defaults (port 20000)
//! framecast-viewer --config <path>  Load a custom config TOML
//! framecast-viewer --gen-config     Write default config to stdout
//! ```
//!
//! Accepts one host connection, consumes the decoded frame stream
//! (the display widget plugs in where the consume loop logs), and
//! holds the event-sender handle the UI uses to report local key
//! transitions.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framecast_core::ViewerSession;
use framecast_viewer::config::ViewerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-viewer", about = "framecast receiving viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-viewer.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = ViewerConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-viewer v{}", env!("CARGO_PKG_VERSION"));

    let session = ViewerSession::bind(config.network.bind_port).await?;
    let mut conn = session.accept().await?;
    let _events = conn.event_sender();

    let mut frames: u64 = 0;
    loop {
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — shutting down");
                break;
            }
            next = conn.next_frame() => next,
        };

        match next {
            Some(Ok(frame)) => {
                frames += 1;
                if frames % 30 == 1 {
                    info!(
                        frames,
                        width = frame.width,
                        height = frame.height,
                        bytes = frame.byte_len(),
                        "receiving"
                    );
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "stream failed");
                std::process::exit(1);
            }
            None => {
                info!(frames, "host closed the stream");
                break;
            }
        }
    }

    Ok(())
}
