//! Configuration for the framecast host.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::{ClientTuning, SessionConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Capture settings.
    pub capture: CaptureConfig,
    /// Viewer targets and per-client limits.
    pub network: NetworkConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// OS handle of the window to capture (0 = test pattern).
    pub window_handle: isize,
    /// Target frames per second (1..=60).
    pub fps: u8,
    /// Test-pattern dimensions (used when no real source is wired).
    pub width: u32,
    pub height: u32,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Viewer addresses as `host:port` strings.
    pub viewers: Vec<String>,
    /// Frames buffered per viewer before ticks start missing.
    pub queue_depth: usize,
    /// Consecutive missed ticks before a stalled viewer is evicted.
    pub max_missed_ticks: u32,
    /// Connect deadline in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-frame write deadline in milliseconds.
    pub write_timeout_ms: u64,
    /// zstd compression level (1..=19).
    pub compression_level: i32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_handle: 0,
            fps: 30,
            width: 1280,
            height: 720,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let tuning = ClientTuning::default();
        Self {
            viewers: vec!["127.0.0.1:20000".into()],
            queue_depth: tuning.queue_depth,
            max_missed_ticks: tuning.max_missed_ticks,
            connect_timeout_ms: tuning.connect_timeout.as_millis() as u64,
            write_timeout_ms: tuning.write_timeout.as_millis() as u64,
            compression_level: tuning.compression_level,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert into the library's session configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            target_fps: self.capture.fps.clamp(1, 60),
            client: ClientTuning {
                queue_depth: self.network.queue_depth.max(1),
                max_missed_ticks: self.network.max_missed_ticks.max(1),
                connect_timeout: Duration::from_millis(self.network.connect_timeout_ms),
                write_timeout: Duration::from_millis(self.network.write_timeout_ms),
                compression_level: self.network.compression_level,
            },
        }
    }

    /// Parse the configured viewer addresses into `(host, port)` pairs.
    pub fn viewer_addrs(&self) -> Vec<(String, u16)> {
        self.network
            .viewers
            .iter()
            .filter_map(|addr| {
                let (host, port) = addr.rsplit_once(':')?;
                let port: u16 = port.parse().ok()?;
                Some((host.to_string(), port))
            })
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────
