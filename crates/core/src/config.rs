use ipnet::IpNet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Maximum clock drift (and replay window) for HMAC timestamps.
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(300);

/// Upper bound on remembered auth timestamps before eviction kicks in.
pub const DEFAULT_REPLAY_CACHE_CAPACITY: usize = 10_000;

/// Runtime configuration for the bridge.
///
/// Built once in `main` from flags/env and handed to the constructors that
/// need it — credentials are never read from ambient process state after
/// startup.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Shared token checked in both auth modes.
    pub token: String,
    /// Secret for HMAC-SHA256 request signatures.
    pub hmac_secret: String,
    /// Directory holding pending signal files.
    pub queue_dir: PathBuf,
    /// Append-only feedback log destination.
    pub feedback_log: PathBuf,
    /// Peers inside these ranges authenticate with the token alone.
    pub token_only_networks: Vec<IpNet>,
    pub replay_window: Duration,
    pub replay_cache_capacity: usize,
}

impl BridgeConfig {
    /// Ranges that skip HMAC by default: loopback plus the common private
    /// networks the EA host usually sits on.
    pub fn default_token_only_networks() -> Vec<IpNet> {
        [
            "127.0.0.0/8",
            "192.168.0.0/24",
            "192.168.1.0/24",
            "10.0.0.0/8",
            "172.16.0.0/12",
        ]
        .iter()
        .map(|net| net.parse().expect("built-in network range"))
        .collect()
    }

    /// Log loud warnings for credential gaps instead of failing — the bridge
    /// must still come up for /health checks during setup.
    pub fn warn_on_missing_credentials(&self) {
        if self.token.is_empty() {
            warn!("shared token not set - authentication will fail");
        }
        if self.hmac_secret.is_empty() {
            warn!("HMAC secret not set - non-LAN authentication will fail");
        }
    }
}
