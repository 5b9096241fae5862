//! Session configuration and config-directory resolution. Config-dir
//! resolution via the `dirs` crate, the minimal standard addition noted
//! in the ambient stack: the teacher persists `HostState` via
//! app-provided paths only, so it carries no equivalent itself.

use std::path::PathBuf;

use bridge_api::{Chain, WalletRecord};

use crate::capture_bridge::CAPTURE_BASE_ENDPOINT;

/// Immutable, per-session configuration. `figma_endpoint` derives from
/// `capture_id` so the two can never disagree.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub wallet: WalletRecord,
    pub chain: Chain,
    pub url: String,
    pub capture_id: String,
    pub figma_endpoint: String,
}

impl CaptureConfig {
    pub fn new(wallet: WalletRecord, chain: Chain, url: impl Into<String>, capture_id: impl Into<String>) -> Self {
        let capture_id = capture_id.into();
        let figma_endpoint = format!("{CAPTURE_BASE_ENDPOINT}/capture/{capture_id}/submit");
        Self {
            wallet,
            chain,
            url: url.into(),
            capture_id,
            figma_endpoint,
        }
    }
}

/// Root directory for wallet store, setup marker and session logs.
/// Resolved via `dirs::config_dir()`, falling back to `.bridge` in the
/// current directory when no platform config dir is available (e.g. a
/// minimal container).
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("bridge"))
        .unwrap_or_else(|| PathBuf::from(".bridge"))
}

pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

pub fn setup_marker_path() -> PathBuf {
    config_dir().join("setup_complete")
}

pub fn setup_is_complete() -> bool {
    setup_marker_path().exists()
}

pub fn mark_setup_complete() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::write(setup_marker_path(), [])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figma_endpoint_derives_from_capture_id() {
        let wallet = WalletRecord::generate("eph");
        let chain = Chain::new(1, "Ethereum", "https://eth.llamarpc.com").unwrap();
        let config = CaptureConfig::new(wallet, chain, "https://example.com", "u-1");
        assert_eq!(config.figma_endpoint, "https://mcp.figma.com/capture/u-1/submit");
    }

    #[test]
    fn logs_dir_is_nested_under_config_dir() {
        assert_eq!(logs_dir(), config_dir().join("logs"));
    }
}
