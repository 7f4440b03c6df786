//! Viewer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the viewer harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Session geometry.
    pub display: DisplayConfig,
    /// Sync-core tuning.
    pub sync: SyncConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Session geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Initial remote width.
    pub width: u32,
    /// Initial remote height.
    pub height: u32,
}

/// Sync-core tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Dirty-region tile size in pixels.
    pub block_size: u32,
    /// Compare every row ("full") or every other row ("sampled").
    pub sampling: String,
    /// Resize debounce in milliseconds.
    pub debounce_ms: u64,
    /// Consumer poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            block_size: 32,
            sampling: "full".into(),
            debounce_ms: 400,
            poll_interval_ms: 10,
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

// ── Loading / conversion ─────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults when the file
    /// is missing or malformed.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("bad config {}: {e}, using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Translate into the core's session config.
    pub fn session_config(&self) -> rdc_core::SessionConfig {
        rdc_core::SessionConfig {
            block_size: self.sync.block_size.max(1),
            sampling: match self.sync.sampling.as_str() {
                "sampled" => rdc_core::RowSampling::EveryOther,
                _ => rdc_core::RowSampling::Full,
            },
            debounce: Duration::from_millis(self.sync.debounce_ms),
            initial_extent: rdc_core::Extent::new(
                self.display.width.max(1),
                self.display.height.max(1),
            ),
            ..rdc_core::SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let text = toml::to_string_pretty(&ViewerConfig::default()).unwrap();
        let parsed: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.sync.block_size, 32);
        assert_eq!(parsed.display.width, 1024);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let parsed: ViewerConfig = toml::from_str("[sync]\nblock_size = 64\n").unwrap();
        assert_eq!(parsed.sync.block_size, 64);
        assert_eq!(parsed.sync.debounce_ms, 400);
    }

    #[test]
    fn sampling_string_maps_to_policy() {
        let mut cfg = ViewerConfig::default();
        cfg.sync.sampling = "sampled".into();
        assert_eq!(cfg.session_config().sampling, rdc_core::RowSampling::EveryOther);
        cfg.sync.sampling = "full".into();
        assert_eq!(cfg.session_config().sampling, rdc_core::RowSampling::Full);
    }
}
