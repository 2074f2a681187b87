//! Configuration for the deobfuscation engine.
//!
//! This module provides configuration types for controlling the deobfuscation
//! pipeline: round limits, technique selection, detection thresholds, trial calls and
//! sandbox limits, and cleanup.

use std::time::Duration;

use crate::sandbox::SandboxConfig;

/// Key passed as second argument when trying two-parameter decoders.
///
/// Keyed decoders usually hash or RC4 the key, so any string works; this one is
/// unlikely to collide with a real key.
pub const DEFAULT_TRIAL_KEY: &str = "jsdeob:trial";

/// Indices every decoder candidate is tried with.
pub const DEFAULT_TRIAL_INDICES: &[f64] =
    &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 16.0, 32.0, 64.0, 128.0, 255.0];

/// Configuration for the deobfuscation engine.
///
/// Controls the number of pipeline rounds, which techniques are registered by
/// [`crate::deobfuscation::DeobfuscationEngine::new`], and the parameters of the
/// string pool technique.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of pipeline rounds (default: 5).
    pub max_rounds: usize,

    /// Minimum number of string literals for an array to count as a pool (default: 6).
    pub min_pool_size: usize,

    /// Indices used to try decoder candidates.
    pub trial_indices: Vec<f64>,

    /// Second argument used to try candidates with two or more parameters.
    pub trial_key: String,

    /// Number of call sites per candidate whose folded first argument is added to
    /// the trials (default: 8). Covers decoders whose index offset lies beyond the
    /// fixed trial set.
    pub trial_call_sites: usize,

    /// Limits for every sandbox the engine launches.
    pub sandbox: SandboxConfig,

    /// Register the string pool technique.
    pub enable_string_pool: bool,

    /// Register the glyph encoding detector.
    pub enable_glyph: bool,

    /// Register the punctuation encoding detector.
    pub enable_punctuation: bool,

    /// Share of `[]()+!` characters above which a script counts as
    /// punctuation-encoded (default: 0.12).
    pub punctuation_density: f64,

    /// Post-rewrite cleanup configuration.
    pub cleanup: CleanupConfig,
}

/// Configuration for the cleanup that follows a successful string pool rewrite.
///
/// Both steps only run when at least one decoder was validated, and both leave
/// program behaviour unchanged.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Replace `!![]` with `true` and `![]` with `false` outside the prelude.
    pub normalize_boolean_idioms: bool,

    /// Remove an otherwise unreferenced top-level `encode_version` marker whose value
    /// names the obfuscator.
    pub strip_version_marker: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            normalize_boolean_idioms: true,
            strip_version_marker: true,
        }
    }
}

impl CleanupConfig {
    /// Creates a new cleanup configuration with all options enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with all cleanup disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            normalize_boolean_idioms: false,
            strip_version_marker: false,
        }
    }

    /// Returns true if any cleanup is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.normalize_boolean_idioms || self.strip_version_marker
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            min_pool_size: 6,
            trial_indices: DEFAULT_TRIAL_INDICES.to_vec(),
            trial_key: DEFAULT_TRIAL_KEY.to_string(),
            trial_call_sites: 8,
            sandbox: SandboxConfig::default(),
            enable_string_pool: true,
            enable_glyph: true,
            enable_punctuation: true,
            punctuation_density: 0.12,
            cleanup: CleanupConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default settings.
    ///
    /// # Returns
    ///
    /// A new `EngineConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of rounds.
    ///
    /// # Arguments
    ///
    /// * `max` - The maximum number of pipeline rounds.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Sets the wall-clock budget for prelude evaluation.
    ///
    /// The per-call budget is capped at the same value.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum time to spend evaluating one prelude.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_sandbox_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox.timeout = timeout;
        self.sandbox.call_timeout = self.sandbox.call_timeout.min(timeout);
        self
    }

    /// Sets the minimum pool size.
    ///
    /// # Arguments
    ///
    /// * `size` - Minimum number of string literals in a pool.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_min_pool_size(mut self, size: usize) -> Self {
        self.min_pool_size = size;
        self
    }

    /// Replaces the cleanup configuration.
    ///
    /// # Arguments
    ///
    /// * `cleanup` - The cleanup settings.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = cleanup;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.min_pool_size, 6);
        assert_eq!(config.trial_indices.len(), 12);
        assert_eq!(config.trial_indices.last(), Some(&255.0));
        assert!(config.enable_string_pool && config.enable_glyph && config.enable_punctuation);
        assert!(config.cleanup.any_enabled());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::new()
            .with_max_rounds(2)
            .with_min_pool_size(3)
            .with_sandbox_timeout(Duration::from_millis(50))
            .with_cleanup(CleanupConfig::disabled());
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.min_pool_size, 3);
        assert_eq!(config.sandbox.timeout, Duration::from_millis(50));
        assert_eq!(config.sandbox.call_timeout, Duration::from_millis(50));
        assert!(!config.cleanup.any_enabled());
    }
}
