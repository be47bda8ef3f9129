#![forbid(unsafe_code)]

//! Tunables as data.
//!
//! Every field defaults to the built-in behavior, so `PasteLockConfig::default()`
//! is what the injected script runs with. An extension may hand a JSON
//! document to `pastelock-web`'s `configure` to retune timings or heuristics:
//!
//! ```json
//! {
//!   "align": { "poll_interval_ms": 40, "max_attempts": 30 },
//!   "identity": [{ "attribute": "data-id" }, "dom_id"]
//! }
//! ```

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::ActivationPolicy;
use crate::error::ConfigError;
use crate::locator::{DEFAULT_SELECTED_MARKERS, SelectionLocator};
use crate::signature::{IdentityChain, IdentitySource};

/// Timing and threshold parameters for one alignment cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Wait after a paste gesture before polling starts, letting the editor
    /// begin rendering the pasted element.
    pub paste_settle_ms: u64,
    /// Interval between polling attempts.
    pub poll_interval_ms: u64,
    /// Counted attempts before the cycle is abandoned.
    pub max_attempts: u32,
    /// Manhattan distance (px) above which a same-identity selection counts
    /// as a different, pasted element.
    pub move_threshold_px: f64,
    /// Per-axis distance (px) under which the target is already in place.
    pub aligned_tolerance_px: f64,
    /// Forget the copied signature once a cycle corrects something.
    pub clear_capture_after_paste: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            paste_settle_ms: 20,
            poll_interval_ms: 60,
            max_attempts: 20,
            move_threshold_px: 2.0,
            aligned_tolerance_px: 1.0,
            clear_capture_after_paste: false,
        }
    }
}

impl AlignConfig {
    /// Settle delay as a duration.
    #[must_use]
    pub const fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("align.poll_interval_ms must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("align.max_attempts must be > 0"));
        }
        let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !finite_non_negative(self.move_threshold_px) {
            return Err(ConfigError::Invalid(
                "align.move_threshold_px must be finite and >= 0",
            ));
        }
        if !finite_non_negative(self.aligned_tolerance_px) {
            return Err(ConfigError::Invalid(
                "align.aligned_tolerance_px must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasteLockConfig {
    /// Which documents the patch activates on.
    pub activation: ActivationPolicy,
    /// Alignment timings and thresholds.
    pub align: AlignConfig,
    /// Selection heuristics in priority order.
    pub selectors: Vec<String>,
    /// Identity sources in priority order; geometry is always the fallback.
    pub identity: Vec<IdentitySource>,
}

impl Default for PasteLockConfig {
    fn default() -> Self {
        Self {
            activation: ActivationPolicy::default(),
            align: AlignConfig::default(),
            selectors: DEFAULT_SELECTED_MARKERS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            identity: IdentityChain::default().sources().to_vec(),
        }
    }
}

impl PasteLockConfig {
    /// Load from a JSON string and validate.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.align.validate()?;
        if self.selectors.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("selectors must not be empty"));
        }
        Ok(())
    }

    /// Locator built from `selectors`.
    #[must_use]
    pub fn locator(&self) -> SelectionLocator {
        SelectionLocator::new(
            self.selectors
                .iter()
                .filter(|s| !s.trim().is_empty())
                .cloned(),
        )
    }

    /// Identity chain built from `identity`.
    #[must_use]
    pub fn identity_chain(&self) -> IdentityChain {
        IdentityChain::new(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_built_in_behavior() {
        let config = PasteLockConfig::default();
        assert_eq!(config.align.paste_settle(), Duration::from_millis(20));
        assert_eq!(config.align.poll_interval(), Duration::from_millis(60));
        assert_eq!(config.align.max_attempts, 20);
        assert_eq!(config.locator(), SelectionLocator::default());
        assert_eq!(config.identity_chain(), IdentityChain::default());
        assert_eq!(config.activation.host_patterns, vec!["canva.com".to_owned()]);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(
            PasteLockConfig::from_json_str("{}").unwrap(),
            PasteLockConfig::default()
        );
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = PasteLockConfig::from_json_str(
            r#"{
                "align": { "poll_interval_ms": 40, "clear_capture_after_paste": true },
                "identity": [{ "attribute": "data-node" }, "dom_id"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.align.poll_interval_ms, 40);
        assert_eq!(config.align.max_attempts, 20);
        assert!(config.align.clear_capture_after_paste);
        assert_eq!(
            config.identity,
            vec![
                IdentitySource::Attribute("data-node".into()),
                IdentitySource::DomId
            ]
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        for json in [
            r#"{ "align": { "poll_interval_ms": 0 } }"#,
            r#"{ "align": { "max_attempts": 0 } }"#,
            r#"{ "align": { "move_threshold_px": -1.0 } }"#,
            r#"{ "selectors": [] }"#,
            r#"{ "selectors": ["  "] }"#,
        ] {
            let err = PasteLockConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{json}: {err}");
        }
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = PasteLockConfig::from_json_str(r#"{ "align": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
