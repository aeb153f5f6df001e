//! # Configuration Module
//!
//! Tunable constants for the stabilization engine. The amplitude gate and the
//! smoothing window are empirically tuned product values, so they live here
//! rather than as constants in the algorithms.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pitch::CONCERT_A4;

/// Engine settings. Every field has a default, so a partial JSON document is
/// enough to override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples with an amplitude at or below this value are treated as silence.
    pub minimum_amplitude: f32,
    /// Number of accepted samples averaged by the signal conditioner.
    pub smoothing_window: usize,
    /// Deviations smaller than this (in cents) are reported as exactly zero.
    pub dead_zone_cents: f32,
    /// Concert pitch for A4 in Hz.
    pub reference_a4: f32,
    /// Period of the sustain tick in milliseconds.
    pub sustain_interval_ms: u64,
    /// Number of sustain ticks before a held reading is cleared.
    pub sustain_ticks: u32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            minimum_amplitude: 0.14,
            smoothing_window: 5,
            dead_zone_cents: 5.0,
            reference_a4: CONCERT_A4,
            sustain_interval_ms: 50,
            sustain_ticks: 20,
        }
    }
}

impl TunerConfig {
    /// Parses a configuration from JSON and validates it.
    ///
    /// # Arguments
    /// * `json` - JSON object; missing fields keep their defaults
    ///
    /// # Returns
    /// * `Ok(config)` - Parsed and validated configuration
    /// * `Err(e)` - Malformed JSON or an out-of-range value
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TunerConfig =
            serde_json::from_str(json).context("Failed to parse tuner configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable by the engine.
    pub fn validate(&self) -> Result<()> {
        if !self.minimum_amplitude.is_finite() || self.minimum_amplitude < 0.0 {
            return Err(anyhow!(
                "minimum_amplitude must be a non-negative number, got {}",
                self.minimum_amplitude
            ));
        }
        if self.smoothing_window == 0 {
            return Err(anyhow!("smoothing_window must hold at least one sample"));
        }
        if !self.dead_zone_cents.is_finite() || self.dead_zone_cents < 0.0 {
            return Err(anyhow!(
                "dead_zone_cents must be a non-negative number, got {}",
                self.dead_zone_cents
            ));
        }
        if !self.reference_a4.is_finite() || self.reference_a4 <= 0.0 {
            return Err(anyhow!("reference_a4 must be positive, got {}", self.reference_a4));
        }
        if self.sustain_interval_ms == 0 {
            return Err(anyhow!("sustain_interval_ms must be at least 1"));
        }
        Ok(())
    }

    pub fn sustain_interval(&self) -> Duration {
        Duration::from_millis(self.sustain_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TunerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.sustain_interval(), Duration::from_millis(50));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TunerConfig::from_json(r#"{ "minimum_amplitude": 0.1 }"#).unwrap();
        assert_eq!(config.minimum_amplitude, 0.1);
        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.reference_a4, 440.0);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(TunerConfig::from_json(r#"{ "smoothing_window": 0 }"#).is_err());
        assert!(TunerConfig::from_json(r#"{ "reference_a4": -440.0 }"#).is_err());
        assert!(TunerConfig::from_json(r#"{ "sustain_interval_ms": 0 }"#).is_err());
        assert!(TunerConfig::from_json("not json").is_err());
    }
}
