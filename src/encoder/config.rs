//! Per-key encoder configuration
//!
//! Every encoder key resolves to a fully populated [`EncoderConfig`]. Partial
//! settings from the built-in table or the mapping file are
//! [`EncoderOverrides`] merged onto [`EncoderConfig::default`]: first the key's
//! overrides, then the overrides of the group target the encoder writes to.

use crate::control::GroupTarget;
use crate::error::MappingError;
use serde::Deserialize;
use std::collections::HashMap;

/// Resolved settings of one encoder key
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub minimum: f64,
    pub maximum: f64,
    /// Change per tick before acceleration
    pub step: f64,
    /// Multiplier growth per rapid tick
    pub acceleration: f64,
    /// Upper bound of the multiplier
    pub acceleration_limit: f64,
    /// Pulse command issued instead of a write on clockwise ticks
    pub up: Option<String>,
    /// Pulse command issued instead of a write on counter-clockwise ticks
    pub down: Option<String>,
    /// Detent at 0.5 for normalized controls
    pub stop_at_middle: bool,
    /// Write the parameter back to 0 after every tick
    pub reset: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            minimum: 0.0,
            maximum: 1.0,
            step: 0.01,
            acceleration: 1.2,
            acceleration_limit: 10.0,
            up: None,
            down: None,
            stop_at_middle: false,
            reset: false,
        }
    }
}

impl EncoderConfig {
    /// Default 0..1 bounds mean the control is addressed as a normalized parameter
    pub fn is_normalized(&self) -> bool {
        self.minimum == 0.0 && self.maximum == 1.0
    }

    pub fn validate(&self, key: &str) -> Result<(), MappingError> {
        let invalid = |reason: String| MappingError::InvalidEncoder {
            key: key.to_string(),
            reason,
        };

        if !self.minimum.is_finite() || !self.maximum.is_finite() || self.minimum >= self.maximum {
            return Err(invalid(format!(
                "minimum {} must be below maximum {}",
                self.minimum, self.maximum
            )));
        }
        if !self.step.is_finite() || self.step < 0.0 {
            return Err(invalid(format!("step {} must be a non-negative number", self.step)));
        }
        if !self.acceleration.is_finite() || self.acceleration < 0.0 {
            return Err(invalid(format!(
                "acceleration {} must be a non-negative number",
                self.acceleration
            )));
        }
        if !self.acceleration_limit.is_finite() || self.acceleration_limit < 0.0 {
            return Err(invalid(format!(
                "acceleration_limit {} must be a non-negative number",
                self.acceleration_limit
            )));
        }
        for command in [&self.up, &self.down].into_iter().flatten() {
            if command.trim().is_empty() {
                return Err(invalid("pulse command names cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Partial encoder settings as written in a mapping file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderOverrides {
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub acceleration: Option<f64>,
    #[serde(default)]
    pub acceleration_limit: Option<f64>,
    #[serde(default)]
    pub up: Option<String>,
    #[serde(default)]
    pub down: Option<String>,
    #[serde(default)]
    pub stop_at_middle: Option<bool>,
    #[serde(default)]
    pub reset: Option<bool>,
}

impl EncoderOverrides {
    /// Merge onto `base`; fields left unset keep the base value
    pub fn apply(&self, base: EncoderConfig) -> EncoderConfig {
        EncoderConfig {
            minimum: self.minimum.unwrap_or(base.minimum),
            maximum: self.maximum.unwrap_or(base.maximum),
            step: self.step.unwrap_or(base.step),
            acceleration: self.acceleration.unwrap_or(base.acceleration),
            acceleration_limit: self.acceleration_limit.unwrap_or(base.acceleration_limit),
            up: self.up.clone().or(base.up),
            down: self.down.clone().or(base.down),
            stop_at_middle: self.stop_at_middle.unwrap_or(base.stop_at_middle),
            reset: self.reset.unwrap_or(base.reset),
        }
    }
}

/// Encoder section of a mapping file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderTableConfig {
    #[serde(default)]
    pub keys: HashMap<String, EncoderOverrides>,
    #[serde(default)]
    pub groups: HashMap<GroupTarget, EncoderOverrides>,
}

/// Validated lookup table from encoder key to configuration
#[derive(Debug, Clone, Default)]
pub struct EncoderTable {
    keys: HashMap<String, EncoderOverrides>,
    groups: HashMap<GroupTarget, EncoderOverrides>,
}

impl EncoderTable {
    /// Table of the keys the bundled mappings rely on
    pub fn builtin() -> Self {
        fn o() -> EncoderOverrides {
            EncoderOverrides::default()
        }

        let keys = [
            ("rate", EncoderOverrides { minimum: Some(-1.0), maximum: Some(1.0), step: Some(0.001), ..o() }),
            (
                "jog",
                EncoderOverrides {
                    minimum: Some(-3.0),
                    maximum: Some(3.0),
                    step: Some(0.1),
                    acceleration: Some(1.5),
                    acceleration_limit: Some(30.0),
                    ..o()
                },
            ),
            (
                "playposition",
                EncoderOverrides {
                    step: Some(0.00003),
                    acceleration: Some(1.4),
                    acceleration_limit: Some(500.0),
                    ..o()
                },
            ),
            (
                "beats_translate",
                EncoderOverrides {
                    step: Some(0.2),
                    acceleration: Some(1.0),
                    up: Some("beats_translate_later".to_string()),
                    down: Some("beats_translate_earlier".to_string()),
                    ..o()
                },
            ),
            (
                "pitch",
                EncoderOverrides {
                    minimum: Some(-6.0),
                    maximum: Some(6.0),
                    step: Some(0.01),
                    acceleration: Some(1.1),
                    ..o()
                },
            ),
            (
                "scratch",
                EncoderOverrides {
                    step: Some(1.0),
                    acceleration: Some(2.0),
                    acceleration_limit: Some(4.0),
                    ..o()
                },
            ),
            ("super1", EncoderOverrides { acceleration: Some(1.1), stop_at_middle: Some(true), ..o() }),
            ("pregain", EncoderOverrides { maximum: Some(4.0), ..o() }),
            (
                "loop_move",
                EncoderOverrides {
                    minimum: Some(-1.0),
                    acceleration: Some(1.1),
                    reset: Some(true),
                    ..o()
                },
            ),
            (
                "loop_factor2",
                EncoderOverrides {
                    step: Some(1.0),
                    acceleration: Some(0.0),
                    up: Some("loop_double".to_string()),
                    down: Some("loop_halve".to_string()),
                    ..o()
                },
            ),
            ("headVolume", EncoderOverrides { maximum: Some(5.0), ..o() }),
            ("headMix", EncoderOverrides { minimum: Some(-1.0), maximum: Some(1.0), step: Some(0.03), ..o() }),
            (
                "SelectTrackKnob",
                EncoderOverrides {
                    minimum: Some(-25.0),
                    maximum: Some(25.0),
                    step: Some(1.0),
                    acceleration: Some(1.3),
                    acceleration_limit: Some(16.0),
                    reset: Some(true),
                    ..o()
                },
            ),
        ];

        let groups = [(
            GroupTarget::Equalizer,
            EncoderOverrides {
                stop_at_middle: Some(true),
                ..o()
            },
        )];

        Self {
            keys: keys.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            groups: groups.into_iter().collect(),
        }
    }

    /// Built-in table extended by a mapping file's encoder section
    ///
    /// Entries from the file replace built-in entries of the same key.
    pub fn with_config(config: &EncoderTableConfig) -> Result<Self, MappingError> {
        let mut table = Self::builtin();
        table
            .keys
            .extend(config.keys.iter().map(|(k, v)| (k.clone(), v.clone())));
        table
            .groups
            .extend(config.groups.iter().map(|(k, v)| (*k, v.clone())));
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        for (key, overrides) in &self.keys {
            overrides.apply(EncoderConfig::default()).validate(key)?;
        }
        for (target, overrides) in &self.groups {
            overrides
                .apply(EncoderConfig::default())
                .validate(&target.to_string())?;
        }
        Ok(())
    }

    /// Resolve the configuration of `key` when writing to `target`
    ///
    /// Unknown keys fall back to the defaults. Key and group overrides are each
    /// valid on their own, but their merge may still be empty.
    pub fn lookup(&self, key: &str, target: &GroupTarget) -> Result<EncoderConfig, MappingError> {
        let mut config = EncoderConfig::default();
        if let Some(overrides) = self.keys.get(key) {
            config = overrides.apply(config);
        }
        if let Some(overrides) = self.groups.get(target) {
            config = overrides.apply(config);
        }
        config.validate(key)?;
        Ok(config)
    }
}
