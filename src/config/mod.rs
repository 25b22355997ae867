//! Mapping file for a control surface
//!
//! A mapping declares the shift levels, encoder tuning, modifier buttons, every
//! physical control with its per-level actions and feedback, and the commands
//! to run once at startup. Files are YAML and are fully validated on load.

use crate::control::{Group, GroupTarget};
use crate::encoder::{EncoderTable, EncoderTableConfig};
use crate::event::ControlAddr;
use crate::feedback::Compose;
use crate::shift::ShiftLevels;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::fs;

/// Root of a mapping file
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    pub name: String,
    #[serde(default)]
    pub midi: Option<MidiPorts>,
    #[serde(default = "default_levels")]
    pub levels: Vec<String>,
    #[serde(default)]
    pub encoders: EncoderTableConfig,
    #[serde(default)]
    pub modifiers: Vec<ModifierConfig>,
    pub controls: Vec<ControlConfig>,
    #[serde(default)]
    pub startup: Vec<StartupAction>,
}

/// Port name patterns, matched case-insensitively as substrings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MidiPorts {
    pub input_port: Option<String>,
    pub output_port: Option<String>,
}

/// Button selecting a shift level while held
#[derive(Debug, Clone, Deserialize)]
pub struct ModifierConfig {
    pub level: String,
    pub input: MidiSpec,
}

/// Physical address as written in the file (channels 1-16)
#[derive(Debug, Clone, Deserialize)]
pub struct MidiSpec {
    #[serde(rename = "type")]
    pub midi_type: MidiType,
    #[serde(default = "default_channel")]
    pub channel: u8,
    pub cc: Option<u8>,
    pub note: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MidiType {
    Cc,
    Note,
}

impl MidiSpec {
    /// Validated wire address
    pub fn addr(&self) -> Result<ControlAddr> {
        if self.channel == 0 || self.channel > 16 {
            anyhow::bail!("invalid MIDI channel {} (must be 1-16)", self.channel);
        }
        let channel = self.channel - 1;
        match self.midi_type {
            MidiType::Cc => {
                let cc = self.cc.context("CC type requires 'cc' field")?;
                if cc > 127 {
                    anyhow::bail!("invalid CC number {} (must be 0-127)", cc);
                }
                Ok(ControlAddr::cc(channel, cc))
            }
            MidiType::Note => {
                let note = self.note.context("Note type requires 'note' field")?;
                if note > 127 {
                    anyhow::bail!("invalid note number {} (must be 0-127)", note);
                }
                Ok(ControlAddr::note(channel, note))
            }
        }
    }
}

/// One physical control
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    pub name: String,
    pub group: Group,
    pub input: MidiSpec,
    /// Action per shift level
    #[serde(default)]
    pub routes: BTreeMap<String, ActionSpec>,
    /// Action independent of the shift level
    #[serde(default)]
    pub action: Option<ActionSpec>,
    #[serde(default)]
    pub feedback: BTreeMap<String, FeedbackSpec>,
    /// Feedback address, defaults to the input address
    #[serde(default)]
    pub output: Option<MidiSpec>,
}

impl ControlConfig {
    pub fn input_addr(&self) -> Result<ControlAddr> {
        self.input.addr()
    }

    pub fn output_addr(&self) -> Result<ControlAddr> {
        match &self.output {
            Some(output) => output.addr().context("invalid output"),
            None => self.input_addr(),
        }
    }
}

/// What a control does
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Relative encoder driving `key`
    Encoder {
        key: String,
        #[serde(default)]
        group: GroupTarget,
    },
    Hold {
        key: String,
        #[serde(default)]
        group: GroupTarget,
    },
    Toggle {
        key: String,
        #[serde(default)]
        group: GroupTarget,
    },
    Set {
        key: String,
        value: f64,
        #[serde(default)]
        group: GroupTarget,
    },
    /// Restore several parameters on release
    Reset {
        values: BTreeMap<String, f64>,
        #[serde(default)]
        group: GroupTarget,
    },
    /// Pick `on` or `off` by the state of `key`
    Switch {
        key: String,
        #[serde(default)]
        group: GroupTarget,
        on: Box<ActionSpec>,
        off: Box<ActionSpec>,
    },
}

impl ActionSpec {
    fn validate(&self, group: Group, encoders: &EncoderTable) -> Result<()> {
        let (key, target) = match self {
            ActionSpec::Encoder { key, group: target } => {
                encoders.lookup(key, target)?;
                (key.as_str(), target)
            }
            ActionSpec::Hold { key, group: target }
            | ActionSpec::Toggle { key, group: target }
            | ActionSpec::Set { key, group: target, .. } => (key.as_str(), target),
            ActionSpec::Reset { values, group: target } => {
                if values.is_empty() {
                    anyhow::bail!("reset needs at least one value");
                }
                target.resolve(group)?;
                return Ok(());
            }
            ActionSpec::Switch {
                key,
                group: target,
                on,
                off,
            } => {
                on.validate(group, encoders).context("in 'on' branch")?;
                off.validate(group, encoders).context("in 'off' branch")?;
                (key.as_str(), target)
            }
        };
        if key.is_empty() {
            anyhow::bail!("action key cannot be empty");
        }
        target.resolve(group)?;
        Ok(())
    }
}

/// Feedback shown on a control's output at one level
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackSpec {
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub compose: Compose,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub group: GroupTarget,
    pub key: String,
    /// Native range; without it the normalized parameter is shown
    #[serde(default)]
    pub range: Option<[f64; 2]>,
}

/// Command issued once when the mapping starts
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StartupAction {
    Set { group: Group, key: String, value: f64 },
    Pulse { group: Group, key: String },
    /// Clear the slot, then step to the effect at `index`
    SelectEffect { group: Group, index: u32 },
}

impl MappingConfig {
    /// Load a mapping from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read mapping file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid mapping file: {}", path.display()))
    }

    /// Parse and validate a mapping document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: MappingConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML mapping")?;
        config.validate()?;
        Ok(config)
    }

    pub fn shift_levels(&self) -> Result<ShiftLevels> {
        Ok(ShiftLevels::new(self.levels.iter().cloned())?)
    }

    pub fn encoder_table(&self) -> Result<EncoderTable> {
        Ok(EncoderTable::with_config(&self.encoders)?)
    }

    /// Validate mapping for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Mapping name cannot be empty");
        }
        if self.controls.is_empty() {
            anyhow::bail!("At least one control must be defined");
        }

        let levels = self.shift_levels().context("Invalid levels")?;
        let encoders = self.encoder_table().context("Invalid encoder configuration")?;

        let mut inputs: HashSet<ControlAddr> = HashSet::new();
        for (idx, modifier) in self.modifiers.iter().enumerate() {
            levels
                .id(&modifier.level)
                .with_context(|| format!("Invalid modifier {}", idx))?;
            let addr = modifier
                .input
                .addr()
                .with_context(|| format!("Invalid input of modifier {}", idx))?;
            if !inputs.insert(addr) {
                anyhow::bail!("Modifier {} input {} is already in use", idx, addr);
            }
        }

        let mut names = HashSet::new();
        for control in &self.controls {
            if !names.insert(control.name.as_str()) {
                anyhow::bail!("Duplicate control name '{}'", control.name);
            }
            let addr = self
                .validate_control(control, &levels, &encoders)
                .with_context(|| format!("Invalid control '{}'", control.name))?;
            if !inputs.insert(addr) {
                anyhow::bail!("Control '{}' input {} is already in use", control.name, addr);
            }
        }

        for (idx, action) in self.startup.iter().enumerate() {
            if let StartupAction::Set { key, .. } | StartupAction::Pulse { key, .. } = action {
                if key.is_empty() {
                    anyhow::bail!("Startup action {} key cannot be empty", idx);
                }
            }
        }

        Ok(())
    }

    /// Validate a single control and return its input address
    fn validate_control(
        &self,
        control: &ControlConfig,
        levels: &ShiftLevels,
        encoders: &EncoderTable,
    ) -> Result<ControlAddr> {
        if control.name.is_empty() {
            anyhow::bail!("Control name cannot be empty");
        }
        let addr = control.input_addr().context("invalid input")?;
        control.output_addr()?;

        match (&control.action, control.routes.is_empty()) {
            (Some(_), false) => anyhow::bail!("specify either 'routes' or 'action', not both"),
            (None, true) => anyhow::bail!("must specify either 'routes' or 'action'"),
            (Some(action), true) => action.validate(control.group, encoders)?,
            (None, false) => {
                for (level, action) in &control.routes {
                    levels.id(level)?;
                    action
                        .validate(control.group, encoders)
                        .with_context(|| format!("in route '{}'", level))?;
                }
            }
        }

        for (level, feedback) in &control.feedback {
            levels.id(level)?;
            if feedback.sources.is_empty() {
                anyhow::bail!("feedback at level '{}' needs at least one source", level);
            }
            for source in &feedback.sources {
                source
                    .group
                    .resolve(control.group)
                    .with_context(|| format!("in feedback '{}'", level))?;
                if let Some([minimum, maximum]) = source.range {
                    if !(minimum < maximum) {
                        anyhow::bail!(
                            "feedback source '{}' has empty range [{}, {}]",
                            source.key,
                            minimum,
                            maximum
                        );
                    }
                }
            }
        }

        Ok(addr)
    }
}

// Default value functions
fn default_levels() -> Vec<String> {
    vec!["off".to_string(), "on".to_string()]
}
fn default_channel() -> u8 { 1 }
