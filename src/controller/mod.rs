//! Controller assembled from a mapping file
//!
//! The controller owns one [`Shifter`] and a handler per physical input. Raw
//! MIDI bytes go in through [`Controller::handle_midi`]; host writes and
//! feedback messages come out through the host and the sink it was built with.

#[cfg(test)]
mod tests;

use crate::buttons::ButtonActions;
use crate::config::{ActionSpec, ControlConfig, MappingConfig, StartupAction};
use crate::control::{ControlRef, Group};
use crate::encoder::{EncoderDecoder, EncoderTable};
use crate::event::{ControlAddr, ControlEvent, Handler};
use crate::feedback::{FeedbackRoute, FeedbackSink, FeedbackSource};
use crate::host::SharedHost;
use crate::midi::{format_hex, MidiMessage};
use crate::shift::{ControlSwitch, RouteTable, Shifter};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Modifier events are not tied to a deck
const MODIFIER_GROUP: Group = Group::Master;

struct InputBinding {
    name: String,
    group: Group,
    handler: Handler,
}

pub struct Controller {
    name: String,
    host: SharedHost,
    shifter: Shifter,
    inputs: HashMap<ControlAddr, InputBinding>,
    startup: Vec<StartupAction>,
}

impl Controller {
    /// Wire every modifier, control and feedback binding of `config`
    pub fn build(config: &MappingConfig, host: SharedHost, sink: Rc<dyn FeedbackSink>) -> Result<Self> {
        let levels = config.shift_levels()?;
        let encoders = config.encoder_table()?;
        let shifter = Shifter::new(config.name.clone(), levels, host.clone(), sink);
        let builder = ActionBuilder {
            host: host.clone(),
            buttons: ButtonActions::new(host.clone()),
            encoders,
        };

        let mut inputs = HashMap::new();
        for modifier in &config.modifiers {
            let addr = modifier.input.addr()?;
            inputs.insert(
                addr,
                InputBinding {
                    name: format!("shift {}", modifier.level),
                    group: MODIFIER_GROUP,
                    handler: shifter.hold_for(&modifier.level)?,
                },
            );
        }

        for control in &config.controls {
            let addr = control.input_addr()?;
            let handler = Self::build_control(control, &builder, &shifter)
                .with_context(|| format!("Failed to build control '{}'", control.name))?;
            inputs.insert(
                addr,
                InputBinding {
                    name: control.name.clone(),
                    group: control.group,
                    handler,
                },
            );
        }

        info!(
            "🎛️  Mapping '{}': {} input(s), {} level(s)",
            config.name,
            inputs.len(),
            shifter.levels().len()
        );

        Ok(Self {
            name: config.name.clone(),
            host,
            shifter,
            inputs,
            startup: config.startup.clone(),
        })
    }

    fn build_control(control: &ControlConfig, builder: &ActionBuilder, shifter: &Shifter) -> Result<Handler> {
        let output = control.output_addr()?;

        let handler = match &control.action {
            Some(action) => builder.build(action)?,
            None => {
                let mut routes = Vec::with_capacity(control.routes.len());
                for (level, action) in &control.routes {
                    routes.push((level.as_str(), builder.build(action)?));
                }
                let table = RouteTable::from_named(shifter.levels(), routes)?.with_output(output);
                shifter.route(table)
            }
        };

        for (level, spec) in &control.feedback {
            let mut sources = Vec::with_capacity(spec.sources.len());
            for source in &spec.sources {
                let target = ControlRef::new(source.group.resolve(control.group)?, source.key.as_str());
                sources.push(match source.range {
                    Some([minimum, maximum]) => FeedbackSource::range(target, minimum, maximum)?,
                    None => FeedbackSource::parameter(target),
                });
            }
            shifter.connect(output, level, FeedbackRoute::new(sources, spec.compose)?)?;
        }

        Ok(handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shifter(&self) -> &Shifter {
        &self.shifter
    }

    pub fn current_level(&self) -> &str {
        self.shifter.current_level_name()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Run the startup commands and show the rest level's feedback
    pub fn start(&self) -> Result<()> {
        for action in &self.startup {
            match action {
                StartupAction::Set { group, key, value } => {
                    self.host.set_value(&ControlRef::new(*group, key.as_str()), *value)?;
                }
                StartupAction::Pulse { group, key } => {
                    self.host.pulse(&ControlRef::new(*group, key.as_str()))?;
                }
                StartupAction::SelectEffect { group, index } => {
                    debug!("Selecting effect {} in {}", index, group);
                    self.host.pulse(&ControlRef::new(*group, "clear"))?;
                    let next = ControlRef::new(*group, "next_effect");
                    for _ in 0..*index {
                        self.host.pulse(&next)?;
                    }
                }
            }
        }
        info!("▶️  Mapping '{}' started ({} startup command(s))", self.name, self.startup.len());
        self.shifter.refresh()
    }

    /// Dispatch raw bytes from the surface
    ///
    /// Returns whether an input handled the message.
    pub fn handle_midi(&self, raw: &[u8], at: Instant) -> Result<bool> {
        match MidiMessage::parse(raw) {
            Some(message) => self.handle_message(&message, at),
            None => {
                trace!("Ignoring MIDI [{}]", format_hex(raw));
                Ok(false)
            }
        }
    }

    pub fn handle_message(&self, message: &MidiMessage, at: Instant) -> Result<bool> {
        let addr = ControlAddr::of_message(message);
        let Some(input) = self.inputs.get(&addr) else {
            trace!("No input bound to {}", addr);
            return Ok(false);
        };

        trace!("→ {} {}", input.name, message);
        let event = ControlEvent::from_message(message, input.group, at);
        (input.handler)(&event).with_context(|| format!("Input '{}' failed on {}", input.name, message))?;
        Ok(true)
    }
}

/// Turns action specs into handlers sharing one host
struct ActionBuilder {
    host: SharedHost,
    buttons: ButtonActions,
    encoders: EncoderTable,
}

impl ActionBuilder {
    fn build(&self, action: &ActionSpec) -> Result<Handler> {
        Ok(match action {
            ActionSpec::Encoder { key, group } => {
                EncoderDecoder::new(key.as_str(), *group, &self.encoders, self.host.clone())?.into_handler()
            }
            ActionSpec::Hold { key, group } => self.buttons.hold(key, *group),
            ActionSpec::Toggle { key, group } => self.buttons.toggle(key, *group),
            ActionSpec::Set { key, value, group } => self.buttons.set(key, *value, *group),
            ActionSpec::Reset { values, group } => self.buttons.reset_group(values.clone(), *group),
            ActionSpec::Switch { key, group, on, off } => {
                ControlSwitch::new(self.host.clone(), key.as_str(), *group)
                    .into_handler(self.build(on)?, self.build(off)?)
            }
        })
    }
}
