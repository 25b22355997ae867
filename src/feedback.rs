//! Feedback routing from host controls to surface LEDs
//!
//! The router subscribes once per host control and, on every change, emits
//! only the bindings owned by the active shift level. A physical LED ring can
//! therefore show a different control in each level without the levels
//! fighting over it.

use crate::control::ControlRef;
use crate::error::MappingError;
use crate::event::ControlAddr;
use crate::host::SharedHost;
use crate::midi::{convert, format_hex, MidiMessage};
use crate::shift::LevelId;
use anyhow::Result;
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace};

/// Destination of outgoing surface messages
pub trait FeedbackSink {
    fn send(&self, message: &MidiMessage) -> Result<()>;
}

/// Sink that only logs, used when no output port is connected
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl FeedbackSink for ConsoleSink {
    fn send(&self, message: &MidiMessage) -> Result<()> {
        info!("💡 {} [{}]", message, format_hex(&message.encode()));
        Ok(())
    }
}

/// How a source value maps onto 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceScale {
    /// Read the host's normalized parameter
    Parameter,
    /// Read the native value and normalize against a fixed range
    Range { minimum: f64, maximum: f64 },
}

/// One host control feeding an output
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSource {
    pub control: ControlRef,
    pub scale: SourceScale,
}

impl FeedbackSource {
    pub fn parameter(control: ControlRef) -> Self {
        Self {
            control,
            scale: SourceScale::Parameter,
        }
    }

    pub fn range(control: ControlRef, minimum: f64, maximum: f64) -> Result<Self, MappingError> {
        if !(minimum < maximum) {
            return Err(MappingError::InvalidFeedback(format!(
                "{}: range [{}, {}] is empty",
                control, minimum, maximum
            )));
        }
        Ok(Self {
            control,
            scale: SourceScale::Range { minimum, maximum },
        })
    }
}

/// Combination of several source values into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compose {
    /// Numeric sum
    #[default]
    Sum,
    /// 1 if any source is above zero
    Any,
    /// 1 if the sum is above zero
    Positive,
    /// 1 if any source is below full scale
    AnyBelowMax,
}

impl Compose {
    pub fn apply(&self, values: &[f64]) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Compose::Sum => values.iter().sum(),
            Compose::Any => flag(values.iter().any(|v| *v > 0.0)),
            Compose::Positive => flag(values.iter().sum::<f64>() > 0.0),
            Compose::AnyBelowMax => flag(values.iter().any(|v| *v < 1.0)),
        }
    }
}

/// Value shown on one output
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRoute {
    pub sources: Vec<FeedbackSource>,
    pub compose: Compose,
}

impl FeedbackRoute {
    pub fn new(sources: Vec<FeedbackSource>, compose: Compose) -> Result<Self, MappingError> {
        if sources.is_empty() {
            return Err(MappingError::InvalidFeedback("route has no sources".to_string()));
        }
        Ok(Self { sources, compose })
    }

    /// Show one host parameter as is
    pub fn single(control: ControlRef) -> Self {
        Self {
            sources: vec![FeedbackSource::parameter(control)],
            compose: Compose::Sum,
        }
    }

    /// Read every source and compose them into a 7-bit wire value
    pub fn evaluate(&self, host: &SharedHost) -> Result<u8> {
        let mut values = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let value = match source.scale {
                SourceScale::Parameter => host.get_parameter(&source.control)?,
                SourceScale::Range { minimum, maximum } => {
                    (host.get_value(&source.control)? - minimum) / (maximum - minimum)
                }
            };
            values.push(value);
        }
        Ok(convert::from_unit_7bit(self.compose.apply(&values)))
    }
}

#[derive(Clone)]
struct Binding {
    output: ControlAddr,
    route: Rc<FeedbackRoute>,
}

#[derive(Default)]
struct Bindings {
    /// Subscribed controls in subscription order
    order: Vec<ControlRef>,
    subscribed: HashSet<ControlRef>,
    by_control: HashMap<ControlRef, HashMap<LevelId, Vec<Binding>>>,
    by_output: HashMap<(LevelId, ControlAddr), Vec<ControlRef>>,
}

/// Level-aware fan-out of host changes to surface outputs
pub struct FeedbackRouter {
    host: SharedHost,
    sink: Rc<dyn FeedbackSink>,
    active: Cell<LevelId>,
    bindings: RefCell<Bindings>,
    this: Weak<FeedbackRouter>,
}

impl FeedbackRouter {
    pub fn new(host: SharedHost, sink: Rc<dyn FeedbackSink>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            host,
            sink,
            active: Cell::new(LevelId::REST),
            bindings: RefCell::new(Bindings::default()),
            this: this.clone(),
        })
    }

    /// Show `route` on `output` while `level` is active
    ///
    /// Each source control is subscribed the first time any binding needs it.
    pub fn connect(&self, output: ControlAddr, level: LevelId, route: FeedbackRoute) -> Result<()> {
        let route = Rc::new(route);
        let mut controls: Vec<ControlRef> = Vec::with_capacity(route.sources.len());
        for source in &route.sources {
            if !controls.contains(&source.control) {
                controls.push(source.control.clone());
            }
        }

        // Nothing is bound until every source has a live subscription
        for control in &controls {
            if self.bindings.borrow().subscribed.contains(control) {
                continue;
            }
            debug!("Subscribing feedback to {}", control);
            let router = self.this.clone();
            let changed = control.clone();
            self.host.connect(
                control,
                Rc::new(move |_: f64| match router.upgrade() {
                    Some(router) => router.on_change(&changed),
                    None => Ok(()),
                }),
            )?;
            let mut bindings = self.bindings.borrow_mut();
            bindings.subscribed.insert(control.clone());
            bindings.order.push(control.clone());
        }

        let mut bindings = self.bindings.borrow_mut();
        for control in controls {
            bindings
                .by_control
                .entry(control.clone())
                .or_default()
                .entry(level)
                .or_default()
                .push(Binding {
                    output,
                    route: route.clone(),
                });
            bindings
                .by_output
                .entry((level, output))
                .or_default()
                .push(control);
        }
        Ok(())
    }

    /// Emit every binding of `control` owned by the active level
    pub fn on_change(&self, control: &ControlRef) -> Result<()> {
        let level = self.active.get();
        let targets = self
            .bindings
            .borrow()
            .by_control
            .get(control)
            .and_then(|levels| levels.get(&level))
            .cloned()
            .unwrap_or_default();
        if targets.is_empty() {
            trace!("No feedback for {} at level {}", control, level);
            return Ok(());
        }

        for binding in targets {
            let value = binding.route.evaluate(&self.host)?;
            let message = binding.output.message(value);
            trace!("Feedback {} → {} = {}", control, binding.output, value);
            self.sink.send(&message)?;
        }
        Ok(())
    }

    /// Make `level` active and refresh every control bound at it
    pub fn switch_to(&self, level: LevelId) -> Result<()> {
        self.active.set(level);
        self.refresh()
    }

    /// Re-deliver every control bound at the active level
    ///
    /// Delivery goes through the host's `trigger`, which reaches every
    /// subscriber of the control: other routers on the same host re-send their
    /// own bindings for it at their own active level.
    pub fn refresh(&self) -> Result<()> {
        let level = self.active.get();
        let controls: Vec<ControlRef> = {
            let bindings = self.bindings.borrow();
            bindings
                .order
                .iter()
                .filter(|control| {
                    bindings
                        .by_control
                        .get(*control)
                        .is_some_and(|levels| levels.contains_key(&level))
                })
                .cloned()
                .collect()
        };
        debug!("Refreshing {} feedback control(s) at level {}", controls.len(), level);
        for control in controls {
            self.host.trigger(&control)?;
        }
        Ok(())
    }

    /// Re-deliver the controls shown on `output` at `level`
    pub fn retrigger(&self, output: ControlAddr, level: LevelId) -> Result<()> {
        let controls = self
            .bindings
            .borrow()
            .by_output
            .get(&(level, output))
            .cloned()
            .unwrap_or_default();
        for control in controls {
            self.host.trigger(&control)?;
        }
        Ok(())
    }
}

/// Sink collecting messages for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    sent: RefCell<Vec<MidiMessage>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn take(&self) -> Vec<MidiMessage> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }
}

#[cfg(test)]
impl FeedbackSink for RecordingSink {
    fn send(&self, message: &MidiMessage) -> Result<()> {
        self.sent.borrow_mut().push(*message);
        Ok(())
    }
}
